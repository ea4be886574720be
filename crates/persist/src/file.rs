//! Optional pose file: the store snapshot as pretty-printed JSON.
//!
//! Written after each debounced commit and read once at startup. A missing
//! file is not an error; an unreadable or invalid one is.

use crate::snapshot::{CameraSnapshot, PoseError};
use std::path::{Path, PathBuf};

/// Errors from pose file operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pose in {path}: {source}")]
    InvalidPose { path: String, source: PoseError },
}

#[derive(Debug, Clone)]
pub struct PoseFile {
    path: PathBuf,
}

impl PoseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, or `None` if the file does not exist.
    pub fn load(&self) -> Result<Option<CameraSnapshot>, StoreError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: CameraSnapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        snapshot
            .pose()
            .validate()
            .map_err(|source| StoreError::InvalidPose {
                path: self.path.display().to_string(),
                source,
            })?;
        tracing::debug!(path = %self.path.display(), "pose file loaded");
        Ok(Some(snapshot))
    }

    /// Write the snapshot, creating parent directories as needed.
    pub fn save(&self, snapshot: &CameraSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(std::fs::File::create(&self.path)?, snapshot)?;
        tracing::debug!(path = %self.path.display(), "pose file written");
        Ok(())
    }

    /// Remove the file. Missing files are fine.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
