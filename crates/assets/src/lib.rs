//! Asset transport for the viewer: chunked byte sources and the manifest of
//! known asset paths.
//!
//! Asset bodies are delivered as a stream of chunks plus an optional total
//! length, which is what lets the texture loader report byte-level progress.
//! The format of the bytes is opaque at this layer.
//!
//! # Invariants
//! - Opening a source never blocks on the body; file reads happen off the
//!   polling thread.
//! - A paced source delivers at most one chunk per released permit.

mod manifest;
mod pace;
mod source;

pub use manifest::AssetManifest;
pub use pace::{ChunkGate, PacedSource};
pub use source::{AssetSource, AssetStream, FsSource, MemorySource};

/// Errors from asset transport.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("transport failed for {uri} after {received} bytes")]
    Transport { uri: String, received: u64 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
