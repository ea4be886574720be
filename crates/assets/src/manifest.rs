use crate::AssetError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Paths of the assets the viewer requests, relative to the asset source root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManifest {
    /// Compressed, pre-mipmapped base color texture.
    pub texture: String,
    pub normal_map: String,
    pub roughness_map: String,
    /// Single-level image substituted when the texture fails to load.
    pub fallback: String,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            texture: "texture.ktx2".into(),
            normal_map: "normal.jpeg".into(),
            roughness_map: "roughness.jpeg".into(),
            fallback: "fallback-texture.jpg".into(),
        }
    }
}

impl AssetManifest {
    /// Save the manifest to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a manifest from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_viewer_assets() {
        let m = AssetManifest::default();
        assert_eq!(m.texture, "texture.ktx2");
        assert_eq!(m.fallback, "fallback-texture.jpg");
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let manifest = AssetManifest {
            texture: "brick.ktx2".into(),
            ..AssetManifest::default()
        };
        manifest.save(tmp.path()).unwrap();
        assert_eq!(AssetManifest::load(tmp.path()).unwrap(), manifest);
    }

    #[test]
    fn partial_manifest_fills_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), r#"{ "texture": "other.ktx2" }"#).unwrap();
        let loaded = AssetManifest::load(tmp.path()).unwrap();
        assert_eq!(loaded.texture, "other.ktx2");
        assert_eq!(loaded.normal_map, "normal.jpeg");
    }
}
