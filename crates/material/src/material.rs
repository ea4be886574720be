use mipview_common::ResourceId;
use serde::{Deserialize, Serialize};

/// Number of face materials in a cube's set.
pub const CUBE_FACES: usize = 6;

const REFINING_OPACITY: f32 = 0.8;

/// Which texture a material samples for its base color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureBinding {
    /// No texture yet: the load is still in flight.
    Provisional,
    /// The streamed, pre-mipmapped texture.
    Streamed(ResourceId),
    /// Single-level fallback substituted after a failed load.
    Fallback(ResourceId),
}

/// Texture coordinate wrap mode, applied to both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Independently loaded auxiliary maps. Either may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxMaps {
    pub normal: Option<ResourceId>,
    pub roughness: Option<ResourceId>,
}

/// Errors from material mutations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MaterialError {
    #[error("UV offset must be finite, got {0}")]
    NonFiniteOffset(f32),
}

/// One face material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub map: TextureBinding,
    pub aux: AuxMaps,
    pub roughness: f32,
    pub metalness: f32,
    pub transparent: bool,
    pub opacity: f32,
    /// Active mip level of `map`; `None` until a texture is bound.
    pub mip_level: Option<usize>,
    pub uv_offset: f32,
    pub wrap: WrapMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            map: TextureBinding::Provisional,
            aux: AuxMaps::default(),
            roughness: 0.8,
            metalness: 0.2,
            transparent: true,
            opacity: 1.0,
            mip_level: None,
            uv_offset: 0.0,
            wrap: WrapMode::Repeat,
        }
    }
}

/// The face materials of one object, mutated only through its update entry
/// points so the faces never diverge.
#[derive(Debug, Clone)]
pub struct MaterialSet {
    materials: Vec<Material>,
    /// Bumped on every mutation that requires a re-upload.
    revision: u64,
    uploaded: u64,
    disposed: bool,
}

impl MaterialSet {
    /// A cube's six face materials in the provisional state.
    pub fn cube() -> Self {
        Self::with_faces(CUBE_FACES)
    }

    pub fn with_faces(faces: usize) -> Self {
        Self {
            materials: vec![Material::default(); faces],
            revision: 1,
            uploaded: 0,
            disposed: false,
        }
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether a mutation happened since the last upload.
    pub fn needs_upload(&self) -> bool {
        !self.disposed && self.revision != self.uploaded
    }

    pub fn mark_uploaded(&mut self) {
        self.uploaded = self.revision;
    }

    /// Bind the streamed texture and its auxiliary maps to every face.
    pub fn bind_streamed(&mut self, resource: ResourceId, aux: AuxMaps) {
        self.update(|m| {
            m.map = TextureBinding::Streamed(resource);
            m.aux = aux;
            m.transparent = true;
        });
    }

    /// Bind the fallback texture to every face. Fallback materials are
    /// opaque and carry no auxiliary maps.
    pub fn bind_fallback(&mut self, resource: ResourceId) {
        self.update(|m| {
            m.map = TextureBinding::Fallback(resource);
            m.aux = AuxMaps::default();
            m.transparent = false;
            m.opacity = 1.0;
            m.mip_level = Some(0);
        });
    }

    /// Point every face at mip `index`. Faces are translucent while a level
    /// coarser than the finest is shown.
    pub fn apply_lod(&mut self, index: usize) {
        let opacity = if index == 0 { 1.0 } else { REFINING_OPACITY };
        self.update(|m| {
            m.mip_level = Some(index);
            m.opacity = opacity;
        });
    }

    /// Shift the horizontal texture origin of every face. The offset is
    /// clamped to [0, 1]; wrapping is forced to repeat so the shift cycles.
    /// Returns the value actually applied.
    pub fn apply_offset(&mut self, value: f32) -> Result<f32, MaterialError> {
        let offset = normalize_offset(value)?;
        self.update(|m| {
            m.uv_offset = offset;
            m.wrap = WrapMode::Repeat;
        });
        Ok(offset)
    }

    /// Release the set. Idempotent; returns whether this call released it.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        true
    }

    /// Whether every face holds identical material state.
    pub fn is_uniform(&self) -> bool {
        self.materials.windows(2).all(|w| w[0] == w[1])
    }

    fn update(&mut self, f: impl Fn(&mut Material)) {
        if self.disposed {
            tracing::warn!("mutation on a disposed material set ignored");
            return;
        }
        self.materials.iter_mut().for_each(f);
        self.revision += 1;
    }
}

pub(crate) fn normalize_offset(value: f32) -> Result<f32, MaterialError> {
    if !value.is_finite() {
        return Err(MaterialError::NonFiniteOffset(value));
    }
    Ok(value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_set_starts_provisional() {
        let set = MaterialSet::cube();
        assert_eq!(set.len(), 6);
        assert!(set.needs_upload());
        assert!(
            set.materials()
                .iter()
                .all(|m| m.map == TextureBinding::Provisional && m.mip_level.is_none())
        );
    }

    #[test]
    fn lod_applies_to_every_face() {
        let mut set = MaterialSet::cube();
        set.bind_streamed(ResourceId::new(), AuxMaps::default());
        set.apply_lod(3);
        assert!(set.is_uniform());
        assert!(set.materials().iter().all(|m| m.mip_level == Some(3)));
        assert_eq!(set.materials()[0].opacity, 0.8);

        set.apply_lod(0);
        assert_eq!(set.materials()[5].opacity, 1.0);
    }

    #[test]
    fn offset_is_clamped_and_forces_repeat() {
        let mut set = MaterialSet::with_faces(4);
        assert_eq!(set.apply_offset(1.7), Ok(1.0));
        assert_eq!(set.apply_offset(-0.2), Ok(0.0));
        assert_eq!(set.apply_offset(0.25), Ok(0.25));
        assert!(
            set.materials()
                .iter()
                .all(|m| m.uv_offset == 0.25 && m.wrap == WrapMode::Repeat)
        );
    }

    #[test]
    fn non_finite_offset_is_rejected_without_change() {
        let mut set = MaterialSet::cube();
        set.apply_offset(0.5).unwrap();
        let revision = set.revision();
        assert!(matches!(
            set.apply_offset(f32::NAN),
            Err(MaterialError::NonFiniteOffset(_))
        ));
        assert_eq!(set.revision(), revision);
        assert_eq!(set.materials()[0].uv_offset, 0.5);
    }

    #[test]
    fn fallback_drops_aux_maps_and_is_opaque() {
        let mut set = MaterialSet::cube();
        set.bind_streamed(
            ResourceId::new(),
            AuxMaps {
                normal: Some(ResourceId::new()),
                roughness: None,
            },
        );
        let fallback = ResourceId::new();
        set.bind_fallback(fallback);
        for m in set.materials() {
            assert_eq!(m.map, TextureBinding::Fallback(fallback));
            assert_eq!(m.aux, AuxMaps::default());
            assert!(!m.transparent);
        }
    }

    #[test]
    fn upload_tracking() {
        let mut set = MaterialSet::cube();
        set.mark_uploaded();
        assert!(!set.needs_upload());
        set.apply_lod(1);
        assert!(set.needs_upload());
    }

    #[test]
    fn dispose_is_idempotent_and_freezes_set() {
        let mut set = MaterialSet::cube();
        assert!(set.dispose());
        assert!(!set.dispose());
        let revision = set.revision();
        set.apply_lod(2);
        assert_eq!(set.revision(), revision);
        assert!(!set.needs_upload());
    }
}
