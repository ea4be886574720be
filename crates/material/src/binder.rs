use crate::material::{AuxMaps, MaterialError, MaterialSet, TextureBinding, normalize_offset};
use mipview_common::{CubeId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Events produced by binder mutations, drained by diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialEvent {
    Attached { cube: CubeId },
    Detached { cube: CubeId },
    TextureBound { binding: TextureBinding, sets: usize },
    LodApplied { index: usize, sets: usize },
    OffsetApplied { offset: f32, sets: usize },
    Disposed { sets: usize },
}

/// Uniform material state handed to the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialFrame {
    pub binding: TextureBinding,
    pub aux: AuxMaps,
    pub mip_level: Option<usize>,
    pub uv_offset: f32,
    pub opacity: f32,
    pub roughness: f32,
    pub metalness: f32,
}

/// Binds one shared texture to the material sets of many cubes.
///
/// The binder remembers the current binding, mip level and offset so a set
/// attached late starts in the same state as its siblings.
#[derive(Debug, Clone)]
pub struct MaterialBinder {
    sets: BTreeMap<CubeId, MaterialSet>,
    binding: TextureBinding,
    aux: AuxMaps,
    lod: Option<usize>,
    uv_offset: f32,
    events: Vec<MaterialEvent>,
}

impl Default for MaterialBinder {
    fn default() -> Self {
        Self {
            sets: BTreeMap::new(),
            binding: TextureBinding::Provisional,
            aux: AuxMaps::default(),
            lod: None,
            uv_offset: 0.0,
            events: Vec::new(),
        }
    }
}

impl MaterialBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cube's six-face set, brought up to the binder's current state.
    pub fn attach(&mut self, cube: CubeId) {
        let mut set = MaterialSet::cube();
        match self.binding {
            TextureBinding::Provisional => {}
            TextureBinding::Streamed(id) => set.bind_streamed(id, self.aux),
            TextureBinding::Fallback(id) => set.bind_fallback(id),
        }
        if let (TextureBinding::Streamed(_), Some(index)) = (self.binding, self.lod) {
            set.apply_lod(index);
        }
        // Stored offsets are already normalized.
        let _ = set.apply_offset(self.uv_offset);
        self.sets.insert(cube, set);
        self.events.push(MaterialEvent::Attached { cube });
    }

    pub fn detach(&mut self, cube: CubeId) -> Option<MaterialSet> {
        let mut removed = self.sets.remove(&cube)?;
        removed.dispose();
        self.events.push(MaterialEvent::Detached { cube });
        Some(removed)
    }

    pub fn set(&self, cube: CubeId) -> Option<&MaterialSet> {
        self.sets.get(&cube)
    }

    pub fn sets(&self) -> &BTreeMap<CubeId, MaterialSet> {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn binding(&self) -> TextureBinding {
        self.binding
    }

    pub fn lod(&self) -> Option<usize> {
        self.lod
    }

    pub fn uv_offset(&self) -> f32 {
        self.uv_offset
    }

    pub fn bind_streamed(&mut self, resource: ResourceId, aux: AuxMaps) {
        self.binding = TextureBinding::Streamed(resource);
        self.aux = aux;
        self.sets
            .values_mut()
            .for_each(|s| s.bind_streamed(resource, aux));
        self.events.push(MaterialEvent::TextureBound {
            binding: self.binding,
            sets: self.sets.len(),
        });
    }

    pub fn bind_fallback(&mut self, resource: ResourceId) {
        self.binding = TextureBinding::Fallback(resource);
        self.aux = AuxMaps::default();
        self.lod = Some(0);
        self.sets.values_mut().for_each(|s| s.bind_fallback(resource));
        self.events.push(MaterialEvent::TextureBound {
            binding: self.binding,
            sets: self.sets.len(),
        });
    }

    /// Point every bound material at mip `index` in one pass.
    pub fn apply_lod(&mut self, index: usize) {
        self.lod = Some(index);
        self.sets.values_mut().for_each(|s| s.apply_lod(index));
        tracing::trace!(index, sets = self.sets.len(), "lod applied to materials");
        self.events.push(MaterialEvent::LodApplied {
            index,
            sets: self.sets.len(),
        });
    }

    /// Apply one UV offset to every bound material. Returns the applied value.
    pub fn apply_offset(&mut self, value: f32) -> Result<f32, MaterialError> {
        let offset = normalize_offset(value)?;
        self.uv_offset = offset;
        for set in self.sets.values_mut() {
            set.apply_offset(offset)?;
        }
        self.events.push(MaterialEvent::OffsetApplied {
            offset,
            sets: self.sets.len(),
        });
        Ok(offset)
    }

    /// Collect this frame's material state if anything changed since the last
    /// call, marking every set uploaded. Call once per frame before drawing.
    pub fn take_dirty(&mut self) -> Option<MaterialFrame> {
        if !self.sets.values().any(MaterialSet::needs_upload) {
            return None;
        }
        self.sets.values_mut().for_each(MaterialSet::mark_uploaded);
        Some(self.frame())
    }

    /// Current uniform state, regardless of dirtiness.
    pub fn frame(&self) -> MaterialFrame {
        let template = self
            .sets
            .values()
            .next()
            .and_then(|s| s.materials().first())
            .cloned()
            .unwrap_or_default();
        debug_assert!(self.is_uniform(), "material sets diverged");
        MaterialFrame {
            binding: self.binding,
            aux: self.aux,
            mip_level: self.lod,
            uv_offset: self.uv_offset,
            opacity: template.opacity,
            roughness: template.roughness,
            metalness: template.metalness,
        }
    }

    /// Whether every material of every set holds identical state.
    pub fn is_uniform(&self) -> bool {
        let mut sets = self.sets.values();
        let Some(first) = sets.next() else {
            return true;
        };
        first.is_uniform()
            && sets.all(|s| s.is_uniform() && s.materials().first() == first.materials().first())
    }

    /// Dispose every set. Idempotent.
    pub fn dispose_all(&mut self) {
        let released = self
            .sets
            .values_mut()
            .map(MaterialSet::dispose)
            .filter(|released| *released)
            .count();
        if released > 0 {
            tracing::debug!(sets = released, "material sets disposed");
            self.events.push(MaterialEvent::Disposed { sets: released });
        }
    }

    /// Drain and return all pending events.
    pub fn drain_events(&mut self) -> Vec<MaterialEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::CUBE_FACES;

    fn binder_with(cubes: u32) -> MaterialBinder {
        let mut binder = MaterialBinder::new();
        for x in 0..cubes {
            binder.attach(CubeId::new(x, 0));
        }
        binder
    }

    #[test]
    fn lod_fans_out_to_all_sets() {
        let mut binder = binder_with(4);
        binder.bind_streamed(ResourceId::new(), AuxMaps::default());
        binder.apply_lod(2);
        assert!(binder.is_uniform());
        for set in binder.sets().values() {
            assert_eq!(set.len(), CUBE_FACES);
            assert!(set.materials().iter().all(|m| m.mip_level == Some(2)));
        }
    }

    #[test]
    fn late_attached_set_matches_siblings() {
        let mut binder = binder_with(2);
        let id = ResourceId::new();
        binder.bind_streamed(id, AuxMaps::default());
        binder.apply_lod(4);
        binder.apply_offset(0.3).unwrap();

        binder.attach(CubeId::new(9, 9));
        let late = binder.set(CubeId::new(9, 9)).unwrap();
        assert_eq!(late.materials()[0].mip_level, Some(4));
        assert_eq!(late.materials()[0].uv_offset, 0.3);
        assert_eq!(late.materials()[0].map, TextureBinding::Streamed(id));
        assert!(binder.is_uniform());
    }

    #[test]
    fn take_dirty_reports_once_per_change() {
        let mut binder = binder_with(3);
        binder.bind_streamed(ResourceId::new(), AuxMaps::default());
        binder.apply_lod(5);
        let frame = binder.take_dirty().unwrap();
        assert_eq!(frame.mip_level, Some(5));
        assert_eq!(frame.opacity, 0.8);
        assert!(binder.take_dirty().is_none());

        binder.apply_lod(4);
        binder.apply_lod(3);
        assert_eq!(binder.take_dirty().unwrap().mip_level, Some(3));
    }

    #[test]
    fn invalid_offset_leaves_all_sets_untouched() {
        let mut binder = binder_with(2);
        binder.apply_offset(0.4).unwrap();
        binder.take_dirty();
        assert!(binder.apply_offset(f32::INFINITY).is_err());
        assert_eq!(binder.uv_offset(), 0.4);
        assert!(binder.take_dirty().is_none());
    }

    #[test]
    fn fallback_binding_reaches_every_face() {
        let mut binder = binder_with(2);
        let fallback = ResourceId::new();
        binder.bind_fallback(fallback);
        assert!(binder.sets().values().all(|s| {
            s.materials()
                .iter()
                .all(|m| m.map == TextureBinding::Fallback(fallback))
        }));
    }

    #[test]
    fn dispose_all_is_idempotent() {
        let mut binder = binder_with(3);
        binder.drain_events();
        binder.dispose_all();
        binder.dispose_all();
        assert_eq!(
            binder.drain_events(),
            vec![MaterialEvent::Disposed { sets: 3 }]
        );
        assert!(binder.take_dirty().is_none());
    }

    #[test]
    fn detach_disposes_set() {
        let mut binder = binder_with(2);
        let removed = binder.detach(CubeId::new(0, 0)).unwrap();
        assert!(removed.is_disposed());
        assert_eq!(binder.len(), 1);
        assert!(binder.detach(CubeId::new(0, 0)).is_none());
    }
}
