use glam::Vec3;
use mipview_common::{CubeId, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Square grid of cubes on the XZ plane, centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    /// Cubes per side.
    pub size: u32,
    /// Distance between neighbouring cube centers.
    pub spacing: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            size: 12,
            spacing: 1.2,
        }
    }
}

/// Errors from building a scene.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LayoutError {
    #[error("grid size must be at least 1")]
    EmptyGrid,
    #[error("grid spacing must be a positive finite number, got {0}")]
    InvalidSpacing(f32),
}

impl GridLayout {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.size == 0 {
            return Err(LayoutError::EmptyGrid);
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(LayoutError::InvalidSpacing(self.spacing));
        }
        Ok(())
    }

    /// World position of a cube center.
    pub fn position(&self, id: CubeId) -> Vec3 {
        let half = self.size as f32 * self.spacing / 2.0;
        Vec3::new(
            id.x as f32 * self.spacing - half,
            0.0,
            id.z as f32 * self.spacing - half,
        )
    }

    pub fn cube_count(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }
}

/// One face of a cube. The discriminant is the face's material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CubeFace {
    Front = 0,
    Back = 1,
    Top = 2,
    Bottom = 3,
    Right = 4,
    Left = 5,
}

impl CubeFace {
    pub const COUNT: usize = 6;

    pub const ALL: [CubeFace; Self::COUNT] = [
        CubeFace::Front,
        CubeFace::Back,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Right,
        CubeFace::Left,
    ];

    /// Material slot used by this face.
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Outward normal in cube-local space.
    pub fn normal(self) -> Vec3 {
        match self {
            CubeFace::Front => Vec3::Z,
            CubeFace::Back => Vec3::NEG_Z,
            CubeFace::Top => Vec3::Y,
            CubeFace::Bottom => Vec3::NEG_Y,
            CubeFace::Right => Vec3::X,
            CubeFace::Left => Vec3::NEG_X,
        }
    }
}

/// A placed cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    pub id: CubeId,
    pub name: String,
    pub transform: Transform,
}

/// The cube grid.
///
/// Uses BTreeMap so every consumer (material fan-out, GPU instance upload,
/// diagnostics) walks cubes in the same order.
#[derive(Debug, Clone)]
pub struct Scene {
    layout: GridLayout,
    cubes: BTreeMap<CubeId, Cube>,
}

impl Scene {
    /// Build the scene for a layout.
    pub fn new(layout: GridLayout) -> Result<Self, LayoutError> {
        layout.validate()?;
        let mut cubes = BTreeMap::new();
        for x in 0..layout.size {
            for z in 0..layout.size {
                let id = CubeId::new(x, z);
                cubes.insert(
                    id,
                    Cube {
                        id,
                        name: id.to_string(),
                        transform: Transform::from_position(layout.position(id)),
                    },
                );
            }
        }
        tracing::debug!(size = layout.size, spacing = layout.spacing, "scene built");
        Ok(Self { layout, cubes })
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Read-only access to all cubes in deterministic order.
    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = CubeId> + '_ {
        self.cubes.keys().copied()
    }

    pub fn get(&self, id: CubeId) -> Option<&Cube> {
        self.cubes.get(&id)
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    /// Total number of faces, i.e. material instances, in the scene.
    pub fn face_count(&self) -> usize {
        self.cubes.len() * CubeFace::COUNT
    }

    /// Radius of the sphere around the origin enclosing every cube.
    pub fn bounding_radius(&self) -> f32 {
        self.cubes
            .values()
            .map(|c| c.transform.position.length() + 0.5 * 3f32.sqrt())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_viewer_grid() {
        let layout = GridLayout::default();
        assert_eq!(layout.size, 12);
        assert_eq!(layout.spacing, 1.2);
        assert_eq!(layout.cube_count(), 144);
    }

    #[test]
    fn positions_are_centered() {
        let layout = GridLayout {
            size: 10,
            spacing: 1.5,
        };
        let first = layout.position(CubeId::new(0, 0));
        assert_eq!(first, Vec3::new(-7.5, 0.0, -7.5));
        let last = layout.position(CubeId::new(9, 9));
        assert!((last.x - 6.0).abs() < 1e-5);
        assert_eq!(last.y, 0.0);
    }

    #[test]
    fn scene_names_and_counts() {
        let scene = Scene::new(GridLayout {
            size: 3,
            spacing: 2.0,
        })
        .unwrap();
        assert_eq!(scene.cube_count(), 9);
        assert_eq!(scene.face_count(), 54);
        assert_eq!(scene.get(CubeId::new(2, 1)).unwrap().name, "cube-2-1");
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        assert_eq!(
            Scene::new(GridLayout {
                size: 0,
                spacing: 1.0
            })
            .unwrap_err(),
            LayoutError::EmptyGrid
        );
        assert!(matches!(
            Scene::new(GridLayout {
                size: 2,
                spacing: f32::NAN
            }),
            Err(LayoutError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn faces_have_unique_slots_and_unit_normals() {
        let mut slots: Vec<usize> = CubeFace::ALL.iter().map(|f| f.slot()).collect();
        slots.sort();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
        for face in CubeFace::ALL {
            assert!((face.normal().length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn bounding_radius_covers_corner_cube() {
        let scene = Scene::new(GridLayout::default()).unwrap();
        let corner = scene.get(CubeId::new(0, 0)).unwrap().transform.position;
        assert!(scene.bounding_radius() >= corner.length());
    }
}
