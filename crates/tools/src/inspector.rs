use glam::EulerRot;
use mipview_common::CubeId;
use mipview_material::{MaterialBinder, TextureBinding};
use mipview_scene::Scene;
use mipview_stream::{LoadState, ResolutionText, TextureResource};

/// Viewer inspector for developer tooling.
///
/// Read-only queries against the scene, the material binder and the streamed
/// texture, for the loading overlay and diagnostics.
pub struct ViewerInspector;

impl ViewerInspector {
    /// Overlay to draw over the viewport, or `None` once loading settled.
    ///
    /// Visible while progress is below 100. A load that fell back to the
    /// substitute texture also hides it, since progress will never reach 100.
    pub fn overlay(resource: &TextureResource) -> Option<LoadingOverlay> {
        if resource.progress() >= 100 || resource.state() == LoadState::Failed {
            return None;
        }
        Some(LoadingOverlay {
            progress: resource.progress(),
            resolution: resource.resolution(),
        })
    }

    /// Produce a summary of the viewer state.
    pub fn summary(scene: &Scene, materials: &MaterialBinder, resource: &TextureResource) -> ViewerSummary {
        ViewerSummary {
            cubes: scene.cube_count(),
            faces: scene.face_count(),
            material_sets: materials.len(),
            state: resource.state(),
            progress: resource.progress(),
            mip_level: materials.lod(),
            mip_count: resource.mip_count(),
            resolution: resource.resolution(),
        }
    }

    /// Placement and material binding of one cube.
    pub fn inspect_cube(scene: &Scene, materials: &MaterialBinder, id: CubeId) -> Option<CubeReport> {
        let cube = scene.get(id)?;
        let material = materials.set(id).and_then(|s| s.materials().first());
        let (rx, ry, rz) = cube.transform.rotation.to_euler(EulerRot::XYZ);
        Some(CubeReport {
            name: cube.name.clone(),
            position: cube.transform.position.to_array(),
            rotation: [rx, ry, rz],
            binding: material.map(|m| m.map),
            mip_level: material.and_then(|m| m.mip_level),
            uv_offset: material.map_or(0.0, |m| m.uv_offset),
        })
    }

    /// Reports for every cube, in scene order.
    pub fn cubes(scene: &Scene, materials: &MaterialBinder) -> Vec<CubeReport> {
        scene
            .ids()
            .filter_map(|id| Self::inspect_cube(scene, materials, id))
            .collect()
    }
}

/// Loading state shown over the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingOverlay {
    pub progress: u8,
    pub resolution: ResolutionText,
}

impl LoadingOverlay {
    pub fn progress_line(&self) -> String {
        format!("Loading... {}%", self.progress)
    }

    pub fn resolution_line(&self) -> String {
        format!("Current resolution: {}", self.resolution)
    }
}

impl std::fmt::Display for LoadingOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.progress_line(), self.resolution_line())
    }
}

/// Summary of viewer state for the inspector.
#[derive(Debug, Clone)]
pub struct ViewerSummary {
    pub cubes: usize,
    pub faces: usize,
    pub material_sets: usize,
    pub state: LoadState,
    pub progress: u8,
    pub mip_level: Option<usize>,
    pub mip_count: usize,
    pub resolution: ResolutionText,
}

impl std::fmt::Display for ViewerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = self
            .mip_level
            .map_or_else(|| "-".to_string(), |l| l.to_string());
        write!(
            f,
            "Viewer: cubes={} faces={} sets={} texture={:?} progress={}% mip={}/{} resolution={}",
            self.cubes,
            self.faces,
            self.material_sets,
            self.state,
            self.progress,
            level,
            self.mip_count,
            self.resolution,
        )
    }
}

/// Diagnostic view of a single cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeReport {
    pub name: String,
    pub position: [f32; 3],
    /// Euler angles, XYZ order, radians.
    pub rotation: [f32; 3],
    /// `None` when the cube has no material set attached.
    pub binding: Option<TextureBinding>,
    pub mip_level: Option<usize>,
    pub uv_offset: f32,
}

impl std::fmt::Display for CubeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let binding = match self.binding {
            Some(TextureBinding::Provisional) => "provisional".to_string(),
            Some(TextureBinding::Streamed(id)) => format!("streamed:{:.8}", id.to_string()),
            Some(TextureBinding::Fallback(id)) => format!("fallback:{:.8}", id.to_string()),
            None => "no material".to_string(),
        };
        write!(
            f,
            "{} pos=({:.2}, {:.2}, {:.2}) rot=({:.2}, {:.2}, {:.2}) material={}",
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            binding,
        )?;
        if let Some(level) = self.mip_level {
            write!(f, " mip={level}")?;
        }
        Ok(())
    }
}
