use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Errors from validating a camera pose.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoseError {
    #[error("camera {field} has a non-finite component: {value:?}")]
    NonFinite { field: &'static str, value: [f32; 3] },
}

/// Camera position, Euler rotation (radians, XYZ order) and orbit target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    /// The pose the viewer starts from and returns to on reset.
    pub const DEFAULT: Self = Self {
        position: Vec3::new(10.0, 10.0, 10.0),
        rotation: Vec3::ZERO,
        target: Vec3::ZERO,
    };

    pub fn new(position: Vec3, rotation: Vec3, target: Vec3) -> Self {
        Self {
            position,
            rotation,
            target,
        }
    }

    /// Check that all nine scalars are finite.
    pub fn validate(&self) -> Result<(), PoseError> {
        for (field, value) in [
            ("position", self.position),
            ("rotation", self.rotation),
            ("target", self.target),
        ] {
            if !value.is_finite() {
                return Err(PoseError::NonFinite {
                    field,
                    value: value.to_array(),
                });
            }
        }
        Ok(())
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

impl ProjectionMode {
    pub fn toggled(self) -> Self {
        match self {
            ProjectionMode::Perspective => ProjectionMode::Orthographic,
            ProjectionMode::Orthographic => ProjectionMode::Perspective,
        }
    }

    pub fn is_orthographic(self) -> bool {
        self == ProjectionMode::Orthographic
    }
}

/// Serialized store state:
/// `{"position":[x,y,z],"rotation":[x,y,z],"target":[x,y,z],"isOrthographic":bool}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSnapshot {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub target: [f32; 3],
    pub is_orthographic: bool,
}

impl CameraSnapshot {
    pub fn new(pose: CameraPose, projection: ProjectionMode) -> Self {
        Self {
            position: pose.position.to_array(),
            rotation: pose.rotation.to_array(),
            target: pose.target.to_array(),
            is_orthographic: projection.is_orthographic(),
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: Vec3::from_array(self.position),
            rotation: Vec3::from_array(self.rotation),
            target: Vec3::from_array(self.target),
        }
    }

    pub fn projection(&self) -> ProjectionMode {
        if self.is_orthographic {
            ProjectionMode::Orthographic
        } else {
            ProjectionMode::Perspective
        }
    }
}

impl Default for CameraSnapshot {
    fn default() -> Self {
        Self::new(CameraPose::DEFAULT, ProjectionMode::Perspective)
    }
}
