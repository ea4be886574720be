use glam::{EulerRot, Mat4, Quat, UVec2, Vec3};
use mipview_persist::{CameraPose, ProjectionMode};

/// Vertical field of view of the perspective lens (45 degrees).
pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
/// Pixels per world unit of the orthographic lens.
pub const DEFAULT_ORTHO_ZOOM: f32 = 50.0;

/// Lens parameters shared between the live camera and its capture clones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    pub projection: ProjectionMode,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov_y: DEFAULT_FOV_Y,
            near: 0.1,
            far: 1000.0,
            zoom: DEFAULT_ORTHO_ZOOM,
            projection: ProjectionMode::Perspective,
        }
    }
}

/// A camera description independent of any GPU backend.
///
/// The live view and every capture use this type; a capture works on a copy
/// and never writes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualCamera {
    pub position: Vec3,
    pub orientation: Quat,
    pub up: Vec3,
    pub lens: Lens,
    /// Output size in pixels. Sets the aspect ratio and the orthographic extent.
    pub viewport: UVec2,
}

impl VirtualCamera {
    /// A camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, up: Vec3, lens: Lens, viewport: UVec2) -> Self {
        let mut camera = Self {
            position,
            orientation: Quat::IDENTITY,
            up,
            lens,
            viewport,
        };
        camera.look_at(target);
        camera
    }

    /// Build from a stored pose. Orientation is derived from the target, the
    /// way orbit controls settle the camera after a pose is applied.
    pub fn from_pose(pose: &CameraPose, projection: ProjectionMode, viewport: UVec2) -> Self {
        let lens = Lens {
            projection,
            ..Lens::default()
        };
        Self::looking_at(pose.position, pose.target, Vec3::Y, lens, viewport)
    }

    /// Re-orient toward `target`, keeping position and up vector.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        if forward.length_squared() <= f32::EPSILON {
            return;
        }
        let up = if forward.cross(self.up).length_squared() <= f32::EPSILON {
            // Up parallel to the view axis; pick any perpendicular.
            forward.normalize().any_orthonormal_vector()
        } else {
            self.up
        };
        let view = Mat4::look_at_rh(self.position, target, up);
        self.orientation = Quat::from_mat4(&view.inverse()).normalize();
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    /// Euler angles (XYZ order) of the orientation, as persisted in poses.
    pub fn euler_rotation(&self) -> Vec3 {
        let (x, y, z) = self.orientation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    /// The pose this camera represents when orbiting `target`.
    pub fn pose(&self, target: Vec3) -> CameraPose {
        CameraPose::new(self.position, self.euler_rotation(), target)
    }

    pub fn aspect(&self) -> f32 {
        if self.viewport.y == 0 {
            return 1.0;
        }
        self.viewport.x as f32 / self.viewport.y as f32
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let lens = &self.lens;
        match lens.projection {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(lens.fov_y, self.aspect(), lens.near, lens.far)
            }
            ProjectionMode::Orthographic => {
                let zoom = lens.zoom.max(f32::EPSILON);
                let half_w = self.viewport.x.max(1) as f32 / (2.0 * zoom);
                let half_h = self.viewport.y.max(1) as f32 / (2.0 * zoom);
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, lens.near, lens.far)
            }
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
