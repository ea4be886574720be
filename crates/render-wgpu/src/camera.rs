use glam::{Quat, UVec2, Vec3};
use mipview_input::TweenFrame;
use mipview_persist::{CameraPose, ProjectionMode};
use mipview_render::{ControlsLock, Lens, VirtualCamera};

const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 500.0;
const MIN_ZOOM: f32 = 5.0;
const MAX_ZOOM: f32 = 2000.0;
/// Keeps the orbit off the poles of the up axis.
const POLE_MARGIN: f32 = 0.01;

/// Orbit/pan/zoom camera around a target point.
///
/// Camera motion lives outside the stored camera state: the host reads
/// [`OrbitCamera::pose`] and feeds it to the sync controller as gestures
/// progress.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub lens: Lens,
    pub viewport: UVec2,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Zoom factor per scroll line.
    pub zoom_step: f32,
    enabled: bool,
}

impl OrbitCamera {
    pub fn new(viewport: UVec2) -> Self {
        Self::from_pose(&CameraPose::DEFAULT, ProjectionMode::Perspective, viewport)
    }

    pub fn from_pose(pose: &CameraPose, projection: ProjectionMode, viewport: UVec2) -> Self {
        Self {
            position: pose.position,
            target: pose.target,
            up: Vec3::Y,
            lens: Lens {
                projection,
                ..Lens::default()
            },
            viewport,
            rotate_speed: 0.005,
            zoom_step: 0.95,
            enabled: true,
        }
    }

    /// Move to a stored pose, as after a reset. The up vector returns to +Y.
    pub fn apply_pose(&mut self, pose: &CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
        self.up = Vec3::Y;
    }

    pub fn set_projection(&mut self, projection: ProjectionMode) {
        self.lens.projection = projection;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = UVec2::new(width.max(1), height.max(1));
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Rotate around the target. Returns false when controls are disabled.
    pub fn orbit(&mut self, dx: f32, dy: f32) -> bool {
        if !self.enabled {
            return false;
        }
        let up = self.up.normalize_or(Vec3::Y);
        let offset = self.position - self.target;
        let offset = Quat::from_axis_angle(up, -dx * self.rotate_speed) * offset;

        let right = offset.cross(up).normalize_or_zero();
        let pitched = if right == Vec3::ZERO {
            offset
        } else {
            Quat::from_axis_angle(right, dy * self.rotate_speed) * offset
        };
        let angle = pitched.angle_between(up);
        let offset = if angle > POLE_MARGIN && angle < std::f32::consts::PI - POLE_MARGIN {
            pitched
        } else {
            offset
        };
        self.position = self.target + offset;
        true
    }

    /// Translate camera and target in the view plane by a drag in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if !self.enabled {
            return false;
        }
        let forward = (self.target - self.position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        let cam_up = right.cross(forward);
        let per_pixel = match self.lens.projection {
            ProjectionMode::Perspective => {
                2.0 * self.distance() * (self.lens.fov_y * 0.5).tan() / self.viewport.y.max(1) as f32
            }
            ProjectionMode::Orthographic => 1.0 / self.lens.zoom.max(f32::EPSILON),
        };
        let delta = (right * -dx + cam_up * dy) * per_pixel;
        self.position += delta;
        self.target += delta;
        true
    }

    /// Dolly (perspective) or scale (orthographic). Positive `lines` zooms in.
    pub fn zoom(&mut self, lines: f32) -> bool {
        if !self.enabled {
            return false;
        }
        let factor = self.zoom_step.powf(lines);
        match self.lens.projection {
            ProjectionMode::Perspective => {
                let offset = self.position - self.target;
                let distance = (offset.length() * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
                self.position = self.target + offset.normalize_or(Vec3::Z) * distance;
            }
            ProjectionMode::Orthographic => {
                self.lens.zoom = (self.lens.zoom / factor).clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }
        true
    }

    /// Place the camera at one sample of a view tween.
    pub fn apply_tween(&mut self, frame: &TweenFrame) {
        self.position = frame.position;
        self.up = frame.up;
        self.target = frame.target;
    }

    pub fn to_virtual(&self) -> VirtualCamera {
        VirtualCamera::looking_at(self.position, self.target, self.up, self.lens, self.viewport)
    }

    /// Current pose, with rotation derived from the view direction.
    pub fn pose(&self) -> CameraPose {
        self.to_virtual().pose(self.target)
    }
}

impl ControlsLock for OrbitCamera {
    fn controls_enabled(&self) -> bool {
        self.enabled
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
