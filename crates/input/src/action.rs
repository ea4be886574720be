use crate::tween::ViewShortcut;
use mipview_common::CaptureAngle;

/// A high-level command the viewer surface can issue.
///
/// Buttons, keys and the CLI all produce actions; nothing downstream consumes
/// raw input events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerAction {
    /// Flip between perspective and orthographic projection.
    ToggleProjection,
    /// Return the camera to the default pose.
    ResetPosition,
    /// Export a still from the given vantage point.
    Capture(CaptureAngle),
    /// Set the horizontal texture offset of every cube face.
    SetTextureOffset(f32),
    /// Move the camera to a preset view.
    ViewShortcut(ViewShortcut),
}

impl ViewerAction {
    /// Map a typed character to an action. Digits select the view presets
    /// laid out like a numeric keypad.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'p' | 'P' => Some(ViewerAction::ToggleProjection),
            'r' | 'R' => Some(ViewerAction::ResetPosition),
            other => ViewShortcut::from_key(other).map(ViewerAction::ViewShortcut),
        }
    }

    /// Whether this action writes to the camera store.
    pub fn mutates_camera(&self) -> bool {
        matches!(
            self,
            ViewerAction::ToggleProjection
                | ViewerAction::ResetPosition
                | ViewerAction::ViewShortcut(_)
        )
    }
}
