//! Still capture through a transient camera.

use crate::camera::VirtualCamera;
use crate::renderer::{OffscreenRenderer, RenderError, RgbaFrame};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use glam::Vec3;
use image::ExtendedColorType;
use image::codecs::webp::WebPEncoder;
use mipview_common::{CaptureAngle, UnknownAngle};

const DATA_URI_PREFIX: &str = "data:image/webp;base64,";

/// Capture configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Distance of the fixed vantage points from the origin.
    pub radius: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { radius: 8.0 }
    }
}

/// Position and up vector of a fixed angle, or `None` for
/// [`CaptureAngle::Current`].
pub fn vantage(angle: CaptureAngle, radius: f32) -> Option<(Vec3, Vec3)> {
    let r = radius;
    match angle {
        CaptureAngle::Front => Some((Vec3::new(0.0, 0.0, r), Vec3::Y)),
        CaptureAngle::Side => Some((Vec3::new(r, 0.0, 0.0), Vec3::Y)),
        CaptureAngle::Top => Some((Vec3::new(0.0, r, 0.0), Vec3::NEG_Z)),
        CaptureAngle::Isometric => Some((Vec3::new(r, r, r), Vec3::Y)),
        CaptureAngle::Current => None,
    }
}

/// Interactive camera controls that a capture suspends while it renders.
pub trait ControlsLock {
    fn controls_enabled(&self) -> bool;
    fn set_controls_enabled(&mut self, enabled: bool);
}

/// For hosts without interactive controls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoControls;

impl ControlsLock for NoControls {
    fn controls_enabled(&self) -> bool {
        false
    }

    fn set_controls_enabled(&mut self, _enabled: bool) {}
}

/// Disables controls for its lifetime and restores them on drop, on every
/// exit path.
struct ControlsGuard<'a, C: ControlsLock + ?Sized> {
    controls: &'a mut C,
    restore: bool,
}

impl<'a, C: ControlsLock + ?Sized> ControlsGuard<'a, C> {
    fn suspend(controls: &'a mut C) -> Self {
        let restore = controls.controls_enabled();
        if restore {
            controls.set_controls_enabled(false);
        }
        Self { controls, restore }
    }
}

impl<C: ControlsLock + ?Sized> Drop for ControlsGuard<'_, C> {
    fn drop(&mut self) {
        if self.restore {
            self.controls.set_controls_enabled(true);
        }
    }
}

/// Errors from a capture. The live camera and controls are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    UnknownAngle(#[from] UnknownAngle),
}

/// An encoded capture.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub angle: CaptureAngle,
    pub width: u32,
    pub height: u32,
    webp: Vec<u8>,
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("angle", &self.angle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.webp.len())
            .finish()
    }
}

impl CapturedImage {
    /// Lossless WebP bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.webp
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.webp
    }

    /// `data:image/webp;base64,...`
    pub fn data_uri(&self) -> String {
        data_uri(&self.webp)
    }

    pub fn file_name(&self) -> String {
        format!("capture-{}.webp", self.angle)
    }
}

/// Renders the scene from a requested angle without touching the live camera.
#[derive(Debug, Clone, Default)]
pub struct ViewCapture {
    config: CaptureConfig,
}

impl ViewCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The transient camera used for `angle`. Fixed angles keep the live
    /// lens and viewport, move to their vantage point and look at the origin;
    /// `current` is a verbatim copy.
    pub fn virtual_camera(&self, angle: CaptureAngle, live: &VirtualCamera) -> VirtualCamera {
        let mut camera = *live;
        if let Some((position, up)) = vantage(angle, self.config.radius) {
            camera.position = position;
            camera.up = up;
            camera.look_at(Vec3::ZERO);
        }
        camera
    }

    /// Render and encode one still. Controls are suspended for the duration
    /// and re-enabled before this returns, whether it succeeds or fails.
    pub fn capture<R, C>(
        &self,
        angle: CaptureAngle,
        live: &VirtualCamera,
        renderer: &mut R,
        controls: &mut C,
    ) -> Result<CapturedImage, CaptureError>
    where
        R: OffscreenRenderer + ?Sized,
        C: ControlsLock + ?Sized,
    {
        let _span = tracing::info_span!("view_capture", %angle).entered();
        let _guard = ControlsGuard::suspend(controls);

        let camera = self.virtual_camera(angle, live);
        tracing::debug!(position = ?camera.position, up = ?camera.up, "capture camera placed");

        let frame = renderer.render(&camera)?;
        let webp = encode_webp(&frame)?;
        tracing::info!(width = frame.width(), height = frame.height(), bytes = webp.len(), "view captured");
        Ok(CapturedImage {
            angle,
            width: frame.width(),
            height: frame.height(),
            webp,
        })
    }

    /// [`ViewCapture::capture`] for an angle given by name.
    pub fn capture_named<R, C>(
        &self,
        angle: &str,
        live: &VirtualCamera,
        renderer: &mut R,
        controls: &mut C,
    ) -> Result<CapturedImage, CaptureError>
    where
        R: OffscreenRenderer + ?Sized,
        C: ControlsLock + ?Sized,
    {
        let angle: CaptureAngle = angle.parse()?;
        self.capture(angle, live, renderer, controls)
    }
}

/// Encode a frame as lossless WebP.
pub fn encode_webp(frame: &RgbaFrame) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out).encode(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

pub fn data_uri(webp: &[u8]) -> String {
    let mut uri = String::from(DATA_URI_PREFIX);
    STANDARD.encode_string(webp, &mut uri);
    uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Lens;
    use crate::renderer::Renderer;
    use glam::UVec2;
    use image::{GenericImageView, ImageFormat};
    use mipview_persist::{CameraPose, CameraStateStore, ProjectionMode};

    /// Records the cameras it is asked to render through.
    struct StubRenderer {
        seen: Vec<VirtualCamera>,
        fail: bool,
        size_override: Option<UVec2>,
    }

    impl StubRenderer {
        fn new() -> Self {
            Self {
                seen: Vec::new(),
                fail: false,
                size_override: None,
            }
        }
    }

    impl Renderer for StubRenderer {
        type Output = RgbaFrame;

        fn render(&mut self, camera: &VirtualCamera) -> Result<RgbaFrame, RenderError> {
            self.seen.push(*camera);
            if self.fail {
                return Err(RenderError::Device("lost".into()));
            }
            let size = self.size_override.unwrap_or(camera.viewport);
            RgbaFrame::filled(size.x, size.y, [200, 100, 50, 255])
        }
    }

    #[derive(Default)]
    struct Controls {
        enabled: bool,
        toggles: Vec<bool>,
    }

    impl ControlsLock for Controls {
        fn controls_enabled(&self) -> bool {
            self.enabled
        }

        fn set_controls_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
            self.toggles.push(enabled);
        }
    }

    fn live_camera(store: &CameraStateStore) -> VirtualCamera {
        VirtualCamera::from_pose(&store.pose(), store.projection(), UVec2::new(32, 24))
    }

    fn enabled_controls() -> Controls {
        Controls {
            enabled: true,
            toggles: Vec::new(),
        }
    }

    #[test]
    fn front_capture_uses_exact_vantage_and_leaves_store_untouched() {
        let mut store = CameraStateStore::new();
        store
            .set_camera_state(CameraPose::new(
                Vec3::new(3.0, 4.0, 5.0),
                Vec3::new(0.1, 0.2, 0.3),
                Vec3::new(0.0, 0.5, 0.0),
            ))
            .unwrap();
        let before = store.snapshot();
        let revision = store.revision();
        let live = live_camera(&store);
        let live_before = live;

        let capture = ViewCapture::default();
        let mut renderer = StubRenderer::new();
        let mut controls = enabled_controls();
        let image = capture
            .capture(CaptureAngle::Front, &live, &mut renderer, &mut controls)
            .unwrap();

        let used = renderer.seen[0];
        assert_eq!(used.position, Vec3::new(0.0, 0.0, 8.0));
        assert_eq!(used.up, Vec3::Y);
        assert!((used.forward() - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(used.lens, live.lens);
        assert_eq!(used.viewport, live.viewport);

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.revision(), revision);
        assert_eq!(live, live_before);
        assert_eq!(image.width, 32);
        assert_eq!(image.height, 24);
    }

    #[test]
    fn fixed_vantage_points() {
        let capture = ViewCapture::default();
        let live = live_camera(&CameraStateStore::new());
        let expected = [
            (CaptureAngle::Side, Vec3::new(8.0, 0.0, 0.0), Vec3::Y),
            (CaptureAngle::Top, Vec3::new(0.0, 8.0, 0.0), Vec3::NEG_Z),
            (CaptureAngle::Isometric, Vec3::new(8.0, 8.0, 8.0), Vec3::Y),
        ];
        for (angle, position, up) in expected {
            let cam = capture.virtual_camera(angle, &live);
            assert_eq!(cam.position, position, "{angle}");
            assert_eq!(cam.up, up, "{angle}");
            assert!((cam.forward() + position.normalize()).length() < 1e-5, "{angle}");
        }
    }

    #[test]
    fn current_clones_live_camera_verbatim() {
        let mut live = VirtualCamera::looking_at(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::Y,
            Lens {
                projection: ProjectionMode::Orthographic,
                ..Lens::default()
            },
            UVec2::new(10, 10),
        );
        live.up = Vec3::new(0.0, 0.8, 0.6);
        let cam = ViewCapture::default().virtual_camera(CaptureAngle::Current, &live);
        assert_eq!(cam, live);
    }

    #[test]
    fn controls_are_restored_after_success_and_failure() {
        let capture = ViewCapture::default();
        let live = live_camera(&CameraStateStore::new());

        let mut controls = enabled_controls();
        capture
            .capture(CaptureAngle::Top, &live, &mut StubRenderer::new(), &mut controls)
            .unwrap();
        assert_eq!(controls.toggles, vec![false, true]);

        let mut controls = enabled_controls();
        let mut failing = StubRenderer::new();
        failing.fail = true;
        let err = capture
            .capture(CaptureAngle::Top, &live, &mut failing, &mut controls)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Render(RenderError::Device(_))));
        assert!(controls.enabled);
        assert_eq!(controls.toggles, vec![false, true]);
    }

    #[test]
    fn encode_failure_restores_controls() {
        let capture = ViewCapture::default();
        let live = live_camera(&CameraStateStore::new());
        let mut renderer = StubRenderer::new();
        // Wider than WebP allows.
        renderer.size_override = Some(UVec2::new(16_385, 1));
        let mut controls = enabled_controls();
        let err = capture
            .capture(CaptureAngle::Front, &live, &mut renderer, &mut controls)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Encode(_)));
        assert!(controls.enabled);
    }

    #[test]
    fn disabled_controls_stay_disabled() {
        let live = live_camera(&CameraStateStore::new());
        let mut controls = Controls::default();
        ViewCapture::default()
            .capture(CaptureAngle::Side, &live, &mut StubRenderer::new(), &mut controls)
            .unwrap();
        assert!(!controls.enabled);
        assert!(controls.toggles.is_empty());
    }

    #[test]
    fn output_is_lossless_webp_data_uri() {
        let live = live_camera(&CameraStateStore::new());
        let image = ViewCapture::default()
            .capture(CaptureAngle::Isometric, &live, &mut StubRenderer::new(), &mut NoControls)
            .unwrap();
        assert!(image.data_uri().starts_with("data:image/webp;base64,"));
        assert_eq!(image.file_name(), "capture-isometric.webp");

        let decoded = image::load_from_memory_with_format(image.bytes(), ImageFormat::WebP).unwrap();
        assert_eq!(decoded.dimensions(), (32, 24));
        assert_eq!(decoded.get_pixel(5, 5).0, [200, 100, 50, 255]);
    }

    #[test]
    fn unknown_angle_name_is_rejected_before_rendering() {
        let live = live_camera(&CameraStateStore::new());
        let mut renderer = StubRenderer::new();
        let err = ViewCapture::default()
            .capture_named("diagonal", &live, &mut renderer, &mut NoControls)
            .unwrap_err();
        assert!(matches!(err, CaptureError::UnknownAngle(_)));
        assert!(renderer.seen.is_empty());
    }

    #[test]
    fn radius_is_configurable() {
        let live = live_camera(&CameraStateStore::new());
        let capture = ViewCapture::new(CaptureConfig { radius: 3.0 });
        let cam = capture.virtual_camera(CaptureAngle::Front, &live);
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 3.0));
    }
}
