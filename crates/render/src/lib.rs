//! Renderer-agnostic camera model, rendering interface and view capture.
//!
//! # Invariants
//! - Renderers read a camera; they never modify it or the state it came from.
//! - A capture renders through a copy of the live camera and restores any
//!   controls it suspended before returning, on success and on failure.
//! - Fixed capture angles sit on a sphere around the origin and look at it.

mod camera;
mod capture;
mod renderer;

pub use camera::{DEFAULT_FOV_Y, DEFAULT_ORTHO_ZOOM, Lens, VirtualCamera};
pub use capture::{
    CaptureConfig, CaptureError, CapturedImage, ControlsLock, NoControls, ViewCapture, data_uri,
    encode_webp, vantage,
};
pub use renderer::{OffscreenRenderer, RenderError, Renderer, RgbaFrame};
