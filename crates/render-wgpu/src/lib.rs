//! wgpu render backend for the cube-grid viewer.
//!
//! Draws a grid floor and one instanced, textured cube per grid cell. All
//! faces share one material bind group: the material binder keeps every face
//! identical, so a single uniform carries the active mip level, UV offset and
//! opacity.
//!
//! # Invariants
//! - The renderer never writes camera state; it draws through the camera it
//!   is handed.
//! - Streamed textures are uploaded with every level they carry and sampled
//!   at the material's explicit mip level. No mips are generated at runtime.
//! - A released texture is never sampled again; materials fall back to
//!   built-in placeholders.

mod camera;
mod gpu;
mod mesh;
mod offscreen;
mod shaders;
mod texture;

pub use camera::OrbitCamera;
pub use gpu::WgpuRenderer;
pub use offscreen::{HeadlessGpu, OffscreenCapture};
pub use texture::{GpuTexture, TextureRole};

/// Errors from GPU setup and texture upload.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("texture format {0} cannot be uploaded")]
    UnsupportedFormat(u32),
    #[error("mip chain has no levels")]
    EmptyChain,
    #[error("mip level {level} is {actual:?}, expected {expected:?}")]
    MipSize {
        level: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("mip level {level} holds {actual} bytes, expected {expected}")]
    MipBytes {
        level: usize,
        expected: usize,
        actual: usize,
    },
}
