use crate::camera::VirtualCamera;

/// Errors raised by a rendering backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("viewport has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },
    #[error("GPU device error: {0}")]
    Device(String),
    #[error("frame readback failed: {0}")]
    Readback(String),
    #[error("frame holds {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for RgbaFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RgbaFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSize { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::FrameSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A frame filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, RenderError> {
        let count = width as usize * height as usize;
        Self::new(width, height, rgba.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Renderer-agnostic interface. Backends implement this trait.
///
/// A renderer draws the scene it owns through the camera it is handed. It
/// never modifies the camera or any camera state behind it.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame through `camera` at the camera's viewport size.
    fn render(&mut self, camera: &VirtualCamera) -> Result<Self::Output, RenderError>;
}

/// Renderers whose output can be read back as pixels.
pub trait OffscreenRenderer: Renderer<Output = RgbaFrame> {}

impl<T: Renderer<Output = RgbaFrame> + ?Sized> OffscreenRenderer for T {}
