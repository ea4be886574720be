use crate::GpuError;
use crate::gpu::WgpuRenderer;
use futures::FutureExt;
use futures::channel::oneshot;
use mipview_render::{RenderError, Renderer, RgbaFrame, VirtualCamera};

/// Row pitch of a texture-to-buffer copy, rounded up to wgpu's alignment.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip row padding and convert BGRA to RGBA when needed.
pub(crate) fn unpad_rows(padded: &[u8], width: u32, height: u32, pitch: u32, bgra: bool) -> Vec<u8> {
    let row = width as usize * 4;
    let mut out = Vec::with_capacity(row * height as usize);
    for chunk in padded.chunks(pitch as usize).take(height as usize) {
        out.extend_from_slice(&chunk[..row]);
    }
    if bgra {
        for px in out.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    out
}

fn is_bgra(format: wgpu::TextureFormat) -> Result<bool, RenderError> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(false),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(true),
        other => Err(RenderError::Readback(format!(
            "cannot read back {other:?} as RGBA8"
        ))),
    }
}

/// Renders into an offscreen texture and reads the pixels back.
///
/// Borrows the live renderer so captures draw the same scene and materials.
pub struct OffscreenCapture<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    renderer: &'a mut WgpuRenderer,
}

impl<'a> OffscreenCapture<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue, renderer: &'a mut WgpuRenderer) -> Self {
        Self {
            device,
            queue,
            renderer,
        }
    }
}

impl Renderer for OffscreenCapture<'_> {
    type Output = RgbaFrame;

    fn render(&mut self, camera: &VirtualCamera) -> Result<RgbaFrame, RenderError> {
        let (width, height) = (camera.viewport.x, camera.viewport.y);
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSize { width, height });
        }
        let format = self.renderer.color_format();
        let bgra = is_bgra(format)?;
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer.render(self.device, self.queue, &view, camera);

        let pitch = padded_bytes_per_row(width);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture_readback"),
            size: pitch as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("capture_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(pitch),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match rx.now_or_never() {
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(e))) => return Err(RenderError::Readback(e.to_string())),
            _ => return Err(RenderError::Readback("buffer map did not complete".into())),
        }

        let pixels = {
            let mapped = slice.get_mapped_range();
            unpad_rows(&mapped, width, height, pitch, bgra)
        };
        readback.unmap();
        target.destroy();
        RgbaFrame::new(width, height, pixels)
    }
}

/// A device and queue without a window, for command-line captures.
pub struct HeadlessGpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl HeadlessGpu {
    /// Color format of headless render targets.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mipview_headless_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;
        let adapter_info = adapter.get_info();
        tracing::info!(
            backend = adapter_info.backend.to_str(),
            adapter = %adapter_info.name,
            "headless GPU initialized"
        );
        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }
}
