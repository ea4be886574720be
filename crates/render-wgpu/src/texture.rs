use crate::GpuError;
use mipview_stream::{MipChain, PixelFormat};

/// How a texture's texels are interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRole {
    /// Color data; sRGB chains are decoded on sample.
    BaseColor,
    /// Normal or roughness data, always linear.
    Data,
}

/// Expected size of mip `level` for a base of `width` x `height`.
pub(crate) fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

fn texture_format(format: PixelFormat, role: TextureRole) -> Result<wgpu::TextureFormat, GpuError> {
    match (format, role) {
        (PixelFormat::Rgba8Srgb, TextureRole::BaseColor) => Ok(wgpu::TextureFormat::Rgba8UnormSrgb),
        (PixelFormat::Rgba8Srgb | PixelFormat::Rgba8Unorm, _) => Ok(wgpu::TextureFormat::Rgba8Unorm),
        (PixelFormat::Opaque { vk_format, .. }, _) => Err(GpuError::UnsupportedFormat(vk_format)),
    }
}

/// Check that every level of `chain` has the size the GPU expects.
pub(crate) fn validate_chain(chain: &MipChain) -> Result<(), GpuError> {
    let base = chain.level(0).ok_or(GpuError::EmptyChain)?;
    for (i, level) in chain.levels.iter().enumerate() {
        let expected = mip_extent(base.width, base.height, i as u32);
        if (level.width, level.height) != expected {
            return Err(GpuError::MipSize {
                level: i,
                expected,
                actual: (level.width, level.height),
            });
        }
        let bytes = level.width as usize * level.height as usize * 4;
        if level.data.len() != bytes {
            return Err(GpuError::MipBytes {
                level: i,
                expected: bytes,
                actual: level.data.len(),
            });
        }
    }
    Ok(())
}

/// A mip chain resident on the GPU.
///
/// The texture is destroyed by [`GpuTexture::release`] or on drop, whichever
/// comes first.
#[derive(Debug)]
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    mip_count: u32,
    released: bool,
}

impl GpuTexture {
    /// Upload every level of `chain`. Runtime mip generation is never used;
    /// the GPU sees exactly the levels the chain carries.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        chain: &MipChain,
        role: TextureRole,
    ) -> Result<Self, GpuError> {
        let format = texture_format(chain.format, role)?;
        validate_chain(chain)?;
        let base = chain.level(0).ok_or(GpuError::EmptyChain)?;
        let mip_count = chain.len() as u32;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: base.width,
                height: base.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (i, level) in chain.levels.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: i as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &level.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width * 4),
                    rows_per_image: Some(level.height),
                },
                wgpu::Extent3d {
                    width: level.width,
                    height: level.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        tracing::debug!(label, mip_count, width = base.width, height = base.height, "texture uploaded");
        Ok(Self {
            texture,
            view,
            mip_count,
            released: false,
        })
    }

    /// A 1x1 texture of one color.
    pub fn solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        rgba: [u8; 4],
    ) -> Result<Self, GpuError> {
        let chain = MipChain {
            format: PixelFormat::Rgba8Unorm,
            ..MipChain::solid(rgba)
        };
        Self::upload(device, queue, label, &chain, TextureRole::Data)
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Free the GPU memory now. Idempotent.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.texture.destroy();
        self.released = true;
        true
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mipview_stream::MipLevel;

    #[test]
    fn mip_extent_halves_down_to_one() {
        assert_eq!(mip_extent(32, 8, 0), (32, 8));
        assert_eq!(mip_extent(32, 8, 3), (4, 1));
        assert_eq!(mip_extent(32, 8, 5), (1, 1));
    }

    #[test]
    fn test_pattern_chain_is_uploadable() {
        assert!(validate_chain(&MipChain::test_pattern(64)).is_ok());
    }

    #[test]
    fn mismatched_level_is_rejected() {
        let mut chain = MipChain::test_pattern(8);
        chain.levels[1] = MipLevel {
            width: 3,
            height: 4,
            data: vec![0; 48],
        };
        assert!(matches!(
            validate_chain(&chain),
            Err(GpuError::MipSize { level: 1, expected: (4, 4), actual: (3, 4) })
        ));
    }

    #[test]
    fn short_level_data_is_rejected() {
        let mut chain = MipChain::test_pattern(4);
        chain.levels[0].data.pop();
        assert!(matches!(validate_chain(&chain), Err(GpuError::MipBytes { level: 0, .. })));
    }

    #[test]
    fn formats_by_role() {
        assert_eq!(
            texture_format(PixelFormat::Rgba8Srgb, TextureRole::BaseColor).unwrap(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format(PixelFormat::Rgba8Srgb, TextureRole::Data).unwrap(),
            wgpu::TextureFormat::Rgba8Unorm
        );
        let opaque = PixelFormat::Opaque {
            vk_format: 0,
            supercompression: 1,
        };
        assert!(matches!(
            texture_format(opaque, TextureRole::BaseColor),
            Err(GpuError::UnsupportedFormat(0))
        ));
    }
}
