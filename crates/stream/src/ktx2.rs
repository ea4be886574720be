//! Minimal KTX2 container reader and RGBA8 writer.
//!
//! Only the header and level index are interpreted. Level payloads are kept
//! as opaque bytes tagged with their Vulkan format; supercompressed or block
//! compressed payloads are carried through untouched.

use crate::texture::{MipChain, MipLevel, PixelFormat};

pub const IDENTIFIER: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n',
];

pub const VK_FORMAT_R8G8B8A8_UNORM: u32 = 37;
pub const VK_FORMAT_R8G8B8A8_SRGB: u32 = 43;

const HEADER_LEN: usize = 80;
const LEVEL_INDEX_ENTRY_LEN: usize = 24;
/// A 2D image cannot have more levels than bits in its largest dimension.
const MAX_LEVELS: u32 = 32;

/// Errors from reading a KTX2 container.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Ktx2Error {
    #[error("not a KTX2 file (bad identifier)")]
    BadIdentifier,
    #[error("truncated KTX2 data: need {needed} bytes, have {len}")]
    Truncated { needed: usize, len: usize },
    #[error("KTX2 texture has zero width")]
    ZeroDimensions,
    #[error("unsupported KTX2 layout: {0}")]
    Unsupported(String),
    #[error("level {level} spans bytes {start}..{end} beyond file length {len}")]
    LevelOutOfBounds {
        level: usize,
        start: u64,
        end: u64,
        len: usize,
    },
    #[error("level {level} has {actual} bytes, expected {expected} for RGBA8")]
    LevelSize {
        level: usize,
        expected: u64,
        actual: u64,
    },
}

/// Fixed-size fields of the KTX2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub vk_format: u32,
    pub type_size: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub layer_count: u32,
    pub face_count: u32,
    pub level_count: u32,
    pub supercompression_scheme: u32,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self, Ktx2Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Ktx2Error::Truncated {
                needed: HEADER_LEN,
                len: bytes.len(),
            });
        }
        if bytes[..12] != IDENTIFIER {
            return Err(Ktx2Error::BadIdentifier);
        }
        Ok(Self {
            vk_format: read_u32(bytes, 12),
            type_size: read_u32(bytes, 16),
            pixel_width: read_u32(bytes, 20),
            pixel_height: read_u32(bytes, 24),
            pixel_depth: read_u32(bytes, 28),
            layer_count: read_u32(bytes, 32),
            face_count: read_u32(bytes, 36),
            level_count: read_u32(bytes, 40),
            supercompression_scheme: read_u32(bytes, 44),
        })
    }

    /// Levels stored in the file. Zero means "generate at load", which this
    /// reader treats as the base level only.
    pub fn stored_levels(&self) -> usize {
        self.level_count.max(1) as usize
    }

    fn pixel_format(&self) -> PixelFormat {
        match (self.vk_format, self.supercompression_scheme) {
            (VK_FORMAT_R8G8B8A8_UNORM, 0) => PixelFormat::Rgba8Unorm,
            (VK_FORMAT_R8G8B8A8_SRGB, 0) => PixelFormat::Rgba8Srgb,
            (vk_format, supercompression) => PixelFormat::Opaque {
                vk_format,
                supercompression,
            },
        }
    }
}

/// Read a KTX2 container into a mip chain ordered finest (index 0) first.
pub fn parse(bytes: &[u8]) -> Result<MipChain, Ktx2Error> {
    let header = Header::parse(bytes)?;
    if header.pixel_width == 0 {
        return Err(Ktx2Error::ZeroDimensions);
    }
    if header.pixel_depth > 1 || header.layer_count > 1 || header.face_count > 1 {
        return Err(Ktx2Error::Unsupported(format!(
            "depth={} layers={} faces={}",
            header.pixel_depth, header.layer_count, header.face_count
        )));
    }
    if header.level_count > MAX_LEVELS {
        return Err(Ktx2Error::Unsupported(format!(
            "{} levels",
            header.level_count
        )));
    }

    let count = header.stored_levels();
    let index_end = HEADER_LEN + count * LEVEL_INDEX_ENTRY_LEN;
    if bytes.len() < index_end {
        return Err(Ktx2Error::Truncated {
            needed: index_end,
            len: bytes.len(),
        });
    }

    let format = header.pixel_format();
    let mut levels = Vec::with_capacity(count);
    for level in 0..count {
        let entry = HEADER_LEN + level * LEVEL_INDEX_ENTRY_LEN;
        let start = read_u64(bytes, entry);
        let length = read_u64(bytes, entry + 8);
        let end = start.saturating_add(length);
        if end > bytes.len() as u64 {
            return Err(Ktx2Error::LevelOutOfBounds {
                level,
                start,
                end,
                len: bytes.len(),
            });
        }

        let width = (header.pixel_width >> level).max(1);
        let height = (header.pixel_height.max(1) >> level).max(1);
        if format.is_rgba8() {
            let expected = width as u64 * height as u64 * 4;
            if length != expected {
                return Err(Ktx2Error::LevelSize {
                    level,
                    expected,
                    actual: length,
                });
            }
        }

        levels.push(MipLevel {
            width,
            height,
            data: bytes[start as usize..end as usize].to_vec(),
        });
    }

    Ok(MipChain { format, levels })
}

/// Write an uncompressed RGBA8 KTX2 container. `levels` must be ordered
/// finest first with halving dimensions.
pub fn write_rgba8(levels: &[MipLevel], srgb: bool) -> Vec<u8> {
    let base = levels.first();
    let width = base.map_or(1, |l| l.width);
    let height = base.map_or(1, |l| l.height);
    let vk_format = if srgb {
        VK_FORMAT_R8G8B8A8_SRGB
    } else {
        VK_FORMAT_R8G8B8A8_UNORM
    };

    let mut out = Vec::new();
    out.extend_from_slice(&IDENTIFIER);
    for field in [vk_format, 1, width, height, 0, 0, 1, levels.len() as u32, 0] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    // dfd/kvd/sgd offsets and lengths: no descriptor blocks are written.
    out.extend_from_slice(&[0u8; 32]);

    let mut offset = (HEADER_LEN + levels.len() * LEVEL_INDEX_ENTRY_LEN) as u64;
    for level in levels {
        let len = level.data.len() as u64;
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        offset += len;
    }
    for level in levels {
        out.extend_from_slice(&level.data);
    }
    out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
