use mipview_common::ResourceId;
use std::fmt;
use std::sync::Arc;

/// Pixel layout of a mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    /// Compressed or otherwise unsupported payload, carried but not uploadable.
    Opaque {
        vk_format: u32,
        supercompression: u32,
    },
}

impl PixelFormat {
    pub fn is_rgba8(self) -> bool {
        matches!(self, PixelFormat::Rgba8Unorm | PixelFormat::Rgba8Srgb)
    }
}

/// One level of a mip chain.
#[derive(Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl fmt::Debug for MipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MipLevel")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Decoded levels of a texture, index 0 the finest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipChain {
    pub format: PixelFormat,
    pub levels: Vec<MipLevel>,
}

/// Largest base level [`MipChain::test_pattern`] produces.
pub const MAX_TEST_PATTERN_SIZE: u32 = 8192;

fn test_pattern_size(size: u32) -> u32 {
    size.clamp(1, MAX_TEST_PATTERN_SIZE).next_power_of_two()
}

impl MipChain {
    /// A single-level RGBA8 chain, as produced by decoding a plain image.
    pub fn single(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            format: PixelFormat::Rgba8Srgb,
            levels: vec![MipLevel {
                width,
                height,
                data,
            }],
        }
    }

    /// A 1x1 chain of one color. Last-resort fallback when even the fallback
    /// image cannot be read.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::single(1, 1, rgba.to_vec())
    }

    /// A full RGBA8 chain from `size` down to 1x1, each level a checkerboard
    /// tinted by its index so refinement is visible on screen. `size` is
    /// rounded up to a power of two and capped at [`MAX_TEST_PATTERN_SIZE`].
    pub fn test_pattern(size: u32) -> Self {
        const TINTS: [[u8; 3]; 6] = [
            [230, 230, 230],
            [80, 160, 230],
            [90, 200, 120],
            [240, 200, 60],
            [230, 120, 60],
            [200, 70, 160],
        ];
        let size = test_pattern_size(size);
        let mut levels = Vec::new();
        let mut dim = size;
        loop {
            let index = levels.len();
            let tint = TINTS[index % TINTS.len()];
            let cell = (dim / 8).max(1);
            let mut data = Vec::with_capacity((dim * dim * 4) as usize);
            for y in 0..dim {
                for x in 0..dim {
                    let dark = ((x / cell) + (y / cell)) % 2 == 1;
                    let shade = if dark { 2 } else { 1 };
                    data.extend(tint.iter().map(|c| c / shade));
                    data.push(255);
                }
            }
            levels.push(MipLevel {
                width: dim,
                height: dim,
                data,
            });
            if dim == 1 {
                break;
            }
            dim /= 2;
        }
        Self {
            format: PixelFormat::Rgba8Unorm,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&MipLevel> {
        self.levels.get(index)
    }

    /// Index of the coarsest level.
    pub fn coarsest(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn byte_len(&self) -> usize {
        self.levels.iter().map(|l| l.data.len()).sum()
    }
}

/// User-facing resolution label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionText {
    Loading,
    Size { width: u32, height: u32 },
}

impl ResolutionText {
    /// Pixel count, zero while loading. Used to order labels.
    pub fn pixels(self) -> u64 {
        match self {
            ResolutionText::Loading => 0,
            ResolutionText::Size { width, height } => width as u64 * height as u64,
        }
    }
}

impl fmt::Display for ResolutionText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionText::Loading => f.write_str("Loading..."),
            ResolutionText::Size { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

/// Lifecycle of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loading,
    Ready,
    /// The load failed and the fallback texture was substituted.
    Failed,
}

/// Errors from texture resource transitions.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TextureError {
    #[error("mip index {index} out of range for {levels} levels")]
    MipOutOfRange { index: usize, levels: usize },
    #[error("texture is {0:?}, not ready")]
    NotReady(LoadState),
    #[error("texture has been disposed")]
    Disposed,
    #[error("mip chain is empty")]
    EmptyChain,
}

/// A texture in flight or on screen: its load state, byte progress, decoded
/// chain and the mip level currently shown.
#[derive(Debug)]
pub struct TextureResource {
    id: ResourceId,
    source: String,
    state: LoadState,
    progress: u8,
    chain: Option<Arc<MipChain>>,
    active_mip: Option<usize>,
    disposed: bool,
}

impl TextureResource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(),
            source: source.into(),
            state: LoadState::Pending,
            progress: 0,
            chain: None,
            active_mip: None,
            disposed: false,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Pending | LoadState::Loading)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn chain(&self) -> Option<&Arc<MipChain>> {
        self.chain.as_ref()
    }

    pub fn mip_count(&self) -> usize {
        self.chain.as_ref().map_or(0, |c| c.len())
    }

    pub fn active_mip(&self) -> Option<usize> {
        self.active_mip
    }

    /// Pending -> Loading. Returns whether the transition happened.
    pub fn begin_loading(&mut self) -> bool {
        if self.disposed || self.state != LoadState::Pending {
            return false;
        }
        self.state = LoadState::Loading;
        true
    }

    /// Record a progress percentage. Values never go backwards and are capped
    /// at 100; updates outside the Loading state are ignored. Returns whether
    /// the stored value changed.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.disposed || self.state != LoadState::Loading {
            return false;
        }
        let percent = percent.min(100);
        if percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Loading -> Ready with the decoded chain. The coarsest level is active
    /// until a scheduler picks its own seed.
    pub fn mark_ready(&mut self, chain: Arc<MipChain>) -> Result<(), TextureError> {
        if self.disposed {
            return Err(TextureError::Disposed);
        }
        if self.state != LoadState::Loading {
            return Err(TextureError::NotReady(self.state));
        }
        if chain.is_empty() {
            return Err(TextureError::EmptyChain);
        }
        self.active_mip = Some(chain.coarsest());
        self.chain = Some(chain);
        self.progress = 100;
        self.state = LoadState::Ready;
        Ok(())
    }

    /// Loading -> Failed, substituting the single-level fallback.
    pub fn substitute_fallback(&mut self, fallback: Arc<MipChain>) -> Result<(), TextureError> {
        if self.disposed {
            return Err(TextureError::Disposed);
        }
        if !self.is_loading() {
            return Err(TextureError::NotReady(self.state));
        }
        if fallback.is_empty() {
            return Err(TextureError::EmptyChain);
        }
        self.chain = Some(fallback);
        self.active_mip = Some(0);
        self.state = LoadState::Failed;
        Ok(())
    }

    /// Select the mip level to show. Only valid once Ready.
    pub fn set_active_mip(&mut self, index: usize) -> Result<(), TextureError> {
        if self.disposed {
            return Err(TextureError::Disposed);
        }
        if self.state != LoadState::Ready {
            return Err(TextureError::NotReady(self.state));
        }
        let levels = self.mip_count();
        if index >= levels {
            return Err(TextureError::MipOutOfRange { index, levels });
        }
        self.active_mip = Some(index);
        Ok(())
    }

    /// Label for the level currently shown.
    pub fn resolution(&self) -> ResolutionText {
        let level = self
            .active_mip
            .and_then(|i| self.chain.as_ref().and_then(|c| c.level(i)));
        match level {
            Some(level) => ResolutionText::Size {
                width: level.width,
                height: level.height,
            },
            None => ResolutionText::Loading,
        }
    }

    /// Release the decoded chain. Idempotent; returns whether this call
    /// released it.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.chain = None;
        self.active_mip = None;
        tracing::debug!(source = %self.source, "texture disposed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(size: u32) -> TextureResource {
        let mut tex = TextureResource::new("/texture.ktx2");
        tex.begin_loading();
        tex.mark_ready(Arc::new(MipChain::test_pattern(size))).unwrap();
        tex
    }

    #[test]
    fn test_pattern_halves_down_to_one() {
        let chain = MipChain::test_pattern(32);
        let widths: Vec<u32> = chain.levels.iter().map(|l| l.width).collect();
        assert_eq!(widths, vec![32, 16, 8, 4, 2, 1]);
        assert!(chain.levels.iter().all(|l| l.data.len() == (l.width * l.height * 4) as usize));
    }

    #[test]
    fn resolution_labels() {
        assert_eq!(ResolutionText::Loading.to_string(), "Loading...");
        assert_eq!(
            ResolutionText::Size {
                width: 1024,
                height: 512
            }
            .to_string(),
            "1024x512"
        );
        assert_eq!(TextureResource::new("x").resolution(), ResolutionText::Loading);
    }

    #[test]
    fn test_pattern_size_is_bounded() {
        assert_eq!(test_pattern_size(0), 1);
        assert_eq!(test_pattern_size(100), 128);
        assert_eq!(test_pattern_size(MAX_TEST_PATTERN_SIZE), MAX_TEST_PATTERN_SIZE);
        assert_eq!(test_pattern_size(u32::MAX), MAX_TEST_PATTERN_SIZE);
        assert_eq!(MipChain::test_pattern(5).levels[0].width, 8);
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut tex = TextureResource::new("x");
        assert!(!tex.record_progress(10), "ignored before loading starts");
        tex.begin_loading();
        assert!(tex.record_progress(30));
        assert!(!tex.record_progress(20));
        assert_eq!(tex.progress(), 30);
        assert!(tex.record_progress(250));
        assert_eq!(tex.progress(), 100);
    }

    #[test]
    fn ready_selects_coarsest_level() {
        let tex = ready(32);
        assert_eq!(tex.state(), LoadState::Ready);
        assert_eq!(tex.active_mip(), Some(5));
        assert_eq!(tex.resolution().to_string(), "1x1");
        assert!(!tex.is_loading());
    }

    #[test]
    fn active_mip_is_range_checked() {
        let mut tex = ready(8);
        tex.set_active_mip(0).unwrap();
        assert_eq!(tex.resolution().to_string(), "8x8");
        assert_eq!(
            tex.set_active_mip(4),
            Err(TextureError::MipOutOfRange {
                index: 4,
                levels: 4
            })
        );
        assert_eq!(tex.active_mip(), Some(0));
    }

    #[test]
    fn fallback_substitution() {
        let mut tex = TextureResource::new("x");
        tex.begin_loading();
        tex.substitute_fallback(Arc::new(MipChain::solid([255; 4])))
            .unwrap();
        assert_eq!(tex.state(), LoadState::Failed);
        assert!(!tex.is_loading());
        assert_eq!(tex.resolution().to_string(), "1x1");
        assert!(matches!(
            tex.set_active_mip(0),
            Err(TextureError::NotReady(LoadState::Failed))
        ));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut tex = ready(4);
        assert!(tex.dispose());
        assert!(!tex.dispose());
        assert!(tex.chain().is_none());
        assert_eq!(tex.set_active_mip(0), Err(TextureError::Disposed));
    }
}
