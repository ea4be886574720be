use crate::ktx2::{self, Ktx2Error};
use crate::texture::MipChain;
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use mipview_assets::{AssetError, AssetSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Errors from loading a texture.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("KTX2 error: {0}")]
    Ktx2(#[from] Ktx2Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0} contains no mip levels")]
    EmptyChain(String),
    #[error("load task for {0} was dropped before completing")]
    Abandoned(String),
}

/// Sending half of a progress channel. Values are whole percentages; only
/// increases are sent, so the receiver sees a non-decreasing sequence.
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<u8>,
    last: Option<u8>,
}

/// Receiving half of a progress channel. Dropping it turns every later
/// report into a no-op.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<u8>,
}

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded();
    (ProgressSender { tx, last: None }, ProgressReceiver { rx })
}

impl ProgressSender {
    /// Report `loaded` of `total` bytes. Without a known total nothing is sent
    /// until [`ProgressSender::complete`].
    pub fn report(&mut self, loaded: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let percent = (loaded as f64 / total as f64 * 100.0).round().min(100.0) as u8;
        self.send(percent);
    }

    pub fn complete(&mut self) {
        self.send(100);
    }

    fn send(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        // A closed receiver means the consumer was torn down.
        let _ = self.tx.unbounded_send(percent);
    }
}

impl ProgressReceiver {
    /// Every percentage received since the last call, oldest first. Never
    /// blocks.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(Some(percent)) = self.rx.next().now_or_never() {
            out.push(percent);
        }
        out
    }
}

/// Loads texture assets into mip chains.
///
/// One loader is shared (behind an `Arc`) by every consumer; decoded chains
/// are memoized per URI so repeated requests reuse the same allocation.
pub struct TextureLoader {
    source: Arc<dyn AssetSource>,
    cache: Mutex<HashMap<String, Arc<MipChain>>>,
}

impl std::fmt::Debug for TextureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureLoader")
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl TextureLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load a pre-mipmapped KTX2 texture, reporting byte progress.
    pub async fn load_texture(
        &self,
        uri: &str,
        progress: &mut ProgressSender,
    ) -> Result<Arc<MipChain>, LoadError> {
        if let Some(chain) = self.cached(uri) {
            tracing::debug!(uri, "texture served from cache");
            progress.complete();
            return Ok(chain);
        }

        let bytes = self.read(uri, Some(progress)).await?;
        let chain = ktx2::parse(&bytes)?;
        if chain.is_empty() {
            return Err(LoadError::EmptyChain(uri.to_string()));
        }
        tracing::info!(
            uri,
            levels = chain.len(),
            bytes = bytes.len(),
            format = ?chain.format,
            "texture decoded"
        );
        Ok(self.remember(uri, chain))
    }

    /// Load a plain image (PNG, JPEG or WebP) as a single-level RGBA8 chain.
    /// Used for the fallback texture and the auxiliary maps.
    pub async fn load_image(&self, uri: &str) -> Result<Arc<MipChain>, LoadError> {
        if let Some(chain) = self.cached(uri) {
            return Ok(chain);
        }
        let bytes = self.read(uri, None).await?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::debug!(uri, width, height, "image decoded");
        Ok(self.remember(uri, MipChain::single(width, height, rgba.into_raw())))
    }

    pub fn cached(&self, uri: &str) -> Option<Arc<MipChain>> {
        self.cache.lock().get(uri).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Drop a memoized chain. Holders of the `Arc` keep their copy.
    pub fn evict(&self, uri: &str) -> bool {
        self.cache.lock().remove(uri).is_some()
    }

    fn remember(&self, uri: &str, chain: MipChain) -> Arc<MipChain> {
        let chain = Arc::new(chain);
        self.cache.lock().insert(uri.to_string(), Arc::clone(&chain));
        chain
    }

    async fn read(
        &self,
        uri: &str,
        mut progress: Option<&mut ProgressSender>,
    ) -> Result<Vec<u8>, LoadError> {
        let mut stream = self.source.open(uri)?;
        let total = stream.total_len;
        let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = stream.chunks.next().await {
            body.extend_from_slice(&chunk?);
            if let Some(progress) = progress.as_deref_mut() {
                progress.report(body.len() as u64, total);
            }
        }
        if let Some(progress) = progress {
            progress.complete();
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use mipview_assets::MemorySource;

    fn ktx2_bytes(size: u32) -> Vec<u8> {
        ktx2::write_rgba8(&MipChain::test_pattern(size).levels, false)
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn progress_values_increase_to_100() {
        let bytes = ktx2_bytes(32);
        let chunk = bytes.len() / 7 + 1;
        let source = MemorySource::new()
            .with_asset("/texture.ktx2", bytes)
            .with_chunk_size(chunk);
        let loader = TextureLoader::new(Arc::new(source));
        let (mut tx, mut rx) = progress_channel();

        let chain = block_on(loader.load_texture("/texture.ktx2", &mut tx)).unwrap();
        assert_eq!(chain.len(), 6);

        let seen = rx.drain();
        assert!(seen.len() >= 2);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn unknown_length_reports_only_completion() {
        let source = MemorySource::new()
            .with_asset("t.ktx2", ktx2_bytes(8))
            .with_chunk_size(16)
            .without_length();
        let loader = TextureLoader::new(Arc::new(source));
        let (mut tx, mut rx) = progress_channel();
        block_on(loader.load_texture("t.ktx2", &mut tx)).unwrap();
        assert_eq!(rx.drain(), vec![100]);
    }

    #[test]
    fn chains_are_memoized() {
        let loader = TextureLoader::new(Arc::new(
            MemorySource::new().with_asset("t.ktx2", ktx2_bytes(4)),
        ));
        let (mut tx, _rx) = progress_channel();
        let a = block_on(loader.load_texture("t.ktx2", &mut tx)).unwrap();
        let b = block_on(loader.load_texture("t.ktx2", &mut tx)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.cached_count(), 1);
        assert!(loader.evict("t.ktx2"));
        assert!(!loader.evict("t.ktx2"));
    }

    #[test]
    fn transport_failure_surfaces_as_asset_error() {
        let source = MemorySource::new()
            .with_asset("t.ktx2", ktx2_bytes(16))
            .with_chunk_size(64)
            .failing_after("t.ktx2", 2);
        let loader = TextureLoader::new(Arc::new(source));
        let (mut tx, mut rx) = progress_channel();
        let err = block_on(loader.load_texture("t.ktx2", &mut tx)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Asset(AssetError::Transport { received: 128, .. })
        ));
        assert!(!rx.drain().contains(&100));
        assert_eq!(loader.cached_count(), 0);
    }

    #[test]
    fn malformed_container_is_a_ktx2_error() {
        let loader = TextureLoader::new(Arc::new(
            MemorySource::new().with_asset("t.ktx2", vec![0; 100]),
        ));
        let (mut tx, _rx) = progress_channel();
        assert!(matches!(
            block_on(loader.load_texture("t.ktx2", &mut tx)),
            Err(LoadError::Ktx2(Ktx2Error::BadIdentifier))
        ));
    }

    #[test]
    fn images_decode_to_single_level() {
        let loader = TextureLoader::new(Arc::new(
            MemorySource::new().with_asset("fallback.png", png_bytes()),
        ));
        let chain = block_on(loader.load_image("fallback.png")).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!((chain.levels[0].width, chain.levels[0].height), (2, 3));
        assert_eq!(&chain.levels[0].data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn dropped_receiver_makes_progress_a_no_op() {
        let (mut tx, rx) = progress_channel();
        drop(rx);
        tx.report(5, Some(10));
        tx.complete();
    }
}
