use crate::loader::{LoadError, ProgressReceiver, TextureLoader, progress_channel};
use crate::lod::{LodConfig, LodScheduler, ResolutionCallback};
use crate::texture::{LoadState, MipChain, TextureResource};
use futures::channel::{mpsc, oneshot};
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use futures::{FutureExt, StreamExt};
use mipview_assets::AssetManifest;
use mipview_common::ResourceId;
use mipview_material::{AuxMaps, MaterialBinder};
use std::sync::Arc;
use std::time::Duration;

/// Shown when even the fallback image cannot be read.
const LAST_RESORT_COLOR: [u8; 4] = [255, 0, 255, 255];

/// Result of a texture load task.
#[derive(Debug)]
pub enum LoadOutcome {
    Ready(Arc<MipChain>),
    /// The load failed; `fallback` is the chain to show instead.
    Failed {
        error: LoadError,
        fallback: Arc<MipChain>,
    },
}

/// Auxiliary map slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    Normal,
    Roughness,
}

/// A loaded auxiliary map.
#[derive(Debug, Clone)]
pub struct AuxTexture {
    pub id: ResourceId,
    pub chain: Arc<MipChain>,
}

type AuxResult = (AuxKind, Result<Arc<MipChain>, LoadError>);

/// The lifecycle of one streamed texture shown on many cubes.
///
/// Owns the resource, the channels of its in-flight load and, once the load
/// resolves, the LOD scheduler. The host calls [`StreamedTexture::poll`] once
/// per frame after driving the executor the load was spawned on.
pub struct StreamedTexture {
    manifest: AssetManifest,
    lod_config: LodConfig,
    resource: TextureResource,
    scheduler: Option<LodScheduler>,
    progress: Option<ProgressReceiver>,
    outcome: Option<oneshot::Receiver<LoadOutcome>>,
    aux_results: Option<mpsc::UnboundedReceiver<AuxResult>>,
    normal: Option<AuxTexture>,
    roughness: Option<AuxTexture>,
    on_progress: Option<Box<dyn FnMut(u8)>>,
    on_resolution: Option<ResolutionCallback>,
    torn_down: bool,
}

impl std::fmt::Debug for StreamedTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedTexture")
            .field("resource", &self.resource)
            .field("scheduler", &self.scheduler)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl StreamedTexture {
    pub fn new(manifest: AssetManifest, lod_config: LodConfig) -> Self {
        let resource = TextureResource::new(manifest.texture.clone());
        Self {
            manifest,
            lod_config,
            resource,
            scheduler: None,
            progress: None,
            outcome: None,
            aux_results: None,
            normal: None,
            roughness: None,
            on_progress: None,
            on_resolution: None,
            torn_down: false,
        }
    }

    /// Observe load progress percentages.
    pub fn on_progress(&mut self, callback: impl FnMut(u8) + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Observe the resolution label after every LOD step, and once for the
    /// fallback if the load fails.
    pub fn on_resolution(&mut self, callback: impl FnMut(&crate::ResolutionText) + 'static) {
        self.on_resolution = Some(Box::new(callback));
    }

    /// Issue the load. The texture, and the auxiliary maps named in the
    /// manifest, are loaded as independent tasks on `spawner`.
    pub fn request<S>(&mut self, loader: Arc<TextureLoader>, spawner: &S) -> Result<(), SpawnError>
    where
        S: LocalSpawn + ?Sized,
    {
        if self.torn_down || !self.resource.begin_loading() {
            tracing::debug!(state = ?self.resource.state(), "texture already requested");
            return Ok(());
        }
        tracing::info!(uri = %self.manifest.texture, "texture requested");

        let (mut progress_tx, progress_rx) = progress_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.progress = Some(progress_rx);
        self.outcome = Some(outcome_rx);

        let texture_uri = self.manifest.texture.clone();
        let fallback_uri = self.manifest.fallback.clone();
        let main_loader = Arc::clone(&loader);
        spawner.spawn_local(async move {
            let outcome = match main_loader.load_texture(&texture_uri, &mut progress_tx).await {
                Ok(chain) => LoadOutcome::Ready(chain),
                Err(error) => {
                    let fallback = match main_loader.load_image(&fallback_uri).await {
                        Ok(chain) => chain,
                        Err(e) => {
                            tracing::warn!(uri = %fallback_uri, error = %e, "fallback image unavailable");
                            Arc::new(MipChain::solid(LAST_RESORT_COLOR))
                        }
                    };
                    LoadOutcome::Failed { error, fallback }
                }
            };
            // The receiver is gone if the texture was torn down meanwhile.
            let _ = outcome_tx.send(outcome);
        })?;

        let (aux_tx, aux_rx) = mpsc::unbounded();
        self.aux_results = Some(aux_rx);
        let aux = [
            (AuxKind::Normal, self.manifest.normal_map.clone()),
            (AuxKind::Roughness, self.manifest.roughness_map.clone()),
        ];
        for (kind, uri) in aux.into_iter().filter(|(_, uri)| !uri.is_empty()) {
            let loader = Arc::clone(&loader);
            let tx = aux_tx.clone();
            spawner.spawn_local(async move {
                let _ = tx.unbounded_send((kind, loader.load_image(&uri).await));
            })?;
        }
        Ok(())
    }

    /// Apply whatever the load tasks produced since the last frame and
    /// advance LOD stepping. Returns the number of LOD steps taken.
    pub fn poll(&mut self, now: Duration, materials: &mut MaterialBinder) -> usize {
        if self.torn_down {
            return 0;
        }
        self.drain_progress();
        self.drain_aux(materials);
        self.resolve_outcome(now, materials);

        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.poll(now, &mut self.resource, materials),
            None => 0,
        }
    }

    /// Cancel stepping, drop the load channels and release the texture and
    /// the materials. Stepping is cancelled before anything is disposed.
    /// Idempotent.
    pub fn teardown(&mut self, materials: &mut MaterialBinder) {
        if self.torn_down {
            return;
        }
        self.release();
        materials.dispose_all();
    }

    pub fn resource(&self) -> &TextureResource {
        &self.resource
    }

    pub fn scheduler(&self) -> Option<&LodScheduler> {
        self.scheduler.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        !self.torn_down && self.resource.is_loading()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn aux_map(&self, kind: AuxKind) -> Option<&AuxTexture> {
        match kind {
            AuxKind::Normal => self.normal.as_ref(),
            AuxKind::Roughness => self.roughness.as_ref(),
        }
    }

    /// Pixel data behind a resource id handed to the materials: the main
    /// texture (streamed or fallback) or one of the auxiliary maps.
    pub fn chain_for(&self, id: ResourceId) -> Option<Arc<MipChain>> {
        if id == self.resource.id() {
            return self.resource.chain().cloned();
        }
        [self.normal.as_ref(), self.roughness.as_ref()]
            .into_iter()
            .flatten()
            .find(|aux| aux.id == id)
            .map(|aux| Arc::clone(&aux.chain))
    }

    fn aux_maps(&self) -> AuxMaps {
        AuxMaps {
            normal: self.normal.as_ref().map(|a| a.id),
            roughness: self.roughness.as_ref().map(|a| a.id),
        }
    }

    fn drain_progress(&mut self) {
        let Some(rx) = self.progress.as_mut() else {
            return;
        };
        for percent in rx.drain() {
            if self.resource.record_progress(percent) {
                tracing::trace!(percent, "texture load progress");
                if let Some(callback) = self.on_progress.as_mut() {
                    callback(self.resource.progress());
                }
            }
        }
    }

    fn drain_aux(&mut self, materials: &mut MaterialBinder) {
        let Some(rx) = self.aux_results.as_mut() else {
            return;
        };
        let mut arrived = false;
        while let Some(Some((kind, result))) = rx.next().now_or_never() {
            match result {
                Ok(chain) => {
                    tracing::debug!(?kind, "auxiliary map loaded");
                    let slot = AuxTexture {
                        id: ResourceId::new(),
                        chain,
                    };
                    match kind {
                        AuxKind::Normal => self.normal = Some(slot),
                        AuxKind::Roughness => self.roughness = Some(slot),
                    }
                    arrived = true;
                }
                Err(e) => tracing::warn!(?kind, error = %e, "auxiliary map unavailable, omitted"),
            }
        }
        if arrived && self.resource.state() == LoadState::Ready {
            materials.bind_streamed(self.resource.id(), self.aux_maps());
        }
    }

    fn resolve_outcome(&mut self, now: Duration, materials: &mut MaterialBinder) {
        let Some(rx) = self.outcome.as_mut() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return,
            Err(oneshot::Canceled) => LoadOutcome::Failed {
                error: LoadError::Abandoned(self.manifest.texture.clone()),
                fallback: Arc::new(MipChain::solid(LAST_RESORT_COLOR)),
            },
        };
        self.outcome = None;
        // Any progress still queued belongs to a load that has now resolved.
        self.drain_progress();
        self.progress = None;

        match outcome {
            LoadOutcome::Ready(chain) => self.on_ready(chain, now, materials),
            LoadOutcome::Failed { error, fallback } => self.on_failed(error, fallback, materials),
        }
    }

    fn on_ready(&mut self, chain: Arc<MipChain>, now: Duration, materials: &mut MaterialBinder) {
        if let Err(e) = self.resource.mark_ready(chain) {
            tracing::warn!(error = %e, "texture could not be marked ready");
            return;
        }
        tracing::info!(
            uri = %self.resource.source(),
            levels = self.resource.mip_count(),
            "texture ready"
        );
        materials.bind_streamed(self.resource.id(), self.aux_maps());
        self.scheduler = LodScheduler::start(
            self.lod_config,
            now,
            &mut self.resource,
            materials,
            self.on_resolution.take(),
        );
    }

    fn on_failed(
        &mut self,
        error: LoadError,
        fallback: Arc<MipChain>,
        materials: &mut MaterialBinder,
    ) {
        tracing::warn!(
            uri = %self.resource.source(),
            error = %error,
            "texture load failed, substituting fallback"
        );
        if let Err(e) = self.resource.substitute_fallback(fallback) {
            tracing::warn!(error = %e, "fallback could not be substituted");
            return;
        }
        materials.bind_fallback(self.resource.id());
        let resolution = self.resource.resolution();
        if let Some(callback) = self.on_resolution.as_mut() {
            callback(&resolution);
        }
    }

    fn release(&mut self) {
        self.torn_down = true;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.cancel();
        }
        self.progress = None;
        self.outcome = None;
        self.aux_results = None;
        self.on_progress = None;
        self.resource.dispose();
        self.normal = None;
        self.roughness = None;
        tracing::debug!(uri = %self.manifest.texture, "streamed texture torn down");
    }
}

impl Drop for StreamedTexture {
    fn drop(&mut self) {
        if !self.torn_down {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ktx2;
    use crate::texture::ResolutionText;
    use futures::executor::LocalPool;
    use mipview_assets::{AssetSource, ChunkGate, FsSource, MemorySource, PacedSource};
    use mipview_common::CubeId;
    use mipview_material::{MaterialEvent, TextureBinding};
    use std::cell::RefCell;
    use std::rc::Rc;

    const CADENCE: Duration = Duration::from_millis(200);

    fn manifest() -> AssetManifest {
        AssetManifest {
            texture: "texture.ktx2".into(),
            normal_map: String::new(),
            roughness_map: String::new(),
            fallback: "fallback.png".into(),
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn source() -> MemorySource {
        let ktx = ktx2::write_rgba8(&MipChain::test_pattern(32).levels, true);
        let chunk = ktx.len() / 4 + 1;
        MemorySource::new()
            .with_asset("texture.ktx2", ktx)
            .with_asset("fallback.png", png(4, 4))
            .with_chunk_size(chunk)
    }

    /// One cube, six face materials.
    fn one_cube() -> MaterialBinder {
        let mut binder = MaterialBinder::new();
        binder.attach(CubeId::new(0, 0));
        binder
    }

    fn lod_indices(binder: &mut MaterialBinder) -> Vec<usize> {
        binder
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                MaterialEvent::LodApplied { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    struct Harness {
        pool: LocalPool,
        texture: StreamedTexture,
        materials: MaterialBinder,
        resolutions: Rc<RefCell<Vec<ResolutionText>>>,
        progress: Rc<RefCell<Vec<u8>>>,
    }

    impl Harness {
        fn new(source: impl AssetSource + 'static, lod: LodConfig) -> Self {
            let pool = LocalPool::new();
            let mut texture = StreamedTexture::new(manifest(), lod);
            let resolutions = Rc::new(RefCell::new(Vec::new()));
            let progress = Rc::new(RefCell::new(Vec::new()));
            let r = Rc::clone(&resolutions);
            texture.on_resolution(move |res| r.borrow_mut().push(*res));
            let p = Rc::clone(&progress);
            texture.on_progress(move |pct| p.borrow_mut().push(pct));
            let loader = Arc::new(TextureLoader::new(Arc::new(source)));
            texture.request(loader, &pool.spawner()).unwrap();
            Self {
                pool,
                texture,
                materials: one_cube(),
                resolutions,
                progress,
            }
        }

        fn frame(&mut self, now: Duration) -> usize {
            self.pool.run_until_stalled();
            self.texture.poll(now, &mut self.materials)
        }
    }

    #[test]
    fn six_level_chain_refines_coarse_to_fine() {
        let mut h = Harness::new(source(), LodConfig::default());
        assert!(h.texture.is_loading());

        h.frame(Duration::ZERO);
        assert_eq!(h.texture.resource().state(), LoadState::Ready);
        assert!(!h.texture.is_loading());
        for tick in 1..=8u32 {
            h.frame(CADENCE * tick);
        }

        assert_eq!(lod_indices(&mut h.materials), vec![5, 4, 3, 2, 1, 0]);
        let pixels: Vec<u64> = h.resolutions.borrow().iter().map(|r| r.pixels()).collect();
        assert_eq!(pixels.len(), 6);
        assert!(pixels.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(h.resolutions.borrow()[5].to_string(), "32x32");
        assert!(!h.texture.scheduler().unwrap().is_running());

        let set = h.materials.set(CubeId::new(0, 0)).unwrap();
        assert_eq!(set.len(), 6);
        assert!(set.materials().iter().all(|m| m.mip_level == Some(0)
            && m.map == TextureBinding::Streamed(h.texture.resource().id())));
    }

    #[test]
    fn progress_is_reported_and_ends_at_100() {
        let mut h = Harness::new(source(), LodConfig::default());
        h.frame(Duration::ZERO);
        let seen = h.progress.borrow().clone();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(h.texture.resource().progress(), 100);
    }

    #[test]
    fn no_steps_after_teardown() {
        let mut h = Harness::new(source(), LodConfig::default());
        h.frame(Duration::ZERO);
        h.frame(CADENCE);
        h.frame(CADENCE * 2);
        assert_eq!(lod_indices(&mut h.materials), vec![5, 4, 3]);

        h.texture.teardown(&mut h.materials);
        let seen = h.resolutions.borrow().len();
        for tick in 3..=20u32 {
            assert_eq!(h.frame(CADENCE * tick), 0);
        }
        assert!(lod_indices(&mut h.materials).is_empty());
        assert_eq!(h.resolutions.borrow().len(), seen);
        assert!(h.texture.resource().is_disposed());
        assert!(h.materials.sets().values().all(|s| s.is_disposed()));
    }

    #[test]
    fn paced_load_shows_partial_progress_across_frames() {
        let gate = ChunkGate::new();
        let mut h = Harness::new(PacedSource::new(source(), gate.clone()), LodConfig::default());

        h.frame(Duration::ZERO);
        assert_eq!(h.texture.resource().state(), LoadState::Loading);
        assert_eq!(h.texture.resource().progress(), 0);

        // Four chunks, one let through per frame.
        let mut after_frame = Vec::new();
        for _ in 0..3 {
            gate.release(1);
            h.frame(Duration::ZERO);
            assert!(h.texture.is_loading());
            after_frame.push(h.texture.resource().progress());
        }
        assert!(after_frame.windows(2).all(|w| w[0] < w[1]));
        assert!(after_frame.iter().all(|p| *p > 0 && *p < 100));
        assert!(h.resolutions.borrow().is_empty());

        gate.release(1);
        h.frame(Duration::ZERO);
        assert_eq!(h.texture.resource().state(), LoadState::Ready);
        assert_eq!(h.texture.resource().progress(), 100);
        assert_eq!(lod_indices(&mut h.materials), vec![5]);
    }

    #[test]
    fn teardown_mid_load_stops_progress() {
        let gate = ChunkGate::new();
        let mut h = Harness::new(PacedSource::new(source(), gate.clone()), LodConfig::default());
        gate.release(1);
        h.frame(Duration::ZERO);
        let seen = h.progress.borrow().len();
        assert!(seen > 0);
        assert!(h.texture.is_loading());

        h.texture.teardown(&mut h.materials);
        gate.release(10);
        for tick in 1..=5u32 {
            assert_eq!(h.frame(CADENCE * tick), 0);
        }
        assert_eq!(h.progress.borrow().len(), seen);
        assert!(h.resolutions.borrow().is_empty());
        assert!(h.texture.scheduler().is_none());
        assert!(h.texture.resource().is_disposed());
    }

    #[test]
    fn file_backed_load_spans_frames() {
        const CHUNK: usize = 4096;
        let dir = tempfile::tempdir().unwrap();
        let ktx = ktx2::write_rgba8(&MipChain::test_pattern(64).levels, true);
        let chunks = ktx.len().div_ceil(CHUNK);
        assert!(chunks > 2);
        std::fs::write(dir.path().join("texture.ktx2"), &ktx).unwrap();

        let gate = ChunkGate::new();
        let files = FsSource::new(dir.path()).with_chunk_size(CHUNK);
        let mut h = Harness::new(PacedSource::new(files, gate.clone()), LodConfig::default());

        gate.release(1);
        h.frame(Duration::ZERO);
        assert!(h.texture.is_loading());
        assert!(h.texture.resource().progress() < 100);

        // The reader thread delivers asynchronously; keep granting one chunk
        // per frame until the load resolves.
        let mut frames = 1;
        while h.texture.is_loading() && frames < 5000 {
            gate.release(1);
            std::thread::sleep(Duration::from_millis(1));
            h.frame(Duration::ZERO);
            frames += 1;
        }
        assert_eq!(h.texture.resource().state(), LoadState::Ready);
        assert_eq!(h.texture.resource().mip_count(), 7);
        assert!(frames >= chunks);

        let seen = h.progress.borrow();
        assert!(seen.iter().any(|p| *p > 0 && *p < 100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn teardown_twice_is_a_no_op() {
        let mut h = Harness::new(source(), LodConfig::default());
        h.frame(Duration::ZERO);
        h.texture.teardown(&mut h.materials);
        h.materials.drain_events();
        h.texture.teardown(&mut h.materials);
        assert!(h.materials.drain_events().is_empty());
        assert!(h.texture.is_torn_down());
    }

    #[test]
    fn teardown_during_load_silences_progress() {
        let mut h = Harness::new(source(), LodConfig::default());
        h.texture.teardown(&mut h.materials);
        h.frame(Duration::ZERO);
        h.frame(CADENCE * 10);
        assert!(h.progress.borrow().is_empty());
        assert!(h.resolutions.borrow().is_empty());
        assert!(h.texture.scheduler().is_none());
        assert!(!h.texture.is_loading());
    }

    #[test]
    fn transport_failure_binds_fallback_to_every_face() {
        let failing = source().failing_after("texture.ktx2", 2);
        let mut h = Harness::new(failing, LodConfig::default());
        h.frame(Duration::ZERO);
        h.frame(CADENCE * 5);

        let id = h.texture.resource().id();
        assert_eq!(h.texture.resource().state(), LoadState::Failed);
        assert!(!h.texture.is_loading());
        assert!(h.texture.scheduler().is_none());

        let set = h.materials.set(CubeId::new(0, 0)).unwrap();
        assert_eq!(set.len(), 6);
        assert!(set
            .materials()
            .iter()
            .all(|m| m.map == TextureBinding::Fallback(id)));
        assert_eq!(h.texture.resource().resolution().to_string(), "4x4");
        assert_eq!(lod_indices(&mut h.materials), Vec::<usize>::new());
    }

    #[test]
    fn missing_fallback_still_recovers() {
        let source = MemorySource::new().with_asset("texture.ktx2", vec![1, 2, 3]);
        let mut h = Harness::new(source, LodConfig::default());
        h.frame(Duration::ZERO);
        assert_eq!(h.texture.resource().state(), LoadState::Failed);
        assert_eq!(h.texture.resource().resolution().to_string(), "1x1");
    }

    #[test]
    fn aux_maps_attach_when_loaded_and_are_omitted_when_missing() {
        let mut manifest = manifest();
        manifest.normal_map = "normal.png".into();
        manifest.roughness_map = "missing.png".into();
        let src = source().with_asset("normal.png", png(2, 2));

        let mut pool = LocalPool::new();
        let mut texture = StreamedTexture::new(manifest, LodConfig::default());
        let loader = Arc::new(TextureLoader::new(Arc::new(src)));
        texture.request(loader, &pool.spawner()).unwrap();
        let mut materials = one_cube();
        pool.run_until_stalled();
        texture.poll(Duration::ZERO, &mut materials);

        let normal = texture.aux_map(AuxKind::Normal).unwrap();
        assert!(texture.aux_map(AuxKind::Roughness).is_none());
        let face = &materials.set(CubeId::new(0, 0)).unwrap().materials()[0];
        assert_eq!(face.aux.normal, Some(normal.id));
        assert_eq!(face.aux.roughness, None);

        let normal_id = normal.id;
        assert_eq!(texture.chain_for(normal_id).unwrap().levels[0].width, 2);
        assert_eq!(texture.chain_for(texture.resource().id()).unwrap().len(), 6);
        assert!(texture.chain_for(ResourceId::new()).is_none());
        texture.teardown(&mut materials);
        assert!(texture.chain_for(normal_id).is_none());
    }

    #[test]
    fn fine_to_coarse_variant_loses_detail() {
        let lod = LodConfig {
            order: crate::RevealOrder::FineToCoarse,
            ..LodConfig::default()
        };
        let mut h = Harness::new(source(), lod);
        for tick in 0..=8u32 {
            h.frame(CADENCE * tick);
        }
        // The historical stepping: sharpest first, then coarser each tick.
        assert_eq!(lod_indices(&mut h.materials), vec![0, 1, 2, 3, 4, 5]);
        let pixels: Vec<u64> = h.resolutions.borrow().iter().map(|r| r.pixels()).collect();
        assert!(pixels.windows(2).all(|w| w[0] > w[1]));
    }
}
