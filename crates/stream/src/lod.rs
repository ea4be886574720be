use crate::texture::{LoadState, ResolutionText, TextureResource};
use mipview_common::IntervalTimer;
use mipview_material::MaterialBinder;
use std::str::FromStr;
use std::time::Duration;

/// Receives the resolution label after every LOD step.
pub type ResolutionCallback = Box<dyn FnMut(&ResolutionText)>;

/// Direction the scheduler walks the mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealOrder {
    /// Start at the coarsest level and refine to the finest (index 0).
    #[default]
    CoarseToFine,
    /// Start at the finest level and degrade to the coarsest. Reproduces an
    /// older viewer build whose stepping ran backwards; likely unintended,
    /// kept selectable for comparison.
    FineToCoarse,
}

impl RevealOrder {
    /// (seed, terminal) indices for a chain of `levels` levels.
    fn endpoints(self, levels: usize) -> (usize, usize) {
        let coarsest = levels.saturating_sub(1);
        match self {
            RevealOrder::CoarseToFine => (coarsest, 0),
            RevealOrder::FineToCoarse => (0, coarsest),
        }
    }
}

impl FromStr for RevealOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coarse-to-fine" => Ok(RevealOrder::CoarseToFine),
            "fine-to-coarse" => Ok(RevealOrder::FineToCoarse),
            other => Err(format!(
                "unknown reveal order '{other}' (expected coarse-to-fine or fine-to-coarse)"
            )),
        }
    }
}

/// LOD stepping configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodConfig {
    /// Time between successive steps.
    pub cadence: Duration,
    pub order: RevealOrder,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_millis(200),
            order: RevealOrder::CoarseToFine,
        }
    }
}

/// Walks a ready texture's mip chain one level per tick.
///
/// Each step sets the resource's active level, reports the resulting
/// resolution, then fans the level out to every bound material, in that
/// order. The seed level is published when the scheduler starts; after
/// reaching the terminal level the timer is cancelled and polling is inert.
pub struct LodScheduler {
    config: LodConfig,
    timer: IntervalTimer,
    current: usize,
    terminal: usize,
    steps: usize,
    on_resolution: Option<ResolutionCallback>,
}

impl std::fmt::Debug for LodScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodScheduler")
            .field("config", &self.config)
            .field("current", &self.current)
            .field("terminal", &self.terminal)
            .field("steps", &self.steps)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl LodScheduler {
    /// Start stepping a Ready resource, publishing the seed level at once.
    /// Returns `None` if the resource is not Ready.
    pub fn start(
        config: LodConfig,
        now: Duration,
        resource: &mut TextureResource,
        materials: &mut MaterialBinder,
        on_resolution: Option<ResolutionCallback>,
    ) -> Option<Self> {
        if resource.state() != LoadState::Ready || resource.mip_count() == 0 {
            tracing::debug!(state = ?resource.state(), "lod scheduler not started");
            return None;
        }
        let levels = resource.mip_count();
        let (seed, terminal) = config.order.endpoints(levels);
        if config.order == RevealOrder::FineToCoarse {
            tracing::warn!("lod stepping fine-to-coarse: the texture will lose detail over time");
        }

        let mut scheduler = Self {
            config,
            timer: IntervalTimer::start(config.cadence, now),
            current: seed,
            terminal,
            steps: 0,
            on_resolution,
        };
        tracing::info!(
            levels,
            seed,
            terminal,
            cadence_ms = config.cadence.as_millis() as u64,
            "lod stepping started"
        );
        scheduler.step(seed, resource, materials);
        if seed == terminal {
            scheduler.timer.cancel();
        }
        Some(scheduler)
    }

    /// Advance by however many ticks are due at `now`. Returns the number of
    /// steps taken.
    pub fn poll(
        &mut self,
        now: Duration,
        resource: &mut TextureResource,
        materials: &mut MaterialBinder,
    ) -> usize {
        let ticks = self.timer.due(now);
        let mut taken = 0;
        for _ in 0..ticks {
            if !self.timer.is_armed() {
                break;
            }
            let next = if self.terminal < self.current {
                self.current - 1
            } else {
                self.current + 1
            };
            if !self.step(next, resource, materials) {
                break;
            }
            taken += 1;
            if next == self.terminal {
                self.timer.cancel();
                tracing::info!(level = next, steps = self.steps, "lod stepping finished");
            }
        }
        taken
    }

    /// Stop stepping. Idempotent.
    pub fn cancel(&mut self) {
        if self.timer.is_armed() {
            tracing::debug!(level = self.current, "lod stepping cancelled");
        }
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn terminal_index(&self) -> usize {
        self.terminal
    }

    /// Steps published so far, the seed included.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn config(&self) -> LodConfig {
        self.config
    }

    fn step(
        &mut self,
        index: usize,
        resource: &mut TextureResource,
        materials: &mut MaterialBinder,
    ) -> bool {
        let _span = tracing::info_span!("lod_step", index).entered();
        if let Err(e) = resource.set_active_mip(index) {
            tracing::warn!(error = %e, "lod step rejected, stopping");
            self.timer.cancel();
            return false;
        }
        self.current = index;
        self.steps += 1;
        let resolution = resource.resolution();
        tracing::debug!(%resolution, "lod level active");
        if let Some(callback) = self.on_resolution.as_mut() {
            callback(&resolution);
        }
        materials.apply_lod(index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::MipChain;
    use mipview_common::CubeId;
    use mipview_material::MaterialEvent;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    const CADENCE: Duration = Duration::from_millis(200);

    fn ready_texture(size: u32) -> TextureResource {
        let mut tex = TextureResource::new("/texture.ktx2");
        tex.begin_loading();
        tex.mark_ready(Arc::new(MipChain::test_pattern(size)))
            .unwrap();
        tex
    }

    fn bound_materials(cubes: u32, tex: &TextureResource) -> MaterialBinder {
        let mut binder = MaterialBinder::new();
        for x in 0..cubes {
            binder.attach(CubeId::new(x, 0));
        }
        binder.bind_streamed(tex.id(), Default::default());
        binder.drain_events();
        binder
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, ResolutionCallback) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let callback: ResolutionCallback =
            Box::new(move |r: &ResolutionText| sink.borrow_mut().push(r.to_string()));
        (seen, callback)
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

    #[test]
    fn coarse_to_fine_visits_every_level_once() {
        let mut tex = ready_texture(32);
        let mut materials = bound_materials(4, &tex);
        let (seen, callback) = recorder();

        let mut lod = LodScheduler::start(
            LodConfig::default(),
            Duration::ZERO,
            &mut tex,
            &mut materials,
            Some(callback),
        )
        .unwrap();
        assert_eq!(lod.current_index(), 5);

        for tick in 1..=10u32 {
            lod.poll(CADENCE * tick, &mut tex, &mut materials);
        }

        assert_eq!(lod_indices(&mut materials), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(
            *seen.borrow(),
            vec!["1x1", "2x2", "4x4", "8x8", "16x16", "32x32"]
        );
        assert_eq!(lod.steps(), 6);
        assert!(!lod.is_running());
        assert_eq!(tex.active_mip(), Some(0));
        assert!(materials.is_uniform());
    }

    #[test]
    fn stalled_host_catches_up_without_overshooting() {
        let mut tex = ready_texture(8);
        let mut materials = bound_materials(1, &tex);
        let mut lod =
            LodScheduler::start(LodConfig::default(), Duration::ZERO, &mut tex, &mut materials, None)
                .unwrap();
        assert_eq!(lod.poll(Duration::from_secs(60), &mut tex, &mut materials), 3);
        assert_eq!(lod_indices(&mut materials), vec![3, 2, 1, 0]);
        assert_eq!(lod.poll(Duration::from_secs(120), &mut tex, &mut materials), 0);
    }

    #[test]
    fn nothing_happens_between_ticks() {
        let mut tex = ready_texture(8);
        let mut materials = bound_materials(1, &tex);
        let mut lod =
            LodScheduler::start(LodConfig::default(), Duration::ZERO, &mut tex, &mut materials, None)
                .unwrap();
        assert_eq!(lod.poll(Duration::from_millis(199), &mut tex, &mut materials), 0);
        assert_eq!(lod.poll(Duration::from_millis(200), &mut tex, &mut materials), 1);
        assert_eq!(lod.current_index(), 2);
    }

    #[test]
    fn fine_to_coarse_degrades_and_stops_at_coarsest() {
        let mut tex = ready_texture(4);
        let mut materials = bound_materials(2, &tex);
        let config = LodConfig {
            order: RevealOrder::FineToCoarse,
            ..LodConfig::default()
        };
        let mut lod =
            LodScheduler::start(config, Duration::ZERO, &mut tex, &mut materials, None).unwrap();
        for tick in 1..=5u32 {
            lod.poll(CADENCE * tick, &mut tex, &mut materials);
        }
        assert_eq!(lod_indices(&mut materials), vec![0, 1, 2]);
        assert_eq!(tex.active_mip(), Some(2));
        assert!(!lod.is_running());
    }

    #[test]
    fn single_level_chain_publishes_once_and_stops() {
        let mut tex = ready_texture(1);
        let mut materials = bound_materials(1, &tex);
        let (seen, callback) = recorder();
        let mut lod = LodScheduler::start(
            LodConfig::default(),
            Duration::ZERO,
            &mut tex,
            &mut materials,
            Some(callback),
        )
        .unwrap();
        assert!(!lod.is_running());
        assert_eq!(lod.poll(Duration::from_secs(5), &mut tex, &mut materials), 0);
        assert_eq!(*seen.borrow(), vec!["1x1"]);
    }

    #[test]
    fn cancelled_scheduler_is_inert() {
        let mut tex = ready_texture(16);
        let mut materials = bound_materials(1, &tex);
        let mut lod =
            LodScheduler::start(LodConfig::default(), Duration::ZERO, &mut tex, &mut materials, None)
                .unwrap();
        lod.poll(CADENCE, &mut tex, &mut materials);
        lod.cancel();
        lod.cancel();
        materials.drain_events();
        assert_eq!(lod.poll(CADENCE * 10, &mut tex, &mut materials), 0);
        assert!(materials.drain_events().is_empty());
        assert_eq!(tex.active_mip(), Some(3));
    }

    #[test]
    fn disposed_resource_stops_stepping() {
        let mut tex = ready_texture(16);
        let mut materials = bound_materials(1, &tex);
        let mut lod =
            LodScheduler::start(LodConfig::default(), Duration::ZERO, &mut tex, &mut materials, None)
                .unwrap();
        tex.dispose();
        assert_eq!(lod.poll(CADENCE * 3, &mut tex, &mut materials), 0);
        assert!(!lod.is_running());
    }

    #[test]
    fn does_not_start_before_ready() {
        let mut tex = TextureResource::new("x");
        let mut materials = MaterialBinder::new();
        assert!(
            LodScheduler::start(LodConfig::default(), Duration::ZERO, &mut tex, &mut materials, None)
                .is_none()
        );
    }

    #[test]
    fn reveal_order_parses() {
        assert_eq!("coarse-to-fine".parse::<RevealOrder>(), Ok(RevealOrder::CoarseToFine));
        assert_eq!("fine-to-coarse".parse::<RevealOrder>(), Ok(RevealOrder::FineToCoarse));
        assert!("sideways".parse::<RevealOrder>().is_err());
    }
}
