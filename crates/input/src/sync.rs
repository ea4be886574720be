use crate::gesture::InteractionEvent;
use mipview_common::Debouncer;
use mipview_persist::{CameraPose, CameraStateStore};
use std::time::Duration;

/// Camera sync configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Quiet period after the last change before a commit.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
        }
    }
}

/// Turns interaction gestures into debounced commits to the camera store.
///
/// Change signals restart the debounce window; the sample pending when the
/// window closes is committed once. An end signal commits its own sample at
/// once unless the store already holds that exact pose, which also covers a
/// store moved elsewhere (e.g. by a reset) since the last commit.
#[derive(Debug)]
pub struct CameraSyncController {
    pending: Debouncer<CameraPose>,
    interacting: bool,
    commits: u64,
    torn_down: bool,
}

impl CameraSyncController {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            pending: Debouncer::new(config.debounce),
            interacting: false,
            commits: 0,
            torn_down: false,
        }
    }

    /// Feed one interaction signal. Returns whether it caused a commit.
    pub fn handle(
        &mut self,
        event: InteractionEvent,
        now: Duration,
        store: &mut CameraStateStore,
    ) -> bool {
        if self.torn_down {
            return false;
        }
        match event {
            InteractionEvent::Start => {
                self.interacting = true;
                false
            }
            InteractionEvent::Change(pose) => {
                self.pending.push(pose, now);
                false
            }
            InteractionEvent::End(pose) => {
                self.interacting = false;
                let had_pending = self.pending.is_pending();
                self.pending.cancel();
                if had_pending || store.pose() != pose {
                    self.commit(pose, store)
                } else {
                    false
                }
            }
        }
    }

    /// Commit the pending sample if its debounce window has closed. Call once
    /// per frame.
    pub fn poll(&mut self, now: Duration, store: &mut CameraStateStore) -> bool {
        if self.torn_down {
            return false;
        }
        match self.pending.poll(now) {
            Some(pose) => self.commit(pose, store),
            None => false,
        }
    }

    /// Drop the pending sample, if any, without ending the gesture. Used when
    /// the store is changed underneath an interaction, so a sample taken
    /// before that change cannot land after it. Returns whether one was
    /// dropped.
    pub fn cancel_pending(&mut self) -> bool {
        let had_pending = self.pending.is_pending();
        if had_pending {
            tracing::debug!("pending camera commit discarded");
        }
        self.pending.cancel();
        had_pending
    }

    /// Drop any pending commit without flushing it. Idempotent.
    pub fn teardown(&mut self) {
        if self.pending.is_pending() {
            tracing::debug!("pending camera commit discarded on teardown");
        }
        self.pending.cancel();
        self.torn_down = true;
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Accepted commits so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    fn commit(&mut self, pose: CameraPose, store: &mut CameraStateStore) -> bool {
        // The store logs rejected poses.
        if store.set_camera_state(pose).is_err() {
            return false;
        }
        self.commits += 1;
        tracing::debug!(commits = self.commits, "camera pose synced");
        true
    }
}

impl Drop for CameraSyncController {
    fn drop(&mut self) {
        self.pending.cancel();
    }
}
