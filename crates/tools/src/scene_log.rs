use crate::inspector::{CubeReport, ViewerInspector};
use mipview_common::IntervalTimer;
use mipview_material::MaterialBinder;
use mipview_scene::Scene;
use std::time::Duration;

/// Default period of the scene log.
pub const SCENE_LOG_PERIOD: Duration = Duration::from_secs(2);

/// Periodic diagnostic dump of every cube at `debug` level.
#[derive(Debug, Clone)]
pub struct SceneLogger {
    timer: IntervalTimer,
    dumps: u64,
}

impl SceneLogger {
    pub fn start(now: Duration) -> Self {
        Self::with_period(SCENE_LOG_PERIOD, now)
    }

    pub fn with_period(period: Duration, now: Duration) -> Self {
        Self {
            timer: IntervalTimer::start(period, now),
            dumps: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.timer.period()
    }

    /// Number of dumps written so far.
    pub fn dumps(&self) -> u64 {
        self.dumps
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    /// Log the scene if a period elapsed. Ticks missed by a stalled host
    /// collapse into one dump. Returns the logged reports.
    pub fn poll(&mut self, now: Duration, scene: &Scene, materials: &MaterialBinder) -> Option<Vec<CubeReport>> {
        if self.timer.due(now) == 0 {
            return None;
        }
        let reports = ViewerInspector::cubes(scene, materials);
        let _span = tracing::debug_span!("scene_log", cubes = reports.len()).entered();
        for report in &reports {
            tracing::debug!(
                cube = %report.name,
                position = ?report.position,
                rotation = ?report.rotation,
                binding = ?report.binding,
                mip = ?report.mip_level,
                "cube"
            );
        }
        self.dumps += 1;
        Some(reports)
    }

    /// Stop logging. Idempotent.
    pub fn cancel(&mut self) {
        self.timer.cancel();
    }
}
