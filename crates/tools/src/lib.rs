//! Developer tooling: viewer inspector, loading overlay and periodic scene log.
//!
//! # Invariants
//! - Tools only read viewer state; nothing here mutates the scene, the
//!   materials or the texture.
//! - The scene log fires on the host clock, never on its own thread.

pub mod inspector;
pub mod scene_log;

pub use inspector::{CubeReport, LoadingOverlay, ViewerInspector, ViewerSummary};
pub use scene_log::{SCENE_LOG_PERIOD, SceneLogger};
