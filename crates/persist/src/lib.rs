//! Persistence of the camera pose: the process-wide [`CameraStateStore`], the
//! serialized [`CameraSnapshot`] format and an optional JSON [`PoseFile`].
//!
//! # Invariants
//! - Every position, rotation and target scalar held by the store is finite;
//!   a rejected commit leaves the previous pose intact.
//! - Reads after a mutation observe the new value immediately.
//! - Toggling projection never changes the pose; resetting the pose never
//!   changes the projection.

mod file;
mod snapshot;
mod store;

pub use file::{PoseFile, StoreError};
pub use snapshot::{CameraPose, CameraSnapshot, PoseError, ProjectionMode};
pub use store::{CameraStateStore, StoreEvent, SubscriptionId};
