//! Shared types and host-driven scheduling primitives.
//!
//! # Invariants
//! - Time is supplied by the caller as a `Duration` since an arbitrary epoch.
//!   Nothing in this crate reads the wall clock, so timers are deterministic
//!   under test.
//! - A cancelled timer never fires again.

mod angle;
mod timer;
mod types;

pub use angle::{CaptureAngle, UnknownAngle};
pub use timer::{Debouncer, IntervalTimer};
pub use types::{CubeId, ResourceId, Transform};
