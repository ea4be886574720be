//! Input: viewer actions, camera interaction gestures and the controller that
//! turns gestures into debounced camera commits.
//!
//! # Invariants
//! - A burst of interaction changes produces at most one commit, carrying the
//!   final sample.
//! - Commits reach the store in gesture order.
//! - After teardown no pending commit is ever flushed.

pub mod action;
mod gesture;
mod sync;
mod tween;

pub use action::ViewerAction;
pub use gesture::InteractionEvent;
pub use sync::{CameraSyncController, SyncConfig};
pub use tween::{CameraTween, TweenFrame, ViewShortcut};
