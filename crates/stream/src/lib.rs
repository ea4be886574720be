//! Streaming: progressive texture loading and level-of-detail refinement.
//!
//! A [`StreamedTexture`] requests a pre-mipmapped texture through the shared
//! [`TextureLoader`], reports byte progress on a separate channel, and once
//! the chain is ready hands it to a [`LodScheduler`] that walks the mip levels
//! at a fixed cadence, re-binding every material on each step.
//!
//! # Invariants
//! - Load progress is monotonic non-decreasing and capped at 100.
//! - The active mip index is valid whenever the resource is Ready.
//! - LOD steps move by exactly one level, never wrap, and stop at the
//!   terminal level with the timer cancelled.
//! - Teardown cancels the scheduler before the resource is disposed; no step
//!   and no progress update is observed afterwards.

pub mod ktx2;
mod loader;
mod lod;
mod streamed;
mod texture;

pub use ktx2::Ktx2Error;
pub use loader::{LoadError, ProgressReceiver, ProgressSender, TextureLoader, progress_channel};
pub use lod::{LodConfig, LodScheduler, ResolutionCallback, RevealOrder};
pub use streamed::{AuxKind, AuxTexture, LoadOutcome, StreamedTexture};
pub use texture::{
    LoadState, MAX_TEST_PATTERN_SIZE, MipChain, MipLevel, PixelFormat, ResolutionText, TextureError,
    TextureResource,
};
