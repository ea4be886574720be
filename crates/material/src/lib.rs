//! Material binding: keeps every face material of every cube synchronized to
//! one streamed texture's active mip level and one UV offset.
//!
//! # Invariants
//! - All materials of a set observe the same mip level and UV offset.
//! - All sets of a binder observe the same values; mutations fan out in one
//!   call, so no render can see a half-applied step.
//! - The renderer consumes changes through [`MaterialBinder::take_dirty`],
//!   once per frame, before drawing.

mod binder;
mod material;

pub use binder::{MaterialBinder, MaterialEvent, MaterialFrame};
pub use material::{
    AuxMaps, CUBE_FACES, Material, MaterialError, MaterialSet, TextureBinding, WrapMode,
};
