//! Scene: the grid of textured cubes the viewer displays.
//!
//! # Invariants
//! - Cube placement is a pure function of the grid layout.
//! - Every cube has exactly six faces, in a fixed order shared with the
//!   material sets and the GPU mesh.

pub mod grid;

pub use grid::{Cube, CubeFace, GridLayout, LayoutError, Scene};
