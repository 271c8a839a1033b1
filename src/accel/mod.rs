//! Sphere bounding volume hierarchy.
//!
//! ## Architecture
//! ```text
//! spheres → BvhBuilder (arena, variance splits) → flatten (pre-order, skip indices) → FlatBvh
//! ```
//!
//! The arena exists only inside [`BvhBuilder::build`]; [`FlatBvh`] is a flat,
//! pointer-free array that can be uploaded to a device as-is.

mod build;
mod node;
mod traverse;

pub use build::{clamp_branching_factor, BvhBuilder, BvhParams};
pub use node::{FlatNode, NOT_A_LEAF};
pub use traverse::{BvhHit, FlatBvh};
