//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus shading helpers
//! - Seeded random streams and sample warping

mod error;
mod math;
mod sampling;

pub use error::*;
pub use math::*;
pub use sampling::*;
