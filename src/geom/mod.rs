//! Geometric primitives.

mod sphere;

pub use sphere::{Ray, Sphere};
