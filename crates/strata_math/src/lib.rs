//! Strata math types.
//!
//! Leaf crate of the workspace: the closed [`Interval`], the axis-aligned
//! bounding box [`Aabb`] with its slab test, and the time-stamped [`Ray`].

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
