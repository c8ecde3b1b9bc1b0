//! Geometric primitives used to query bounding volumes and hierarchies.

pub use self::frustum::{Frustum, Plane, PlaneSide};
pub use self::ray::Ray;
pub use self::segment::Segment;

mod frustum;
pub mod ray;
mod segment;
