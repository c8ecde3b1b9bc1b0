/*!
arbor3d
========

**arbor3d** is a dynamic 3-dimensional bounding volume hierarchy written with
the rust programming language.

It provides an incrementally updated binary AABB tree with two quality optimizers (local tree
rotations and a time-boxed bottom-up rebuild), recursive, explicit-stack and resumable
stackless traversals, ray/segment/frustum queries, a flat implicit BVH for static geometry, and
a compact binary serialization format.

*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::module_inception)]
#![allow(clippy::manual_range_contains)] // This usually makes it way more verbose that it could be.
#![allow(clippy::type_complexity)] // Complains about closures that are fairly simple.

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
#[cfg(test)]
#[macro_use]
extern crate approx;
extern crate num_traits as num;

pub extern crate nalgebra as na;

pub mod bounding_volume;
pub mod codec;
pub mod partitioning;
pub mod query;
pub mod utils;

/// Aliases for mathematical types.
pub mod math {
    pub use na::{Matrix4, Point3, Vector3};

    /// The scalar type used throughout this crate.
    pub type Real = f64;

    /// The default tolerance used for geometric operations.
    pub const DEFAULT_EPSILON: Real = Real::EPSILON;

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The dimension of the space multiplied by two.
    pub const TWO_DIM: usize = DIM * 2;

    /// The point type.
    pub use Point3 as Point;

    /// The vector type.
    pub use Vector3 as Vector;
}
