//! Traits and structure needed to cast rays.

use crate::math::{Point, Real, Vector};

/// A ray for ray-casting queries.
///
/// A ray is a half-infinite line starting at an origin point and extending
/// infinitely in a direction. Points along the ray are `origin + dir * t` for `t ≥ 0`; the
/// direction does not need to be normalized, in which case times of impact are scaled by
/// `dir.norm()`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Starting point of the ray.
    pub origin: Point<Real>,
    /// Direction vector of the ray.
    pub dir: Vector<Real>,
}

impl Ray {
    /// Creates a new ray from an origin point and direction vector.
    pub fn new(origin: Point<Real>, dir: Vector<Real>) -> Ray {
        Ray { origin, dir }
    }

    /// Creates a ray starting at `origin` and pointing toward `target`.
    ///
    /// The direction is `target - origin`, so `t = 1` is reached at `target`.
    pub fn toward(origin: Point<Real>, target: Point<Real>) -> Ray {
        Ray::new(origin, target - origin)
    }

    /// Computes a point along the ray at parameter `t`.
    #[inline]
    pub fn point_at(&self, t: Real) -> Point<Real> {
        self.origin + self.dir * t
    }

    /// The component-wise inverse of the direction.
    ///
    /// Near-zero components are replaced by a large finite value with the same sign so that the
    /// slab test never multiplies zero by infinity.
    #[inline]
    pub fn inv_dir(&self) -> Vector<Real> {
        self.dir.map(|r| {
            if r.abs() < Real::EPSILON {
                r.signum() / Real::EPSILON
            } else {
                1.0 / r
            }
        })
    }
}
