//! Axis Aligned Bounding Box.

use crate::bounding_volume::BoundingVolume;
use crate::math::{Point, Real, Vector, DIM};

/// An Axis-Aligned Bounding Box (AABB).
///
/// The box is described by its six bounds `(x0, y0, z0)`–`(x1, y1, z1)`. Callers are expected to
/// keep `x0 ≤ x1`, `y0 ≤ y1` and `z0 ≤ z1`; this is not enforced here (use
/// [`Aabb::set_bounds_unordered`] when the ordering of the input isn't known).
///
/// The surface area is cached and recomputed by every method that changes the bounds, so
/// [`Aabb::surface_area`] is always consistent with [`Aabb::mins`] and [`Aabb::maxs`].
///
/// # Example
///
/// ```rust
/// use arbor3d::bounding_volume::Aabb;
/// use arbor3d::na::Point3;
///
/// let mut aabb = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// assert_eq!(aabb.surface_area(), 6.0);
///
/// let grown = aabb.expand_to_fit(&Aabb::new(Point3::origin(), Point3::new(2.0, 1.0, 1.0)));
/// assert!(grown);
/// assert_eq!(aabb.surface_area(), 10.0);
/// ```
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Aabb {
    mins: Point<Real>,
    maxs: Point<Real>,
    surface_area: Real,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point::origin(), Point::origin())
    }
}

impl Aabb {
    /// Creates a new AABB from its minimum and maximum corners.
    ///
    /// Each component of `mins` should be ≤ the corresponding component of `maxs`.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Aabb {
        Aabb {
            mins,
            maxs,
            surface_area: Self::surface_area_of(&mins, &maxs),
        }
    }

    /// Creates a new AABB from its six bounds.
    #[inline]
    pub fn from_bounds(x0: Real, y0: Real, z0: Real, x1: Real, y1: Real, z1: Real) -> Aabb {
        Self::new(Point::new(x0, y0, z0), Point::new(x1, y1, z1))
    }

    /// Creates an invalid AABB with inverted bounds.
    ///
    /// The resulting AABB has `mins` set to maximum values and `maxs` set to
    /// minimum values. This is useful as an initial value for AABB merging
    /// algorithms (similar to starting a min operation with infinity).
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::MAX).into(),
            Vector::repeat(-Real::MAX).into(),
        )
    }

    /// Creates a new AABB from its center and half-extents.
    #[inline]
    pub fn from_half_extents(center: Point<Real>, half_extents: Vector<Real>) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Creates a new AABB that tightly encloses a set of points.
    ///
    /// Returns [`Aabb::new_invalid`] if the iterator is empty.
    pub fn from_points<I>(pts: I) -> Self
    where
        I: IntoIterator<Item = Point<Real>>,
    {
        let mut result = Self::new_invalid();
        for pt in pts {
            result.mins = result.mins.inf(&pt);
            result.maxs = result.maxs.sup(&pt);
        }
        result.update_surface_area();
        result
    }

    /// The point with minimum coordinates.
    #[inline]
    pub fn mins(&self) -> Point<Real> {
        self.mins
    }

    /// The point with maximum coordinates.
    #[inline]
    pub fn maxs(&self) -> Point<Real> {
        self.maxs
    }

    /// The six bounds of this box, in `[x0, y0, z0, x1, y1, z1]` order.
    #[inline]
    pub fn bounds(&self) -> [Real; 6] {
        [
            self.mins.x,
            self.mins.y,
            self.mins.z,
            self.maxs.x,
            self.maxs.y,
            self.maxs.z,
        ]
    }

    /// Overwrites the six bounds of this box.
    ///
    /// The bounds are taken as-is: `x0` is expected to be smaller than `x1` and so on.
    #[inline]
    pub fn set_bounds(&mut self, x0: Real, y0: Real, z0: Real, x1: Real, y1: Real, z1: Real) {
        self.mins = Point::new(x0, y0, z0);
        self.maxs = Point::new(x1, y1, z1);
        self.update_surface_area();
    }

    /// Overwrites the six bounds of this box, sorting each axis pair first.
    pub fn set_bounds_unordered(
        &mut self,
        x0: Real,
        y0: Real,
        z0: Real,
        x1: Real,
        y1: Real,
        z1: Real,
    ) {
        self.set_bounds(
            x0.min(x1),
            y0.min(y1),
            z0.min(z1),
            x0.max(x1),
            y0.max(y1),
            z0.max(z1),
        );
    }

    /// Overwrites this box with a copy of `other`.
    #[inline]
    pub fn copy_bounds(&mut self, other: &Aabb) {
        *self = *other;
    }

    /// Returns the center point of this AABB.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// The extents of this `Aabb`.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// Returns the half-extents of this AABB.
    #[inline]
    pub fn half_extents(&self) -> Vector<Real> {
        (self.maxs - self.mins) * 0.5
    }

    /// Returns the volume of this AABB.
    #[inline]
    pub fn volume(&self) -> Real {
        let extents = self.extents();
        extents.x * extents.y * extents.z
    }

    /// Is this box free from NaN and with `mins ≤ maxs` on every axis?
    #[inline]
    pub fn is_valid(&self) -> bool {
        (0..DIM).all(|i| self.mins[i] <= self.maxs[i])
    }

    /// Does any bound of this box contain a NaN?
    #[inline]
    pub fn has_nan(&self) -> bool {
        self.mins.iter().chain(self.maxs.iter()).any(|x| x.is_nan())
    }

    /// The cached surface area of this box.
    ///
    /// Inverted axes contribute a zero extent.
    #[inline]
    pub fn surface_area(&self) -> Real {
        self.surface_area
    }

    /// Recomputes the surface area of this box from its bounds, ignoring the cache.
    #[inline]
    pub fn compute_surface_area(&self) -> Real {
        Self::surface_area_of(&self.mins, &self.maxs)
    }

    #[inline]
    fn surface_area_of(mins: &Point<Real>, maxs: &Point<Real>) -> Real {
        let e = (maxs - mins).map(|x| x.max(0.0));
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    #[inline]
    fn update_surface_area(&mut self) {
        self.surface_area = Self::surface_area_of(&self.mins, &self.maxs);
    }

    /// Grows this box so it encloses `other`.
    ///
    /// Returns `true` if at least one bound actually moved.
    #[inline]
    pub fn expand_to_fit(&mut self, other: &Aabb) -> bool {
        let mins = self.mins.inf(&other.mins);
        let maxs = self.maxs.sup(&other.maxs);
        if mins == self.mins && maxs == self.maxs {
            return false;
        }

        self.mins = mins;
        self.maxs = maxs;
        self.update_surface_area();
        true
    }

    /// Checks if `other` lies entirely within this box (boundaries included).
    #[inline]
    pub fn contains_box(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.mins) && na::partial_ge(&self.maxs, &other.maxs)
    }

    /// Checks if `point` lies within this box (boundaries included).
    #[inline]
    pub fn contains_point(&self, point: &Point<Real>) -> bool {
        na::partial_le(&self.mins, point) && na::partial_ge(&self.maxs, point)
    }

    /// How much the surface area would grow if this box had to include `other`.
    ///
    /// This is `Σ growth(axis) × (sum of the extents of the two other axes)`, i.e., half the
    /// first-order surface-area delta, which is enough to rank insertion candidates without
    /// recomputing areas.
    #[inline]
    pub fn cost_for_inclusion(&self, other: &Aabb) -> Real {
        let extents = self.extents();
        let mut cost = 0.0;

        for i in 0..DIM {
            let growth = (self.mins[i] - other.mins[i]).max(0.0)
                + (other.maxs[i] - self.maxs[i]).max(0.0);
            let j = (i + 1) % DIM;
            let k = (i + 2) % DIM;
            cost += growth * (extents[j] + extents[k]);
        }

        cost
    }

    /// Signed distance between this box and `other`.
    ///
    /// Positive when the boxes are apart (Euclidean distance between their closest points),
    /// zero when they touch, and negative when they penetrate (the opposite of the smallest
    /// penetration depth along any axis).
    pub fn distance_to_box(&self, other: &Aabb) -> Real {
        let gaps = Vector::from_fn(|i, _| {
            (self.mins[i] - other.maxs[i]).max(other.mins[i] - self.maxs[i])
        });

        if gaps.iter().all(|g| *g <= 0.0) {
            gaps.max()
        } else {
            gaps.map(|g| g.max(0.0)).norm()
        }
    }
}

impl BoundingVolume for Aabb {
    #[inline]
    fn intersects(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    #[inline]
    fn contains(&self, other: &Aabb) -> bool {
        self.contains_box(other)
    }

    #[inline]
    fn merge(&mut self, other: &Aabb) {
        let _ = self.expand_to_fit(other);
    }

    #[inline]
    fn merged(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.mins.inf(&other.mins), self.maxs.sup(&other.maxs))
    }

    #[inline]
    fn loosened(&self, margin: Real) -> Aabb {
        assert!(margin >= 0.0, "The loosening margin must be positive.");
        Aabb::new(
            self.mins - Vector::repeat(margin),
            self.maxs + Vector::repeat(margin),
        )
    }
}

#[cfg(test)]
mod test {
    use super::Aabb;
    use crate::bounding_volume::BoundingVolume;
    use crate::math::Point;

    fn unit_at(x: f64, y: f64, z: f64) -> Aabb {
        Aabb::from_bounds(x, y, z, x + 1.0, y + 1.0, z + 1.0)
    }

    #[test]
    fn surface_area_follows_every_mutation() {
        let mut aabb = unit_at(0.0, 0.0, 0.0);
        assert_eq!(aabb.surface_area(), 6.0);

        aabb.set_bounds(0.0, 0.0, 0.0, 2.0, 3.0, 4.0);
        assert_eq!(aabb.surface_area(), 2.0 * (6.0 + 12.0 + 8.0));
        assert_eq!(aabb.surface_area(), aabb.compute_surface_area());

        // Shrinking keeps the area positive: a sign-based cache would have returned the old value.
        aabb.set_bounds(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        assert_eq!(aabb.surface_area(), 6.0);
    }

    #[test]
    fn inverted_box_has_zero_area() {
        assert_eq!(Aabb::new_invalid().surface_area(), 0.0);
        assert!(!Aabb::new_invalid().is_valid());
    }

    #[test]
    fn unordered_bounds_are_sorted() {
        let mut aabb = Aabb::default();
        aabb.set_bounds_unordered(3.0, -1.0, 5.0, 1.0, 2.0, -5.0);
        assert_eq!(aabb.mins(), Point::new(1.0, -1.0, -5.0));
        assert_eq!(aabb.maxs(), Point::new(3.0, 2.0, 5.0));
    }

    #[test]
    fn expand_to_fit_reports_growth() {
        let mut aabb = unit_at(0.0, 0.0, 0.0);
        assert!(!aabb.expand_to_fit(&Aabb::from_bounds(0.2, 0.2, 0.2, 0.8, 0.8, 0.8)));
        assert!(aabb.expand_to_fit(&unit_at(2.0, 0.0, 0.0)));
        assert_eq!(aabb, Aabb::from_bounds(0.0, 0.0, 0.0, 3.0, 1.0, 1.0));

        let mut invalid = Aabb::new_invalid();
        assert!(invalid.expand_to_fit(&aabb));
        assert_eq!(invalid, aabb);
    }

    #[test]
    fn cost_for_inclusion() {
        let aabb = unit_at(0.0, 0.0, 0.0);
        assert_eq!(aabb.cost_for_inclusion(&Aabb::from_bounds(0.1, 0.1, 0.1, 0.9, 0.9, 0.9)), 0.0);
        // Growing by 1 along x costs 1 × (1 + 1).
        assert_eq!(aabb.cost_for_inclusion(&unit_at(1.0, 0.0, 0.0)), 2.0);
        // Growing by 1 along x and y.
        assert_eq!(aabb.cost_for_inclusion(&unit_at(1.0, 1.0, 0.0)), 4.0);
    }

    #[test]
    fn containment_and_intersection() {
        let big = Aabb::from_bounds(0.0, 0.0, 0.0, 10.0, 10.0, 10.0);
        let small = unit_at(2.0, 2.0, 2.0);
        assert!(big.contains_box(&small));
        assert!(!small.contains_box(&big));
        assert!(big.intersects(&small));
        assert!(!small.intersects(&unit_at(5.0, 5.0, 5.0)));
        assert!(big.contains_point(&Point::new(10.0, 0.0, 5.0)));
        assert_eq!(
            small.merged(&unit_at(5.0, 5.0, 5.0)),
            Aabb::from_bounds(2.0, 2.0, 2.0, 6.0, 6.0, 6.0)
        );
    }

    #[test]
    fn signed_distance() {
        let a = unit_at(0.0, 0.0, 0.0);
        assert_relative_eq!(a.distance_to_box(&unit_at(3.0, 0.0, 0.0)), 2.0);
        assert_relative_eq!(a.distance_to_box(&unit_at(4.0, 5.0, 0.0)), 5.0);
        assert_relative_eq!(a.distance_to_box(&unit_at(1.0, 0.0, 0.0)), 0.0);
        assert_relative_eq!(a.distance_to_box(&unit_at(0.75, 0.5, 0.0)), -0.25);
    }
}
