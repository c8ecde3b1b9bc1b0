use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector, DEFAULT_EPSILON};

/// A segment with extremities `a` and `b`.
#[derive(PartialEq, Debug, Copy, Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Segment {
    /// The segment first point.
    pub a: Point<Real>,
    /// The segment second point.
    pub b: Point<Real>,
}

impl Segment {
    /// Creates a new segment from two points.
    #[inline]
    pub fn new(a: Point<Real>, b: Point<Real>) -> Segment {
        Segment { a, b }
    }

    /// The middle point of this segment.
    #[inline]
    pub fn midpoint(&self) -> Point<Real> {
        na::center(&self.a, &self.b)
    }

    /// The vector from `a` to `b`.
    #[inline]
    pub fn scaled_direction(&self) -> Vector<Real> {
        self.b - self.a
    }

    /// The length of this segment.
    #[inline]
    pub fn length(&self) -> Real {
        self.scaled_direction().norm()
    }
}

impl Aabb {
    /// Tests if this box intersects the given segment.
    ///
    /// This is a separating-axis test: the three box axes are checked against the projection of
    /// the segment midpoint and half-direction, then the three cross products between the box
    /// axes and the segment direction.
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        let half_extents = self.half_extents();
        let half_dir = segment.scaled_direction() * 0.5;
        let t = segment.midpoint() - self.center();
        let abs_dir = half_dir.abs();

        for i in 0..3 {
            if t[i].abs() > half_extents[i] + abs_dir[i] {
                return false;
            }
        }

        // Widen a bit so that a segment lying exactly on a face isn't rejected by rounding.
        let abs_dir = abs_dir.add_scalar(DEFAULT_EPSILON);

        if (t.y * half_dir.z - t.z * half_dir.y).abs()
            > half_extents.y * abs_dir.z + half_extents.z * abs_dir.y
        {
            return false;
        }

        if (t.z * half_dir.x - t.x * half_dir.z).abs()
            > half_extents.x * abs_dir.z + half_extents.z * abs_dir.x
        {
            return false;
        }

        if (t.x * half_dir.y - t.y * half_dir.x).abs()
            > half_extents.x * abs_dir.y + half_extents.y * abs_dir.x
        {
            return false;
        }

        true
    }
}
