use crate::bounding_volume::Aabb;
use crate::math::{Matrix4, Point, Real, Vector, DIM};
use arrayvec::ArrayVec;

/// The maximum number of planes a [`Frustum`] can hold.
pub const MAX_FRUSTUM_PLANES: usize = 8;

/// A plane `n · p + bias = 0`.
///
/// Points with `n · p + bias ≥ 0` are on the positive side of the plane, which is the "inside"
/// side when the plane bounds a [`Frustum`].
#[derive(PartialEq, Debug, Copy, Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Plane {
    /// The plane normal. It doesn't have to be normalized.
    pub normal: Vector<Real>,
    /// The plane offset along its normal.
    pub bias: Real,
}

/// Where a box lies relative to a plane.
///
/// The discriminants are the sum of the signs of the two extreme corners of the box along the
/// plane normal, each corner counting `+1` on the positive side and `-1` on the negative one.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
#[repr(i8)]
pub enum PlaneSide {
    /// The whole box is on the negative side of the plane.
    Below = -2,
    /// The plane cuts through the box.
    Straddling = 0,
    /// The whole box is on the positive side of the plane.
    Above = 2,
}

impl Plane {
    /// Creates the plane `normal · p + bias = 0`.
    #[inline]
    pub fn new(normal: Vector<Real>, bias: Real) -> Self {
        Self { normal, bias }
    }

    /// Creates the plane passing through `point` with the given normal.
    #[inline]
    pub fn from_point_normal(point: &Point<Real>, normal: Vector<Real>) -> Self {
        Self {
            normal,
            bias: -normal.dot(&point.coords),
        }
    }

    /// The signed distance from `point` to this plane, scaled by the normal's norm.
    #[inline]
    pub fn signed_distance(&self, point: &Point<Real>) -> Real {
        self.normal.dot(&point.coords) + self.bias
    }

    /// Rescales this plane so its normal has unit length.
    ///
    /// Degenerate planes are left untouched.
    pub fn normalized(&self) -> Self {
        let norm = self.normal.norm();
        if norm > 0.0 {
            Self::new(self.normal / norm, self.bias / norm)
        } else {
            *self
        }
    }
}

impl Aabb {
    /// Classifies this box against a plane.
    ///
    /// Only the two corners of the box that are extreme along the plane normal are tested.
    pub fn compute_plane_side(&self, plane: &Plane) -> PlaneSide {
        let mins = self.mins();
        let maxs = self.maxs();
        let mut p_vertex = mins;
        let mut n_vertex = maxs;

        for i in 0..DIM {
            if plane.normal[i] >= 0.0 {
                p_vertex[i] = maxs[i];
                n_vertex[i] = mins[i];
            }
        }

        let sign = |pt: &Point<Real>| {
            if plane.signed_distance(pt) < 0.0 {
                -1
            } else {
                1
            }
        };

        match sign(&p_vertex) + sign(&n_vertex) {
            -2 => PlaneSide::Below,
            2 => PlaneSide::Above,
            _ => PlaneSide::Straddling,
        }
    }
}

/// A convex volume bounded by up to [`MAX_FRUSTUM_PLANES`] planes.
///
/// A point is inside of the frustum if it is on the positive side of every plane.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Frustum {
    planes: ArrayVec<Plane, MAX_FRUSTUM_PLANES>,
}

impl Frustum {
    /// Builds a frustum from its planes.
    ///
    /// Planes past the [`MAX_FRUSTUM_PLANES`]-th are ignored.
    pub fn new(planes: impl IntoIterator<Item = Plane>) -> Self {
        Self {
            planes: planes.into_iter().take(MAX_FRUSTUM_PLANES).collect(),
        }
    }

    /// Extracts the six planes of a view-projection matrix (Gribb & Hartmann).
    ///
    /// The matrix is expected to map the view volume to the `[-1, 1]³` clip cube, as the
    /// perspective and orthographic projections of `nalgebra` do.
    pub fn from_view_projection(m: &Matrix4<Real>) -> Self {
        let row = |i: usize| m.row(i).transpose();
        let r3 = row(3);
        let planes = [
            r3 + row(0),
            r3 - row(0),
            r3 + row(1),
            r3 - row(1),
            r3 + row(2),
            r3 - row(2),
        ];

        Self::new(
            planes
                .iter()
                .map(|p| Plane::new(p.xyz(), p.w).normalized()),
        )
    }

    /// The planes bounding this frustum.
    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// The mask selecting every plane of this frustum.
    #[inline]
    pub fn full_mask(&self) -> u8 {
        ((1u16 << self.planes.len()) - 1) as u8
    }

    /// Classifies a box against this frustum.
    ///
    /// Returns [`PlaneSide::Above`] if the box is entirely inside, [`PlaneSide::Below`] if it is
    /// entirely outside of at least one plane, and [`PlaneSide::Straddling`] otherwise.
    pub fn classify(&self, aabb: &Aabb) -> PlaneSide {
        self.classify_masked(aabb, self.full_mask()).0
    }

    /// Classifies a box against the planes selected by `mask`.
    ///
    /// Also returns the mask of the planes the box still straddles: a subtree enclosed by this
    /// box is fully inside of the dropped planes, so they don't need to be tested again.
    pub fn classify_masked(&self, aabb: &Aabb, mask: u8) -> (PlaneSide, u8) {
        let mut remaining = mask;

        for (i, plane) in self.planes.iter().enumerate() {
            let bit = 1 << i;
            if mask & bit == 0 {
                continue;
            }

            match aabb.compute_plane_side(plane) {
                PlaneSide::Below => return (PlaneSide::Below, 0),
                PlaneSide::Above => remaining &= !bit,
                PlaneSide::Straddling => {}
            }
        }

        if remaining == 0 {
            (PlaneSide::Above, 0)
        } else {
            (PlaneSide::Straddling, remaining)
        }
    }
}
