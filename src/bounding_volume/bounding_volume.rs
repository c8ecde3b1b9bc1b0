use crate::math::Real;

/// Operations shared by the volumes a hierarchy can be built from.
///
/// Tree nodes only need to test overlap and containment, and to grow a volume so it encloses
/// another one. All of these are expected to run in constant time.
pub trait BoundingVolume: Sized {
    /// Do this volume and `other` overlap? Touching boundaries count as an overlap.
    fn intersects(&self, other: &Self) -> bool;

    /// Does this volume enclose `other` entirely?
    fn contains(&self, other: &Self) -> bool;

    /// Grows this volume in-place so it encloses `other`.
    fn merge(&mut self, other: &Self);

    /// The smallest volume enclosing both `self` and `other`.
    fn merged(&self, other: &Self) -> Self;

    /// A copy of this volume enlarged by `margin` in every direction.
    fn loosened(&self, margin: Real) -> Self;
}
