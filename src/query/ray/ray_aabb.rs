use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector, DIM};
use crate::query::Ray;
use num::Zero;

impl Aabb {
    /// Casts a ray on this AABB using the branchless slab test.
    ///
    /// Returns the smallest `t ∈ [0, max_toi]` such that `ray.point_at(t)` lies in this box, or
    /// `None` if there is no such `t`. A ray starting inside of the box hits at `t = 0`.
    #[inline]
    pub fn cast_ray_slab(&self, ray: &Ray, max_toi: Real) -> Option<Real> {
        self.cast_inv_ray_slab(&ray.origin, &ray.inv_dir(), max_toi)
    }

    /// Same as [`Aabb::cast_ray_slab`], with the inverse ray direction already computed.
    ///
    /// Tree traversals call this once per node, so they compute [`Ray::inv_dir`] only once.
    #[inline]
    pub fn cast_inv_ray_slab(
        &self,
        origin: &Point<Real>,
        inv_dir: &Vector<Real>,
        max_toi: Real,
    ) -> Option<Real> {
        let t1 = (self.mins() - origin).component_mul(inv_dir);
        let t2 = (self.maxs() - origin).component_mul(inv_dir);

        let tmin = t1.inf(&t2).max().max(0.0);
        let tmax = t1.sup(&t2).min().min(max_toi);

        (tmax >= tmin).then_some(tmin)
    }

    /// Casts a ray on this AABB using the "candidate plane" test from Graphics Gems.
    ///
    /// This classifies the ray origin against each slab, picks the candidate plane with the
    /// largest time of impact, and checks that the corresponding hit point is on the box. It
    /// gives the same answers as [`Aabb::cast_ray_slab`].
    pub fn cast_ray_candidate_plane(&self, ray: &Ray, max_toi: Real) -> Option<Real> {
        #[derive(Copy, Clone, PartialEq)]
        enum Quadrant {
            Left,
            Right,
            Middle,
        }

        let mins = self.mins();
        let maxs = self.maxs();
        let mut inside = true;
        let mut quadrant = [Quadrant::Middle; DIM];
        let mut candidate_plane = [0.0; DIM];

        for i in 0..DIM {
            if ray.origin[i] < mins[i] {
                quadrant[i] = Quadrant::Left;
                candidate_plane[i] = mins[i];
                inside = false;
            } else if ray.origin[i] > maxs[i] {
                quadrant[i] = Quadrant::Right;
                candidate_plane[i] = maxs[i];
                inside = false;
            }
        }

        if inside {
            return Some(0.0);
        }

        let mut max_t = [-1.0; DIM];
        for i in 0..DIM {
            if quadrant[i] != Quadrant::Middle && !ray.dir[i].is_zero() {
                max_t[i] = (candidate_plane[i] - ray.origin[i]) / ray.dir[i];
            }
        }

        let mut which_plane = 0;
        for i in 1..DIM {
            if max_t[which_plane] < max_t[i] {
                which_plane = i;
            }
        }

        let toi = max_t[which_plane];
        if toi < 0.0 || toi > max_toi {
            return None;
        }

        for i in 0..DIM {
            if i != which_plane {
                let coord = ray.origin[i] + toi * ray.dir[i];
                if coord < mins[i] || coord > maxs[i] {
                    return None;
                }
            }
        }

        Some(toi)
    }

    /// Does the ray hit this box within `[0, max_toi]`?
    #[inline]
    pub fn intersects_ray(&self, ray: &Ray, max_toi: Real) -> bool {
        self.cast_ray_slab(ray, max_toi).is_some()
    }
}
