use super::{Bvh, BvhNodeKind, BvhWorkspace, NodeId, TraversalAction};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Real, Vector};
use crate::query::{Frustum, PlaneSide, Ray, Segment};

impl<T> Bvh<T> {
    /// Iterates through all the leaves with an AABB intersecting the given `aabb`.
    pub fn intersect_aabb<'a>(
        &'a self,
        aabb: &'a Aabb,
    ) -> impl Iterator<Item = (NodeId, &'a T)> + 'a {
        self.leaves(move |node| node.aabb.intersects(aabb))
    }

    /// Calls `visitor` on every leaf whose AABB is hit by the ray within `[0, max_toi]`.
    ///
    /// Leaves are reported in depth-first order (not sorted along the ray) along with the time of
    /// impact of the ray on their AABB. The traversal stops if `visitor` returns `false`.
    pub fn cast_ray(
        &self,
        ray: &Ray,
        max_toi: Real,
        workspace: &mut BvhWorkspace,
        mut visitor: impl FnMut(NodeId, &T, Real) -> bool,
    ) {
        let inv_dir = ray.inv_dir();

        self.traverse(workspace, |id, node| {
            let Some(toi) = node.aabb.cast_inv_ray_slab(&ray.origin, &inv_dir, max_toi) else {
                return TraversalAction::Prune;
            };

            match &node.kind {
                BvhNodeKind::Leaf(payload) if !visitor(id, payload, toi) => {
                    TraversalAction::EarlyExit
                }
                _ => TraversalAction::Continue,
            }
        })
    }

    /// Same as [`Bvh::cast_ray`], but always descends first into the child whose AABB is hit
    /// first by the ray.
    ///
    /// Leaves are therefore reported roughly front-to-back, which lets `visitor` stop early once
    /// it found a hit closer than anything left to visit.
    pub fn cast_ray_front_to_back(
        &self,
        ray: &Ray,
        max_toi: Real,
        workspace: &mut BvhWorkspace,
        mut visitor: impl FnMut(NodeId, &T, Real) -> bool,
    ) {
        let inv_dir = ray.inv_dir();
        let stack = &mut workspace.ordered_stack;
        stack.clear();

        let Some(root_toi) = self.nodes[self.root.0]
            .aabb
            .cast_inv_ray_slab(&ray.origin, &inv_dir, max_toi)
        else {
            return;
        };
        stack.push((self.root, root_toi));

        while let Some((id, toi)) = stack.pop() {
            let node = &self.nodes[id.0];

            match &node.kind {
                BvhNodeKind::Leaf(payload) => {
                    if !visitor(id, payload, toi) {
                        return;
                    }
                }
                BvhNodeKind::Internal { left, right } => {
                    let hits = self.children_hits([*left, *right], ray, &inv_dir, max_toi);
                    stack.extend(hits.into_iter().flatten());
                }
            }
        }
    }

    /// Finds the closest leaf hit by a ray.
    ///
    /// The `leaf_toi` closure is given each leaf whose AABB is hit, with the time of impact on
    /// that AABB, and returns the actual time of impact on the leaf’s geometry (if any). Simply
    /// returning the given time of impact makes this a query on the leaf AABBs themselves.
    ///
    /// Subtrees farther than the best hit found so far are skipped.
    pub fn cast_ray_closest(
        &self,
        ray: &Ray,
        max_toi: Real,
        workspace: &mut BvhWorkspace,
        mut leaf_toi: impl FnMut(NodeId, &T, Real) -> Option<Real>,
    ) -> Option<(NodeId, Real)> {
        let inv_dir = ray.inv_dir();
        let stack = &mut workspace.ordered_stack;
        let mut best: Option<(NodeId, Real)> = None;
        let mut best_toi = max_toi;
        stack.clear();

        let root_toi = self.nodes[self.root.0]
            .aabb
            .cast_inv_ray_slab(&ray.origin, &inv_dir, max_toi)?;
        stack.push((self.root, root_toi));

        while let Some((id, toi)) = stack.pop() {
            if toi > best_toi {
                continue;
            }

            let node = &self.nodes[id.0];
            match &node.kind {
                BvhNodeKind::Leaf(payload) => {
                    if let Some(hit) = leaf_toi(id, payload, toi) {
                        if hit <= best_toi && best.map(|b| hit < b.1).unwrap_or(true) {
                            best = Some((id, hit));
                            best_toi = hit;
                        }
                    }
                }
                BvhNodeKind::Internal { left, right } => {
                    let hits = self.children_hits([*left, *right], ray, &inv_dir, best_toi);
                    stack.extend(hits.into_iter().flatten());
                }
            }
        }

        best
    }

    // The children hit by the ray within `[0, max_toi]`, with their time of impact, the
    // farthest first so the nearest pops first from a stack.
    fn children_hits(
        &self,
        children: [Option<NodeId>; 2],
        ray: &Ray,
        inv_dir: &Vector<Real>,
        max_toi: Real,
    ) -> [Option<(NodeId, Real)>; 2] {
        let hits = children.map(|child| {
            let child = child?;
            let toi = self.nodes[child.0]
                .aabb
                .cast_inv_ray_slab(&ray.origin, inv_dir, max_toi)?;
            Some((child, toi))
        });

        match hits {
            [Some(a), Some(b)] if a.1 < b.1 => [Some(b), Some(a)],
            _ => hits,
        }
    }

    /// Calls `visitor` on every leaf whose AABB intersects the given segment.
    ///
    /// The traversal stops if `visitor` returns `false`.
    pub fn intersect_segment(
        &self,
        segment: &Segment,
        workspace: &mut BvhWorkspace,
        visitor: impl FnMut(NodeId, &T) -> bool,
    ) {
        self.for_each_leaf(
            workspace,
            |node| node.aabb.intersects_segment(segment),
            visitor,
        )
    }

    /// Calls `visitor` on every leaf whose AABB isn’t entirely outside of the frustum.
    ///
    /// The boolean given to `visitor` is `true` if the leaf is entirely inside of the frustum.
    /// As the traversal goes down, the planes a node is found to be fully inside of are no
    /// longer tested on its descendants; once none are left, the whole subtree is reported
    /// without any further test. The traversal stops if `visitor` returns `false`.
    pub fn intersect_frustum(
        &self,
        frustum: &Frustum,
        workspace: &mut BvhWorkspace,
        mut visitor: impl FnMut(NodeId, &T, bool) -> bool,
    ) {
        let stack = &mut workspace.masked_stack;
        stack.clear();
        stack.push((self.root, frustum.full_mask()));

        while let Some((id, mask)) = stack.pop() {
            let node = &self.nodes[id.0];

            let mask = if mask == 0 {
                0
            } else {
                match frustum.classify_masked(&node.aabb, mask) {
                    (PlaneSide::Below, _) => continue,
                    (_, remaining) => remaining,
                }
            };

            match &node.kind {
                BvhNodeKind::Leaf(payload) => {
                    if !visitor(id, payload, mask == 0) {
                        return;
                    }
                }
                BvhNodeKind::Internal { left, right } => {
                    stack.extend(right.map(|c| (c, mask)));
                    stack.extend(left.map(|c| (c, mask)));
                }
            }
        }
    }
}
