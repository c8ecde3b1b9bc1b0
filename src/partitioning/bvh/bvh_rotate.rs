use super::{Bvh, NodeId};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use arrayvec::ArrayVec;
use hashbrown::HashMap;

// Relative cost decrease below which a rotation isn’t worth applying. Protects against
// ping-ponging between two configurations with the same cost up to rounding errors.
const ROTATION_EPSILON: Real = 1.0e-9;

/// The constants of the surface area heuristic (SAH) cost model.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SahConstants {
    /// The cost of traversing an internal node.
    pub traversal: Real,
    /// The cost of testing a leaf.
    pub intersection: Real,
}

impl Default for SahConstants {
    fn default() -> Self {
        Self {
            traversal: 1.0,
            intersection: 1.0,
        }
    }
}

/// The expected cost of a query hitting a node split into two children.
///
/// This is `k_traversal + k_intersection × (sa_left × n_left + sa_right × n_right) / sa_parent`
/// where `sa_*` are surface areas and `n_*` leaf counts. If the parent has a zero area, every
/// child is assumed to be hit.
pub fn surface_area_heuristic(
    sa_parent: Real,
    sa_left: Real,
    sa_right: Real,
    n_left: Real,
    n_right: Real,
    k_traversal: Real,
    k_intersection: Real,
) -> Real {
    if sa_parent <= 0.0 {
        return k_traversal + k_intersection * (n_left + n_right);
    }

    k_traversal + k_intersection * (sa_left * n_left / sa_parent + sa_right * n_right / sa_parent)
}

// A node seen as a unit by the rotation search.
#[derive(Copy, Clone)]
struct Unit {
    id: NodeId,
    aabb: Aabb,
    leaves: Real,
}

// One side of the neighborhood of a rotated node.
#[derive(Copy, Clone)]
struct Side {
    unit: Unit,
    // The children of `unit` if they can be swapped around.
    open: Option<[Unit; 2]>,
}

impl SahConstants {
    // The SAH cost of an internal node scaled by its own area, so costs of different nodes
    // can be summed.
    #[inline]
    pub(super) fn scaled(
        &self,
        sa: Real,
        children: impl IntoIterator<Item = (Real, Real)>,
    ) -> Real {
        self.traversal * sa
            + self.intersection * children.into_iter().map(|(sa, n)| sa * n).sum::<Real>()
    }

    // The scaled cost of a child of the rotated node, and its (area, leaf count) as seen from
    // its parent.
    fn side_cost(&self, unit: &Unit, open: Option<[Unit; 2]>) -> (Real, (Real, Real)) {
        match open {
            Some([a, b]) => {
                let sa = a.aabb.merged(&b.aabb).surface_area();
                let n = a.leaves + b.leaves;
                let cost = self.scaled(
                    sa,
                    [
                        (a.aabb.surface_area(), a.leaves),
                        (b.aabb.surface_area(), b.leaves),
                    ],
                );
                (cost, (sa, n))
            }
            None => (0.0, (unit.aabb.surface_area(), unit.leaves)),
        }
    }

    // The scaled cost of an open side as it currently is in the tree.
    fn current_cost(&self, side: &Side) -> Real {
        match side.open {
            Some(children) => self.scaled(
                side.unit.aabb.surface_area(),
                children.map(|u| (u.aabb.surface_area(), u.leaves)),
            ),
            None => 0.0,
        }
    }

    fn neighborhood_cost(
        &self,
        sa: Real,
        left: (Real, (Real, Real)),
        right: (Real, (Real, Real)),
    ) -> Real {
        self.scaled(sa, [left.1, right.1]) + left.0 + right.0
    }
}

impl<T> Bvh<T> {
    /// The number of leaves under `id`, memoized in `cache`.
    pub(super) fn cached_leaf_count(&self, id: NodeId, cache: &mut HashMap<NodeId, u32>) -> u32 {
        if let Some(count) = cache.get(&id) {
            return *count;
        }

        let node = &self.nodes[id.0];
        let count: u32 = if node.is_leaf() {
            1
        } else {
            node.children()
                .into_iter()
                .flatten()
                .map(|child| self.cached_leaf_count(child, cache))
                .sum()
        };

        let _ = cache.insert(id, count);
        count
    }

    // The SAH cost of the internal node `id` scaled by its area.
    fn scaled_sah(
        &self,
        id: NodeId,
        constants: &SahConstants,
        leaf_counts: &mut HashMap<NodeId, u32>,
    ) -> Real {
        let node = &self.nodes[id.0];
        let children: Vec<_> = node
            .children()
            .into_iter()
            .flatten()
            .map(|child| {
                (
                    self.nodes[child.0].aabb.surface_area(),
                    self.cached_leaf_count(child, leaf_counts) as Real,
                )
            })
            .collect();
        constants.scaled(node.aabb.surface_area(), children)
    }

    /// Computes the surface area heuristic of the subtree rooted at `id`.
    ///
    /// This is the sum, over every internal node `n` of the subtree, of
    /// `k_traversal × sa(n) + k_intersection × (sa(left) × n(left) + sa(right) × n(right))`,
    /// divided by the surface area of `id`. Lower is better. The division is skipped if `id`
    /// has a zero area.
    pub fn compute_sah(&self, id: NodeId, constants: &SahConstants) -> Real {
        let total = self.scaled_sah_sum(id, constants, &mut HashMap::new());
        let area = self.nodes[id.0].aabb.surface_area();
        if area > 0.0 {
            total / area
        } else {
            total
        }
    }

    // The sum of the scaled SAH costs of every internal node under `id` (included).
    pub(super) fn scaled_sah_sum(
        &self,
        id: NodeId,
        constants: &SahConstants,
        leaf_counts: &mut HashMap<NodeId, u32>,
    ) -> Real {
        let mut total = 0.0;
        let mut stack = vec![id];

        while let Some(curr) = stack.pop() {
            let node = &self.nodes[curr.0];
            if node.is_leaf() {
                continue;
            }

            total += self.scaled_sah(curr, constants, leaf_counts);
            stack.extend(node.children().into_iter().flatten());
        }

        total
    }

    // The two children of `id` if it’s an internal node that can be restructured.
    fn rotatable_children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        let node = &self.nodes[id.0];
        if node.is_leaf() || node.is_protected() {
            return None;
        }

        match node.children() {
            [Some(left), Some(right)] => Some((left, right)),
            _ => None,
        }
    }

    /// Applies a left rotation on the node `id`.
    ///
    /// The right child `r` of `id` gets the left child `l` of `id` as its new left child, its
    /// former left child `rl` being pushed down: `id(l, r(rl, rr))` becomes `id(r(l, rl), rr)`.
    /// Both `r` and `id` are refitted afterward.
    ///
    /// Returns `false` (and does nothing) if `id` or `r` isn’t a full internal node, or if one of
    /// them is protected.
    pub fn rotate_left(&mut self, id: NodeId) -> bool {
        let Some((l, r)) = self.rotatable_children(id) else {
            return false;
        };
        let Some((rl, rr)) = self.rotatable_children(r) else {
            return false;
        };

        self.nodes[id.0].set_child(1, Some(rr));
        self.nodes[rr.0].parent = Some(id);
        self.nodes[id.0].set_child(0, Some(r));

        self.nodes[r.0].set_child(0, Some(l));
        self.nodes[r.0].set_child(1, Some(rl));
        self.nodes[l.0].parent = Some(r);

        let _ = self.refit(r);
        let _ = self.refit(id);
        self.bump_generation();
        true
    }

    /// Applies a right rotation on the node `id`.
    ///
    /// This is the mirror of [`Bvh::rotate_left`]: `id(l(ll, lr), r)` becomes `id(ll, l(lr, r))`.
    pub fn rotate_right(&mut self, id: NodeId) -> bool {
        let Some((l, r)) = self.rotatable_children(id) else {
            return false;
        };
        let Some((ll, lr)) = self.rotatable_children(l) else {
            return false;
        };

        self.nodes[id.0].set_child(0, Some(ll));
        self.nodes[ll.0].parent = Some(id);
        self.nodes[id.0].set_child(1, Some(l));

        self.nodes[l.0].set_child(0, Some(lr));
        self.nodes[l.0].set_child(1, Some(r));
        self.nodes[r.0].parent = Some(l);

        let _ = self.refit(l);
        let _ = self.refit(id);
        self.bump_generation();
        true
    }

    fn rotation_unit(&self, id: NodeId, leaf_counts: &mut HashMap<NodeId, u32>) -> Unit {
        Unit {
            id,
            aabb: self.nodes[id.0].aabb,
            leaves: self.cached_leaf_count(id, leaf_counts) as Real,
        }
    }

    fn rotation_side(&self, id: NodeId, leaf_counts: &mut HashMap<NodeId, u32>) -> Side {
        let open = self
            .rotatable_children(id)
            .map(|(a, b)| [self.rotation_unit(a, leaf_counts), self.rotation_unit(b, leaf_counts)]);
        Side {
            unit: self.rotation_unit(id, leaf_counts),
            open,
        }
    }

    /// Tries to lower the SAH cost of the node `id` by swapping two nodes of its neighborhood.
    ///
    /// Six swaps are evaluated, in this order: the left child with either child of the right
    /// child, the right child with either child of the left child, and the left-left grandchild
    /// with either child of the right child. The first one that strictly lowers the summed SAH
    /// cost of `id` and of its internal children is applied. Protected children are moved as a
    /// whole but never opened, and nothing is done if `id` itself is protected.
    ///
    /// The bounds of `id` are left untouched since its set of leaves doesn’t change. The
    /// `leaf_counts` cache is updated for the restructured nodes.
    ///
    /// Returns `true` if a rotation was applied.
    pub fn try_rotate_single_node(
        &mut self,
        id: NodeId,
        constants: &SahConstants,
        leaf_counts: &mut HashMap<NodeId, u32>,
    ) -> bool {
        let Some((l, r)) = self.rotatable_children(id) else {
            return false;
        };

        let sa = self.nodes[id.0].aabb.surface_area();
        let left = self.rotation_side(l, leaf_counts);
        let right = self.rotation_side(r, leaf_counts);

        // Only the costs of the nodes whose children change are compared: `id` always, and the
        // children of `id` that get one of their own children swapped.
        let id_before = constants.scaled(
            sa,
            [left, right].map(|side| (side.unit.aabb.surface_area(), side.unit.leaves)),
        );
        let left_before = constants.current_cost(&left);
        let right_before = constants.current_cost(&right);

        // (swapped node, swapped node, cost before, cost after)
        let mut candidates = ArrayVec::<(NodeId, NodeId, Real, Real), 6>::new();

        // A child swapped with a grandchild on the other side.
        for (this, other, other_before, this_is_left) in [
            (&left, &right, right_before, true),
            (&right, &left, left_before, false),
        ] {
            if let Some(grandchildren) = other.open {
                for k in 0..2 {
                    let mut swapped = grandchildren;
                    swapped[k] = this.unit;
                    let moved = constants.side_cost(&grandchildren[k], None);
                    let opened = constants.side_cost(&other.unit, Some(swapped));
                    let after = if this_is_left {
                        constants.neighborhood_cost(sa, moved, opened)
                    } else {
                        constants.neighborhood_cost(sa, opened, moved)
                    };
                    candidates.push((
                        this.unit.id,
                        grandchildren[k].id,
                        id_before + other_before,
                        after,
                    ));
                }
            }
        }

        // The left-left grandchild swapped with a grandchild on the right side.
        if let (Some(lg), Some(rg)) = (left.open, right.open) {
            for k in 0..2 {
                let mut new_left = lg;
                let mut new_right = rg;
                new_left[0] = rg[k];
                new_right[k] = lg[0];
                let after = constants.neighborhood_cost(
                    sa,
                    constants.side_cost(&left.unit, Some(new_left)),
                    constants.side_cost(&right.unit, Some(new_right)),
                );
                candidates.push((
                    lg[0].id,
                    rg[k].id,
                    id_before + left_before + right_before,
                    after,
                ));
            }
        }

        let Some((a, b, current, cost)) = candidates
            .into_iter()
            .find(|(_, _, before, after)| *after < *before - before.abs() * ROTATION_EPSILON)
        else {
            return false;
        };

        log::trace!(
            "Rotating {:?} with {:?} under {:?}: cost {} -> {}.",
            a,
            b,
            id,
            current,
            cost
        );

        let (Some(pa), Some(pb)) = (self.nodes[a.0].parent, self.nodes[b.0].parent) else {
            return false;
        };
        self.swap_nodes(a, pa, b, pb);

        for parent in [pa, pb] {
            if parent != id {
                let _ = self.refit(parent);
                let count: u32 = self.nodes[parent.0]
                    .children()
                    .into_iter()
                    .flatten()
                    .map(|c| self.cached_leaf_count(c, leaf_counts))
                    .sum();
                let _ = leaf_counts.insert(parent, count);
            }
        }

        self.bump_generation();
        true
    }

    // Exchanges the positions of `a` (child of `pa`) and `b` (child of `pb`).
    fn swap_nodes(&mut self, a: NodeId, pa: NodeId, b: NodeId, pb: NodeId) {
        let (Some(slot_a), Some(slot_b)) =
            (self.nodes[pa.0].slot_of(a), self.nodes[pb.0].slot_of(b))
        else {
            return;
        };

        self.nodes[pa.0].set_child(slot_a, Some(b));
        self.nodes[pb.0].set_child(slot_b, Some(a));
        self.nodes[a.0].parent = Some(pb);
        self.nodes[b.0].parent = Some(pa);
    }
}
