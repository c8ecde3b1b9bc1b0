use super::{Bvh, BvhNodeFlags, BvhNodeKind, NodeId, SahConstants};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use hashbrown::HashMap;
use ordered_float::OrderedFloat;

// Something the rebuilder merges: either a node of the live tree kept as a whole (a leaf or
// a protected subtree), or a node created by a previous merge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FragmentRef {
    Node(NodeId),
    Merged(usize),
}

#[derive(Copy, Clone, Debug)]
struct Fragment {
    item: FragmentRef,
    aabb: Aabb,
    leaves: u32,
}

#[derive(Copy, Clone, Debug)]
struct Merge {
    children: [FragmentRef; 2],
    // The (surface area, leaf count) of each child.
    child_weights: [(Real, Real); 2],
    aabb: Aabb,
    leaves: u32,
}

#[derive(Clone, Debug)]
struct RebuildState {
    subtree_root: NodeId,
    generation: u64,
    // The scaled SAH sum of the subtree before the rebuild.
    cost_before: Real,
    // The part of the cost of protected fragments coming from their own internal nodes.
    protected_cost: Real,
    fragments: Vec<Fragment>,
    merges: Vec<Merge>,
    // Internal nodes of the live subtree that get reused when grafting.
    pool: Vec<NodeId>,
}

/// Rebuilds a subtree of a [`Bvh`] from scratch with a greedy bottom-up agglomeration.
///
/// The leaves (and protected subtrees) of the rebuilt subtree are the initial fragments. The
/// two fragments whose merged AABB has the smallest surface area are repeatedly merged, until
/// at most two fragments are left, which become the new children of the subtree root.
///
/// The work can be spread over multiple calls to [`BottomUpOptimizingRebuilder::compute`]. The
/// live tree isn’t modified until the very last step, so an unfinished rebuild can simply be
/// abandoned. If the tree is modified by anything else in-between two calls, the rebuild
/// starts over.
///
/// Each merge scans every pair of fragments, so rebuilding `n` leaves costs `O(n³)`. This is
/// meant for small subtrees, or for spreading the work over many frames.
#[derive(Clone, Debug)]
pub struct BottomUpOptimizingRebuilder {
    /// If `true`, the result of a rebuild is discarded unless it has a lower SAH cost than the
    /// original subtree.
    pub only_if_improving: bool,
    /// The cost model used to compare the rebuilt subtree with the original one.
    pub constants: SahConstants,
    state: Option<RebuildState>,
}

impl Default for BottomUpOptimizingRebuilder {
    fn default() -> Self {
        Self {
            only_if_improving: true,
            constants: SahConstants::default(),
            state: None,
        }
    }
}

impl BottomUpOptimizingRebuilder {
    /// A rebuilder discarding non-improving results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a rebuild in progress?
    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// The number of fragments left to merge by the rebuild in progress.
    pub fn remaining_fragments(&self) -> usize {
        self.state.as_ref().map(|s| s.fragments.len()).unwrap_or(0)
    }

    /// Abandons the rebuild in progress, if any. The tree is left untouched.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    /// Starts rebuilding the subtree rooted at `subtree_root`, abandoning any rebuild in
    /// progress.
    ///
    /// Returns `false` (and starts nothing) if `subtree_root` isn’t an internal node of `bvh`, or
    /// if it is protected.
    pub fn start<T>(&mut self, bvh: &Bvh<T>, subtree_root: NodeId) -> bool {
        self.state = None;

        match bvh.node(subtree_root) {
            Some(node) if !node.is_leaf() && !node.is_protected() => {}
            _ => return false,
        }

        let mut leaf_counts = HashMap::new();
        let mut fragments = vec![];
        let mut pool = vec![];
        let mut protected_cost = 0.0;
        let mut stack: Vec<_> = bvh.nodes[subtree_root.0]
            .children()
            .into_iter()
            .flatten()
            .collect();

        while let Some(id) = stack.pop() {
            let node = &bvh.nodes[id.0];

            if node.is_leaf() || node.is_protected() {
                if !node.is_leaf() {
                    protected_cost += bvh.scaled_sah_sum(id, &self.constants, &mut leaf_counts);
                }

                fragments.push(Fragment {
                    item: FragmentRef::Node(id),
                    aabb: node.aabb,
                    leaves: bvh.cached_leaf_count(id, &mut leaf_counts),
                });
            } else {
                pool.push(id);
                stack.extend(node.children().into_iter().flatten());
            }
        }

        let cost_before = bvh.scaled_sah_sum(subtree_root, &self.constants, &mut leaf_counts);
        self.state = Some(RebuildState {
            subtree_root,
            generation: bvh.generation(),
            cost_before,
            protected_cost,
            merges: Vec::with_capacity(fragments.len()),
            fragments,
            pool,
        });
        true
    }

    /// Performs up to `max_steps` merges (at least one) of the rebuild in progress.
    ///
    /// If no rebuild is in progress, a rebuild of the whole tree is started first. Once two
    /// fragments or less are left, the rebuilt subtree is grafted in place of the original one
    /// (unless it is discarded, see [`Self::only_if_improving`]).
    ///
    /// Returns `true` if the rebuild has completed (whether its result was applied or not), and
    /// `false` if more calls are needed.
    pub fn compute<T>(&mut self, bvh: &mut Bvh<T>, max_steps: usize) -> bool {
        let restart = match &self.state {
            None => Some(bvh.root()),
            Some(state) if state.generation != bvh.generation() => {
                log::debug!("Tree modified during a rebuild, starting over.");
                Some(state.subtree_root)
            }
            Some(_) => None,
        };

        if let Some(subtree_root) = restart {
            if !self.start(bvh, subtree_root) && !self.start(bvh, bvh.root()) {
                return true;
            }
        }

        let Some(state) = &mut self.state else {
            return true;
        };

        for _ in 0..max_steps.max(1) {
            if state.fragments.len() <= 2 {
                break;
            }
            state.merge_cheapest_pair();
        }

        if state.fragments.len() > 2 {
            return false;
        }

        if let Some(state) = self.state.take() {
            self.finish(bvh, state);
        }

        true
    }

    /// Rebuilds the subtree rooted at `subtree_root` in one go.
    ///
    /// Returns `false` if `subtree_root` can’t be rebuilt (see [`Self::start`]).
    pub fn rebuild<T>(&mut self, bvh: &mut Bvh<T>, subtree_root: NodeId) -> bool {
        if !self.start(bvh, subtree_root) {
            return false;
        }

        while !self.compute(bvh, usize::MAX) {}
        true
    }

    fn finish<T>(&self, bvh: &mut Bvh<T>, state: RebuildState) {
        let root_aabb = state
            .fragments
            .iter()
            .fold(Aabb::new_invalid(), |acc, f| acc.merged(&f.aabb));
        let cost_after = state.cost_after(&self.constants, &root_aabb);

        let is_tree_root = state.subtree_root == bvh.root();
        let improves = if is_tree_root {
            // The root area changes the normalization of the whole tree’s cost.
            let old_area = bvh.nodes[state.subtree_root.0].aabb.surface_area();
            normalized(cost_after, root_aabb.surface_area())
                < normalized(state.cost_before, old_area)
        } else {
            cost_after < state.cost_before
        };

        log::debug!(
            "Rebuild of {:?} completed: {} merges, cost {} -> {} ({}).",
            state.subtree_root,
            state.merges.len(),
            state.cost_before,
            cost_after,
            if improves || !self.only_if_improving {
                "applied"
            } else {
                "discarded"
            }
        );

        if improves || !self.only_if_improving {
            bvh.graft(state);
        }
    }
}

fn normalized(cost: Real, area: Real) -> Real {
    if area > 0.0 {
        cost / area
    } else {
        cost
    }
}

impl RebuildState {
    fn merge_cheapest_pair(&mut self) {
        let mut best = (0, 1);
        let mut best_area = OrderedFloat(Real::MAX);

        for i in 0..self.fragments.len() {
            for j in i + 1..self.fragments.len() {
                let area = OrderedFloat(
                    self.fragments[i]
                        .aabb
                        .merged(&self.fragments[j].aabb)
                        .surface_area(),
                );
                if area < best_area {
                    best_area = area;
                    best = (i, j);
                }
            }
        }

        // Remove `j` first since `j > i`.
        let b = self.fragments.swap_remove(best.1);
        let a = self.fragments.swap_remove(best.0);
        let merge = Merge {
            children: [a.item, b.item],
            child_weights: [a, b].map(|f| (f.aabb.surface_area(), f.leaves as Real)),
            aabb: a.aabb.merged(&b.aabb),
            leaves: a.leaves + b.leaves,
        };

        self.fragments.push(Fragment {
            item: FragmentRef::Merged(self.merges.len()),
            aabb: merge.aabb,
            leaves: merge.leaves,
        });
        self.merges.push(merge);
    }

    // The scaled SAH sum the subtree would have once grafted.
    fn cost_after(&self, constants: &SahConstants, root_aabb: &Aabb) -> Real {
        let top = constants.scaled(
            root_aabb.surface_area(),
            self.fragments
                .iter()
                .map(|f| (f.aabb.surface_area(), f.leaves as Real)),
        );

        let merged: Real = self
            .merges
            .iter()
            .map(|merge| constants.scaled(merge.aabb.surface_area(), merge.child_weights))
            .sum();

        top + merged + self.protected_cost
    }
}

impl<T> Bvh<T> {
    // Replaces the internal nodes of the subtree by the structure built by the rebuilder.
    fn graft(&mut self, state: RebuildState) {
        let RebuildState {
            subtree_root,
            fragments,
            merges,
            mut pool,
            ..
        } = state;

        let ids: Vec<NodeId> = merges
            .iter()
            .map(|merge| pool.pop().unwrap_or_else(|| self.create_internal(merge.aabb)))
            .collect();

        for unused in pool {
            let _ = self.nodes.remove(unused.0);
        }

        let resolve = |item: FragmentRef| match item {
            FragmentRef::Node(id) => id,
            FragmentRef::Merged(i) => ids[i],
        };

        for (merge, id) in merges.iter().zip(ids.iter().copied()) {
            let [left, right] = merge.children.map(resolve);
            let node = &mut self.nodes[id.0];
            node.kind = BvhNodeKind::Internal {
                left: Some(left),
                right: Some(right),
            };
            node.flags = BvhNodeFlags::empty();
            node.set_aabb(merge.aabb);
            self.nodes[left.0].parent = Some(id);
            self.nodes[right.0].parent = Some(id);
        }

        let mut top = fragments.iter().map(|f| resolve(f.item));
        let (left, right) = (top.next(), top.next());
        self.nodes[subtree_root.0].kind = BvhNodeKind::Internal { left, right };
        for child in [left, right].into_iter().flatten() {
            self.nodes[child.0].parent = Some(subtree_root);
        }

        self.bubble_refit(subtree_root);
        self.bump_generation();
    }
}
