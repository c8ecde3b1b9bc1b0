use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Real, TWO_DIM};
use crate::query::Ray;
use smallvec::SmallVec;

/// A static BVH stored as a flat buffer, in an implicit complete binary tree layout.
///
/// Each node occupies six consecutive reals (its bounds, mins first) of a single buffer. The
/// children of the node `i` are the nodes `2i + 1` and `2i + 2`. The first
/// [`IndexedBinaryBvh::internal_count`] nodes are internal, and the remaining ones are the
/// leaves, in the order they were given.
///
/// The number of leaf slots is rounded up to a power of two. The extra slots are filled with
/// zero-size boxes placed on the last actual leaf so they don’t enlarge their ancestors, and
/// are never reported by queries.
///
/// This is meant for static geometry (e.g. the triangles of a mesh): the tree is built once,
/// and only the leaf boxes can be updated afterward with [`IndexedBinaryBvh::set_leaves`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IndexedBinaryBvh {
    data: Vec<Real>,
    internal_count: usize,
    leaf_count: usize,
}

impl IndexedBinaryBvh {
    /// An empty tree, with no leaves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree with one leaf per given AABB.
    pub fn from_aabbs(aabbs: &[Aabb]) -> Self {
        let mut result = Self::new();
        result.initialize(aabbs.len());
        result.set_leaves(|i| aabbs[i]);
        result
    }

    /// Resizes this tree for `leaf_count` leaves.
    ///
    /// The number of internal nodes is set to the smallest power of two that is greater than or
    /// equal to `leaf_count`, minus one. All bounds are reset to zero: they must be set with
    /// [`IndexedBinaryBvh::set_leaves`] before any query.
    pub fn initialize(&mut self, leaf_count: usize) {
        self.leaf_count = leaf_count;

        if leaf_count == 0 {
            self.internal_count = 0;
            self.data.clear();
            return;
        }

        let leaf_slots = leaf_count.next_power_of_two();
        self.internal_count = leaf_slots - 1;
        self.data.clear();
        self.data.resize((self.internal_count + leaf_slots) * TWO_DIM, 0.0);
    }

    /// The number of leaves of this tree (excluding padding).
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// The number of internal nodes of this tree.
    #[inline]
    pub fn internal_count(&self) -> usize {
        self.internal_count
    }

    /// The total number of nodes of this tree, including padding leaves.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.data.len() / TWO_DIM
    }

    /// The raw buffer of bounds, six reals per node.
    #[inline]
    pub fn data(&self) -> &[Real] {
        &self.data
    }

    #[inline]
    fn node_aabb(&self, node: usize) -> Aabb {
        let b = &self.data[node * TWO_DIM..(node + 1) * TWO_DIM];
        Aabb::from_bounds(b[0], b[1], b[2], b[3], b[4], b[5])
    }

    #[inline]
    fn set_node_aabb(&mut self, node: usize, aabb: &Aabb) {
        self.data[node * TWO_DIM..(node + 1) * TWO_DIM].copy_from_slice(&aabb.bounds());
    }

    /// The AABB of the `i`-th leaf, or `None` if there is no such leaf.
    pub fn leaf_aabb(&self, i: usize) -> Option<Aabb> {
        (i < self.leaf_count).then(|| self.node_aabb(self.internal_count + i))
    }

    /// The AABB enclosing all the leaves of this tree.
    ///
    /// This is an invalid AABB (see [`Aabb::new_invalid`]) if the tree has no leaves.
    pub fn root_aabb(&self) -> Aabb {
        if self.leaf_count == 0 {
            Aabb::new_invalid()
        } else {
            self.node_aabb(0)
        }
    }

    /// Sets the AABB of every leaf to `leaf_aabb(leaf_index)`, then refits the whole tree.
    pub fn set_leaves(&mut self, mut leaf_aabb: impl FnMut(usize) -> Aabb) {
        if self.leaf_count == 0 {
            return;
        }

        for i in 0..self.leaf_count {
            let aabb = leaf_aabb(i);
            self.set_node_aabb(self.internal_count + i, &aabb);
        }

        self.refit();
    }

    // Recomputes the padding leaves and every internal node from the leaves.
    fn refit(&mut self) {
        let last_leaf = self.node_aabb(self.internal_count + self.leaf_count - 1);
        let padding = Aabb::new(last_leaf.mins(), last_leaf.mins());

        for node in self.internal_count + self.leaf_count..self.node_count() {
            self.set_node_aabb(node, &padding);
        }

        let first_padding = self.internal_count + self.leaf_count;

        for node in (0..self.internal_count).rev() {
            let (left, right) = (2 * node + 1, 2 * node + 2);

            // Only the level right above the leaves can have padding children.
            let aabb = match (left >= first_padding, right >= first_padding) {
                (true, _) => padding,
                (false, true) => self.node_aabb(left),
                (false, false) => self.node_aabb(left).merged(&self.node_aabb(right)),
            };

            self.set_node_aabb(node, &aabb);
        }
    }

    /// Calls `visitor` on every leaf whose AABB is hit by the ray within `[0, max_toi]`.
    ///
    /// The visitor is given the leaf index and the time of impact of the ray on the leaf’s AABB.
    /// The traversal stops if `visitor` returns `false`.
    pub fn cast_ray(
        &self,
        ray: &Ray,
        max_toi: Real,
        mut visitor: impl FnMut(usize, Real) -> bool,
    ) {
        if self.leaf_count == 0 {
            return;
        }

        let inv_dir = ray.inv_dir();
        let first_padding = self.internal_count + self.leaf_count;
        let mut stack: SmallVec<[usize; 32]> = SmallVec::new();
        stack.push(0);

        while let Some(node) = stack.pop() {
            if node >= first_padding {
                continue;
            }

            let Some(toi) = self
                .node_aabb(node)
                .cast_inv_ray_slab(&ray.origin, &inv_dir, max_toi)
            else {
                continue;
            };

            if node >= self.internal_count {
                if !visitor(node - self.internal_count, toi) {
                    return;
                }
            } else {
                stack.push(2 * node + 2);
                stack.push(2 * node + 1);
            }
        }
    }
}
