use super::{Bvh, NodeId};
use crate::bounding_volume::{Aabb, BoundingVolume};

impl<T> Bvh<T> {
    /// Recomputes the AABB of the node `id` from its children.
    ///
    /// With two children, the AABB becomes their union. With a single child, it becomes a copy
    /// of that child’s AABB. Leaves and internal nodes without children are left unchanged.
    ///
    /// Returns `true` if the AABB was modified.
    pub fn refit(&mut self, id: NodeId) -> bool {
        let aabb = match self.nodes[id.0].children() {
            [Some(left), Some(right)] => self.nodes[left.0].aabb.merged(&self.nodes[right.0].aabb),
            [Some(child), None] | [None, Some(child)] => self.nodes[child.0].aabb,
            [None, None] => return false,
        };

        let node = &mut self.nodes[id.0];
        if node.aabb == aabb {
            false
        } else {
            node.set_aabb(aabb);
            true
        }
    }

    /// Refits the node `id`, then every one of its ancestors, up to the root.
    ///
    /// The walk doesn’t stop at a node left unchanged by its refit: ancestors may still be
    /// loose, e.g., after a [`Bvh::disconnect`].
    pub fn bubble_refit(&mut self, id: NodeId) {
        let mut curr = Some(id);
        while let Some(node_id) = curr {
            let _ = self.refit(node_id);
            curr = self.nodes[node_id.0].parent;
        }
    }

    /// Moves or resizes the leaf `id`, then refits its ancestors.
    ///
    /// Returns `false` (and does nothing) if `id` isn’t a leaf of this tree.
    pub fn set_leaf_aabb(&mut self, id: NodeId, aabb: Aabb) -> bool {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return false;
        };

        if !node.is_leaf() {
            return false;
        }

        node.set_aabb(aabb);

        if let Some(parent) = node.parent {
            self.bubble_refit(parent);
        }

        self.bump_generation();
        true
    }
}
