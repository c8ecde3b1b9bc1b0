use super::{Bvh, NodeId};
use crate::bounding_volume::Aabb;

/// Errors returned by [`Bvh::insert_node`].
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertError {
    /// The node doesn’t exist in this tree.
    #[error("the node {0:?} doesn’t exist.")]
    UnknownNode(NodeId),
    /// The node already has a parent. It must be disconnected before being inserted again.
    #[error("the node {node:?} is already attached to {parent:?}.")]
    AlreadyAttached {
        /// The node being inserted.
        node: NodeId,
        /// Its current parent.
        parent: NodeId,
    },
    /// The root of a tree can’t be inserted into itself.
    #[error("the root node cannot be inserted into its own tree.")]
    IsRoot,
}

/// Errors returned by [`Bvh::disconnect`].
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisconnectError {
    /// The node claims a parent that doesn’t list it as one of its children.
    #[error("the node {node:?} claims {parent:?} as its parent, but isn’t one of its children.")]
    Impostor {
        /// The node being disconnected.
        node: NodeId,
        /// The parent it claims to have.
        parent: NodeId,
    },
}

impl<T> Bvh<T> {
    /// Creates a new leaf and inserts it into this BVH.
    pub fn insert(&mut self, aabb: Aabb, payload: T) -> NodeId {
        let id = self.create_leaf(aabb, payload);
        self.attach(id);
        id
    }

    /// Inserts a detached node (and, if it is internal, its whole subtree) into this BVH.
    ///
    /// The attachment point is chosen by [`Bvh::find_parent_for`]. Every ancestor of the
    /// inserted node is then enlarged to contain it.
    pub fn insert_node(&mut self, id: NodeId) -> Result<(), InsertError> {
        if id == self.root {
            return Err(InsertError::IsRoot);
        }

        let node = self.nodes.get(id.0).ok_or(InsertError::UnknownNode(id))?;

        if let Some(parent) = node.parent {
            return Err(InsertError::AlreadyAttached { node: id, parent });
        }

        self.attach(id);
        Ok(())
    }

    /// Detaches the node `id` from its parent, in `O(1)`.
    ///
    /// The node and its subtree stay alive (they can be inserted again with
    /// [`Bvh::insert_node`]). The former parent is neither refitted nor collapsed, so its
    /// bounds may stay larger than necessary until the next refit.
    ///
    /// Disconnecting a node that has no parent only logs a warning. Disconnecting a node whose
    /// parent doesn’t list it as a child fails with [`DisconnectError::Impostor`].
    pub fn disconnect(&mut self, id: NodeId) -> Result<(), DisconnectError> {
        let Some(parent) = self.nodes.get(id.0).and_then(|node| node.parent) else {
            log::warn!("Attempted to disconnect the node {:?} which has no parent.", id);
            return Ok(());
        };

        let slot = self
            .nodes
            .get(parent.0)
            .and_then(|p| p.slot_of(id))
            .ok_or(DisconnectError::Impostor { node: id, parent })?;

        self.nodes[parent.0].set_child(slot, None);
        self.nodes[id.0].parent = None;
        self.bump_generation();
        Ok(())
    }

    /// Finds the node under which a box `aabb` would be attached by an insertion.
    ///
    /// Returns the internal node that gets the new node as a direct child, along with the child
    /// slot (0 for left, 1 for right) that needs to be filled. If that slot is already occupied,
    /// its current occupant has to be wrapped together with the new node under a new internal
    /// node.
    pub fn find_parent_for(&self, aabb: &Aabb) -> (NodeId, usize) {
        let mut curr = self.root;

        loop {
            let [left, right] = self.nodes[curr.0].children();
            let (left, right) = match (left, right) {
                (None, _) => return (curr, 0),
                (_, None) => return (curr, 1),
                (Some(left), Some(right)) => (left, right),
            };

            let children = [left, right];
            let mut slot = self.cheapest_slot(left, right, aabb);

            if self.nodes[children[slot].0].is_protected() {
                // Go to the sibling instead. If it’s protected too, the chosen node will be
                // wrapped as a whole.
                if self.nodes[children[1 - slot].0].is_protected() {
                    return (curr, slot);
                }
                slot = 1 - slot;
            }

            if self.nodes[children[slot].0].is_leaf() {
                return (curr, slot);
            }

            curr = children[slot];
        }
    }

    // Compares the cost of including `aabb` into `left` or `right`.
    fn cheapest_slot(&self, left: NodeId, right: NodeId, aabb: &Aabb) -> usize {
        let left = &self.nodes[left.0].aabb;
        let right = &self.nodes[right.0].aabb;
        let left_cost = left.cost_for_inclusion(aabb);
        let right_cost = right.cost_for_inclusion(aabb);

        if left_cost < right_cost {
            0
        } else if right_cost < left_cost {
            1
        } else {
            // Tie: prefer the smaller child.
            (right.surface_area() < left.surface_area()) as usize
        }
    }

    // Attaches the detached node `id` and enlarges its ancestors.
    fn attach(&mut self, id: NodeId) {
        let aabb = self.nodes[id.0].aabb;
        let (parent, slot) = self.find_parent_for(&aabb);

        let new_parent = match self.nodes[parent.0].children()[slot] {
            None => {
                self.nodes[parent.0].set_child(slot, Some(id));
                self.nodes[id.0].parent = Some(parent);
                parent
            }
            Some(sibling) => {
                if self.nodes[sibling.0].is_protected() {
                    log::warn!(
                        "Both children of {:?} are protected, wrapping {:?} with {:?}.",
                        parent,
                        sibling,
                        id
                    );
                }
                self.wrap(parent, slot, sibling, id)
            }
        };

        let mut curr = Some(new_parent);
        while let Some(node_id) = curr {
            let node = &mut self.nodes[node_id.0];
            if !node.expand_to_fit(&aabb) {
                break;
            }
            curr = node.parent;
        }

        self.bump_generation();
    }

    // Replaces `sibling` (the child at `slot` of `parent`) by a new internal node parenting both
    // `sibling` and `id`.
    fn wrap(&mut self, parent: NodeId, slot: usize, sibling: NodeId, id: NodeId) -> NodeId {
        let sibling_aabb = self.nodes[sibling.0].aabb;
        let wrapper = self.create_internal(sibling_aabb);
        let wrapper_node = &mut self.nodes[wrapper.0];
        wrapper_node.parent = Some(parent);
        wrapper_node.set_child(0, Some(sibling));
        wrapper_node.set_child(1, Some(id));

        self.nodes[parent.0].set_child(slot, Some(wrapper));
        self.nodes[sibling.0].parent = Some(wrapper);
        self.nodes[id.0].parent = Some(wrapper);
        wrapper
    }
}
