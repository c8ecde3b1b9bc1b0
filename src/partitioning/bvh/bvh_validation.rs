use super::{Bvh, BvhNodeKind, NodeId};
use hashbrown::HashSet;

/// A structural or geometric defect found by [`Bvh::validate`].
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum BvhViolation {
    /// An internal node references a child that doesn’t exist in the tree.
    #[error("node {parent:?} references the missing child {child:?}.")]
    DanglingChild {
        /// The internal node.
        parent: NodeId,
        /// The missing child.
        child: NodeId,
    },
    /// A child doesn’t point back to the node it is a child of.
    #[error("node {child:?} is a child of {parent:?} but its parent is {actual:?}.")]
    ParentMismatch {
        /// The child.
        child: NodeId,
        /// The node listing `child` as one of its children.
        parent: NodeId,
        /// The parent recorded on `child`.
        actual: Option<NodeId>,
    },
    /// The bounds of a node don’t contain the bounds of one of its children.
    #[error("the bounds of {parent:?} don’t contain the bounds of its child {child:?}.")]
    ContainmentViolation {
        /// The enclosing node.
        parent: NodeId,
        /// The child sticking out.
        child: NodeId,
    },
    /// The bounds of a node contain NaNs, or are inverted while they should enclose something.
    #[error("node {0:?} has invalid bounds.")]
    InvalidBounds(NodeId),
    /// A node was reached twice while traversing the tree.
    #[error("node {0:?} was reached twice.")]
    DuplicateNode(NodeId),
    /// Both children slots of an internal node reference the same node.
    #[error("both children of {0:?} are the same node.")]
    IdenticalChildren(NodeId),
}

impl<T> Bvh<T> {
    /// Checks the subtree rooted at `id`, returning every defect found.
    ///
    /// The following properties are checked:
    /// - every child referenced by an internal node exists, and has that node as its parent.
    /// - the two children of an internal node are distinct.
    /// - no node is reachable twice (which also excludes cycles).
    /// - the bounds of every node contain the bounds of its children. Internal nodes without
    ///   any child impose no constraint on their parent.
    /// - no bounds contain NaN, and the bounds of leaves and internal nodes with children aren’t
    ///   inverted.
    ///
    /// This never panics, even on a corrupted tree. An `id` that isn’t part of the tree yields
    /// an empty report.
    pub fn validate(&self, id: NodeId) -> Vec<BvhViolation> {
        let mut violations = vec![];
        let mut visited = HashSet::new();
        let mut stack = vec![id];

        if !self.nodes.contains(id.0) {
            return violations;
        }

        while let Some(curr) = stack.pop() {
            if !visited.insert(curr) {
                violations.push(BvhViolation::DuplicateNode(curr));
                continue;
            }

            let node = &self.nodes[curr.0];
            let has_children = node.children().iter().any(Option::is_some);

            if node.aabb.has_nan() || ((node.is_leaf() || has_children) && !node.aabb.is_valid())
            {
                violations.push(BvhViolation::InvalidBounds(curr));
            }

            let BvhNodeKind::Internal { left, right } = node.kind else {
                continue;
            };

            let children = if left.is_some() && left == right {
                violations.push(BvhViolation::IdenticalChildren(curr));
                [left, None]
            } else {
                [left, right]
            };

            for child in children.into_iter().flatten() {
                let Some(child_node) = self.nodes.get(child.0) else {
                    violations.push(BvhViolation::DanglingChild {
                        parent: curr,
                        child,
                    });
                    continue;
                };

                if child_node.parent != Some(curr) {
                    violations.push(BvhViolation::ParentMismatch {
                        child,
                        parent: curr,
                        actual: child_node.parent,
                    });
                }

                let child_is_empty =
                    !child_node.is_leaf() && child_node.children().iter().all(Option::is_none);
                if !child_is_empty && !node.aabb.contains_box(&child_node.aabb) {
                    violations.push(BvhViolation::ContainmentViolation {
                        parent: curr,
                        child,
                    });
                }

                stack.push(child);
            }
        }

        violations
    }

    /// Returns `true` if [`Bvh::validate`] doesn’t find any defect on the whole tree.
    pub fn is_well_formed(&self) -> bool {
        self.validate(self.root).is_empty()
    }

    /// Panics if the tree isn’t well-formed.
    ///
    /// The tree is well-formed if it is topologically correct (children and parent links agree)
    /// and geometrically correct (the bounds of a parent contain the ones of its children). See
    /// [`Bvh::validate`] for the exact list of checks.
    pub fn assert_well_formed(&self) {
        if let Some(violation) = self.validate(self.root).first() {
            panic!("Malformed BVH: {}", violation);
        }
    }
}
