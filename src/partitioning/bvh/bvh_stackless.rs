use super::{Bvh, BvhNode, NodeId};

/// The state of a [`StacklessTraverser`], i.e., where it comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum StacklessState {
    /// The current node was reached from its parent: it is the first child of its parent, or
    /// the root.
    FromParent,
    /// The current node was reached from its sibling: it is the second child of its parent.
    FromSibling,
    /// The subtree rooted at the current node was fully explored.
    FromChild,
}

/// A resumable depth-first traversal that doesn’t need any stack.
///
/// This implements the stack-free traversal from "Efficient Stack-less BVH Traversal for Ray
/// Tracing", Hapala et al. The whole progress of the traversal is the pair made of the current
/// node and of a [`StacklessState`]: parent links are followed to go back up, so the traversal
/// can be suspended between any two calls to [`StacklessTraverser::advance`] and continued
/// later.
///
/// Nodes are visited in pre-order, left child first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct StacklessTraverser {
    root: NodeId,
    current: NodeId,
    state: StacklessState,
}

impl StacklessTraverser {
    /// A traverser exploring the subtree rooted at `root`.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            current: root,
            state: StacklessState::FromParent,
        }
    }

    /// The root of the explored subtree.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node the traverser is currently at.
    #[inline]
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// The current state of the traverser.
    #[inline]
    pub fn state(&self) -> StacklessState {
        self.state
    }

    /// Moves the traverser back to the start of a pass.
    pub fn reset(&mut self) {
        self.current = self.root;
        self.state = StacklessState::FromParent;
    }

    /// Performs a single step of the traversal.
    ///
    /// The `visitor` is called at most once, on the node being entered. If it returns `false`,
    /// the descendants of that node are skipped.
    ///
    /// Returns `false` exactly once per pass, when the traversal went back to the root after
    /// having explored the whole subtree. The traverser is then reset, so the next call starts a
    /// new pass. A pass is also ended if the current node was removed from the tree in-between
    /// two calls.
    pub fn advance<T>(
        &mut self,
        bvh: &Bvh<T>,
        mut visitor: impl FnMut(NodeId, &BvhNode<T>) -> bool,
    ) -> bool {
        let Some(node) = bvh.node(self.current) else {
            self.reset();
            return false;
        };

        match self.state {
            StacklessState::FromChild => {
                if self.current == self.root {
                    self.reset();
                    return false;
                }

                match node.parent {
                    Some(parent) => self.leave(bvh, parent),
                    None => {
                        // Detached in-between two calls.
                        self.reset();
                        return false;
                    }
                }
            }
            StacklessState::FromParent | StacklessState::FromSibling => {
                let descend = visitor(self.current, node);

                match (descend, node.first_child()) {
                    (true, Some(child)) => {
                        self.current = child;
                        self.state = StacklessState::FromParent;
                    }
                    _ => match node.parent {
                        Some(parent) if self.current != self.root => self.leave(bvh, parent),
                        _ => self.state = StacklessState::FromChild,
                    },
                }
            }
        }

        true
    }

    // The subtree rooted at `self.current` is done: go to its sibling if it was the first
    // child of `parent`, or back to `parent` otherwise.
    fn leave<T>(&mut self, bvh: &Bvh<T>, parent: NodeId) {
        let sibling = match bvh.node(parent).map(|p| p.children()) {
            Some([Some(left), right]) if left == self.current => right,
            _ => None,
        };

        match sibling {
            Some(sibling) => {
                self.current = sibling;
                self.state = StacklessState::FromSibling;
            }
            None => {
                self.current = parent;
                self.state = StacklessState::FromChild;
            }
        }
    }

    /// Runs a complete pass from the current position, returning the number of visited nodes.
    pub fn run_pass<T>(
        &mut self,
        bvh: &Bvh<T>,
        mut visitor: impl FnMut(NodeId, &BvhNode<T>) -> bool,
    ) -> usize {
        let mut visited = 0;
        while self.advance(bvh, |id, node| {
            visited += 1;
            visitor(id, node)
        }) {}
        visited
    }
}
