use super::{Bvh, BvhNode, BvhNodeKind, BvhWorkspace, NodeId};
use smallvec::SmallVec;

const TRAVERSAL_STACK_SIZE: usize = 32;

/// An iterator through the leaves of a [`Bvh`], in depth-first order.
///
/// See [`Bvh::leaves`].
pub struct Leaves<'a, T, Check: Fn(&BvhNode<T>) -> bool> {
    tree: &'a Bvh<T>,
    stack: SmallVec<[NodeId; TRAVERSAL_STACK_SIZE]>,
    check: Check,
}

impl<'a, T, Check: Fn(&BvhNode<T>) -> bool> Leaves<'a, T, Check> {
    fn new(tree: &'a Bvh<T>, check: Check) -> Self {
        let mut stack = SmallVec::new();
        stack.push(tree.root);
        Leaves { tree, stack, check }
    }
}

impl<'a, T, Check: Fn(&BvhNode<T>) -> bool> Iterator for Leaves<'a, T, Check> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            let node = &self.tree.nodes[id.0];

            if !(self.check)(node) {
                continue;
            }

            match &node.kind {
                BvhNodeKind::Leaf(payload) => return Some((id, payload)),
                BvhNodeKind::Internal { left, right } => {
                    self.stack.extend(right.iter().copied());
                    self.stack.extend(left.iter().copied());
                }
            }
        }
    }
}

/// Controls the execution flow of [`Bvh::traverse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalAction {
    /// The traversal will continue on the children of the tested node.
    Continue,
    /// The traversal will skip all descendants of the tested node.
    Prune,
    /// The traversal will exit immediately.
    EarlyExit,
}

impl<T> Bvh<T> {
    /// Iterates through the leaves attached to this tree, in depth-first order.
    ///
    /// The `check_node` closure is called on every traversed node. If it returns `false` then the
    /// node and all its descendants won’t be iterated on. This is useful for pruning whole
    /// sub-trees based on a geometric predicate on the node’s AABB.
    pub fn leaves<F: Fn(&BvhNode<T>) -> bool>(&self, check_node: F) -> Leaves<'_, T, F> {
        Leaves::new(self, check_node)
    }

    /// Recursively visits the subtree rooted at `id` in pre-order, left child first.
    ///
    /// If `visitor` returns `false` on a node, the descendants of that node are skipped.
    pub fn traverse_pre_order(
        &self,
        id: NodeId,
        mut visitor: impl FnMut(NodeId, &BvhNode<T>) -> bool,
    ) {
        self.traverse_pre_order_recurse(id, &mut visitor)
    }

    fn traverse_pre_order_recurse(
        &self,
        id: NodeId,
        visitor: &mut impl FnMut(NodeId, &BvhNode<T>) -> bool,
    ) {
        let node = &self.nodes[id.0];
        if visitor(id, node) {
            for child in node.children().into_iter().flatten() {
                self.traverse_pre_order_recurse(child, visitor);
            }
        }
    }

    /// Recursively visits the subtree rooted at `id` in post-order, left child first.
    ///
    /// `descend` is called on each node before its children: if it returns `false`, the children
    /// are skipped. `visitor` is called on each node after its children.
    pub fn traverse_post_order(
        &self,
        id: NodeId,
        mut descend: impl FnMut(NodeId, &BvhNode<T>) -> bool,
        mut visitor: impl FnMut(NodeId, &BvhNode<T>),
    ) {
        self.traverse_post_order_recurse(id, &mut descend, &mut visitor)
    }

    fn traverse_post_order_recurse(
        &self,
        id: NodeId,
        descend: &mut impl FnMut(NodeId, &BvhNode<T>) -> bool,
        visitor: &mut impl FnMut(NodeId, &BvhNode<T>),
    ) {
        let node = &self.nodes[id.0];
        if descend(id, node) {
            for child in node.children().into_iter().flatten() {
                self.traverse_post_order_recurse(child, descend, visitor);
            }
        }
        visitor(id, node);
    }

    /// Traverses the whole tree in depth-first pre-order with full control over traversal.
    ///
    /// Unlike [`Bvh::traverse_pre_order`] this doesn’t recurse: the nodes left to visit are
    /// pushed on the stack of `workspace`, which can be reused from one call to the next.
    ///
    /// For each visited node, `check_node` decides whether to continue traversing its children,
    /// prune that subtree, or exit early.
    pub fn traverse(
        &self,
        workspace: &mut BvhWorkspace,
        mut check_node: impl FnMut(NodeId, &BvhNode<T>) -> TraversalAction,
    ) {
        let stack = &mut workspace.traversal_stack;
        stack.clear();
        stack.push(self.root);

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            match check_node(id, node) {
                TraversalAction::Continue => {
                    // Push right first so that left pops first.
                    let [left, right] = node.children();
                    stack.extend(right);
                    stack.extend(left);
                }
                TraversalAction::Prune => {}
                TraversalAction::EarlyExit => return,
            }
        }
    }

    /// Visits every leaf of the tree in depth-first order, without recursion.
    ///
    /// `check_node` is called on every traversed node (including leaves): returning `false`
    /// skips the node and its descendants. `visit_leaf` is called on the leaves passing the check
    /// and can return `false` to stop the traversal.
    pub fn for_each_leaf(
        &self,
        workspace: &mut BvhWorkspace,
        mut check_node: impl FnMut(&BvhNode<T>) -> bool,
        mut visit_leaf: impl FnMut(NodeId, &T) -> bool,
    ) {
        self.traverse(workspace, |id, node| {
            if !check_node(node) {
                return TraversalAction::Prune;
            }

            match &node.kind {
                BvhNodeKind::Leaf(payload) if !visit_leaf(id, payload) => {
                    TraversalAction::EarlyExit
                }
                _ => TraversalAction::Continue,
            }
        })
    }
}
