use crate::bounding_volume::Aabb;
use crate::math::Real;
use crate::utils::morton_encode_point;
use core::cell::Cell;
use core::ops::Index;
use slab::Slab;

/// Workspace data for various operations on the tree.
///
/// This is all temporary data that can be freed at any time without affecting results.
/// The main reason to reuse the same instance of this over time is to lower costs of internal
/// allocations.
#[derive(Clone, Default)]
pub struct BvhWorkspace {
    pub(super) traversal_stack: Vec<NodeId>,
    pub(super) masked_stack: Vec<(NodeId, u8)>,
    pub(super) ordered_stack: Vec<(NodeId, Real)>,
}

/// An index identifying a single BVH tree node.
///
/// Node ids are stable: a node keeps its id until it is removed from the tree, after which the
/// id may be reused by a new node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NodeId(pub(super) usize);

impl NodeId {
    /// The raw index of this node in the tree's storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
/// Persistent state flags of a BVH node.
pub struct BvhNodeFlags(u8);

bitflags::bitflags! {
    impl BvhNodeFlags: u8 {
        /// The subtree rooted at this node is never restructured.
        ///
        /// Insertion doesn't descend into it (new leaves get attached next to it instead), and the
        /// optimizers move it around as a whole, like a leaf.
        const PROTECTED = 1;
    }
}

/// The content of a node: either a leaf payload, or up to two children.
#[derive(Clone, Debug, PartialEq)]
pub enum BvhNodeKind<T> {
    /// A leaf carrying a caller-owned payload.
    Leaf(T),
    /// An internal node with zero, one, or two children.
    Internal {
        /// The left child, if any.
        left: Option<NodeId>,
        /// The right child, if any.
        right: Option<NodeId>,
    },
}

/// The node (internal or leaf) of a BVH.
#[derive(Clone, Debug)]
pub struct BvhNode<T> {
    pub(super) aabb: Aabb,
    pub(super) parent: Option<NodeId>,
    pub(super) kind: BvhNodeKind<T>,
    pub(super) flags: BvhNodeFlags,
    // Lazily computed, cleared whenever `aabb` changes.
    pub(super) morton: Cell<Option<u64>>,
}

impl<T> BvhNode<T> {
    pub(super) fn leaf(aabb: Aabb, payload: T) -> Self {
        Self {
            aabb,
            parent: None,
            kind: BvhNodeKind::Leaf(payload),
            flags: BvhNodeFlags::empty(),
            morton: Cell::new(None),
        }
    }

    pub(super) fn internal(aabb: Aabb) -> Self {
        Self {
            aabb,
            parent: None,
            kind: BvhNodeKind::Internal {
                left: None,
                right: None,
            },
            flags: BvhNodeFlags::empty(),
            morton: Cell::new(None),
        }
    }

    /// This node’s AABB.
    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// The parent of this node, or `None` for the root and for detached nodes.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The content of this node.
    #[inline]
    pub fn kind(&self) -> &BvhNodeKind<T> {
        &self.kind
    }

    /// Is this node a leaf?
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvhNodeKind::Leaf(_))
    }

    /// The payload of this node if it is a leaf.
    #[inline]
    pub fn payload(&self) -> Option<&T> {
        match &self.kind {
            BvhNodeKind::Leaf(payload) => Some(payload),
            BvhNodeKind::Internal { .. } => None,
        }
    }

    /// The left and right children of this node.
    ///
    /// Both are `None` for leaves.
    #[inline]
    pub fn children(&self) -> [Option<NodeId>; 2] {
        match self.kind {
            BvhNodeKind::Leaf(_) => [None, None],
            BvhNodeKind::Internal { left, right } => [left, right],
        }
    }

    /// The first child present on this node, looking at the left slot first.
    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        let [left, right] = self.children();
        left.or(right)
    }

    /// The state flags of this node.
    #[inline]
    pub fn flags(&self) -> BvhNodeFlags {
        self.flags
    }

    /// Is the subtree rooted at this node protected from restructuring?
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.flags.contains(BvhNodeFlags::PROTECTED)
    }

    /// The Morton code of the center of this node’s AABB.
    ///
    /// It is computed on first request and cached until the AABB changes.
    pub fn morton_code(&self) -> u64 {
        if let Some(code) = self.morton.get() {
            return code;
        }

        let code = morton_encode_point(&self.aabb.center());
        self.morton.set(Some(code));
        code
    }

    #[inline]
    pub(super) fn set_aabb(&mut self, aabb: Aabb) {
        self.aabb = aabb;
        self.morton.set(None);
    }

    #[inline]
    pub(super) fn expand_to_fit(&mut self, aabb: &Aabb) -> bool {
        let grown = self.aabb.expand_to_fit(aabb);
        if grown {
            self.morton.set(None);
        }
        grown
    }

    #[inline]
    pub(super) fn set_child(&mut self, slot: usize, child: Option<NodeId>) {
        if let BvhNodeKind::Internal { left, right } = &mut self.kind {
            if slot == 0 {
                *left = child;
            } else {
                *right = child;
            }
        }
    }

    #[inline]
    pub(super) fn slot_of(&self, child: NodeId) -> Option<usize> {
        self.children().iter().position(|c| *c == Some(child))
    }
}

/// A dynamic Bounding Volume Hierarchy of AABBs.
///
/// Every node lives in an arena owned by the tree and is identified by a [`NodeId`]. The tree
/// always has an internal root node, which has no children (and inverted bounds) while the tree
/// is empty.
///
/// Leaves can be created detached with [`Bvh::create_leaf`] and attached later with
/// [`Bvh::insert_node`], or both at once with [`Bvh::insert`].
#[derive(Clone, Debug)]
pub struct Bvh<T> {
    pub(super) nodes: Slab<BvhNode<T>>,
    pub(super) root: NodeId,
    pub(super) generation: u64,
}

impl<T> Default for Bvh<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeId> for Bvh<T> {
    type Output = BvhNode<T>;

    /// Panics if `id` doesn’t identify a node of this tree.
    #[inline]
    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl<T> Bvh<T> {
    /// An empty BVH.
    pub fn new() -> Self {
        let mut nodes = Slab::new();
        let root = NodeId(nodes.insert(BvhNode::internal(Aabb::new_invalid())));
        Self {
            nodes,
            root,
            generation: 0,
        }
    }

    /// The root node of this tree.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// A counter incremented by every modification of the tree structure or of its leaf bounds.
    ///
    /// Incremental algorithms can compare it to a previously seen value to check whether the
    /// tree was modified in-between.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(super) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// The node identified by `id`, if it exists.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&BvhNode<T>> {
        self.nodes.get(id.0)
    }

    /// Does a node identified by `id` exist in this tree (attached or not)?
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// The payload of the leaf identified by `id`.
    pub fn payload(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0)?.payload()
    }

    /// A mutable reference to the payload of the leaf identified by `id`.
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            BvhNodeKind::Leaf(payload) => Some(payload),
            BvhNodeKind::Internal { .. } => None,
        }
    }

    /// The total number of nodes allocated by this tree, including detached ones.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Does this tree not contain any leaf?
    pub fn is_empty(&self) -> bool {
        self.nodes[self.root.0].first_child().is_none()
    }

    /// The AABB bounding everything contained by this BVH.
    ///
    /// This is an invalid AABB (see [`Aabb::new_invalid`]) while the tree has never contained
    /// anything.
    #[inline]
    pub fn root_aabb(&self) -> Aabb {
        self.nodes[self.root.0].aabb
    }

    /// Creates a new leaf that is not attached to the tree yet.
    ///
    /// Use [`Bvh::insert_node`] to attach it.
    pub fn create_leaf(&mut self, aabb: Aabb, payload: T) -> NodeId {
        NodeId(self.nodes.insert(BvhNode::leaf(aabb, payload)))
    }

    pub(crate) fn create_internal(&mut self, aabb: Aabb) -> NodeId {
        NodeId(self.nodes.insert(BvhNode::internal(aabb)))
    }

    // Makes `child` the child of `parent` in the given slot, without any refit.
    pub(crate) fn link_child(&mut self, parent: NodeId, slot: usize, child: NodeId) {
        self.nodes[parent.0].set_child(slot, Some(child));
        self.nodes[child.0].parent = Some(parent);
    }

    // Overwrites the bounds of a node, without any refit.
    pub(crate) fn set_node_aabb(&mut self, id: NodeId, aabb: Aabb) {
        self.nodes[id.0].set_aabb(aabb);
    }

    /// Marks or unmarks the subtree rooted at `id` as protected.
    ///
    /// See [`BvhNodeFlags::PROTECTED`]. Returns `false` if the node doesn’t exist.
    pub fn set_protected(&mut self, id: NodeId, protected: bool) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) => {
                node.flags.set(BvhNodeFlags::PROTECTED, protected);
                true
            }
            None => false,
        }
    }

    /// Removes a leaf from this tree and returns its payload.
    ///
    /// If the leaf was attached, its ancestors are refitted, and its parent gets collapsed if
    /// it is left with a single child (unless it is the root or is protected). Returns `None` if
    /// `id` isn’t a leaf.
    pub fn remove_leaf(&mut self, id: NodeId) -> Option<T> {
        if !self.nodes.get(id.0)?.is_leaf() {
            return None;
        }

        if let Some(parent) = self.nodes[id.0].parent {
            if let Some(slot) = self.nodes[parent.0].slot_of(id) {
                self.nodes[parent.0].set_child(slot, None);
            }
            self.collapse_or_refit(parent);
        }

        self.bump_generation();

        match self.nodes.remove(id.0).kind {
            BvhNodeKind::Leaf(payload) => Some(payload),
            BvhNodeKind::Internal { .. } => None,
        }
    }

    // Replaces `id` by its only child if it has one, then refits the ancestors.
    fn collapse_or_refit(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];

        if let (Some(grandparent), false) = (node.parent, node.is_protected()) {
            if let [Some(child), None] | [None, Some(child)] = node.children() {
                if let Some(slot) = self.nodes[grandparent.0].slot_of(id) {
                    self.nodes[grandparent.0].set_child(slot, Some(child));
                    self.nodes[child.0].parent = Some(grandparent);
                    let _ = self.nodes.remove(id.0);
                    self.bubble_refit(grandparent);
                    return;
                }
            }
        }

        self.bubble_refit(id);
    }

    /// The number of leaves reachable from the node `id`.
    pub fn reachable_leaf_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        self.traverse_pre_order(id, |_, node| {
            count += node.is_leaf() as usize;
            true
        });
        count
    }

    /// The number of leaves attached to this tree.
    pub fn leaf_count(&self) -> usize {
        self.reachable_leaf_count(self.root)
    }

    /// The depth of the sub-tree rooted at the node `id`.
    ///
    /// A single leaf has a depth of 1, and so does an internal node without children.
    pub fn subtree_depth(&self, id: NodeId) -> usize {
        let [left, right] = self.nodes[id.0].children();
        let left_depth = left.map(|c| self.subtree_depth(c)).unwrap_or(0);
        let right_depth = right.map(|c| self.subtree_depth(c)).unwrap_or(0);
        left_depth.max(right_depth) + 1
    }
}
