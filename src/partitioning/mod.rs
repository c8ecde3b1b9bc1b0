//! Spatial partitioning tools.

pub use self::bvh::{
    surface_area_heuristic, BottomUpOptimizingRebuilder, Bvh, BvhNode, BvhNodeFlags, BvhNodeKind,
    BvhViolation, BvhWorkspace, DisconnectError, InsertError, Leaves, NodeId, RotationOptimizer,
    SahConstants, StacklessState, StacklessTraverser, TraversalAction,
};
pub use self::indexed_bvh::IndexedBinaryBvh;

mod bvh;
mod indexed_bvh;
