pub use bvh_insert::{DisconnectError, InsertError};
pub use bvh_optimize::RotationOptimizer;
pub use bvh_rebuild::BottomUpOptimizingRebuilder;
pub use bvh_rotate::{surface_area_heuristic, SahConstants};
pub use bvh_stackless::{StacklessState, StacklessTraverser};
pub use bvh_traverse::{Leaves, TraversalAction};
pub use bvh_tree::{Bvh, BvhNode, BvhNodeFlags, BvhNodeKind, BvhWorkspace, NodeId};
pub use bvh_validation::BvhViolation;

mod bvh_build;
mod bvh_insert;
mod bvh_optimize;
mod bvh_queries;
mod bvh_rebuild;
mod bvh_refit;
mod bvh_rotate;
mod bvh_stackless;
mod bvh_traverse;
mod bvh_tree;
mod bvh_validation;
