use super::{Bvh, NodeId, SahConstants, StacklessState, StacklessTraverser};
use hashbrown::HashMap;

/// Incrementally improves the quality of a [`Bvh`] with local tree rotations.
///
/// The optimizer walks the tree with a [`StacklessTraverser`] and calls
/// [`Bvh::try_rotate_single_node`] on every internal node it enters. Because the traverser
/// doesn’t need any stack, the walk can be suspended once a budget of node visits is exhausted
/// and resumed on the next call to [`RotationOptimizer::optimize`]. This makes it suitable for
/// maintaining the tree of a dynamic scene with a small amount of work every frame.
///
/// Protected subtrees are never entered.
///
/// If the tree is modified by anything else than this optimizer in-between two calls (detected
/// with [`Bvh::generation`]), the walk restarts from the root.
///
/// # Example
///
/// ```rust
/// use arbor3d::bounding_volume::Aabb;
/// use arbor3d::partitioning::{Bvh, RotationOptimizer, SahConstants};
///
/// let mut bvh = Bvh::new();
/// for i in 0..100 {
///     let x = ((i * 37) % 100) as f64;
///     let _ = bvh.insert(Aabb::from_bounds(x, 0.0, 0.0, x + 1.0, 1.0, 1.0), i);
/// }
///
/// let constants = SahConstants::default();
/// let before = bvh.compute_sah(bvh.root(), &constants);
/// let mut optimizer = RotationOptimizer::new(constants);
///
/// // A small budget per frame.
/// for _frame in 0..100 {
///     let _ = optimizer.optimize(&mut bvh, 50);
/// }
///
/// assert!(bvh.compute_sah(bvh.root(), &constants) <= before);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RotationOptimizer {
    constants: SahConstants,
    traverser: Option<StacklessTraverser>,
    leaf_counts: HashMap<NodeId, u32>,
    rotations_in_pass: usize,
    converged: bool,
    generation: Option<u64>,
}

impl RotationOptimizer {
    /// An optimizer evaluating rotations with the given cost model.
    pub fn new(constants: SahConstants) -> Self {
        Self {
            constants,
            ..Default::default()
        }
    }

    /// The cost model used to evaluate rotations.
    pub fn constants(&self) -> &SahConstants {
        &self.constants
    }

    /// Has the last complete pass over the tree found nothing left to rotate?
    ///
    /// This is reset as soon as the tree is modified by something else than this optimizer.
    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Forgets about any walk in progress: the next call to [`RotationOptimizer::optimize`]
    /// starts over from the root.
    pub fn reset(&mut self) {
        self.traverser = None;
        self.leaf_counts.clear();
        self.rotations_in_pass = 0;
        self.converged = false;
        self.generation = None;
    }

    /// Runs the optimizer for at most `max_iterations` node visits.
    ///
    /// Only entering a node counts as a visit: the steps going back up the tree are free. The
    /// walk continues where the previous call left it. Full passes over the tree are restarted
    /// until either the budget is exhausted, or a whole pass doesn’t apply any rotation. Returns
    /// the number of rotations applied by this call.
    pub fn optimize<T>(&mut self, bvh: &mut Bvh<T>, max_iterations: usize) -> usize {
        if self.generation != Some(bvh.generation())
            || self.traverser.map(|t| t.root()) != Some(bvh.root())
        {
            self.reset();
        }

        if self.converged {
            return 0;
        }

        let mut traverser = self
            .traverser
            .unwrap_or_else(|| StacklessTraverser::new(bvh.root()));
        let mut rotations = 0;
        let mut visits = 0;

        loop {
            let entering = matches!(
                traverser.state(),
                StacklessState::FromParent | StacklessState::FromSibling
            );

            if entering {
                if visits == max_iterations {
                    break;
                }
                visits += 1;

                // Rotate the node about to be entered, so the traverser then descends into its
                // updated children.
                if bvh.contains(traverser.current())
                    && bvh.try_rotate_single_node(
                        traverser.current(),
                        &self.constants,
                        &mut self.leaf_counts,
                    )
                {
                    rotations += 1;
                    self.rotations_in_pass += 1;
                }
            }

            if !traverser.advance(bvh, |_, node| !node.is_protected()) {
                log::debug!(
                    "Rotation pass completed with {} rotations.",
                    self.rotations_in_pass
                );

                if self.rotations_in_pass == 0 {
                    self.converged = true;
                    break;
                }

                self.rotations_in_pass = 0;
                self.leaf_counts.clear();
            }
        }

        self.traverser = Some(traverser);
        self.generation = Some(bvh.generation());
        rotations
    }
}
