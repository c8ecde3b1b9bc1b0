use super::{Bvh, NodeId};
use crate::bounding_volume::Aabb;

impl<T> Bvh<T> {
    /// Builds a balanced BVH from a set of leaves.
    ///
    /// The leaves are sorted along a Morton curve of their AABB centers, then recursively split
    /// in two halves of equal size. This is much faster than inserting the leaves one by one,
    /// and gives a tree with a depth of `⌈log2(n)⌉ + 1` that incremental optimizations
    /// can refine later.
    ///
    /// The ids of the leaves can be retrieved by iterating with [`Bvh::leaves`].
    pub fn from_leaves(leaves: impl IntoIterator<Item = (Aabb, T)>) -> Self {
        let mut bvh = Self::new();
        let mut ids: Vec<NodeId> = leaves
            .into_iter()
            .map(|(aabb, payload)| bvh.create_leaf(aabb, payload))
            .collect();

        if ids.is_empty() {
            return bvh;
        }

        ids.sort_by_cached_key(|id| bvh.nodes[id.0].morton_code());
        bvh.build_range(bvh.root, &ids);
        bvh.bump_generation();
        bvh
    }

    // Attaches the leaves `ids` under the internal node `target`, creating the intermediate
    // nodes needed for a balanced split.
    fn build_range(&mut self, target: NodeId, ids: &[NodeId]) {
        let mid = ids.len() / 2;
        let halves = if ids.len() == 1 {
            [ids, &[][..]]
        } else {
            [&ids[..mid], &ids[mid..]]
        };

        for (slot, half) in halves.into_iter().enumerate() {
            let child = match half {
                [] => continue,
                [leaf] => *leaf,
                _ => {
                    let internal = self.create_internal(Aabb::new_invalid());
                    self.build_range(internal, half);
                    internal
                }
            };

            self.link_child(target, slot, child);
        }

        let _ = self.refit(target);
    }
}

#[cfg(test)]
mod test {
    use crate::bounding_volume::Aabb;
    use crate::partitioning::Bvh;

    #[test]
    fn bulk_build_is_balanced() {
        let leaves = (0..100).map(|i| {
            let x = (i % 10) as f64 * 3.0;
            let y = (i / 10) as f64 * 3.0;
            (Aabb::from_bounds(x, y, 0.0, x + 1.0, y + 1.0, 1.0), i)
        });
        let bvh = Bvh::from_leaves(leaves);

        bvh.assert_well_formed();
        assert_eq!(bvh.leaf_count(), 100);
        assert_eq!(bvh.subtree_depth(bvh.root()), 8);
        assert_eq!(
            bvh.root_aabb(),
            Aabb::from_bounds(0.0, 0.0, 0.0, 28.0, 28.0, 1.0)
        );

        let mut payloads: Vec<_> = bvh.leaves(|_| true).map(|(_, i)| *i).collect();
        payloads.sort();
        assert_eq!(payloads, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn bulk_build_small_inputs() {
        let empty = Bvh::<u32>::from_leaves(vec![]);
        assert!(empty.is_empty());
        empty.assert_well_formed();

        let single = Bvh::from_leaves([(Aabb::from_bounds(0.0, 0.0, 0.0, 1.0, 1.0, 1.0), 7)]);
        single.assert_well_formed();
        assert_eq!(single.leaf_count(), 1);
        assert_eq!(single.subtree_depth(single.root()), 2);
    }
}
