use arbor3d::bounding_volume::Aabb;
use arbor3d::math::{Point, Real, Vector};
use arbor3d::partitioning::{Bvh, NodeId};
use rand::rngs::StdRng;
use rand::Rng;

mod codec;
mod optimization;
mod scenario;

pub fn random_aabb(rng: &mut StdRng, spread: Real) -> Aabb {
    let center = Point::new(
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
    );
    let half_extents = Vector::new(
        rng.gen_range(0.05..2.0),
        rng.gen_range(0.05..2.0),
        rng.gen_range(0.05..2.0),
    );
    Aabb::from_half_extents(center, half_extents)
}

pub fn random_tree(rng: &mut StdRng, len: u32) -> Bvh<u32> {
    let mut bvh = Bvh::new();
    for i in 0..len {
        let _ = bvh.insert(random_aabb(rng, 20.0), i);
    }
    bvh
}

/// The sorted payloads and bounds of all the leaves attached to `bvh`.
pub fn leaf_set(bvh: &Bvh<u32>) -> Vec<(u32, [Real; 6])> {
    let mut leaves: Vec<_> = bvh
        .leaves(|_| true)
        .map(|(id, payload)| (*payload, bvh[id].aabb().bounds()))
        .collect();
    leaves.sort_by_key(|leaf| leaf.0);
    leaves
}

/// The nodes of the subtree rooted at `id`, in pre-order.
pub fn pre_order<T>(bvh: &Bvh<T>, id: NodeId) -> Vec<NodeId> {
    let mut result = vec![];
    bvh.traverse_pre_order(id, |id, _| {
        result.push(id);
        true
    });
    result
}
