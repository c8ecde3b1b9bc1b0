use super::{leaf_set, random_aabb, random_tree};
use arbor3d::bounding_volume::Aabb;
use arbor3d::partitioning::{BottomUpOptimizingRebuilder, Bvh, RotationOptimizer, SahConstants};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: [u32; 7] = [4, 5, 8, 13, 32, 64, 100];

fn sah(bvh: &Bvh<u32>) -> f64 {
    bvh.compute_sah(bvh.root(), &SahConstants::default())
}

#[test]
fn rotations_never_increase_the_cost() {
    let mut rng = StdRng::seed_from_u64(100);

    for len in SIZES {
        let mut bvh = random_tree(&mut rng, len);
        let leaves = leaf_set(&bvh);
        let root_aabb = bvh.root_aabb();
        let mut optimizer = RotationOptimizer::new(SahConstants::default());
        let mut cost = sah(&bvh);

        for _ in 0..10_000 {
            let budget = rng.gen_range(1..20);
            let _ = optimizer.optimize(&mut bvh, budget);

            let new_cost = sah(&bvh);
            assert!(new_cost <= cost * (1.0 + 1.0e-12), "{len} leaves: {cost} -> {new_cost}");
            cost = new_cost;

            if optimizer.is_converged() {
                break;
            }
        }

        assert!(optimizer.is_converged(), "{len} leaves: no convergence");
        assert_eq!(optimizer.optimize(&mut bvh, 100), 0);
        bvh.assert_well_formed();
        assert_eq!(leaf_set(&bvh), leaves);
        assert_eq!(bvh.root_aabb(), root_aabb);
    }
}

#[test]
fn rebuilds_never_increase_the_cost() {
    let mut rng = StdRng::seed_from_u64(200);

    for len in SIZES {
        let mut bvh = random_tree(&mut rng, len);
        let leaves = leaf_set(&bvh);
        let node_count = bvh.node_count();
        let before = sah(&bvh);

        let mut rebuilder = BottomUpOptimizingRebuilder::new();
        let mut steps = 0;
        while !rebuilder.compute(&mut bvh, 3) {
            steps += 1;
            assert!(steps <= len as usize, "{len} leaves: the rebuild doesn’t end");
        }

        assert!(!rebuilder.is_running());
        assert!(sah(&bvh) <= before, "{len} leaves: {before} -> {}", sah(&bvh));
        bvh.assert_well_formed();
        assert_eq!(leaf_set(&bvh), leaves);
        assert_eq!(bvh.node_count(), node_count);
    }
}

#[test]
fn rebuilding_a_sorted_insertion_improves_it() {
    // Inserting along a line yields a poor tree.
    let mut bvh = Bvh::new();
    for i in 0..64u32 {
        let x = i as f64 * 2.0;
        let _ = bvh.insert(Aabb::from_bounds(x, 0.0, 0.0, x + 1.0, 1.0, 1.0), i);
    }

    let before = sah(&bvh);
    let mut rebuilder = BottomUpOptimizingRebuilder::new();
    let root = bvh.root();
    assert!(rebuilder.rebuild(&mut bvh, root));
    let rebuilt = sah(&bvh);
    assert!(rebuilt < before);

    // Rotations can only improve on the rebuilt tree.
    let mut optimizer = RotationOptimizer::new(SahConstants::default());
    while !optimizer.is_converged() {
        let _ = optimizer.optimize(&mut bvh, 1000);
    }
    assert!(sah(&bvh) <= rebuilt);
    assert!(bvh.subtree_depth(bvh.root()) <= 10);
    bvh.assert_well_formed();
}

#[test]
fn optimizers_interleaved_with_updates() {
    let mut rng = StdRng::seed_from_u64(300);
    let mut bvh = random_tree(&mut rng, 50);
    let mut optimizer = RotationOptimizer::new(SahConstants::default());
    let mut rebuilder = BottomUpOptimizingRebuilder::new();
    let ids: Vec<_> = bvh.leaves(|_| true).map(|(id, _)| id).collect();

    for frame in 0..200 {
        let id = ids[rng.gen_range(0..ids.len())];
        match frame % 3 {
            0 => {
                assert!(bvh.set_leaf_aabb(id, random_aabb(&mut rng, 20.0)));
            }
            1 => {
                bvh.disconnect(id).unwrap();
                bvh.insert_node(id).unwrap();
            }
            _ => {}
        }

        let _ = optimizer.optimize(&mut bvh, 10);
        let _ = rebuilder.compute(&mut bvh, 5);
        bvh.assert_well_formed();
        assert_eq!(bvh.leaf_count(), 50);
    }
}
