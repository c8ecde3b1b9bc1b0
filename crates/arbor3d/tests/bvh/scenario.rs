use super::{pre_order, random_aabb, random_tree};
use arbor3d::bounding_volume::{Aabb, BoundingVolume};
use arbor3d::math::{Point, Vector};
use arbor3d::partitioning::{
    Bvh, BvhWorkspace, IndexedBinaryBvh, NodeId, StacklessState, StacklessTraverser,
};
use arbor3d::query::{Ray, Segment};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn unit_cube(x: f64) -> Aabb {
    Aabb::from_bounds(x, x, x, x + 1.0, x + 1.0, x + 1.0)
}

#[test]
fn three_boxes() {
    let mut bvh = Bvh::new();
    let a = bvh.insert(unit_cube(0.0), "a");
    let b = bvh.insert(unit_cube(2.0), "b");
    let c = bvh.insert(unit_cube(10.0), "c");
    bvh.assert_well_formed();

    let expected = Aabb::from_bounds(0.0, 0.0, 0.0, 11.0, 11.0, 11.0);
    assert_eq!(bvh.root_aabb(), expected);
    assert_eq!(bvh.root_aabb().surface_area(), 6.0 * 121.0);

    let mut workspace = BvhWorkspace::default();
    let ray = Ray::new(Point::new(-1.0, -1.0, -1.0), Vector::new(1.0, 1.0, 1.0));
    let mut hits = vec![];
    bvh.cast_ray(&ray, f64::MAX, &mut workspace, |id, _, toi| {
        hits.push((toi, id));
        true
    });
    hits.sort_by(|h1, h2| h1.0.total_cmp(&h2.0));
    let order: Vec<_> = hits.iter().map(|h| h.1).collect();
    assert_eq!(order, vec![a, b, c]);
    assert_eq!(hits[0].0, 1.0);
    assert_eq!(hits[2].0, 11.0);

    let closest = bvh.cast_ray_closest(&ray, f64::MAX, &mut workspace, |_, _, toi| Some(toi));
    assert_eq!(closest, Some((a, 1.0)));

    let segment = Segment::new(Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0));
    let mut found = vec![];
    bvh.intersect_segment(&segment, &mut workspace, |_, name| {
        found.push(*name);
        true
    });
    assert_eq!(found, vec!["a"]);

    let near: Vec<_> = bvh
        .intersect_aabb(&Aabb::from_bounds(1.5, 1.5, 1.5, 2.5, 2.5, 2.5))
        .map(|(_, name)| *name)
        .collect();
    assert_eq!(near, vec!["b"]);

    assert_eq!(bvh.remove_leaf(b), Some("b"));
    assert_eq!(bvh.leaf_count(), 2);
    assert_eq!(bvh.root_aabb(), expected);
    assert_eq!(bvh[c].parent(), Some(bvh.root()));
    bvh.assert_well_formed();
}

#[test]
fn every_node_contains_its_descendants() {
    let mut rng = StdRng::seed_from_u64(1000);
    let mut bvh = Bvh::new();
    let mut ids = vec![];

    for i in 0..400u32 {
        ids.push(bvh.insert(random_aabb(&mut rng, 100.0), i));

        if i % 50 == 49 {
            for id in pre_order(&bvh, bvh.root()) {
                let node = &bvh[id];
                for child in node.children().into_iter().flatten() {
                    assert!(node.aabb().contains(bvh[child].aabb()));
                }
            }
        }
    }

    for id in ids.iter().step_by(7) {
        assert!(bvh.set_leaf_aabb(*id, random_aabb(&mut rng, 150.0)));
    }
    bvh.assert_well_formed();

    for id in ids.iter().skip(1).step_by(2) {
        let _ = bvh.remove_leaf(*id);
    }
    bvh.assert_well_formed();
    assert_eq!(bvh.leaf_count(), 200);
}

#[test]
fn bulk_build_matches_incremental_contents() {
    let mut rng = StdRng::seed_from_u64(1001);
    let boxes: Vec<_> = (0..257u32)
        .map(|i| (random_aabb(&mut rng, 30.0), i))
        .collect();

    let bulk = Bvh::from_leaves(boxes.iter().copied());
    bulk.assert_well_formed();
    assert_eq!(bulk.leaf_count(), 257);
    // One leaf past a power of two adds a level.
    assert_eq!(bulk.subtree_depth(bulk.root()), 10);

    let mut incremental = Bvh::new();
    for (aabb, i) in &boxes {
        let _ = incremental.insert(*aabb, *i);
    }
    assert_eq!(bulk.root_aabb(), incremental.root_aabb());

    let mut payloads: Vec<_> = bulk.leaves(|_| true).map(|(_, i)| *i).collect();
    payloads.sort();
    assert_eq!(payloads, (0..257).collect::<Vec<_>>());
}

#[test]
fn stackless_traversal_is_resumable() {
    let mut rng = StdRng::seed_from_u64(1002);
    let bvh = random_tree(&mut rng, 77);
    let expected = pre_order(&bvh, bvh.root());

    let mut traverser = StacklessTraverser::new(bvh.root());
    let mut visited: Vec<NodeId> = vec![];
    let mut steps = 0;

    // The whole progress is a copyable value.
    loop {
        let mut resumed = traverser;
        let more = resumed.advance(&bvh, |id, _| {
            visited.push(id);
            true
        });
        traverser = resumed;
        steps += 1;
        if !more {
            break;
        }
    }

    assert_eq!(visited, expected);
    assert_eq!(traverser.state(), StacklessState::FromParent);
    assert_eq!(traverser.current(), bvh.root());
    // Each node is entered once and left once, plus the final step.
    assert!(steps <= 2 * expected.len() + 1);
}

#[test]
fn stackless_pass_ends_if_the_current_node_disappears() {
    let mut bvh = Bvh::new();
    let a = bvh.insert(unit_cube(0.0), 0);
    let _ = bvh.insert(unit_cube(2.0), 1);

    let mut traverser = StacklessTraverser::new(bvh.root());
    assert!(traverser.advance(&bvh, |_, _| true));
    assert_eq!(traverser.current(), a);

    let _ = bvh.remove_leaf(a);
    assert!(!traverser.advance(&bvh, |_, _| true));
    assert_eq!(traverser.current(), bvh.root());
    assert_eq!(traverser.run_pass(&bvh, |_, _| true), 2);
}

#[test]
fn flat_tree_over_five_leaves() {
    let boxes = [
        unit_cube(0.0),
        unit_cube(2.0),
        unit_cube(10.0),
        Aabb::from_bounds(-4.0, 0.0, 0.0, -3.0, 1.0, 1.0),
        Aabb::from_bounds(0.0, 0.0, 20.0, 1.0, 1.0, 21.0),
    ];

    let mut flat = IndexedBinaryBvh::new();
    flat.initialize(boxes.len());
    assert_eq!(flat.internal_count(), 7);
    flat.set_leaves(|i| boxes[i]);

    let union = boxes
        .iter()
        .fold(Aabb::new_invalid(), |acc, aabb| acc.merged(aabb));
    assert_eq!(flat.root_aabb(), union);
    assert_eq!(
        flat.root_aabb(),
        Aabb::from_bounds(-4.0, 0.0, 0.0, 11.0, 11.0, 21.0)
    );

    // Moving leaves refits the whole tree.
    flat.set_leaves(|i| boxes[i].loosened(1.0));
    assert_eq!(flat.root_aabb(), union.loosened(1.0));

    let ray = Ray::new(Point::new(-1.0, -1.0, -1.0), Vector::new(1.0, 1.0, 1.0));
    let mut hits = vec![];
    flat.cast_ray(&ray, 100.0, |i, _| {
        hits.push(i);
        true
    });
    hits.sort();
    assert_eq!(hits, vec![0, 1, 2]);
}
