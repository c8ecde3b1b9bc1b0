use super::{pre_order, random_tree};
use arbor3d::bounding_volume::{Aabb, BoundingVolume};
use arbor3d::codec::{
    decode_compact, decode_lossless, decode_lossless_with, encode_compact, encode_lossless,
    encode_lossless_with, CodecError,
};
use arbor3d::math::DIM;
use arbor3d::partitioning::{BottomUpOptimizingRebuilder, Bvh, NodeId};
use byteorder::{ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Checks that both trees have the same shape and payloads, and returns the pairs of matching
// nodes.
fn same_shape<T: PartialEq + std::fmt::Debug>(a: &Bvh<T>, b: &Bvh<T>) -> Vec<(NodeId, NodeId)> {
    let nodes_a = pre_order(a, a.root());
    let nodes_b = pre_order(b, b.root());
    assert_eq!(nodes_a.len(), nodes_b.len());

    for (ia, ib) in nodes_a.iter().zip(nodes_b.iter()) {
        let (node_a, node_b) = (&a[*ia], &b[*ib]);
        assert_eq!(node_a.payload(), node_b.payload());
        assert_eq!(
            node_a.children().map(|c| c.is_some()),
            node_b.children().map(|c| c.is_some())
        );
    }

    nodes_a.into_iter().zip(nodes_b).collect()
}

#[test]
fn lossless_round_trip() {
    let mut rng = StdRng::seed_from_u64(0);

    for len in [0, 1, 2, 3, 17, 150] {
        let bvh = random_tree(&mut rng, len);
        let mut buffer = vec![];
        encode_lossless(&bvh, &mut buffer).unwrap();

        let decoded: Bvh<u32> = decode_lossless(&mut &buffer[..]).unwrap();
        decoded.assert_well_formed();
        assert_eq!(decoded.leaf_count(), len as usize);

        for (a, b) in same_shape(&bvh, &decoded) {
            assert_eq!(bvh[a].aabb(), decoded[b].aabb());
        }

        // The same bytes again.
        let mut reencoded = vec![];
        encode_lossless(&decoded, &mut reencoded).unwrap();
        assert_eq!(buffer, reencoded);
    }
}

#[test]
fn lossless_round_trip_after_removals() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut bvh = random_tree(&mut rng, 40);
    let ids: Vec<_> = bvh.leaves(|_| true).map(|(id, _)| id).collect();
    for id in ids.iter().step_by(2) {
        let _ = bvh.remove_leaf(*id);
    }
    // Leaves an internal node with a single child.
    let lonely = ids[1];
    let parent = bvh[lonely].parent().unwrap();
    bvh.disconnect(lonely).unwrap();
    let _ = bvh.refit(parent);

    let mut buffer = vec![];
    encode_lossless(&bvh, &mut buffer).unwrap();
    let decoded: Bvh<u32> = decode_lossless(&mut &buffer[..]).unwrap();
    for (a, b) in same_shape(&bvh, &decoded) {
        assert_eq!(bvh[a].aabb(), decoded[b].aabb());
    }
}

#[test]
fn custom_payload_codec() {
    let mut bvh = Bvh::new();
    let _ = bvh.insert(Aabb::from_bounds(0.0, 0.0, 0.0, 1.0, 1.0, 1.0), -3i16);
    let _ = bvh.insert(Aabb::from_bounds(2.0, 0.0, 0.0, 3.0, 1.0, 1.0), 12i16);

    let mut buffer = vec![];
    encode_lossless_with(&bvh, &mut buffer, |w, p| {
        w.write_i16::<byteorder::LittleEndian>(*p)
    })
    .unwrap();

    let decoded = decode_lossless_with(&mut &buffer[..], |r| {
        let value = r.read_i16::<byteorder::LittleEndian>()?;
        if value > 100 {
            return Err(CodecError::Payload(format!("{value} is out of range")));
        }
        Ok(value)
    })
    .unwrap();
    let _ = same_shape(&bvh, &decoded);

    let rejected = decode_lossless_with(&mut &buffer[..], |r| {
        let _ = r.read_i16::<byteorder::LittleEndian>()?;
        Err::<i16, _>(CodecError::Payload("nope".to_string()))
    });
    assert!(matches!(rejected, Err(CodecError::Payload(_))));
}

#[test]
fn compact_decoding_is_conservative() {
    let mut rng = StdRng::seed_from_u64(2);

    for len in [1, 2, 5, 64, 200] {
        let bvh = random_tree(&mut rng, len);
        let mut lossless = vec![];
        let mut compact = vec![];
        encode_lossless(&bvh, &mut lossless).unwrap();
        encode_compact(&bvh, &mut compact).unwrap();

        let decoded: Bvh<u32> = decode_compact(&mut &compact[..]).unwrap();
        decoded.assert_well_formed();
        assert_eq!(decoded.root_aabb(), bvh.root_aabb());

        if len > 2 {
            assert!(compact.len() < lossless.len() / 2);
        }

        for (a, b) in same_shape(&bvh, &decoded) {
            let (original, decoded_aabb) = (bvh[a].aabb(), decoded[b].aabb());
            assert!(decoded_aabb.contains(original));

            // Each bound is off by at most one quantization step of the decoded parent.
            if let Some(parent) = decoded[b].parent() {
                let parent = decoded[parent].aabb();
                let step = parent.extents() / 65535.0;
                for i in 0..DIM {
                    let tolerance = step[i] + 1.0e-9;
                    assert!(original.mins()[i] - decoded_aabb.mins()[i] <= tolerance);
                    assert!(decoded_aabb.maxs()[i] - original.maxs()[i] <= tolerance);
                }
            }
        }
    }
}

#[test]
fn compact_error_on_a_three_level_tree() {
    let boxes = [
        Aabb::from_bounds(0.3, 0.1, 0.7, 1.9, 2.2, 1.3),
        Aabb::from_bounds(50.123, 0.4, 0.2, 51.7, 1.3, 3.9),
        Aabb::from_bounds(52.01, 0.05, 0.6, 53.333, 3.1, 2.2),
    ];
    let mut bvh = Bvh::new();
    let ids: Vec<_> = (0..3u32).map(|i| bvh.insert(boxes[i as usize], i)).collect();

    // root(a, w(b, c))
    let w = bvh[ids[2]].parent().unwrap();
    assert_eq!(bvh[ids[1]].parent(), Some(w));
    assert_eq!(bvh[w].parent(), Some(bvh.root()));
    assert_eq!(bvh.root_aabb(), Aabb::from_bounds(0.3, 0.05, 0.2, 53.333, 3.1, 3.9));
    assert_eq!(*bvh[w].aabb(), Aabb::from_bounds(50.123, 0.05, 0.2, 53.333, 3.1, 3.9));

    let mut buffer = vec![];
    encode_compact(&bvh, &mut buffer).unwrap();
    let decoded: Bvh<u32> = decode_compact(&mut &buffer[..]).unwrap();
    decoded.assert_well_formed();

    let pairs = same_shape(&bvh, &decoded);
    let decoded_id = |id: NodeId| pairs.iter().find(|p| p.0 == id).unwrap().1;
    assert_eq!(decoded.root_aabb(), bvh.root_aabb());

    let root_step = bvh.root_aabb().extents() / 65535.0;
    let decoded_w = *decoded[decoded_id(w)].aabb();

    for i in 0..DIM {
        // First level: one step of the exact root.
        for id in [ids[0], w] {
            let (original, aabb) = (bvh[id].aabb(), decoded[decoded_id(id)].aabb());
            assert!(original.mins()[i] - aabb.mins()[i] <= root_step[i] + 1.0e-12);
            assert!(aabb.maxs()[i] - original.maxs()[i] <= root_step[i] + 1.0e-12);
        }

        // Second level: one step of the decoded parent, which itself grew by at most one root
        // step on each side.
        let w_step = decoded_w.extents()[i] / 65535.0;
        let w_extent = bvh[w].aabb().extents()[i];
        assert!(w_step <= (w_extent + 2.0 * root_step[i]) / 65535.0 + 1.0e-12);
        for id in [ids[1], ids[2]] {
            let (original, aabb) = (bvh[id].aabb(), decoded[decoded_id(id)].aabb());
            assert!(aabb.contains(original));
            assert!(original.mins()[i] - aabb.mins()[i] <= w_step + 1.0e-12);
            assert!(aabb.maxs()[i] - original.maxs()[i] <= w_step + 1.0e-12);
        }
    }
}

#[test]
fn compact_round_trip_of_a_rebuilt_tree() {
    // Three levels under the root: the error of the deepest leaves accumulates.
    let mut rng = StdRng::seed_from_u64(3);
    let mut bvh = random_tree(&mut rng, 8);
    let mut rebuilder = BottomUpOptimizingRebuilder::new();
    rebuilder.only_if_improving = false;
    let root = bvh.root();
    assert!(rebuilder.rebuild(&mut bvh, root));

    let mut buffer = vec![];
    encode_compact(&bvh, &mut buffer).unwrap();
    let decoded: Bvh<u32> = decode_compact(&mut &buffer[..]).unwrap();

    assert!(bvh.subtree_depth(bvh.root()) >= 4);
    // One step per level, each level being at most slightly larger than the root.
    let depth = bvh.subtree_depth(bvh.root()) as f64;
    let tolerance = depth * 1.01 * bvh.root_aabb().extents().max() / 65535.0;
    for (a, b) in same_shape(&bvh, &decoded) {
        let original = bvh[a].aabb();
        let decoded_aabb = decoded[b].aabb();
        assert!(decoded_aabb.contains(original));
        for (d, o) in decoded_aabb.bounds().iter().zip(original.bounds().iter()) {
            assert!((d - o).abs() <= tolerance);
        }
    }
}

#[test]
fn truncated_inputs_are_io_errors() {
    let mut rng = StdRng::seed_from_u64(4);
    let bvh = random_tree(&mut rng, 10);

    let mut buffer = vec![];
    encode_compact(&bvh, &mut buffer).unwrap();
    for len in [0, 10, 48, 49, buffer.len() - 1] {
        assert!(matches!(
            decode_compact::<u32, _>(&mut &buffer[..len]),
            Err(CodecError::Io(_))
        ));
    }

    buffer.clear();
    encode_lossless(&bvh, &mut buffer).unwrap();
    assert!(matches!(
        decode_lossless::<u32, _>(&mut &buffer[..buffer.len() - 1]),
        Err(CodecError::Io(_))
    ));
}

#[test]
fn deep_trees_round_trip() {
    // Inserting along a line yields a tree as deep as it has leaves.
    let mut bvh = Bvh::new();
    for i in 0..2000u32 {
        let x = i as f64 * 2.0;
        let _ = bvh.insert(Aabb::from_bounds(x, 0.0, 0.0, x + 1.0, 1.0, 1.0), i);
    }
    let payloads = |bvh: &Bvh<u32>| {
        let mut result: Vec<_> = bvh.leaves(|_| true).map(|(_, i)| *i).collect();
        result.sort();
        result
    };

    let mut buffer = vec![];
    encode_lossless(&bvh, &mut buffer).unwrap();
    let decoded: Bvh<u32> = decode_lossless(&mut &buffer[..]).unwrap();
    assert_eq!(decoded.node_count(), bvh.node_count());
    assert_eq!(decoded.root_aabb(), bvh.root_aabb());
    assert_eq!(payloads(&decoded), payloads(&bvh));

    buffer.clear();
    encode_compact(&bvh, &mut buffer).unwrap();
    let decoded: Bvh<u32> = decode_compact(&mut &buffer[..]).unwrap();
    assert_eq!(decoded.node_count(), bvh.node_count());
    assert_eq!(payloads(&decoded), payloads(&bvh));
}
