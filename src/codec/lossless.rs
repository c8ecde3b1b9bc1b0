//! Lossless binary format.
//!
//! Every node is written in depth-first pre-order as a tag byte ([`TAG_LEAF`] or
//! [`TAG_INTERNAL`]) followed by its six bounds as big-endian `f64`. A leaf is then followed by
//! its payload, and an internal node by its left then right child, where an empty slot is a
//! single [`TAG_ABSENT`] byte.

use super::{read_aabb_f64, write_aabb_f64, BinaryPayload, CodecError};
use super::{TAG_ABSENT, TAG_INTERNAL, TAG_LEAF};
use crate::partitioning::{Bvh, BvhNodeKind, NodeId};
use byteorder::{ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::io::{Read, Write};

/// Writes `bvh` in the lossless format, with [`BinaryPayload`] leaf payloads.
pub fn encode_lossless<T: BinaryPayload, W: Write>(
    bvh: &Bvh<T>,
    writer: &mut W,
) -> Result<(), CodecError> {
    encode_lossless_with(bvh, writer, |w, payload| payload.serialize(w))
}

/// Writes `bvh` in the lossless format, using `write_payload` to write leaf payloads.
pub fn encode_lossless_with<T, W: Write>(
    bvh: &Bvh<T>,
    writer: &mut W,
    mut write_payload: impl FnMut(&mut W, &T) -> std::io::Result<()>,
) -> Result<(), CodecError> {
    // `None` stands for an empty child slot.
    let mut stack: SmallVec<[Option<NodeId>; 32]> = SmallVec::new();
    stack.push(Some(bvh.root()));

    while let Some(entry) = stack.pop() {
        let Some(id) = entry else {
            writer.write_u8(TAG_ABSENT)?;
            continue;
        };

        let node = &bvh[id];
        match node.kind() {
            BvhNodeKind::Leaf(payload) => {
                writer.write_u8(TAG_LEAF)?;
                write_aabb_f64(writer, node.aabb())?;
                write_payload(writer, payload)?;
            }
            BvhNodeKind::Internal { left, right } => {
                writer.write_u8(TAG_INTERNAL)?;
                write_aabb_f64(writer, node.aabb())?;
                stack.push(*right);
                stack.push(*left);
            }
        }
    }

    Ok(())
}

/// Reads a tree written by [`encode_lossless`].
pub fn decode_lossless<T: BinaryPayload, R: Read>(reader: &mut R) -> Result<Bvh<T>, CodecError> {
    decode_lossless_with(reader, |r| Ok(T::deserialize(r)?))
}

/// Reads a tree written in the lossless format, using `read_payload` to read leaf payloads.
///
/// The decoded tree has the same structure and bounds as the encoded one, but its nodes may
/// have different ids. The input may be arbitrarily deep: decoding doesn’t recurse.
pub fn decode_lossless_with<T, R: Read>(
    reader: &mut R,
    mut read_payload: impl FnMut(&mut R) -> Result<T, CodecError>,
) -> Result<Bvh<T>, CodecError> {
    let tag = reader.read_u8()?;
    if tag != TAG_INTERNAL {
        return Err(CodecError::UnexpectedRootTag(tag));
    }

    let mut bvh = Bvh::new();
    let root = bvh.root();
    let aabb = read_aabb_f64(reader)?;
    bvh.set_node_aabb(root, aabb);

    // The child slots left to read, as `(parent, slot)`.
    let mut stack: SmallVec<[(NodeId, usize); 32]> = SmallVec::new();
    stack.push((root, 1));
    stack.push((root, 0));

    while let Some((parent, slot)) = stack.pop() {
        let child = match reader.read_u8()? {
            TAG_ABSENT => continue,
            TAG_LEAF => {
                let aabb = read_aabb_f64(reader)?;
                let payload = read_payload(reader)?;
                bvh.create_leaf(aabb, payload)
            }
            TAG_INTERNAL => {
                let aabb = read_aabb_f64(reader)?;
                let id = bvh.create_internal(aabb);
                stack.push((id, 1));
                stack.push((id, 0));
                id
            }
            tag => return Err(CodecError::InvalidNodeTag(tag)),
        };

        bvh.link_child(parent, slot, child);
    }

    Ok(bvh)
}

#[cfg(test)]
mod test {
    use super::{decode_lossless, encode_lossless};
    use crate::bounding_volume::Aabb;
    use crate::codec::CodecError;
    use crate::partitioning::Bvh;

    #[test]
    fn exact_layout_of_a_small_tree() {
        let mut bvh = Bvh::new();
        let _ = bvh.insert(Aabb::from_bounds(0.0, 0.0, 0.0, 1.0, 1.0, 1.0), 7u32);

        let mut buffer = vec![];
        encode_lossless(&bvh, &mut buffer).unwrap();

        // root: tag + bounds, leaf: tag + bounds + payload, absent right slot.
        assert_eq!(buffer.len(), (1 + 48) + (1 + 48 + 4) + 1);
        assert_eq!(buffer[0], 2);
        assert_eq!(buffer[49], 1);
        assert_eq!(&buffer[98..102], &[0, 0, 0, 7]);
        assert_eq!(buffer[102], 0);

        let decoded: Bvh<u32> = decode_lossless(&mut &buffer[..]).unwrap();
        assert_eq!(decoded.leaf_count(), 1);
        assert_eq!(decoded.root_aabb(), bvh.root_aabb());
        decoded.assert_well_formed();
    }

    #[test]
    fn corrupted_inputs() {
        let leaf_root = [1u8; 49];
        assert!(matches!(
            decode_lossless::<u32, _>(&mut &leaf_root[..]),
            Err(CodecError::UnexpectedRootTag(1))
        ));

        let mut buffer = vec![2u8];
        buffer.extend_from_slice(&[0; 48]);
        buffer.push(5);
        assert!(matches!(
            decode_lossless::<u32, _>(&mut &buffer[..]),
            Err(CodecError::InvalidNodeTag(5))
        ));

        assert!(matches!(
            decode_lossless::<u32, _>(&mut &buffer[..20]),
            Err(CodecError::Io(_))
        ));
    }

    #[test]
    fn deeply_nested_truncated_input() {
        // A chain of internal nodes that ends abruptly.
        let mut buffer = vec![];
        for _ in 0..200_000 {
            buffer.push(2u8);
            buffer.extend_from_slice(&[0; 48]);
        }

        assert!(matches!(
            decode_lossless::<u32, _>(&mut &buffer[..]),
            Err(CodecError::Io(_))
        ));
    }
}
