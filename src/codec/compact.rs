//! Compact, lossy, binary format.
//!
//! The root bounds are written as six big-endian `f64`, followed by the child marker of the
//! root. Every other node is written in depth-first pre-order as six big-endian `u16`: each
//! bound is quantized into the interval of its parent’s (decoded) bounds along the same axis.
//! A leaf is then followed by its payload, and an internal node by its child marker and its
//! children.
//!
//! The child marker of an internal node packs the type of its left child in bits 0 and 1, and
//! the type of its right child in bits 2 and 3: `00` for an empty slot, `10` for a leaf, and
//! `11` for an internal node.
//!
//! Quantization rounds the minimum bounds down and the maximum bounds up, so every decoded box
//! contains the original one, and lies inside its decoded parent. The error on each bound is
//! at most one quantization step, i.e., the extent of the decoded parent divided by 65535.
//! Since the parent itself was enlarged, the error grows with the depth.
//!
//! Decoding is the plain inverse affine map, so any stream following this layout can be read.
//! However, an encoder rounding every bound to the nearest step writes values differing by one
//! unit from the ones written here, and its decoded boxes don’t always contain the original
//! ones.

use super::{read_aabb_f64, write_aabb_f64, BinaryPayload, CodecError};
use crate::bounding_volume::Aabb;
use crate::math::{Real, DIM};
use crate::partitioning::{Bvh, BvhNodeKind, NodeId};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::io::{self, Read, Write};

const QUANTIZATION_RANGE: Real = u16::MAX as Real;

const MARKER_ABSENT: u8 = 0b00;
const MARKER_LEAF: u8 = 0b10;
const MARKER_INTERNAL: u8 = 0b11;

fn quantization_scale(min: Real, max: Real) -> Option<Real> {
    let extent = max - min;
    (extent > 0.0 && extent.is_finite()).then(|| QUANTIZATION_RANGE / extent)
}

/// Quantizes a lower bound into `[min, max]`, rounding down.
///
/// Returns `0` if the interval is empty or infinite.
pub fn quantize_min(value: Real, min: Real, max: Real) -> u16 {
    match quantization_scale(min, max) {
        Some(scale) => {
            let q = ((value - min) * scale).floor().clamp(0.0, QUANTIZATION_RANGE) as u16;
            // Compensate rounding errors of the decoder.
            if q > 0 && dequantize(q, min, max) > value {
                q - 1
            } else {
                q
            }
        }
        None => 0,
    }
}

/// Quantizes an upper bound into `[min, max]`, rounding up.
///
/// Returns `u16::MAX` if the interval is empty or infinite.
pub fn quantize_max(value: Real, min: Real, max: Real) -> u16 {
    match quantization_scale(min, max) {
        Some(scale) => {
            let q = ((value - min) * scale).ceil().clamp(0.0, QUANTIZATION_RANGE) as u16;
            if q < u16::MAX && dequantize(q, min, max) < value {
                q + 1
            } else {
                q
            }
        }
        None => u16::MAX,
    }
}

/// Maps a quantized value back into `[min, max]`.
pub fn dequantize(quantized: u16, min: Real, max: Real) -> Real {
    match quantization_scale(min, max) {
        Some(_) if quantized == u16::MAX => max,
        Some(_) => (min + quantized as Real / QUANTIZATION_RANGE * (max - min)).min(max),
        None => min,
    }
}

fn quantize_aabb(aabb: &Aabb, base: &Aabb) -> [u16; 6] {
    let (mins, maxs) = (aabb.mins(), aabb.maxs());
    let (bmins, bmaxs) = (base.mins(), base.maxs());
    let mut result = [0; 6];

    for i in 0..DIM {
        result[i] = quantize_min(mins[i], bmins[i], bmaxs[i]);
        result[i + DIM] = quantize_max(maxs[i], bmins[i], bmaxs[i]);
    }

    result
}

fn dequantize_aabb(quantized: &[u16; 6], base: &Aabb) -> Aabb {
    let (bmins, bmaxs) = (base.mins(), base.maxs());
    let (mut mins, mut maxs) = (bmins, bmaxs);

    for i in 0..DIM {
        mins[i] = dequantize(quantized[i], bmins[i], bmaxs[i]);
        maxs[i] = dequantize(quantized[i + DIM], bmins[i], bmaxs[i]);
    }

    Aabb::new(mins, maxs)
}

fn marker_of<T>(bvh: &Bvh<T>, child: Option<NodeId>) -> u8 {
    match child {
        None => MARKER_ABSENT,
        Some(id) if bvh[id].is_leaf() => MARKER_LEAF,
        Some(_) => MARKER_INTERNAL,
    }
}

/// Writes `bvh` in the compact format, with [`BinaryPayload`] leaf payloads.
pub fn encode_compact<T: BinaryPayload, W: Write>(
    bvh: &Bvh<T>,
    writer: &mut W,
) -> Result<(), CodecError> {
    encode_compact_with(bvh, writer, |w, payload| payload.serialize(w))
}

/// Writes `bvh` in the compact format, using `write_payload` to write leaf payloads.
pub fn encode_compact_with<T, W: Write>(
    bvh: &Bvh<T>,
    writer: &mut W,
    mut write_payload: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> Result<(), CodecError> {
    let root = bvh.root();
    let root_aabb = *bvh[root].aabb();
    write_aabb_f64(writer, &root_aabb)?;

    // The nodes left to write, with the bounds the decoder will see for their parent.
    let mut stack: SmallVec<[(NodeId, Aabb); 32]> = SmallVec::new();
    write_marker(bvh, root, &root_aabb, writer, &mut stack)?;

    while let Some((id, decoded_parent)) = stack.pop() {
        let node = &bvh[id];
        let quantized = quantize_aabb(node.aabb(), &decoded_parent);
        for q in quantized {
            writer.write_u16::<BigEndian>(q)?;
        }

        match node.kind() {
            BvhNodeKind::Leaf(payload) => write_payload(writer, payload)?,
            BvhNodeKind::Internal { .. } => {
                // Children are quantized relative to what the decoder will see.
                let decoded = dequantize_aabb(&quantized, &decoded_parent);
                write_marker(bvh, id, &decoded, writer, &mut stack)?;
            }
        }
    }

    Ok(())
}

// Writes the child marker of `parent`, and schedules its children, left one first.
fn write_marker<T, W: Write>(
    bvh: &Bvh<T>,
    parent: NodeId,
    decoded_parent: &Aabb,
    writer: &mut W,
    stack: &mut SmallVec<[(NodeId, Aabb); 32]>,
) -> io::Result<()> {
    let [left, right] = bvh[parent].children();
    writer.write_u8(marker_of(bvh, left) | (marker_of(bvh, right) << 2))?;

    for child in [right, left].into_iter().flatten() {
        stack.push((child, *decoded_parent));
    }

    Ok(())
}

/// Reads a tree written by [`encode_compact`].
pub fn decode_compact<T: BinaryPayload, R: Read>(reader: &mut R) -> Result<Bvh<T>, CodecError> {
    decode_compact_with(reader, |r| Ok(T::deserialize(r)?))
}

/// A child slot left to decode.
struct PendingChild {
    parent: NodeId,
    slot: usize,
    kind: u8,
    decoded_parent: Aabb,
}

/// Reads a tree written in the compact format, using `read_payload` to read leaf payloads.
///
/// The decoded tree has the same structure as the encoded one, but its bounds (except the
/// root’s) are slightly enlarged. The input may be arbitrarily deep: decoding doesn’t recurse.
pub fn decode_compact_with<T, R: Read>(
    reader: &mut R,
    mut read_payload: impl FnMut(&mut R) -> Result<T, CodecError>,
) -> Result<Bvh<T>, CodecError> {
    let mut bvh = Bvh::new();
    let root = bvh.root();
    let aabb = read_aabb_f64(reader)?;
    bvh.set_node_aabb(root, aabb);

    let mut stack: SmallVec<[PendingChild; 32]> = SmallVec::new();
    read_marker(root, &aabb, reader, &mut stack)?;

    while let Some(pending) = stack.pop() {
        let mut quantized = [0; 6];
        reader.read_u16_into::<BigEndian>(&mut quantized)?;
        let aabb = dequantize_aabb(&quantized, &pending.decoded_parent);

        let child = if pending.kind == MARKER_LEAF {
            let payload = read_payload(reader)?;
            bvh.create_leaf(aabb, payload)
        } else {
            let id = bvh.create_internal(aabb);
            read_marker(id, &aabb, reader, &mut stack)?;
            id
        };

        bvh.link_child(pending.parent, pending.slot, child);
    }

    Ok(bvh)
}

// Reads the child marker of `parent`, and schedules its children, left one first.
fn read_marker<R: Read>(
    parent: NodeId,
    decoded_parent: &Aabb,
    reader: &mut R,
    stack: &mut SmallVec<[PendingChild; 32]>,
) -> Result<(), CodecError> {
    let marker = reader.read_u8()?;
    if marker & 0xf0 != 0 {
        return Err(CodecError::InvalidMarker(marker));
    }

    for slot in [1, 0] {
        let kind = (marker >> (slot * 2)) & 0b11;
        match kind {
            MARKER_ABSENT => {}
            MARKER_LEAF | MARKER_INTERNAL => stack.push(PendingChild {
                parent,
                slot,
                kind,
                decoded_parent: *decoded_parent,
            }),
            _ => return Err(CodecError::InvalidMarker(marker)),
        }
    }

    Ok(())
}
