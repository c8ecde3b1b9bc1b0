//! Binary serialization of BVHs.
//!
//! Two formats are provided:
//! - [`lossless`] stores every bound as a big-endian `f64`, and restores the exact same tree
//!   structure and bounds.
//! - [`compact`] stores the root bounds as `f64` and every other bound as a `u16` quantized
//!   into the bounds of its parent. Decoded boxes are slightly larger than the original ones.
//!
//! Leaf payloads are written by a caller-supplied closure, or through the [`BinaryPayload`]
//! trait. Protected flags aren’t serialized.

use crate::bounding_volume::Aabb;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub use self::compact::{
    decode_compact, decode_compact_with, dequantize, encode_compact, encode_compact_with,
    quantize_max, quantize_min,
};
pub use self::lossless::{
    decode_lossless, decode_lossless_with, encode_lossless, encode_lossless_with,
};

pub mod compact;
pub mod lossless;

/// Tag of an empty child slot in the lossless format.
pub const TAG_ABSENT: u8 = 0;
/// Tag of a leaf in the lossless format.
pub const TAG_LEAF: u8 = 1;
/// Tag of an internal node in the lossless format.
pub const TAG_INTERNAL: u8 = 2;

/// Errors that can occur while decoding a BVH.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The underlying reader or writer failed, or the input ended too early.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A node tag of the lossless format isn’t one of the known tags.
    #[error("invalid node tag {0}.")]
    InvalidNodeTag(u8),
    /// A child-presence marker of the compact format has an invalid bit pattern.
    #[error("invalid child marker {0:#06b}.")]
    InvalidMarker(u8),
    /// The root of the tree isn’t tagged as an internal node.
    #[error("the root node must be internal, found tag {0}.")]
    UnexpectedRootTag(u8),
    /// The payload deserializer rejected its input.
    #[error("invalid leaf payload: {0}")]
    Payload(String),
}

/// A leaf payload that can be written to, and read from, a binary stream.
pub trait BinaryPayload: Sized {
    /// Writes `self` to `writer`.
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;
    /// Reads a value written by [`BinaryPayload::serialize`].
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;
}

impl BinaryPayload for () {
    fn serialize<W: Write>(&self, _: &mut W) -> io::Result<()> {
        Ok(())
    }
    fn deserialize<R: Read>(_: &mut R) -> io::Result<Self> {
        Ok(())
    }
}

impl BinaryPayload for u8 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u8> {
        reader.read_u8()
    }
}

impl BinaryPayload for u32 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u32> {
        reader.read_u32::<BigEndian>()
    }
}

impl BinaryPayload for u64 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<BigEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u64> {
        reader.read_u64::<BigEndian>()
    }
}

impl BinaryPayload for i64 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<i64> {
        reader.read_i64::<BigEndian>()
    }
}

impl BinaryPayload for String {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.as_bytes();
        writer.write_u32::<BigEndian>(data.len() as u32)?;
        writer.write_all(data)
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<String> {
        let len = reader.read_u32::<BigEndian>()? as u64;
        let mut result = String::new();
        let read = reader.take(len).read_to_string(&mut result)?;
        if read as u64 != len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(result)
    }
}

pub(crate) fn write_aabb_f64<W: Write>(writer: &mut W, aabb: &Aabb) -> io::Result<()> {
    for bound in aabb.bounds() {
        writer.write_f64::<BigEndian>(bound)?;
    }
    Ok(())
}

pub(crate) fn read_aabb_f64<R: Read>(reader: &mut R) -> io::Result<Aabb> {
    let mut b = [0.0; 6];
    reader.read_f64_into::<BigEndian>(&mut b)?;
    Ok(Aabb::from_bounds(b[0], b[1], b[2], b[3], b[4], b[5]))
}
