//! Morton encoding of 3D points.

// From https://github.com/DGriffin91/obvhs/tree/main/src/ploc/morton.rs
// MIT/Apache 2 license.

use crate::math::{Point, Real};

//---------------------------------------------------
// --- 21 bit resolution per channel morton curve ---
//---------------------------------------------------

#[inline]
fn split_by_3_u64(a: u32) -> u64 {
    let mut x = a as u64 & 0x1fffff; // we only look at the first 21 bits
    x = (x | x << 32) & 0x1f00000000ffff;
    x = (x | x << 16) & 0x1f0000ff0000ff;
    x = (x | x << 8) & 0x100f00f00f00f00f;
    x = (x | x << 4) & 0x10c30c30c30c30c3;
    x = (x | x << 2) & 0x1249249249249249;
    x
}

/// Encode x,y,z position into a u64 morton value.
///
/// Only the 21 lowest bits of each coordinate are used.
#[inline]
pub fn morton_encode_u64(x: u32, y: u32, z: u32) -> u64 {
    split_by_3_u64(x) | split_by_3_u64(y) << 1 | split_by_3_u64(z) << 2
}

/// Maps a float to an unsigned integer with the same ordering.
///
/// Negative values get all their bits flipped and positive values get their sign bit set, so
/// comparing the results as integers is the same as comparing the floats (NaN aside).
#[inline]
fn order_preserving_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Encode an arbitrary 3D point into a u64 morton value.
///
/// Each coordinate is rounded to `f32` and mapped to an order-preserving integer, from which the
/// 21 most significant bits are interleaved. This doesn't need any scene bounds, so the
/// resulting code stays valid as the scene grows: close points share long code prefixes, and
/// sorting by code groups points along a Z-order curve.
#[inline]
pub fn morton_encode_point(pt: &Point<Real>) -> u64 {
    let quantize = |v: Real| order_preserving_bits(v as f32) >> 11;
    morton_encode_u64(quantize(pt.x), quantize(pt.y), quantize(pt.z))
}
