//! Various unsorted geometrical and logical operators.

pub use self::morton::{morton_encode_point, morton_encode_u64};

pub mod morton;
