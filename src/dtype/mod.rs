//! Data type system for device buffers
//!
//! Every buffer the kernels touch is a flat array of 32-bit elements. `DType`
//! records which interpretation a buffer carries so that `setup` can reject a
//! `u32` label array passed where `f32` samples are expected.

mod element;

pub use element::Element;

use std::fmt;

/// Element types supported by the compute kernels
///
/// WGSL has no 64-bit or 8-bit storage types without extensions, so the set
/// is limited to the three 32-bit scalar types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 32-bit floating point
    F32 = 1,
    /// 32-bit signed integer
    I32 = 11,
    /// 32-bit unsigned integer (segment ids, labels, random words)
    U32 = 21,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        4
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    /// Returns true if this is an integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I32 | Self::U32)
    }

    /// Short lowercase name, matching the WGSL scalar type
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
