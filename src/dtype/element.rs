//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::Pod;

/// Trait for host types that can be uploaded into a device buffer
///
/// # Bounds
/// - `Pod` - buffers are written and read back through `bytemuck` casts
/// - `PartialEq + Debug` - test assertions compare whole slices
pub trait Element: Pod + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Addition with the same overflow behavior as WGSL (integers wrap)
    fn accumulate(self, rhs: Self) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }

    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl Element for u32 {
    const DTYPE: DType = DType::U32;

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }

    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_accumulate_wraps() {
        assert_eq!(u32::MAX.accumulate(2), 1);
        assert_eq!(i32::MAX.accumulate(1), i32::MIN);
        assert_eq!(1.5f32.accumulate(2.0), 3.5);
    }
}
