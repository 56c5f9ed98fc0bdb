//! The kernel object contract shared by every operation.
//!
//! A kernel binds its dimensions at construction, validates buffers and
//! builds its pipelines in `setup`, and then records the same dispatches on
//! every `encode`. `setup` signatures differ per kernel (they take the
//! buffers the kernel reads and writes), so only the recording half lives in
//! the [`Kernel`] trait.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::wgpu::GpuBuffer;

/// Threads per block used when no [`KernelConfig`] is given.
pub const DEFAULT_THREADS_PER_BLOCK: u32 = 32;

/// Upper bound on threads per block; the WebGPU default for
/// `max_compute_invocations_per_workgroup`.
pub const MAX_THREADS_PER_BLOCK: u32 = 256;

/// A set-up compute kernel that can be recorded into a compute pass.
pub trait Kernel {
    /// Human-readable kernel name, used in errors and logs.
    fn label(&self) -> &'static str;

    /// Whether `setup` has completed.
    fn is_setup(&self) -> bool;

    /// Record this kernel's dispatches, in dependency order.
    ///
    /// Pure command recording: never allocates and never waits. Returns
    /// [`Error::NotSetUp`] if called before `setup`.
    fn encode(&self, pass: &mut wgpu::ComputePass<'_>) -> Result<()>;
}

/// Construction-time launch configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    threads_per_block: u32,
}

impl KernelConfig {
    /// Configuration with `threads_per_block` lanes per workgroup.
    ///
    /// Must be a power of two in `[2, 256]`: the shared-memory tree
    /// reductions halve the active lanes each step.
    pub fn new(threads_per_block: u32) -> Result<Self> {
        if !(2..=MAX_THREADS_PER_BLOCK).contains(&threads_per_block)
            || !threads_per_block.is_power_of_two()
        {
            return Err(Error::invalid_argument(
                "threads_per_block",
                format!(
                    "must be a power of two in [2, {MAX_THREADS_PER_BLOCK}], got {threads_per_block}"
                ),
            ));
        }
        Ok(Self { threads_per_block })
    }

    /// Lanes per workgroup.
    #[inline]
    pub fn threads_per_block(&self) -> u32 {
        self.threads_per_block
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            threads_per_block: DEFAULT_THREADS_PER_BLOCK,
        }
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Reject zero dimensions and dimensions that overflow a `u32` uniform.
pub(crate) fn dim(arg: &'static str, value: usize) -> Result<u32> {
    if value == 0 {
        return Err(Error::invalid_argument(arg, "must be at least 1"));
    }
    u32::try_from(value)
        .map_err(|_| Error::invalid_argument(arg, format!("{value} does not fit in u32")))
}

/// Element count of a product of dimensions, checked against `u32` indexing.
pub(crate) fn extent(arg: &'static str, dims: &[usize]) -> Result<usize> {
    let total = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::invalid_argument(arg, "element count overflows usize"))?;
    dim(arg, total)?;
    Ok(total)
}

/// Check a buffer's dtype and logical length.
pub(crate) fn expect_buffer(
    kernel: &'static str,
    buffer: &'static str,
    actual: &GpuBuffer,
    dtype: DType,
    len: usize,
) -> Result<()> {
    expect_dtype(kernel, buffer, actual, &[dtype])?;
    expect_len(kernel, buffer, actual, len)
}

/// Check a buffer's dtype against an accepted set.
pub(crate) fn expect_dtype(
    kernel: &'static str,
    buffer: &'static str,
    actual: &GpuBuffer,
    accepted: &[DType],
) -> Result<()> {
    if accepted.contains(&actual.dtype()) {
        return Ok(());
    }
    let expected = accepted
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(Error::DTypeMismatch {
        kernel,
        buffer,
        expected,
        got: actual.dtype(),
    })
}

/// Check a buffer's logical length.
pub(crate) fn expect_len(
    kernel: &'static str,
    buffer: &'static str,
    actual: &GpuBuffer,
    len: usize,
) -> Result<()> {
    if actual.len() != len {
        return Err(Error::BufferSize {
            kernel,
            buffer,
            expected: len,
            got: actual.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_config_validation() {
        assert_eq!(KernelConfig::default().threads_per_block(), 32);
        assert_eq!(KernelConfig::new(256).unwrap().threads_per_block(), 256);
        assert!(KernelConfig::new(0).is_err());
        assert!(KernelConfig::new(1).is_err());
        assert!(KernelConfig::new(48).is_err());
        assert!(KernelConfig::new(512).is_err());
    }

    #[test]
    fn test_dim_rejects_zero_and_overflow() {
        assert_eq!(dim("m", 7).unwrap(), 7);
        assert!(matches!(dim("m", 0), Err(Error::InvalidArgument { arg: "m", .. })));
        assert!(dim("m", u32::MAX as usize + 1).is_err());
    }

    #[test]
    fn test_extent_multiplies_dims() {
        assert_eq!(extent("shape", &[3, 4, 5]).unwrap(), 60);
        assert!(extent("shape", &[3, 0]).is_err());
        assert!(extent("shape", &[1 << 20, 1 << 20]).is_err());
    }
}
