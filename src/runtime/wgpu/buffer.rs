//! Typed device buffers.

use crate::dtype::DType;

/// A flat device buffer of 32-bit elements.
///
/// Carries the logical element count and element type alongside the wgpu
/// handle so that kernels can validate what they are given at `setup`.
/// Zero-length buffers still occupy one element on the device because
/// WebGPU forbids binding empty ranges.
///
/// Dropping a `GpuBuffer` destroys the device allocation immediately. A
/// kernel set up against a buffer must not be encoded after that buffer has
/// been dropped.
pub struct GpuBuffer {
    pub(crate) raw: wgpu::Buffer,
    len: usize,
    dtype: DType,
}

impl GpuBuffer {
    pub(crate) fn new(raw: wgpu::Buffer, len: usize, dtype: DType) -> Self {
        Self { raw, len, dtype }
    }

    /// Number of logical elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no logical elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Logical size in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> u64 {
        (self.len * self.dtype.size_in_bytes()) as u64
    }

    /// Underlying wgpu buffer, for callers recording their own passes.
    #[inline]
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.raw.destroy();
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("len", &self.len)
            .field("dtype", &self.dtype)
            .finish_non_exhaustive()
    }
}

/// Byte size to request from wgpu for `len` elements.
#[inline]
pub(crate) fn device_size(len: usize, dtype: DType) -> u64 {
    (len.max(1) * dtype.size_in_bytes()) as u64
}
