//! Host reference kernels
//!
//! Sequential implementations of every device kernel with the same memory
//! layouts. ThreeFry and the uniform mapping are bit-identical to the
//! device; float sums differ only by reassociation.
//!
//! These are used to validate device output and are the slow path for
//! callers without an adapter.

mod layout;
mod random;
mod reduce;

pub use layout::{closest, kmeans_step, matvec, scale_shift, transpose};
pub use random::{
    categorical, gamma, gamma_from_streams, normal, split_key, threefry4x32_20, threefry_words,
    uniform, uniform_from_bits,
};
pub use reduce::{count, segment_sum, segment_sum_2d, sum_2d, sum_3d, validate_segment_ids};

use crate::error::{Error, Result};

/// Reject a host slice whose length differs from the bound dimensions.
fn check_len(
    kernel: &'static str,
    buffer: &'static str,
    got: usize,
    expected: usize,
) -> Result<()> {
    if got != expected {
        return Err(Error::BufferSize {
            kernel,
            buffer,
            expected,
            got,
        });
    }
    Ok(())
}
