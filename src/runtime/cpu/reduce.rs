//! Sequential sums.

use super::check_len;
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Column sums of an `(M, N)` tensor stored at `n * M + m`.
pub fn sum_2d<T: Element>(input: &[T], m: usize, n: usize) -> Result<Vec<T>> {
    sum_3d(input, m, n, 1)
}

/// Leading-axis sums of an `(M, N, K)` tensor stored at `(n * K + k) * M + m`.
pub fn sum_3d<T: Element>(input: &[T], m: usize, n: usize, k: usize) -> Result<Vec<T>> {
    check_len("sum_3d", "input", input.len(), m * n * k)?;
    if m == 0 {
        return Ok(vec![T::zero(); n * k]);
    }
    Ok(input
        .chunks_exact(m)
        .map(|row| row.iter().fold(T::zero(), |acc, &v| acc.accumulate(v)))
        .collect())
}

/// Per-segment sums of `data`. Ids outside `[0, K)` are dropped, matching
/// the device scatter.
pub fn segment_sum<T: Element>(
    data: &[T],
    segment_ids: &[u32],
    num_segments: usize,
) -> Result<Vec<T>> {
    segment_sum_2d(data, segment_ids, 1, num_segments)
}

/// Per-segment sums of feature-major `(N, M)` data into `(N, K)`.
pub fn segment_sum_2d<T: Element>(
    data: &[T],
    segment_ids: &[u32],
    n: usize,
    num_segments: usize,
) -> Result<Vec<T>> {
    let m = segment_ids.len();
    check_len("segment_sum_2d", "data", data.len(), n * m)?;
    let mut out = vec![T::zero(); n * num_segments];
    if num_segments == 0 {
        return Ok(out);
    }
    for (col, row) in out.chunks_exact_mut(num_segments).enumerate() {
        let values = &data[col * m..(col + 1) * m];
        for (&id, &v) in segment_ids.iter().zip(values) {
            if let Some(slot) = row.get_mut(id as usize) {
                *slot = slot.accumulate(v);
            }
        }
    }
    Ok(out)
}

/// Occurrences of each segment id.
pub fn count<T: Element>(segment_ids: &[u32], num_segments: usize) -> Result<Vec<T>> {
    let ones = vec![T::one(); segment_ids.len()];
    segment_sum(&ones, segment_ids, num_segments)
}

/// Check that every id lies in `[0, num_segments)`.
///
/// The device kernels never look; call this before upload when ids come
/// from an untrusted source.
pub fn validate_segment_ids(segment_ids: &[u32], num_segments: usize) -> Result<()> {
    match segment_ids
        .iter()
        .position(|&id| id as usize >= num_segments)
    {
        Some(i) => Err(Error::invalid_argument(
            "segment_ids",
            format!(
                "id {} at index {i} is outside [0, {num_segments})",
                segment_ids[i]
            ),
        )),
        None => Ok(()),
    }
}
