//! Layout permutations, broadcasts and nearest-neighbour search.

use super::check_len;
use super::reduce::{count, segment_sum_2d};
use crate::dtype::Element;
use crate::error::Result;
use crate::ops::BinaryOp;

/// `(M, N)` row-major into `(N, M)` row-major.
pub fn transpose<T: Element>(input: &[T], m: usize, n: usize) -> Result<Vec<T>> {
    check_len("transpose", "input", input.len(), m * n)?;
    let mut out = Vec::with_capacity(m * n);
    for j in 0..n {
        out.extend((0..m).map(|i| input[i * n + j]));
    }
    Ok(out)
}

/// `out[i * N + j] = op(matrix[i * N + j], vector[i])`.
pub fn matvec(matrix: &[f32], vector: &[f32], n: usize, op: BinaryOp) -> Result<Vec<f32>> {
    let m = vector.len();
    check_len("matvec", "matrix", matrix.len(), m * n)?;
    Ok(matrix
        .iter()
        .enumerate()
        .map(|(idx, &a)| {
            let b = vector[idx / n];
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
            }
        })
        .collect())
}

/// In place `data[j * M1 + i] = data[j * M1 + i] * scale[j * K + a] + shift[j * K + a]`
/// with `a = assignments[i]`. Points with `a >= K` are left unchanged.
pub fn scale_shift(
    assignments: &[u32],
    scale: &[f32],
    shift: &[f32],
    data: &mut [f32],
    k: usize,
) -> Result<()> {
    let m1 = assignments.len();
    if m1 == 0 {
        return Ok(());
    }
    let m2 = data.len() / m1;
    check_len("scale_shift", "data", data.len(), m1 * m2)?;
    check_len("scale_shift", "scale", scale.len(), m2 * k)?;
    check_len("scale_shift", "shift", shift.len(), m2 * k)?;
    for (j, row) in data.chunks_exact_mut(m1).enumerate() {
        for (v, &a) in row.iter_mut().zip(assignments) {
            if a as usize >= k {
                continue;
            }
            let p = j * k + a as usize;
            *v = *v * scale[p] + shift[p];
        }
    }
    Ok(())
}

/// Index of the nearest reference point for each query point.
///
/// Both point sets are feature-major. The first minimum wins and a NaN
/// distance never does.
pub fn closest(queries: &[f32], references: &[f32], k: usize) -> Result<Vec<u32>> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let m1 = queries.len() / k;
    let m2 = references.len() / k;
    check_len("closest", "queries", queries.len(), m1 * k)?;
    check_len("closest", "references", references.len(), m2 * k)?;
    Ok((0..m1)
        .map(|i| {
            let mut best = 0u32;
            let mut best_distance = f32::MAX;
            let mut found = false;
            for j in 0..m2 {
                let mut dist2 = 0.0f32;
                for l in 0..k {
                    let d = queries[l * m1 + i] - references[l * m2 + j];
                    dist2 += d * d;
                }
                if dist2 < best_distance || (!found && dist2 == best_distance) {
                    best_distance = dist2;
                    best = j as u32;
                    found = true;
                }
            }
            best
        })
        .collect())
}

/// One Lloyd iteration over feature-major `(N, M)` data.
///
/// Returns the `(N, K)` centroids of the current labelling and the labels
/// of their nearest centroids. Empty clusters give NaN centroids.
pub fn kmeans_step(
    data: &[f32],
    assignments: &[u32],
    n: usize,
    k: usize,
) -> Result<(Vec<f32>, Vec<u32>)> {
    let sums = segment_sum_2d(data, assignments, n, k)?;
    let counts = count::<f32>(assignments, k)?;
    let mut centroids = sums;
    for row in centroids.chunks_exact_mut(k.max(1)) {
        for (c, &total) in row.iter_mut().zip(&counts) {
            *c /= total;
        }
    }
    let labels = closest(data, &centroids, n)?;
    Ok((centroids, labels))
}
