//! ThreeFry4x32-20 and the sampler transforms.

use crate::error::{Error, Result};
use crate::random::KEY_WORDS;

const THREEFRY_ROTATION: [[u32; 2]; 8] = [
    [10, 26],
    [11, 21],
    [13, 27],
    [23, 5],
    [6, 20],
    [17, 11],
    [25, 10],
    [18, 20],
];

const THREEFRY_PARITY32: u32 = 0x1BD11BDA;

/// `2^-24`, the spacing of the uniform grid.
const UNIT_SCALE: f32 = 1.0 / 16_777_216.0;

#[inline(always)]
fn threefry_round(x: &mut [u32; 4], ks: &[u32; 5], r: usize) {
    // Inject the key schedule every 4 rounds
    if r.is_multiple_of(4) {
        let d = r / 4;
        x[0] = x[0].wrapping_add(ks[d % 5]);
        x[1] = x[1].wrapping_add(ks[(d + 1) % 5]);
        x[2] = x[2].wrapping_add(ks[(d + 2) % 5]);
        x[3] = x[3].wrapping_add(ks[(d + 3) % 5]).wrapping_add(d as u32);
    }

    let rot = &THREEFRY_ROTATION[r % 8];

    x[0] = x[0].wrapping_add(x[1]);
    x[1] = x[1].rotate_left(rot[0]) ^ x[0];

    x[2] = x[2].wrapping_add(x[3]);
    x[3] = x[3].rotate_left(rot[1]) ^ x[2];

    x.swap(1, 3);
}

/// One ThreeFry4x32-20 block.
pub fn threefry4x32_20(ctr: [u32; 4], key: [u32; 4]) -> [u32; 4] {
    let ks = [
        key[0],
        key[1],
        key[2],
        key[3],
        THREEFRY_PARITY32 ^ key[0] ^ key[1] ^ key[2] ^ key[3],
    ];

    let mut x = ctr;
    for r in 0..20 {
        threefry_round(&mut x, &ks, r);
    }

    x[0] = x[0].wrapping_add(ks[0]);
    x[1] = x[1].wrapping_add(ks[1]);
    x[2] = x[2].wrapping_add(ks[2]);
    x[3] = x[3].wrapping_add(ks[3]).wrapping_add(5);
    x
}

/// The `4 * blocks` words the device generator writes for `key`.
pub fn threefry_words(key: [u32; 4], blocks: usize) -> Vec<u32> {
    (0..blocks)
        .flat_map(|i| threefry4x32_20([i as u32, 0, 0, 0], key))
        .collect()
}

/// The two sub-keys `KeySplitter` derives from `key`.
pub fn split_key(key: [u32; 4]) -> ([u32; 4], [u32; 4]) {
    (
        threefry4x32_20([0, 0, 0, 0], key),
        threefry4x32_20([1, 0, 0, 0], key),
    )
}

/// Top 24 bits of `word` as a float in `[0, 1)`.
#[inline]
pub fn uniform_from_bits(word: u32) -> f32 {
    (word >> 8) as f32 * UNIT_SCALE
}

/// `n` uniforms, bit-identical to the device sampler.
pub fn uniform(key: [u32; 4], n: usize) -> Vec<f32> {
    threefry_words(key, n.div_ceil(KEY_WORDS))
        .into_iter()
        .take(n)
        .map(uniform_from_bits)
        .collect()
}

/// `n` standard normals by Box-Muller over word pairs.
pub fn normal(key: [u32; 4], n: usize) -> Vec<f32> {
    let pairs = n.div_ceil(2);
    let words = threefry_words(key, (2 * pairs).div_ceil(KEY_WORDS));
    let mut out = Vec::with_capacity(2 * pairs);
    for pair in words.chunks_exact(2).take(pairs) {
        let u1 = ((pair[0] >> 8) + 1) as f32 * UNIT_SCALE;
        let u2 = uniform_from_bits(pair[1]);
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f32::consts::TAU * u2;
        out.push(radius * theta.cos());
        out.push(radius * theta.sin());
    }
    out.truncate(n);
    out
}

/// `n` Gumbel-max draws over `log_probs`.
pub fn categorical(key: [u32; 4], log_probs: &[f32], n: usize) -> Vec<u32> {
    let k = log_probs.len();
    if k == 0 {
        return vec![0; n];
    }
    let words = threefry_words(key, (n * k).div_ceil(KEY_WORDS));
    words
        .chunks_exact(k)
        .take(n)
        .map(|draw| {
            let mut best = 0u32;
            let mut best_score = -3.0e38f32;
            for (c, (&w, &lp)) in draw.iter().zip(log_probs).enumerate() {
                let u = uniform_from_bits(w).max(UNIT_SCALE);
                let score = lp - (-u.ln()).ln();
                if score > best_score {
                    best_score = score;
                    best = c as u32;
                }
            }
            best
        })
        .collect()
}

/// Marsaglia-Tsang over four candidate slots per output.
///
/// `uniforms` and `normals` each hold `4n` values; slot group `i` is
/// `4i..4i + 4`.
pub fn gamma_from_streams(
    uniforms: &[f32],
    normals: &[f32],
    shape: f32,
    scale: f32,
) -> Result<Vec<f32>> {
    check_gamma_params(shape, scale)?;
    if uniforms.len() != normals.len() || !uniforms.len().is_multiple_of(4) {
        return Err(Error::invalid_argument(
            "uniforms",
            format!(
                "need two streams of equal length divisible by 4, got {} and {}",
                uniforms.len(),
                normals.len()
            ),
        ));
    }

    let (alpha, candidates) = if shape < 1.0 { (shape + 1.0, 3) } else { (shape, 4) };
    let d = alpha - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    Ok(uniforms
        .chunks_exact(4)
        .zip(normals.chunks_exact(4))
        .map(|(u, x)| {
            let boost = if shape < 1.0 {
                u[3].max(UNIT_SCALE).powf(1.0 / shape)
            } else {
                1.0
            };
            let mut value = d;
            for s in 0..candidates {
                let t = 1.0 + c * x[s];
                if t <= 0.0 {
                    continue;
                }
                let v = t * t * t;
                let us = u[s].max(UNIT_SCALE);
                if us.ln() < 0.5 * x[s] * x[s] + d - d * v + d * v.ln() {
                    value = d * v;
                    break;
                }
            }
            value * boost * scale
        })
        .collect())
}

/// `n` gamma deviates drawn the way the device sampler draws them.
pub fn gamma(key: [u32; 4], n: usize, shape: f32, scale: f32) -> Result<Vec<f32>> {
    let (key_a, key_b) = split_key(key);
    gamma_from_streams(&uniform(key_a, 4 * n), &normal(key_b, 4 * n), shape, scale)
}

fn check_gamma_params(shape: f32, scale: f32) -> Result<()> {
    if !(shape.is_finite() && shape > 0.0) {
        return Err(Error::invalid_argument(
            "shape",
            format!("must be finite and positive, got {shape}"),
        ));
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::invalid_argument(
            "scale",
            format!("must be finite and positive, got {scale}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known-answer vectors from the Random123 distribution (kat_vectors)
    #[test]
    fn test_threefry_known_answers() {
        assert_eq!(
            threefry4x32_20([0; 4], [0; 4]),
            [0x9c6ca96a, 0xe17eae66, 0xfc10ecd4, 0x5256a7d8]
        );
        assert_eq!(
            threefry4x32_20([u32::MAX; 4], [u32::MAX; 4]),
            [0x2a881696, 0x57012287, 0xf6c7446e, 0xa16a6732]
        );
        assert_eq!(
            threefry4x32_20(
                [0x243f6a88, 0x85a308d3, 0x13198a2e, 0x03707344],
                [0xa4093822, 0x299f31d0, 0x082efa98, 0xec4e6c89]
            ),
            [0x59cd1dbb, 0xb8879579, 0x86b5d00c, 0xac8b6d84]
        );
    }

    #[test]
    fn test_words_follow_block_counter() {
        let key = [1, 2, 3, 4];
        let words = threefry_words(key, 3);
        assert_eq!(words.len(), 12);
        assert_eq!(&words[8..], &threefry4x32_20([2, 0, 0, 0], key));
        let (a, b) = split_key(key);
        assert_eq!(&words[..4], &a);
        assert_eq!(&words[4..8], &b);
    }

    #[test]
    fn test_uniform_bounds() {
        assert_eq!(uniform_from_bits(0), 0.0);
        assert!(uniform_from_bits(u32::MAX) < 1.0);
        assert_eq!(uniform_from_bits(0x8000_0000), 0.5);
        let u = uniform([7, 0, 0, 0], 10);
        assert_eq!(u.len(), 10);
        assert!(u.iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_normal_odd_length_is_prefix() {
        let key = [9, 9, 9, 9];
        let five = normal(key, 5);
        let six = normal(key, 6);
        assert_eq!(five.len(), 5);
        assert_eq!(&six[..5], &five[..]);
        assert!(six.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_categorical_prefers_heavy_category() {
        let labels = categorical([3, 1, 4, 1], &[0.0, -1000.0, -1000.0], 200);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_gamma_mean_matches_shape_times_scale() {
        for (shape, scale) in [(0.5f32, 2.0f32), (3.0, 1.0)] {
            let n = 20_000;
            let samples = gamma([11, 22, 33, 44], n, shape, scale).unwrap();
            assert!(samples.iter().all(|&v| v >= 0.0 && v.is_finite()));
            let mean = samples.iter().sum::<f32>() / n as f32;
            let expected = shape * scale;
            assert!((mean - expected).abs() < 0.05 * expected + 0.02, "{mean} vs {expected}");
        }
    }

    #[test]
    fn test_gamma_rejects_bad_params() {
        assert!(gamma([0; 4], 4, 0.0, 1.0).is_err());
        assert!(gamma_from_streams(&[0.5; 4], &[0.0; 8], 1.0, 1.0).is_err());
    }
}
