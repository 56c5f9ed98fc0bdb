//! Common test utilities
#![allow(dead_code)]

use std::sync::Once;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use wgstat::kernel::Kernel;
use wgstat::runtime::wgpu::{WgpuClient, default_client, is_wgpu_available};

static TRACING: Once = Once::new();

/// Install a fmt subscriber once per test binary; `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Create a WebGPU client, returning None if no adapter is available
pub fn create_wgpu_client() -> Option<WgpuClient> {
    init_tracing();
    if !is_wgpu_available() {
        println!("No WebGPU adapter available, skipping test");
        return None;
    }
    default_client().ok()
}

/// Record one kernel in its own submission and wait.
pub fn run(client: &WgpuClient, kernel: &dyn Kernel) {
    client.run(kernel.label(), &[kernel]).unwrap();
}

/// Deterministic uniform data in `[lo, hi)`.
pub fn random_f32(seed: u64, n: usize, lo: f32, hi: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

/// Deterministic ids in `[0, k)`.
pub fn random_ids(seed: u64, n: usize, k: u32) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(0..k)).collect()
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Fraction of `values` falling in each of `edges.len() - 1` half-open bins.
pub fn bin_fractions(values: &[f32], edges: &[f32]) -> Vec<f64> {
    let mut counts = vec![0usize; edges.len() - 1];
    for &v in values {
        if let Some(b) = edges.windows(2).position(|w| v >= w[0] && v < w[1]) {
            counts[b] += 1;
        }
    }
    counts
        .into_iter()
        .map(|c| c as f64 / values.len() as f64)
        .collect()
}
