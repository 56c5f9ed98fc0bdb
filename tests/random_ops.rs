//! Integration tests for the counter-based generator and its samplers.

mod common;

use common::{bin_fractions, create_wgpu_client, run};
use wgstat::error::Error;
use wgstat::kernel::Kernel;
use wgstat::random::{Categorical, Gamma, KeySplitter, Normal, ThreeFry, Uniform};
use wgstat::runtime::cpu;
use wgstat::runtime::wgpu::WgpuClient;

fn sample_uniform(client: &WgpuClient, key: [u32; 4], n: usize) -> Vec<f32> {
    let key = client.upload("key", &key);
    let output = client.alloc::<f32>("uniform", n);
    let mut uniform = Uniform::new(n).unwrap();
    uniform.setup(client, &key, &output).unwrap();
    run(client, &uniform);
    client.read_back(&output).unwrap()
}

fn sample_normal(client: &WgpuClient, key: [u32; 4], n: usize) -> Vec<f32> {
    let key = client.upload("key", &key);
    let output = client.alloc::<f32>("normal", n);
    let mut normal = Normal::new(n).unwrap();
    normal.setup(client, &key, &output).unwrap();
    run(client, &normal);
    client.read_back(&output).unwrap()
}

#[test]
fn test_threefry_matches_host_reference() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    for key in [[0u32; 4], [u32::MAX; 4], [0xa4093822, 0x299f31d0, 0x082efa98, 0xec4e6c89]] {
        let key_buf = client.upload("key", &key);
        let words = client.alloc::<u32>("words", 4 * 300);
        let mut threefry = ThreeFry::new(300).unwrap();
        threefry.setup(&client, &key_buf, &words).unwrap();
        run(&client, &threefry);
        assert_eq!(
            client.read_back::<u32>(&words).unwrap(),
            cpu::threefry_words(key, 300)
        );
    }
}

#[test]
fn test_uniform_is_bit_identical_to_host() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    for n in [1usize, 3, 4, 5, 1001] {
        let key = [n as u32, 17, 0xdead_beef, 4];
        let got = sample_uniform(&client, key, n);
        assert_eq!(got, cpu::uniform(key, n), "N={n}");
    }
}

#[test]
fn test_uniform_buckets_are_flat() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let edges: Vec<f32> = (0..=10).map(|i| i as f32 / 10.0).collect();
    for seed in [1u32, 42, 0x1234_5678] {
        let samples = sample_uniform(&client, [seed, 0, 0, 0], 200_000);
        assert!(samples.iter().all(|&u| (0.0..1.0).contains(&u)));
        for (bucket, fraction) in bin_fractions(&samples, &edges).into_iter().enumerate() {
            assert!((fraction - 0.1).abs() < 0.01, "seed {seed} bucket {bucket}: {fraction}");
        }
    }
}

#[test]
fn test_normal_matches_standard_cdf() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let samples = sample_normal(&client, [7, 7, 7, 7], 1_000_000);
    assert!(samples.iter().all(|v| v.is_finite()));
    let fractions = bin_fractions(&samples, &[-2.0, -1.0, 0.0, 1.0, 2.0]);
    let expected = [0.1359, 0.3413, 0.3413, 0.1359];
    for (got, want) in fractions.iter().zip(expected) {
        assert!((got - want).abs() < 0.01, "{fractions:?}");
    }
    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64;
    assert!(mean.abs() < 0.01, "mean {mean}");
}

#[test]
fn test_normal_odd_length_tracks_host() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let key = [3, 1, 4, 1];
    let got = sample_normal(&client, key, 777);
    // Device transcendental functions are not correctly rounded.
    common::assert_allclose_f32(&got, &cpu::normal(key, 777), 1e-3, 5e-3, "normal");
}

#[test]
fn test_categorical_matches_input_proportions() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let probs = [0.1f32, 0.2, 0.3, 0.4];
    let log_probs: Vec<f32> = probs.iter().map(|p| p.ln()).collect();
    let n = 10_000;

    let key = client.upload("key", &[5u32, 6, 7, 8]);
    let log_probs_buf = client.upload("log_probs", &log_probs);
    let labels = client.alloc::<u32>("labels", n);
    let mut categorical = Categorical::new(n, probs.len()).unwrap();
    categorical.setup(&client, &key, &log_probs_buf, &labels).unwrap();
    run(&client, &categorical);

    let labels: Vec<u32> = client.read_back(&labels).unwrap();
    let mut counts = [0usize; 4];
    for &l in &labels {
        counts[l as usize] += 1;
    }
    for (c, p) in counts.iter().zip(probs) {
        let fraction = *c as f32 / n as f32;
        assert!((fraction - p).abs() < 0.02, "{counts:?}");
    }
}

#[test]
fn test_categorical_ignores_normalization() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let key = client.upload("key", &[9u32, 9, 9, 9]);
    let n = 2000;
    let mut results = Vec::new();
    for shift in [0.0f32, 50.0] {
        let log_probs = client.upload("log_probs", &[-1.0 + shift, -2.0 + shift, -0.5 + shift]);
        let labels = client.alloc::<u32>("labels", n);
        let mut categorical = Categorical::new(n, 3).unwrap();
        categorical.setup(&client, &key, &log_probs, &labels).unwrap();
        run(&client, &categorical);
        results.push(client.read_back::<u32>(&labels).unwrap());
    }
    let agree = results[0]
        .iter()
        .zip(&results[1])
        .filter(|(a, b)| a == b)
        .count();
    assert!(agree as f32 / n as f32 > 0.99, "{agree} of {n}");
}

#[test]
fn test_sub_keys_match_host_split() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let seed = [11u32, 22, 33, 44];
    let key = client.upload("seed", &seed);
    let mut splitter = KeySplitter::new().unwrap();
    splitter.setup(&client, &key).unwrap();
    run(&client, &splitter);

    let (a, b) = cpu::split_key(seed);
    assert_eq!(client.read_back::<u32>(splitter.key_a().unwrap()).unwrap(), a.to_vec());
    assert_eq!(client.read_back::<u32>(splitter.key_b().unwrap()).unwrap(), b.to_vec());
    assert_ne!(a, b);
    assert_ne!(a, seed);
    // The parent key is only read.
    assert_eq!(client.read_back::<u32>(&key).unwrap(), seed.to_vec());
}

/// Chi-squared statistic of a 10x10 joint histogram of paired uniforms.
fn joint_chi_squared(a: &[f32], b: &[f32]) -> f64 {
    let mut cells = [[0usize; 10]; 10];
    for (&x, &y) in a.iter().zip(b) {
        cells[(x * 10.0) as usize][(y * 10.0) as usize] += 1;
    }
    let expected = a.len() as f64 / 100.0;
    cells
        .iter()
        .flatten()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum()
}

#[test]
fn test_sub_key_streams_are_independent() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let n = 100_000;
    let key = client.upload("seed", &[2024u32, 1, 2, 3]);
    let mut splitter = KeySplitter::new().unwrap();
    splitter.setup(&client, &key).unwrap();

    let stream_a = client.alloc::<f32>("stream_a", n);
    let stream_b = client.alloc::<f32>("stream_b", n);
    let mut uniform_a = Uniform::new(n).unwrap();
    uniform_a.setup(&client, splitter.key_a().unwrap(), &stream_a).unwrap();
    let mut uniform_b = Uniform::new(n).unwrap();
    uniform_b.setup(&client, splitter.key_b().unwrap(), &stream_b).unwrap();
    client
        .run("split streams", &[&splitter, &uniform_a, &uniform_b])
        .unwrap();

    let a: Vec<f32> = client.read_back(&stream_a).unwrap();
    let b: Vec<f32> = client.read_back(&stream_b).unwrap();
    // 99 degrees of freedom: mean 99, standard deviation 14.
    let chi2 = joint_chi_squared(&a, &b);
    assert!(chi2 < 200.0, "chi2 {chi2}");

    // A shared key collapses the joint histogram onto the diagonal.
    assert!(joint_chi_squared(&a, &a) > 10_000.0);
}

#[test]
fn test_gamma_moments() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let n = 100_000;
    let key = client.upload("key", &[77u32, 0, 0, 1]);
    for (shape, scale) in [(0.5f32, 2.0f32), (1.0, 1.0), (3.0, 0.5), (9.0, 2.0)] {
        let output = client.alloc::<f32>("gamma", n);
        let mut gamma = Gamma::new(n, shape, scale).unwrap();
        gamma.setup(&client, &key, &output).unwrap();
        run(&client, &gamma);
        let samples: Vec<f32> = client.read_back(&output).unwrap();
        assert!(samples.iter().all(|&v| v >= 0.0 && v.is_finite()));

        let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let var = samples
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let (want_mean, want_var) = ((shape * scale) as f64, (shape * scale * scale) as f64);
        assert!((mean - want_mean).abs() < 0.02 * want_mean, "shape {shape}: mean {mean}");
        assert!((var - want_var).abs() < 0.06 * want_var, "shape {shape}: var {var}");
    }
}

#[test]
fn test_repeated_encode_reproduces_samples() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let key = client.upload("key", &[1u32, 2, 3, 4]);
    let output = client.alloc::<f32>("normal", 4096);
    let mut normal = Normal::new(4096).unwrap();
    normal.setup(&client, &key, &output).unwrap();
    run(&client, &normal);
    let first: Vec<f32> = client.read_back(&output).unwrap();
    run(&client, &normal);
    assert_eq!(client.read_back::<f32>(&output).unwrap(), first);

    client.write(&key, 0, &[5u32]).unwrap();
    run(&client, &normal);
    assert_ne!(client.read_back::<f32>(&output).unwrap(), first);
}

#[test]
fn test_sampler_errors() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let normal = Normal::new(16).unwrap();
    assert!(matches!(
        client.run("unset", &[&normal]),
        Err(Error::NotSetUp { kernel: "Normal" })
    ));

    let key = client.upload("key", &[0u32; 4]);
    let short = client.alloc::<f32>("short", 15);
    let mut uniform = Uniform::new(16).unwrap();
    assert!(matches!(
        uniform.setup(&client, &key, &short),
        Err(Error::BufferSize {
            kernel: "Uniform",
            expected: 16,
            got: 15,
            ..
        })
    ));
    assert!(!uniform.is_setup());

    let bad_key = client.alloc::<u32>("bad_key", 3);
    let output = client.alloc::<f32>("output", 16);
    assert!(uniform.setup(&client, &bad_key, &output).is_err());
}
