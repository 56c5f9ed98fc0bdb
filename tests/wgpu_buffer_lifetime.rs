//! Tests for WebGPU buffer lifetime and device identity.
//!
//! Buffers belong to the `wgpu::Device` that created them; binding one on
//! another device panics inside wgpu-core. Every client handed out for the
//! same adapter index must therefore share one device, and a kernel that is
//! set up again must release its old scratch without disturbing caller
//! buffers.

mod common;

use common::{create_wgpu_client, run};
use wgstat::kernel::Kernel;
use wgstat::ops::{Sum2D, UnsortedSegmentSum};
use wgstat::random::Gamma;
use wgstat::runtime::wgpu::{WgpuDevice, get_or_create_client};

#[test]
fn test_cached_clients_share_a_device() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let again = get_or_create_client(&WgpuDevice::new(0)).unwrap();

    // Upload through one handle, reduce through the other.
    let input = client.upload("input", &[1.0f32, 2.0, 3.0, 4.0]);
    let output = again.alloc::<f32>("output", 2);
    let mut sum = Sum2D::new(2, 2).unwrap();
    sum.setup(&again, &input, &output).unwrap();
    run(&client, &sum);
    assert_eq!(client.read_back::<f32>(&output).unwrap(), vec![3.0, 7.0]);
}

#[test]
fn test_repeated_setup_replaces_scratch() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let m = 50_000;
    let data = client.upload("data", &vec![1u32; m]);
    let ids = client.upload("ids", &(0..m as u32).map(|i| i % 4).collect::<Vec<_>>());
    let output = client.alloc::<u32>("output", 4);
    let mut sum = UnsortedSegmentSum::new(m, 4).unwrap();
    for _ in 0..20 {
        sum.setup(&client, &data, &ids, &output).unwrap();
        run(&client, &sum);
    }
    assert_eq!(
        client.read_back::<u32>(&output).unwrap(),
        vec![12_500; 4]
    );
    // Caller buffers outlive every scratch generation.
    assert_eq!(client.read_back::<u32>(&data).unwrap().len(), m);
}

#[test]
fn test_dropping_a_composite_keeps_caller_buffers() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let key = client.upload("key", &[4u32, 3, 2, 1]);
    let output = client.alloc::<f32>("output", 256);
    {
        let mut gamma = Gamma::new(256, 2.0, 1.0).unwrap();
        gamma.setup(&client, &key, &output).unwrap();
        run(&client, &gamma);
        assert!(gamma.is_setup());
    }
    assert_eq!(client.read_back::<u32>(&key).unwrap(), vec![4, 3, 2, 1]);
    let samples: Vec<f32> = client.read_back(&output).unwrap();
    assert!(samples.iter().all(|&v| v > 0.0));
}
