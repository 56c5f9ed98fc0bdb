//! Integration tests for segmented sums and counts.

mod common;

use common::{assert_allclose_f32, create_wgpu_client, random_f32, random_ids, run};
use wgstat::kernel::{Kernel, KernelConfig};
use wgstat::ops::{Count, UnsortedSegmentSum, UnsortedSegmentSum2D};
use wgstat::runtime::cpu;

#[test]
fn test_segment_sum_known_values() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let data = client.upload("data", &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    let ids = client.upload("ids", &[0u32, 0, 1, 1, 1, 1, 0, 2]);
    let output = client.alloc::<f32>("sums", 3);
    let mut sum = UnsortedSegmentSum::new(8, 3).unwrap();
    sum.setup(&client, &data, &ids, &output).unwrap();
    run(&client, &sum);
    assert_eq!(client.read_back::<f32>(&output).unwrap(), vec![10.0, 18.0, 8.0]);
}

#[test]
fn test_count_equals_segment_sum_of_ones() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let m = 10_000;
    for k in [1usize, 3, 7, 33] {
        let ids = random_ids(k as u64, m, k as u32);
        let ids_buf = client.upload("ids", &ids);
        let ones = client.upload("ones", &vec![1.0f32; m]);

        let counts = client.alloc::<f32>("counts", k);
        let mut count = Count::new(m, k).unwrap();
        count.setup(&client, &ids_buf, &counts).unwrap();

        let sums = client.alloc::<f32>("sums", k);
        let mut sum = UnsortedSegmentSum::new(m, k).unwrap();
        sum.setup(&client, &ones, &ids_buf, &sums).unwrap();

        client.run("count vs sum", &[&count, &sum]).unwrap();
        let got_counts: Vec<f32> = client.read_back(&counts).unwrap();
        let got_sums: Vec<f32> = client.read_back(&sums).unwrap();
        assert_eq!(got_counts, got_sums, "K={k}");
        assert_eq!(got_counts, cpu::count::<f32>(&ids, k).unwrap(), "K={k}");
    }
}

#[test]
fn test_integer_counts_are_exact() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let m = 65_537;
    let ids = random_ids(99, m, 5);
    let ids_buf = client.upload("ids", &ids);
    let counts = client.alloc::<u32>("counts", 5);
    let mut count = Count::new(m, 5).unwrap();
    count.setup(&client, &ids_buf, &counts).unwrap();
    run(&client, &count);
    assert_eq!(
        client.read_back::<u32>(&counts).unwrap(),
        cpu::count::<u32>(&ids, 5).unwrap()
    );
}

#[test]
fn test_absent_segments_are_zero() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let data = client.upload("data", &[2i32, 4, 6, 8]);
    let ids = client.upload("ids", &[3u32, 3, 0, 3]);
    let output = client.upload("sums", &[-1i32; 5]);
    let mut sum = UnsortedSegmentSum::new(4, 5).unwrap();
    sum.setup(&client, &data, &ids, &output).unwrap();
    run(&client, &sum);
    assert_eq!(client.read_back::<i32>(&output).unwrap(), vec![6, 0, 0, 14, 0]);
}

#[test]
fn test_out_of_range_ids_contribute_nothing() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let data = client.upload("data", &[1u32, 10, 100]);
    let ids = client.upload("ids", &[0u32, 9, 1]);
    let output = client.alloc::<u32>("sums", 2);
    let mut sum = UnsortedSegmentSum::new(3, 2).unwrap();
    sum.setup(&client, &data, &ids, &output).unwrap();
    run(&client, &sum);
    assert_eq!(client.read_back::<u32>(&output).unwrap(), vec![1, 100]);
}

#[test]
fn test_segment_sum_2d_matches_host() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let config = KernelConfig::new(64).unwrap();
    for (m, n, k) in [(8, 1, 3), (1000, 3, 4), (20_000, 2, 6)] {
        let data = random_f32(m as u64, n * m, -1.0, 1.0);
        let ids = random_ids(m as u64 + 1, m, k as u32);
        let expected = cpu::segment_sum_2d(&data, &ids, n, k).unwrap();

        let data_buf = client.upload("data", &data);
        let ids_buf = client.upload("ids", &ids);
        let output = client.alloc::<f32>("sums", n * k);
        let mut sum = UnsortedSegmentSum2D::with_config(m, n, k, config).unwrap();
        sum.setup(&client, &data_buf, &ids_buf, &output).unwrap();
        assert!(sum.is_setup());
        run(&client, &sum);
        let got: Vec<f32> = client.read_back(&output).unwrap();
        assert_allclose_f32(&got, &expected, 1e-4, 1e-3, &format!("({m}, {n}, {k})"));
    }
}

#[test]
fn test_block_axis_beyond_grid_limit() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let config = KernelConfig::new(2).unwrap();
    let m = client.max_workgroups_per_dimension() as usize * 4 + 3;
    let ids: Vec<u32> = (0..m as u32).map(|i| i % 3).collect();
    let data = client.upload("data", &vec![1u32; m]);
    let ids_buf = client.upload("ids", &ids);
    let output = client.alloc::<u32>("counts", 3);
    let mut sum = UnsortedSegmentSum::with_config(m, 3, config).unwrap();
    sum.setup(&client, &data, &ids_buf, &output).unwrap();
    run(&client, &sum);
    assert_eq!(
        client.read_back::<u32>(&output).unwrap(),
        cpu::count::<u32>(&ids, 3).unwrap()
    );
}

#[test]
fn test_setup_rejects_short_ids() {
    let Some(client) = create_wgpu_client() else {
        return;
    };
    let data = client.alloc::<f32>("data", 8);
    let ids = client.alloc::<u32>("ids", 7);
    let output = client.alloc::<f32>("sums", 3);
    let mut sum = UnsortedSegmentSum::new(8, 3).unwrap();
    assert!(sum.setup(&client, &data, &ids, &output).is_err());
    assert!(!sum.is_setup());
}
