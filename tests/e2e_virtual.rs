//! E2E tests running the passthrough loop on the virtual loopback device
//!
//! Covers silence on an empty loopback, feeding noise through the loop and
//! collecting running statistics with `TimingStore`.

use approx::assert_abs_diff_eq;
use mysynth::audio::noise::{play_noise, NoiseGenerator};
use mysynth::audio::virtual_device::VirtualDuplex;
use mysynth::{AudioBlock, DuplexStream, Passthrough, StreamParams, TimingStore};
use std::time::{Duration, Instant};

fn small_params() -> StreamParams {
    StreamParams::new(8000, 1, 80).unwrap()
}

#[test]
fn test_empty_loopback_passes_silence() {
    let mut device = VirtualDuplex::new(StreamParams::default());
    let mut store = TimingStore::new();

    let summary = Passthrough::new()
        .with_max_iterations(10)
        .run(&mut device, &mut store)
        .unwrap();

    assert_eq!(summary.iterations, 10);
    assert_eq!(summary.bytes, 10 * 4096);
    assert_eq!(device.blocks_read(), 10);
    assert_eq!(device.blocks_written(), 10);
    // Each silent block written is read back by the next cycle
    assert_eq!(device.queued(), 1);
    assert_eq!(device.read_block().unwrap(), AudioBlock::silence(4096));
}

#[test]
fn test_noise_circulates_through_loop() {
    let params = small_params();
    let mut device = VirtualDuplex::new(params);
    let mut generator = NoiseGenerator::new(0x1234);

    let written = play_noise(&mut device, &mut generator, Some(3), None).unwrap();
    assert_eq!(written, 3);

    let mut reference = NoiseGenerator::new(0x1234);
    let expected: Vec<AudioBlock> = (0..3).map(|_| reference.next_block(&params)).collect();

    Passthrough::new()
        .with_max_iterations(3)
        .run(&mut device, &mut TimingStore::new())
        .unwrap();

    // The loop consumed the noise and queued the same blocks again
    let replayed: Vec<AudioBlock> = (0..3).map(|_| device.read_block().unwrap()).collect();
    assert_eq!(replayed, expected);
}

#[test]
fn test_paced_device_runs_in_real_time() {
    let params = small_params();
    let mut device = VirtualDuplex::new(params).paced(true);
    let mut store = TimingStore::new();

    let start = Instant::now();
    Passthrough::new()
        .with_max_iterations(5)
        .run(&mut device, &mut store)
        .unwrap();
    let elapsed = start.elapsed();

    // 5 blocks of 10 ms
    assert!(elapsed >= Duration::from_millis(50));

    let stats = store.stats();
    assert_eq!(stats.measurement_count, 5);
    assert_eq!(stats.bytes_transferred, 5 * 160);
    assert!(stats.record.max >= stats.record.min);
    assert_abs_diff_eq!(
        stats.latency.avg,
        stats.record.avg + stats.play.avg,
        epsilon = 1e-6
    );
}

#[test]
fn test_store_summary_after_run() {
    let mut device = VirtualDuplex::new(small_params());
    let mut store = TimingStore::new();
    Passthrough::new()
        .with_max_iterations(4)
        .run(&mut device, &mut store)
        .unwrap();

    let summary = store.summary();
    assert!(summary.starts_with("Cycles: 4  Bytes: 640"));
    assert_eq!(summary.lines().count(), 4);
}
