//! cpal audio backend for device enumeration and blocking stream access
//!
//! Provides high-level interface for:
//! - Enumerating capture and playback devices
//! - Opening a duplex stream as a capture stream plus a playback stream
//! - Bridging the driver callbacks to blocking `read_block`/`write_block`
//!
//! ## Callback bridge
//!
//! Each direction owns a lock-free SPSC ring buffer of `i16` samples. The
//! input callback is the producer of the capture ring, the output callback the
//! consumer of the playback ring. Errors raised on callback threads travel
//! through a bounded crossbeam channel and are returned by the next blocking
//! call on the main thread.
//!
//! Capture overflow is fatal. Playback underflow is filled with silence and
//! only counted, since the read-then-write loop always leaves the output
//! starved while it waits for input.

use super::format::{AudioBlock, StreamParams};
use super::stream::{DeviceError, DuplexStream, PlaybackStream};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Host, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Capture ring capacity in blocks
const CAPTURE_RING_BLOCKS: usize = 8;

/// Playback ring capacity in blocks
const PLAYBACK_RING_BLOCKS: usize = 4;

/// How long a blocking call sleeps between ring buffer checks
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Capacity of the callback error channel
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Whether this is the host's default input device
    pub is_default_input: bool,
    /// Whether this is the host's default output device
    pub is_default_output: bool,
    /// Supported sample rates among the common ones
    pub sample_rates: Vec<u32>,
    /// Number of input channels (0 if capture is unsupported)
    pub input_channels: u16,
    /// Number of output channels (0 if playback is unsupported)
    pub output_channels: u16,
}

/// Which devices to open, by name; `None` selects the host default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// List the devices known to the default host
pub fn list_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let all = host
        .devices()
        .map_err(|e| DeviceError::Open(e.to_string()))?;

    for device in all {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let input_channels = device
            .default_input_config()
            .map(|c| c.channels())
            .unwrap_or(0);
        let output_channels = device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(0);

        let common_rates = [22050, 44100, 48000, 88200, 96000];
        let mut sample_rates = Vec::new();
        if let Ok(configs) = device.supported_output_configs() {
            for config in configs {
                for &rate in &common_rates {
                    if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
        }
        sample_rates.sort();

        devices.push(DeviceInfo {
            is_default_input: default_input.as_deref() == Some(name.as_str()),
            is_default_output: default_output.as_deref() == Some(name.as_str()),
            name,
            sample_rates,
            input_channels,
            output_channels,
        });
    }

    Ok(devices)
}

fn find_input_device(host: &Host, name: Option<&str>) -> Result<Device, DeviceError> {
    match name {
        None => host
            .default_input_device()
            .ok_or(DeviceError::NoDevice("input")),
        Some(name) => host
            .input_devices()
            .map_err(|e| DeviceError::Open(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
    }
}

fn find_output_device(host: &Host, name: Option<&str>) -> Result<Device, DeviceError> {
    match name {
        None => host
            .default_output_device()
            .ok_or(DeviceError::NoDevice("output")),
        Some(name) => host
            .output_devices()
            .map_err(|e| DeviceError::Open(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
    }
}

fn stream_config(params: &StreamParams) -> StreamConfig {
    StreamConfig {
        channels: params.channels,
        sample_rate: SampleRate(params.sample_rate),
        buffer_size: BufferSize::Fixed(params.block_frames as u32),
    }
}

/// Input callback body: queue captured samples, report what did not fit
fn capture_into(producer: &mut HeapProd<i16>, data: &[i16], errors: &Sender<DeviceError>) {
    let pushed = producer.push_slice(data);
    if pushed < data.len() {
        let _ = errors.try_send(DeviceError::Overrun {
            dropped: data.len() - pushed,
        });
    }
}

/// Output callback body: drain queued samples, zero-fill and count a shortfall
fn playback_from(consumer: &mut HeapCons<i16>, data: &mut [i16], underruns: &AtomicU64) {
    let popped = consumer.pop_slice(data);
    if popped < data.len() {
        data[popped..].fill(0);
        underruns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reader side of the capture ring
struct CaptureQueue {
    consumer: HeapCons<i16>,
    errors: Receiver<DeviceError>,
    block_samples: usize,
    scratch: Vec<i16>,
}

impl CaptureQueue {
    fn new(consumer: HeapCons<i16>, errors: Receiver<DeviceError>, block_samples: usize) -> Self {
        Self {
            consumer,
            errors,
            block_samples,
            scratch: vec![0; block_samples],
        }
    }

    /// Block until one full block is buffered, then take it
    ///
    /// A pending callback error is returned first, even with data queued.
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        loop {
            if let Ok(err) = self.errors.try_recv() {
                return Err(err);
            }
            if self.consumer.occupied_len() >= self.block_samples {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let read = self
            .consumer
            .pop_slice(&mut self.scratch[..self.block_samples]);
        Ok(AudioBlock::from_samples(&self.scratch[..read]))
    }
}

/// Capture half of a duplex stream
pub struct CpalCapture {
    _stream: Stream,
    queue: CaptureQueue,
}

impl CpalCapture {
    /// Build and start an input stream on `device`
    pub fn open(device: &Device, params: &StreamParams) -> Result<Self, DeviceError> {
        let block_samples = params.block_samples();
        let ring = HeapRb::<i16>::new(block_samples * CAPTURE_RING_BLOCKS);
        let (mut producer, consumer) = ring.split();
        let (error_tx, errors) = crossbeam_channel::bounded(ERROR_CHANNEL_CAPACITY);

        let overrun_tx = error_tx.clone();
        let stream = device
            .build_input_stream(
                &stream_config(params),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    capture_into(&mut producer, data, &overrun_tx);
                },
                error_callback("Input", error_tx),
                None,
            )
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            queue: CaptureQueue::new(consumer, errors, block_samples),
        })
    }

    /// Block until one full block is buffered, then take it
    pub fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        self.queue.read_block()
    }
}

/// Playback half of a duplex stream
pub struct CpalPlayback {
    _stream: Stream,
    producer: HeapProd<i16>,
    errors: Receiver<DeviceError>,
    underruns: Arc<AtomicU64>,
    reported_underruns: u64,
    params: StreamParams,
    scratch: Vec<i16>,
}

impl CpalPlayback {
    /// Build and start an output stream on `device`
    pub fn open(device: &Device, params: &StreamParams) -> Result<Self, DeviceError> {
        let ring = HeapRb::<i16>::new(params.block_samples() * PLAYBACK_RING_BLOCKS);
        let (producer, mut consumer) = ring.split();
        let (error_tx, errors) = crossbeam_channel::bounded(ERROR_CHANNEL_CAPACITY);
        let underruns = Arc::new(AtomicU64::new(0));

        let callback_underruns = Arc::clone(&underruns);
        let stream = device
            .build_output_stream(
                &stream_config(params),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    playback_from(&mut consumer, data, &callback_underruns);
                },
                error_callback("Output", error_tx),
                None,
            )
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            producer,
            errors,
            underruns,
            reported_underruns: 0,
            params: *params,
            scratch: Vec::with_capacity(params.block_samples()),
        })
    }

    /// Playback callbacks that ran out of data so far
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl PlaybackStream for CpalPlayback {
    fn params(&self) -> &StreamParams {
        &self.params
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        let expected = self.params.block_bytes();
        if block.len() != expected {
            return Err(DeviceError::BlockSize {
                expected,
                actual: block.len(),
            });
        }

        let total = block.copy_samples_into(&mut self.scratch);
        let mut offset = 0;
        while offset < total {
            if let Ok(err) = self.errors.try_recv() {
                return Err(err);
            }
            offset += self.producer.push_slice(&self.scratch[offset..total]);
            if offset < total {
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        let underruns = self.underruns();
        if underruns != self.reported_underruns {
            tracing::debug!(
                total = underruns,
                new = underruns - self.reported_underruns,
                "Playback underrun filled with silence"
            );
            self.reported_underruns = underruns;
        }

        Ok(())
    }
}

fn error_callback(
    direction: &'static str,
    tx: Sender<DeviceError>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        tracing::error!("{} stream error: {}", direction, err);
        let _ = tx.try_send(DeviceError::Stream(err.to_string()));
    }
}

/// Duplex stream on cpal devices
///
/// Opened once; both underlying streams stop when this value is dropped.
pub struct CpalDuplex {
    params: StreamParams,
    input_name: String,
    output_name: String,
    capture: CpalCapture,
    playback: CpalPlayback,
}

impl CpalDuplex {
    /// Open capture and playback on the selected devices with fixed parameters
    pub fn open(params: StreamParams, selection: &DeviceSelection) -> Result<Self, DeviceError> {
        params
            .validate()
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        let host = cpal::default_host();
        let input = find_input_device(&host, selection.input.as_deref())?;
        let output = find_output_device(&host, selection.output.as_deref())?;
        let input_name = input.name().unwrap_or_else(|_| "unknown".to_string());
        let output_name = output.name().unwrap_or_else(|_| "unknown".to_string());

        tracing::info!(
            "Opening duplex stream: in={} out={} @ {}Hz, {} ch, {} frames/block",
            input_name,
            output_name,
            params.sample_rate,
            params.channels,
            params.block_frames
        );

        let playback = CpalPlayback::open(&output, &params)?;
        let capture = CpalCapture::open(&input, &params)?;

        tracing::info!("Duplex stream started");

        Ok(Self {
            params,
            input_name,
            output_name,
            capture,
            playback,
        })
    }

    /// Name of the capture device
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Name of the playback device
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Playback underruns so far
    pub fn underruns(&self) -> u64 {
        self.playback.underruns()
    }
}

impl PlaybackStream for CpalDuplex {
    fn params(&self) -> &StreamParams {
        &self.params
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        self.playback.write_block(block)
    }
}

impl DuplexStream for CpalDuplex {
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        self.capture.read_block()
    }
}

impl Drop for CpalDuplex {
    fn drop(&mut self) {
        tracing::info!(
            underruns = self.playback.underruns(),
            "Duplex stream closed: in={} out={}",
            self.input_name,
            self.output_name
        );
    }
}

/// Open only the playback side, for output-only loops
pub fn open_playback(
    params: StreamParams,
    output: Option<&str>,
) -> Result<CpalPlayback, DeviceError> {
    params
        .validate()
        .map_err(|e| DeviceError::Open(e.to_string()))?;
    let host = cpal::default_host();
    let device = find_output_device(&host, output)?;
    tracing::info!(
        "Opening playback stream: {} @ {}Hz, {} ch",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        params.sample_rate,
        params.channels
    );
    CpalPlayback::open(&device, &params)
}
