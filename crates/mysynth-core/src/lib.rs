//! MySynth Core - Audio passthrough probe, timing statistics, and board drivers
//!
//! This library provides the pieces behind the `mysynth` binary:
//! - A strictly sequential read-then-write audio passthrough loop that
//!   measures how long each capture and playback call blocks
//! - Duplex stream backends (cpal hardware devices and a virtual loopback)
//! - Running timing statistics for the loop
//! - Drivers for the PiFace Control and Display board (LCD and switches)

pub mod audio;
pub mod cad;
pub mod stats;

pub use audio::format::{AudioBlock, StreamParams};
pub use audio::passthrough::{Passthrough, PassthroughError};
pub use audio::stream::{DeviceError, DuplexStream, PlaybackStream};
pub use stats::store::TimingStore;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default sample rate (CD quality)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default channel count (stereo)
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default block size in frames
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// Bytes per sample for signed 16-bit PCM
pub const BYTES_PER_SAMPLE: usize = 2;
