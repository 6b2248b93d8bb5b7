//! MySynth - audio passthrough latency probe
//!
//! This library re-exports the passthrough loop, stream backends, timing
//! statistics and PiFace CAD drivers from `mysynth-core`, and adds the
//! persistent configuration used by the `mysynth` binary.

pub mod config;

pub use mysynth_core::audio;
pub use mysynth_core::cad;
pub use mysynth_core::stats;

pub use mysynth_core::{AudioBlock, DeviceError, DuplexStream, PlaybackStream, StreamParams};
pub use mysynth_core::{Passthrough, PassthroughError, TimingStore};
pub use mysynth_core::{
    BUILD_DATE, DEFAULT_BLOCK_FRAMES, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, VERSION,
};
