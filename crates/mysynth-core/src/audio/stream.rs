//! Blocking stream traits shared by the hardware and virtual backends
//!
//! Both calls block with no timeout. Any error returned is fatal for the
//! caller; backends never retry internally.

use super::format::{AudioBlock, StreamParams};
use thiserror::Error;

/// Errors raised by an audio device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No {0} device available")]
    NoDevice(&'static str),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    Open(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Input overflow: {dropped} samples dropped")]
    Overrun { dropped: usize },

    #[error("Block size mismatch: expected {expected} bytes, got {actual}")]
    BlockSize { expected: usize, actual: usize },
}

/// Output side of a stream
pub trait PlaybackStream {
    /// Parameters the stream was opened with
    fn params(&self) -> &StreamParams;

    /// Block until the whole block has been accepted by the device buffer
    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError>;
}

/// A single handle supporting capture and playback
pub trait DuplexStream: PlaybackStream {
    /// Block until one full block of input is available and return it
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError>;
}

impl<S: PlaybackStream + ?Sized> PlaybackStream for &mut S {
    fn params(&self) -> &StreamParams {
        (**self).params()
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        (**self).write_block(block)
    }
}

impl<S: DuplexStream + ?Sized> DuplexStream for &mut S {
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        (**self).read_block()
    }
}

impl<S: PlaybackStream + ?Sized> PlaybackStream for Box<S> {
    fn params(&self) -> &StreamParams {
        (**self).params()
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        (**self).write_block(block)
    }
}

impl<S: DuplexStream + ?Sized> DuplexStream for Box<S> {
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        (**self).read_block()
    }
}
