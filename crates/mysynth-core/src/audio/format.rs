//! Stream parameters and audio block buffers
//!
//! All streams carry interleaved signed 16-bit little-endian PCM. A block is
//! `block_frames * channels * 2` bytes and lives for one loop iteration.

use thiserror::Error;

use crate::{BYTES_PER_SAMPLE, DEFAULT_BLOCK_FRAMES, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// Errors for invalid stream parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Sample rate out of range (8000-384000 Hz): {0}")]
    SampleRate(u32),

    #[error("Channel count must be at least 1")]
    NoChannels,

    #[error("Block size must be at least 1 frame")]
    EmptyBlock,

    #[error("Block too large: {frames} frames x {channels} ch (limit 65536 frames, 16 MiB)")]
    BlockTooLarge { frames: usize, channels: u16 },
}

/// Largest accepted block, in frames
pub const MAX_BLOCK_FRAMES: usize = 65536;

/// Largest accepted block, in bytes
pub const MAX_BLOCK_BYTES: usize = 16 * 1024 * 1024;

/// Fixed parameters of a duplex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Frames transferred per read or write call
    pub block_frames: usize,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_frames: DEFAULT_BLOCK_FRAMES,
        }
    }
}

impl StreamParams {
    /// Create and validate stream parameters
    pub fn new(sample_rate: u32, channels: u16, block_frames: usize) -> Result<Self, ParamsError> {
        let params = Self {
            sample_rate,
            channels,
            block_frames,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that the parameters describe an openable stream
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(ParamsError::SampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(ParamsError::NoChannels);
        }
        if self.block_frames == 0 {
            return Err(ParamsError::EmptyBlock);
        }
        let bytes = self
            .block_frames
            .checked_mul(self.channels as usize)
            .and_then(|samples| samples.checked_mul(BYTES_PER_SAMPLE));
        let fits = bytes.is_some_and(|bytes| bytes <= MAX_BLOCK_BYTES);
        if self.block_frames > MAX_BLOCK_FRAMES || !fits {
            return Err(ParamsError::BlockTooLarge {
                frames: self.block_frames,
                channels: self.channels,
            });
        }
        Ok(())
    }

    /// Samples in one block (all channels)
    ///
    /// Saturates for parameters that fail [`validate`](Self::validate).
    pub fn block_samples(&self) -> usize {
        self.block_frames.saturating_mul(self.channels as usize)
    }

    /// Bytes in one block
    pub fn block_bytes(&self) -> usize {
        self.block_samples().saturating_mul(BYTES_PER_SAMPLE)
    }

    /// Wall-clock duration of one block at the nominal sample rate
    pub fn block_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate as f64)
    }
}

/// One block of interleaved S16LE audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    bytes: Vec<u8>,
}

impl AudioBlock {
    /// Wrap raw S16LE bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A block of digital silence
    pub fn silence(len_bytes: usize) -> Self {
        Self {
            bytes: vec![0u8; len_bytes],
        }
    }

    /// Encode samples as little-endian bytes
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self { bytes }
    }

    /// Decode into `out`, returning the number of samples written
    ///
    /// A trailing odd byte is ignored.
    pub fn copy_samples_into(&self, out: &mut Vec<i16>) -> usize {
        out.clear();
        out.extend(
            self.bytes
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );
        out.len()
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole samples in the block
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_SAMPLE
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
