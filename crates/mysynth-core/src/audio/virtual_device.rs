//! Virtual duplex device
//!
//! Behaves like a loopback cable: blocks written to the output come back on
//! later reads, in order. When nothing is queued a read returns silence.
//! With pacing enabled, reads block until the nominal capture time of the
//! block has passed, so timing output looks like a real device.

use super::format::{AudioBlock, StreamParams};
use super::stream::{DeviceError, DuplexStream, PlaybackStream};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of written blocks held for loopback
const MAX_QUEUED_BLOCKS: usize = 64;

/// In-process loopback device
#[derive(Debug)]
pub struct VirtualDuplex {
    params: StreamParams,
    queue: VecDeque<AudioBlock>,
    paced: bool,
    /// Capture clock origin, set on the first read
    epoch: Option<Instant>,
    blocks_read: u64,
    blocks_written: u64,
}

impl VirtualDuplex {
    /// Unpaced loopback: reads return immediately
    pub fn new(params: StreamParams) -> Self {
        Self {
            params,
            queue: VecDeque::with_capacity(MAX_QUEUED_BLOCKS),
            paced: false,
            epoch: None,
            blocks_read: 0,
            blocks_written: 0,
        }
    }

    /// Block reads until the nominal capture time of each block
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Blocks read so far
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Blocks written so far
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// Blocks waiting to be read back
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn wait_for_capture(&mut self) {
        let epoch = *self.epoch.get_or_insert_with(Instant::now);
        let due = epoch
            + Duration::from_secs_f64(
                (self.blocks_read + 1) as f64 * self.params.block_duration().as_secs_f64(),
            );
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl PlaybackStream for VirtualDuplex {
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
        if self.queue.len() >= MAX_QUEUED_BLOCKS {
            self.queue.pop_front();
            tracing::warn!("Virtual loopback queue full, oldest block dropped");
        }
        self.queue.push_back(block.clone());
        self.blocks_written += 1;
        Ok(())
    }
}

impl DuplexStream for VirtualDuplex {
    fn read_block(&mut self) -> Result<AudioBlock, DeviceError> {
        if self.paced {
            self.wait_for_capture();
        }
        self.blocks_read += 1;
        Ok(self
            .queue
            .pop_front()
            .unwrap_or_else(|| AudioBlock::silence(self.params.block_bytes())))
    }
}
