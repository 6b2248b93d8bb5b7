//! Timed read-then-write passthrough loop
//!
//! Each iteration reads one block from the input side of a duplex stream and
//! writes that same block to the output side, stamping three instants:
//!
//! ```text
//! T0 ──read_block──▶ T1 ──write_block──▶ T2
//!    recording time      playing time
//!    └──────────── latency ────────────┘
//! ```
//!
//! Iterations are strictly sequential: the write of block *i* completes
//! before the read of block *i+1* starts. Device errors end the loop
//! immediately; there is no retry.

use super::format::AudioBlock;
use super::stream::{DeviceError, DuplexStream};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that end the passthrough loop
#[derive(Error, Debug)]
pub enum PassthroughError {
    #[error("Device error after {completed} completed cycles: {source}")]
    Device {
        /// Read/write cycles that finished before the failure
        completed: u64,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to report timing: {0}")]
    Report(#[from] io::Error),
}

impl PassthroughError {
    /// Cycles completed before the loop failed
    pub fn completed(&self) -> Option<u64> {
        match self {
            PassthroughError::Device { completed, .. } => Some(*completed),
            PassthroughError::Report(_) => None,
        }
    }
}

/// Timestamps and sizes of one read/write cycle
#[derive(Debug, Clone, Copy)]
pub struct IterationTiming {
    /// Zero-based iteration index
    pub index: u64,
    /// T0: before the read
    pub started: Instant,
    /// T1: after the read returned a block
    pub recorded: Instant,
    /// T2: after the write accepted the block
    pub played: Instant,
    /// Bytes returned by the read
    pub bytes_read: usize,
    /// Bytes handed to the write
    pub bytes_written: usize,
}

impl IterationTiming {
    /// T1 - T0
    pub fn record_time(&self) -> Duration {
        self.recorded.duration_since(self.started)
    }

    /// T2 - T1
    pub fn play_time(&self) -> Duration {
        self.played.duration_since(self.recorded)
    }

    /// T2 - T0
    pub fn latency(&self) -> Duration {
        self.played.duration_since(self.started)
    }
}

/// Receives the timing of every completed cycle
pub trait TimingReport {
    fn report(&mut self, timing: &IterationTiming) -> io::Result<()>;
}

impl<R: TimingReport + ?Sized> TimingReport for &mut R {
    fn report(&mut self, timing: &IterationTiming) -> io::Result<()> {
        (**self).report(timing)
    }
}

/// Prints three lines per cycle:
///
/// ```text
/// time for recording: 0.023167
/// time for playing: 0.000012
/// latency: 0.023179
/// ```
pub struct ConsoleReport<W: Write> {
    out: W,
}

impl ConsoleReport<io::Stdout> {
    /// Report to standard output
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TimingReport for ConsoleReport<W> {
    fn report(&mut self, timing: &IterationTiming) -> io::Result<()> {
        writeln!(
            self.out,
            "time for recording: {}",
            timing.record_time().as_secs_f64()
        )?;
        writeln!(
            self.out,
            "time for playing: {}",
            timing.play_time().as_secs_f64()
        )?;
        writeln!(self.out, "latency: {}", timing.latency().as_secs_f64())?;
        self.out.flush()
    }
}

/// Totals for a loop that ended without a device error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassthroughSummary {
    /// Completed read/write cycles
    pub iterations: u64,
    /// Bytes passed from input to output
    pub bytes: u64,
}

/// Passthrough loop settings
///
/// With neither a limit nor a stop flag the loop only ends on a device error.
#[derive(Debug, Clone, Default)]
pub struct Passthrough {
    max_iterations: Option<u64>,
    stop: Option<Arc<AtomicBool>>,
}

impl Passthrough {
    /// Unbounded loop
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `count` completed cycles
    pub fn with_max_iterations(mut self, count: u64) -> Self {
        self.max_iterations = Some(count);
        self
    }

    /// Stop before the next cycle once `flag` is set
    ///
    /// The flag is only checked between cycles, never during a read or write.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    fn should_stop(&self, completed: u64) -> bool {
        if self.max_iterations.is_some_and(|max| completed >= max) {
            return true;
        }
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run the loop on `stream`, reporting every cycle to `report`
    ///
    /// Every block read is checked against the stream's block size before it
    /// is written back, so bytes written always equal bytes read.
    pub fn run<S, R>(
        &self,
        stream: &mut S,
        report: &mut R,
    ) -> Result<PassthroughSummary, PassthroughError>
    where
        S: DuplexStream + ?Sized,
        R: TimingReport + ?Sized,
    {
        let params = *stream.params();
        let expected = params.block_bytes();
        let mut summary = PassthroughSummary::default();

        tracing::info!(
            "Passthrough started: {}Hz, {} ch, {} frames ({} bytes) per block",
            params.sample_rate,
            params.channels,
            params.block_frames,
            expected
        );

        while !self.should_stop(summary.iterations) {
            let completed = summary.iterations;
            let device_error = |source: DeviceError| PassthroughError::Device { completed, source };

            let started = Instant::now();
            let block: AudioBlock = stream.read_block().map_err(device_error)?;
            let recorded = Instant::now();

            if block.len() != expected {
                return Err(device_error(DeviceError::BlockSize {
                    expected,
                    actual: block.len(),
                }));
            }

            stream.write_block(&block).map_err(device_error)?;
            let played = Instant::now();

            let timing = IterationTiming {
                index: completed,
                started,
                recorded,
                played,
                bytes_read: block.len(),
                bytes_written: block.len(),
            };
            report.report(&timing)?;

            summary.iterations += 1;
            summary.bytes += block.len() as u64;
        }

        tracing::info!(
            iterations = summary.iterations,
            bytes = summary.bytes,
            "Passthrough stopped"
        );

        Ok(summary)
    }
}
