//! Time-series storage for passthrough timings
//!
//! Stores recent measurements with a fixed history size and keeps running
//! min/max/average figures over the whole run.

use crate::audio::passthrough::{IterationTiming, TimingReport};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::io;

/// Maximum number of timings to keep in history
const MAX_HISTORY_SIZE: usize = 3600;

/// A single read/write cycle measurement
#[derive(Debug, Clone)]
pub struct TimingSample {
    /// Wall-clock time the cycle finished
    pub timestamp: DateTime<Utc>,
    /// Read (recording) time in seconds
    pub record_s: f64,
    /// Write (playing) time in seconds
    pub play_s: f64,
    /// Total cycle time in seconds
    pub latency_s: f64,
}

/// Running figures for one measured phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseStats {
    /// Most recent value (seconds)
    pub current: f64,
    /// Minimum observed (seconds)
    pub min: f64,
    /// Maximum observed (seconds)
    pub max: f64,
    /// Mean over all cycles (seconds)
    pub avg: f64,
}

impl Default for PhaseStats {
    fn default() -> Self {
        Self {
            current: 0.0,
            min: f64::MAX,
            max: 0.0,
            avg: 0.0,
        }
    }
}

impl PhaseStats {
    fn record(&mut self, value: f64, count: u64) {
        self.current = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        // Incremental mean over the whole run
        self.avg += (value - self.avg) / count as f64;
    }
}

/// Running statistics calculated from timings
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    /// Read phase
    pub record: PhaseStats,
    /// Write phase
    pub play: PhaseStats,
    /// Whole cycle
    pub latency: PhaseStats,
    /// Completed cycles
    pub measurement_count: u64,
    /// Bytes passed through
    pub bytes_transferred: u64,
    /// When the first timing was recorded
    pub started_at: Option<DateTime<Utc>>,
}

/// Statistics store for passthrough timings
#[derive(Debug)]
pub struct TimingStore {
    history: VecDeque<TimingSample>,
    max_size: usize,
    stats: RunningStats,
}

impl TimingStore {
    /// Create a new store
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    /// Create a store keeping at most `max_size` recent timings
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_size.min(MAX_HISTORY_SIZE)),
            max_size: max_size.max(1),
            stats: RunningStats::default(),
        }
    }

    /// Record one cycle
    pub fn record(&mut self, timing: &IterationTiming) {
        let now = Utc::now();
        let sample = TimingSample {
            timestamp: now,
            record_s: timing.record_time().as_secs_f64(),
            play_s: timing.play_time().as_secs_f64(),
            latency_s: timing.latency().as_secs_f64(),
        };

        if self.history.len() >= self.max_size {
            self.history.pop_front();
        }

        self.stats.measurement_count += 1;
        let count = self.stats.measurement_count;
        self.stats.record.record(sample.record_s, count);
        self.stats.play.record(sample.play_s, count);
        self.stats.latency.record(sample.latency_s, count);
        self.stats.bytes_transferred += timing.bytes_written as u64;
        self.stats.started_at.get_or_insert(now);

        self.history.push_back(sample);
    }

    /// Recent timings, oldest first
    pub fn history(&self) -> &VecDeque<TimingSample> {
        &self.history
    }

    /// Get running statistics
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Clear all history and reset statistics
    pub fn clear(&mut self) {
        self.history.clear();
        self.stats = RunningStats::default();
    }

    /// Human-readable summary, one phase per line
    pub fn summary(&self) -> String {
        let s = &self.stats;
        if s.measurement_count == 0 {
            return "No cycles completed".to_string();
        }
        let line = |label: &str, p: &PhaseStats| {
            format!(
                "{:<10} avg {:>9.6}s  min {:>9.6}s  max {:>9.6}s",
                label, p.avg, p.min, p.max
            )
        };
        format!(
            "Cycles: {}  Bytes: {}\n{}\n{}\n{}",
            s.measurement_count,
            s.bytes_transferred,
            line("recording", &s.record),
            line("playing", &s.play),
            line("latency", &s.latency)
        )
    }
}

impl Default for TimingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingReport for TimingStore {
    fn report(&mut self, timing: &IterationTiming) -> io::Result<()> {
        self.record(timing);
        Ok(())
    }
}
