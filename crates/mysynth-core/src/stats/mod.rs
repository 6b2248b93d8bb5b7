//! Timing statistics module
//!
//! Keeps recent per-iteration timings and running statistics for the
//! passthrough loop.

pub mod store;
