//! Audio processing module
//!
//! This module contains all audio-related functionality including:
//! - Stream parameters and the block buffer type ([`format`])
//! - Duplex and playback stream traits, device errors ([`stream`])
//! - cpal hardware backend and device enumeration ([`engine`])
//! - Virtual loopback device for running without hardware ([`virtual_device`])
//! - The timed read-then-write loop ([`passthrough`])
//! - Pseudo-random noise playback ([`noise`])

pub mod engine;
pub mod format;
pub mod noise;
pub mod passthrough;
pub mod stream;
pub mod virtual_device;
