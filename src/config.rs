//! Persistent application configuration
//!
//! Stores device selection and stream parameters in a JSON file at
//! `<config_dir>/mysynth/config.json` (`~/.config` on Linux).

use anyhow::Context;
use mysynth_core::audio::engine::DeviceSelection;
use mysynth_core::audio::format::{ParamsError, StreamParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_sample_rate() -> u32 {
    mysynth_core::DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u16 {
    mysynth_core::DEFAULT_CHANNELS
}

fn default_block_frames() -> usize {
    mysynth_core::DEFAULT_BLOCK_FRAMES
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture device name (None = host default)
    #[serde(default)]
    pub input_device: Option<String>,
    /// Playback device name (None = host default)
    #[serde(default)]
    pub output_device: Option<String>,
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Interleaved channel count
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Frames per block
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            block_frames: default_block_frames(),
        }
    }
}

impl AppConfig {
    /// Config file path: `<config_dir>/mysynth/config.json`
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mysynth")
            .join("config.json")
    }

    /// Load config from the default path, falling back to defaults on any error
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Validated stream parameters
    pub fn stream_params(&self) -> Result<StreamParams, ParamsError> {
        StreamParams::new(self.sample_rate, self.channels, self.block_frames)
    }

    /// Devices to open
    pub fn selection(&self) -> DeviceSelection {
        DeviceSelection {
            input: self.input_device.clone(),
            output: self.output_device.clone(),
        }
    }
}
