//! Configuration file handling.
//!
//! Every field is optional; a missing file section falls back to the
//! defaults the sweep has always used.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::sweep::SweepConfig;
use crate::traits::{CameraError, Result};

/// Default preview time before each capture, in seconds.
pub const DEFAULT_PREVIEW_SECS: f64 = 2.0;

/// Default number of frames dropped before a capture.
pub const DEFAULT_WARMUP_FRAMES: u32 = 5;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device index (`/dev/video{device}`).
    pub device: u32,
    /// Preview time before each capture, in seconds.
    pub preview_secs: f64,
    /// Frames dropped before each capture.
    pub warmup_frames: u32,
    /// Sweep ranges.
    pub sweep: SweepConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: 0,
            preview_secs: DEFAULT_PREVIEW_SECS,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            sweep: SweepConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| CameraError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| CameraError::Config(err.to_string()))?;
        config.preview_duration()?;
        Ok(config)
    }

    /// Preview time as a [`Duration`].
    pub fn preview_duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.preview_secs).map_err(|err| {
            CameraError::Config(format!("invalid preview_secs {}: {err}", self.preview_secs))
        })
    }
}
