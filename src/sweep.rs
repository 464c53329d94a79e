//! Exposure/white balance/brightness/contrast sweep enumeration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::traits::{SettingValue, Settings};

/// Mode name excluded from the sweep by default.
pub const DEFAULT_SKIPPED_MODE: &str = "off";

/// Brightness and contrast levels swept by default: 10, 20, ..., 90.
pub const DEFAULT_LEVELS: [i64; 9] = [10, 20, 30, 40, 50, 60, 70, 80, 90];

/// Ranges covered by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Brightness values, in order.
    pub brightness: Vec<i64>,
    /// Contrast values, in order.
    pub contrast: Vec<i64>,
    /// Exposure and AWB mode names to leave out.
    pub skip_modes: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_LEVELS.to_vec(),
            contrast: DEFAULT_LEVELS.to_vec(),
            skip_modes: vec![DEFAULT_SKIPPED_MODE.to_owned()],
        }
    }
}

/// One combination of the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPoint {
    /// Exposure mode.
    pub exposure_mode: String,
    /// White balance mode.
    pub awb_mode: String,
    /// Brightness level.
    pub brightness: i64,
    /// Contrast level.
    pub contrast: i64,
}

impl SweepPoint {
    /// File name for the image of this combination.
    pub fn file_name(&self) -> String {
        format!(
            "exp={} wb={} brght={} ctr={}.jpg",
            self.exposure_mode, self.awb_mode, self.brightness, self.contrast
        )
    }

    /// Image path for this combination under `directory`.
    pub fn location(&self, directory: &Path) -> PathBuf {
        directory.join(self.file_name())
    }

    /// Settings applied while shooting this combination.
    pub fn settings(&self) -> Settings {
        crate::traits::settings_from([
            ("brightness", SettingValue::Int(self.brightness)),
            ("contrast", SettingValue::Int(self.contrast)),
            ("exposure_mode", SettingValue::from(self.exposure_mode.as_str())),
            ("awb_mode", SettingValue::from(self.awb_mode.as_str())),
        ])
    }
}

/// The full set of combinations for one camera.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    exposure_modes: Vec<String>,
    awb_modes: Vec<String>,
    brightness: Vec<i64>,
    contrast: Vec<i64>,
}

impl SweepPlan {
    /// Build a plan from the modes a camera reports.
    pub fn new(exposure_modes: Vec<String>, awb_modes: Vec<String>, config: &SweepConfig) -> Self {
        let keep = |mode: &String| !config.skip_modes.contains(mode);
        Self {
            exposure_modes: exposure_modes.into_iter().filter(keep).collect(),
            awb_modes: awb_modes.into_iter().filter(keep).collect(),
            brightness: config.brightness.clone(),
            contrast: config.contrast.clone(),
        }
    }

    /// Number of shots the plan takes.
    pub fn len(&self) -> usize {
        self.exposure_modes.len() * self.awb_modes.len() * self.brightness.len() * self.contrast.len()
    }

    /// Whether the plan takes no shots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Combinations in sweep order: exposure, AWB, brightness, contrast.
    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.exposure_modes.iter().flat_map(move |exposure| {
            self.awb_modes.iter().flat_map(move |awb| {
                self.brightness.iter().flat_map(move |&brightness| {
                    self.contrast.iter().map(move |&contrast| SweepPoint {
                        exposure_mode: exposure.clone(),
                        awb_mode: awb.clone(),
                        brightness,
                        contrast,
                    })
                })
            })
        })
    }
}
