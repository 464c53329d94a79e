//! Core traits and types for the camera handle abstraction.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A single camera configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Integer value (brightness, contrast, ...).
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Named value (exposure mode, white balance mode, ...).
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl FromStr for SettingValue {
    type Err = std::convert::Infallible;

    /// Parse as an integer, then a float, falling back to text.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(value) = s.parse::<i64>() {
            return Ok(Self::Int(value));
        }
        if let Ok(value) = s.parse::<f64>() {
            return Ok(Self::Float(value));
        }
        Ok(Self::Text(s.to_owned()))
    }
}

/// Mapping from setting name to value.
pub type Settings = BTreeMap<String, SettingValue>;

/// Build a [`Settings`] map from `(key, value)` pairs.
pub fn settings_from<I, K, V>(pairs: I) -> Settings
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<SettingValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Error type for camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// Device with given index was not found.
    #[error("Device {0} not found")]
    DeviceNotFound(u32),
    /// Failed to open device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// The camera has no setting with this name.
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),
    /// The camera rejected a value for a setting.
    #[error("Invalid value {value} for {key}: {reason}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Rejected value.
        value: SettingValue,
        /// Why the camera rejected it.
        reason: String,
    },
    /// The device produces a pixel format we cannot store.
    #[error("Format not supported: {0}")]
    FormatNotSupported(String),
    /// Error during streaming operation.
    #[error("Stream error: {0}")]
    StreamError(String),
    /// Failed to encode a captured frame.
    #[error("Encode error: {0}")]
    Encode(String),
    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over a camera driver handle.
///
/// The handle is constructed and owned by the caller. Everything that talks
/// to it here only borrows it.
pub trait CameraHandle {
    /// Read the current value of a setting. `Ok(None)` means the camera has
    /// no such setting.
    fn get_setting(&self, key: &str) -> Result<Option<SettingValue>>;

    /// Write a setting.
    fn set_setting(&mut self, key: &str, value: SettingValue) -> Result<()>;

    /// Drop a setting that was introduced by [`CameraHandle::set_setting`].
    fn remove_setting(&mut self, key: &str) -> Result<()>;

    /// Start the live preview.
    fn start_preview(&mut self) -> Result<()>;

    /// Stop the live preview.
    fn stop_preview(&mut self) -> Result<()>;

    /// Capture a still image to `location`.
    fn capture(&mut self, location: &Path) -> Result<()>;

    /// Start recording video to `location`.
    fn start_recording(&mut self, location: &Path) -> Result<()>;

    /// Stop the recording started by [`CameraHandle::start_recording`].
    fn stop_recording(&mut self) -> Result<()>;

    /// Exposure modes supported by the camera.
    fn exposure_modes(&self) -> Result<Vec<String>>;

    /// Automatic white balance modes supported by the camera.
    fn awb_modes(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_parse() {
        assert_eq!("42".parse::<SettingValue>().ok(), Some(SettingValue::Int(42)));
        assert_eq!("-3".parse::<SettingValue>().ok(), Some(SettingValue::Int(-3)));
        assert_eq!(
            "1.5".parse::<SettingValue>().ok(),
            Some(SettingValue::Float(1.5))
        );
        assert_eq!(
            "night".parse::<SettingValue>().ok(),
            Some(SettingValue::Text("night".to_owned()))
        );
    }

    #[test]
    fn test_setting_value_display() {
        assert_eq!(SettingValue::Int(10).to_string(), "10");
        assert_eq!(SettingValue::Float(0.5).to_string(), "0.5");
        assert_eq!(SettingValue::from("auto").to_string(), "auto");
    }

    #[test]
    fn test_settings_from_pairs() {
        let settings = settings_from([("brightness", 10), ("contrast", 20)]);
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("brightness"), Some(&SettingValue::Int(10)));
        assert_eq!(settings.get("contrast"), Some(&SettingValue::Int(20)));
    }

    #[test]
    fn test_error_display() {
        let err = CameraError::InvalidValue {
            key: "awb_mode".to_owned(),
            value: SettingValue::from("sunset"),
            reason: "not a menu entry".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value sunset for awb_mode: not a menu entry"
        );
        assert_eq!(
            CameraError::UnknownSetting("zoom".to_owned()).to_string(),
            "Unknown setting: zoom"
        );
    }
}
