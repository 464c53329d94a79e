//! Mock camera handle for testing without hardware.

use crate::traits::{CameraError, CameraHandle, Result, SettingValue, Settings};
use std::path::{Path, PathBuf};

/// A call made against [`MockCamera`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `set_setting(key, value)`.
    Set(String, SettingValue),
    /// `remove_setting(key)`.
    Remove(String),
    /// `start_preview()`.
    StartPreview,
    /// `stop_preview()`.
    StopPreview,
    /// `capture(path)`.
    Capture(PathBuf),
    /// `start_recording(path)`.
    StartRecording(PathBuf),
    /// `stop_recording()`.
    StopRecording,
}

/// Mock camera that keeps its settings in a map and logs every call.
pub struct MockCamera {
    settings: Settings,
    exposure_modes: Vec<String>,
    awb_modes: Vec<String>,
    rejected: Vec<(String, SettingValue)>,
    fail_capture: bool,
    fail_start_recording: bool,
    fail_stop_recording: bool,
    calls: Vec<Call>,
    captures: Vec<(PathBuf, Settings)>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCamera {
    /// Create a mock with picamera-like defaults.
    #[must_use]
    pub fn new() -> Self {
        let settings = crate::traits::settings_from([
            ("brightness", SettingValue::Int(50)),
            ("contrast", SettingValue::Int(0)),
            ("exposure_mode", SettingValue::from("auto")),
            ("awb_mode", SettingValue::from("auto")),
        ]);
        Self {
            settings,
            exposure_modes: vec!["off".to_owned(), "auto".to_owned(), "night".to_owned()],
            awb_modes: vec!["off".to_owned(), "auto".to_owned()],
            rejected: Vec::new(),
            fail_capture: false,
            fail_start_recording: false,
            fail_stop_recording: false,
            calls: Vec::new(),
            captures: Vec::new(),
        }
    }

    /// Replace the reported exposure and white balance modes.
    #[must_use]
    pub fn with_modes(mut self, exposure: &[&str], awb: &[&str]) -> Self {
        self.exposure_modes = exposure.iter().map(|&mode| mode.to_owned()).collect();
        self.awb_modes = awb.iter().map(|&mode| mode.to_owned()).collect();
        self
    }

    /// Make `set_setting(key, value)` fail.
    #[must_use]
    pub fn rejecting<V: Into<SettingValue>>(mut self, key: &str, value: V) -> Self {
        self.rejected.push((key.to_owned(), value.into()));
        self
    }

    /// Make every `capture` fail.
    #[must_use]
    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// Make every `start_recording` fail.
    #[must_use]
    pub fn failing_start_recording(mut self) -> Self {
        self.fail_start_recording = true;
        self
    }

    /// Make every `stop_recording` fail.
    #[must_use]
    pub fn failing_stop_recording(mut self) -> Self {
        self.fail_stop_recording = true;
        self
    }

    /// Current settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Calls other than `Set`/`Remove`.
    pub fn device_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, Call::Set(..) | Call::Remove(_)))
            .cloned()
            .collect()
    }

    /// Each captured path with the settings in effect at capture time.
    pub fn captures(&self) -> &[(PathBuf, Settings)] {
        &self.captures
    }
}

impl CameraHandle for MockCamera {
    fn get_setting(&self, key: &str) -> Result<Option<SettingValue>> {
        Ok(self.settings.get(key).cloned())
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) -> Result<()> {
        self.calls.push(Call::Set(key.to_owned(), value.clone()));
        if self
            .rejected
            .iter()
            .any(|(rejected_key, rejected)| rejected_key == key && *rejected == value)
        {
            return Err(CameraError::InvalidValue {
                key: key.to_owned(),
                value,
                reason: "rejected by mock".to_owned(),
            });
        }
        self.settings.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove_setting(&mut self, key: &str) -> Result<()> {
        self.calls.push(Call::Remove(key.to_owned()));
        self.settings.remove(key);
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        self.calls.push(Call::StartPreview);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        self.calls.push(Call::StopPreview);
        Ok(())
    }

    fn capture(&mut self, location: &Path) -> Result<()> {
        self.calls.push(Call::Capture(location.to_path_buf()));
        if self.fail_capture {
            return Err(CameraError::StreamError("capture failed".to_owned()));
        }
        self.captures
            .push((location.to_path_buf(), self.settings.clone()));
        Ok(())
    }

    fn start_recording(&mut self, location: &Path) -> Result<()> {
        self.calls.push(Call::StartRecording(location.to_path_buf()));
        if self.fail_start_recording {
            return Err(CameraError::StreamError("start_recording failed".to_owned()));
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.calls.push(Call::StopRecording);
        if self.fail_stop_recording {
            return Err(CameraError::StreamError("stop_recording failed".to_owned()));
        }
        Ok(())
    }

    fn exposure_modes(&self) -> Result<Vec<String>> {
        Ok(self.exposure_modes.clone())
    }

    fn awb_modes(&self) -> Result<Vec<String>> {
        Ok(self.awb_modes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_creation() {
        let camera = MockCamera::new();
        assert_eq!(
            camera.get_setting("brightness").expect("get_setting failed"),
            Some(SettingValue::Int(50))
        );
        assert_eq!(
            camera.get_setting("iso").expect("get_setting failed"),
            None
        );
        assert!(camera.calls().is_empty());
    }

    #[test]
    fn test_mock_camera_set_and_remove() {
        let mut camera = MockCamera::new();
        camera
            .set_setting("iso", SettingValue::Int(800))
            .expect("set_setting failed");
        assert_eq!(camera.settings().get("iso"), Some(&SettingValue::Int(800)));

        camera.remove_setting("iso").expect("remove_setting failed");
        assert!(!camera.settings().contains_key("iso"));
    }

    #[test]
    fn test_mock_camera_rejects_value() {
        let mut camera = MockCamera::new().rejecting("exposure_mode", "night");
        let result = camera.set_setting("exposure_mode", SettingValue::from("night"));
        assert!(matches!(result, Err(CameraError::InvalidValue { .. })));
        assert_eq!(
            camera.settings().get("exposure_mode"),
            Some(&SettingValue::from("auto"))
        );
    }

    #[test]
    fn test_mock_camera_records_captures() {
        let mut camera = MockCamera::new();
        camera
            .capture(Path::new("a.jpg"))
            .expect("capture failed");
        assert_eq!(camera.captures().len(), 1);
        assert_eq!(camera.device_calls(), vec![Call::Capture("a.jpg".into())]);
    }
}
