//! Pi-Cam-Sweep: scoped camera settings and parameter sweeps for Raspberry Pi
//!
//! A [`CameraHandle`] abstracts the camera driver so the [`RpiCamera`] façade
//! can run against real V4L2 hardware or a mock device in tests. Settings
//! applied around a shot are always restored afterwards.

pub mod camera;
pub mod config;
pub mod device;
pub mod scoped;
pub mod sweep;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use camera::{RpiCamera, DEFAULT_PREVIEW_DURATION};
pub use config::Config;
pub use device::V4L2Camera;
pub use scoped::{with_settings, Backup, SettingsScope};
pub use sweep::{SweepConfig, SweepPlan, SweepPoint};
pub use traits::{settings_from, CameraError, CameraHandle, SettingValue, Settings};
