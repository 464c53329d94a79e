//! Camera façade: preview/capture/record sequencing and the settings sweep.

use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::scoped::with_settings;
use crate::sweep::{SweepConfig, SweepPlan};
use crate::traits::{CameraError, CameraHandle, Result, Settings};

/// Preview time before a capture when none is given.
pub const DEFAULT_PREVIEW_DURATION: Duration = Duration::from_secs(2);

/// Façade over a borrowed camera handle.
pub struct RpiCamera<'c, C: CameraHandle + ?Sized> {
    cam: &'c mut C,
    preview_duration: Duration,
}

impl<'c, C: CameraHandle + ?Sized> RpiCamera<'c, C> {
    /// Wrap a camera handle owned by the caller.
    pub fn new(cam: &'c mut C) -> Self {
        Self {
            cam,
            preview_duration: DEFAULT_PREVIEW_DURATION,
        }
    }

    /// Set the preview time used by the sweep.
    #[must_use]
    pub fn with_preview_duration(mut self, preview_duration: Duration) -> Self {
        self.preview_duration = preview_duration;
        self
    }

    /// Preview time used by the sweep.
    pub fn preview_duration(&self) -> Duration {
        self.preview_duration
    }

    /// The wrapped handle.
    pub fn handle(&mut self) -> &mut C {
        self.cam
    }

    /// Apply `settings` permanently and return the values they replaced.
    ///
    /// Nothing is restored; pass the returned map back in to undo. Fails
    /// with [`CameraError::UnknownSetting`] before writing anything if the
    /// camera lacks one of the keys.
    pub fn settings(&mut self, settings: &Settings) -> Result<Settings> {
        let mut backup = Settings::new();
        for key in settings.keys() {
            let prior = self
                .cam
                .get_setting(key)?
                .ok_or_else(|| CameraError::UnknownSetting(key.clone()))?;
            backup.insert(key.clone(), prior);
        }

        for (key, value) in settings {
            self.cam.set_setting(key, value.clone())?;
        }

        Ok(backup)
    }

    /// Preview for `preview_duration`, then capture a still to `location`.
    pub fn shoot(
        &mut self,
        location: &Path,
        preview_duration: Duration,
        settings: Option<&Settings>,
    ) -> Result<()> {
        with_settings(&mut *self.cam, settings, |cam| {
            cam.start_preview()?;
            thread::sleep(preview_duration);
            info!("Capturing {}", location.display());
            let captured = cam.capture(location);
            let stopped = cam.stop_preview();
            if let (Err(_), Err(err)) = (&captured, &stopped) {
                warn!("Failed to stop preview: {err}");
            }
            captured.and(stopped)
        })
    }

    /// Record video to `location` for `record_duration`.
    ///
    /// Recording and preview are both stopped before returning.
    pub fn record(
        &mut self,
        location: &Path,
        record_duration: Duration,
        settings: Option<&Settings>,
    ) -> Result<()> {
        with_settings(&mut *self.cam, settings, |cam| {
            cam.start_preview()?;
            if let Err(err) = cam.start_recording(location) {
                if let Err(stop_err) = cam.stop_preview() {
                    warn!("Failed to stop preview: {stop_err}");
                }
                return Err(err);
            }
            info!(
                "Recording {} for {:.1}s",
                location.display(),
                record_duration.as_secs_f64()
            );
            thread::sleep(record_duration);

            let recorded = cam.stop_recording();
            let stopped = cam.stop_preview();
            if let (Err(_), Err(err)) = (&recorded, &stopped) {
                warn!("Failed to stop preview: {err}");
            }
            recorded.and(stopped)
        })
    }

    /// Shoot every exposure/AWB/brightness/contrast combination into
    /// `directory` using the default ranges. Returns the number of shots.
    pub fn try_settings(&mut self, directory: &Path) -> Result<usize> {
        self.try_settings_with(directory, &SweepConfig::default())
    }

    /// Like [`RpiCamera::try_settings`] with explicit ranges.
    ///
    /// The first failure aborts the sweep; images already written stay.
    pub fn try_settings_with(&mut self, directory: &Path, config: &SweepConfig) -> Result<usize> {
        let plan = SweepPlan::new(self.cam.exposure_modes()?, self.cam.awb_modes()?, config);
        if plan.is_empty() {
            warn!("Nothing to sweep: no usable exposure/AWB modes or empty level ranges");
        }
        info!(
            "Sweeping {} combinations into {}",
            plan.len(),
            directory.display()
        );

        let mut shots = 0;
        for point in plan.points() {
            self.shoot(
                &point.location(directory),
                self.preview_duration,
                Some(&point.settings()),
            )?;
            shots += 1;
        }

        info!("Sweep finished: {shots} images");
        Ok(shots)
    }
}
