//! Temporarily applied camera settings.
//!
//! [`SettingsScope`] applies a [`Settings`] map to a camera and restores the
//! previous state when the scope ends. Settings that existed are written
//! back; settings that did not exist are removed again. Restoration runs on
//! every exit path: explicitly through [`SettingsScope::finish`], or from
//! `Drop` on early return and unwinding.

use std::ops::{Deref, DerefMut};

use log::{debug, warn};

use crate::traits::{CameraHandle, Result, SettingValue, Settings};

/// Prior state of each applied setting, in application order.
///
/// `None` marks a setting that was absent before the scope opened.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Backup {
    entries: Vec<(String, Option<SettingValue>)>,
}

impl Backup {
    /// Number of recorded settings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior value of `key`. The outer `Option` is `None` if `key` was never
    /// applied; the inner one is `None` if it was absent on the camera.
    pub fn prior(&self, key: &str) -> Option<Option<&SettingValue>> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, prior)| prior.as_ref())
    }

    /// Settings that did not exist before the scope.
    pub fn introduced(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, prior)| prior.is_none())
            .map(|(name, _)| name.as_str())
    }
}

/// Guard holding settings applied to a borrowed camera.
pub struct SettingsScope<'a, C: CameraHandle + ?Sized> {
    camera: &'a mut C,
    backup: Backup,
    restored: bool,
}

impl<'a, C: CameraHandle + ?Sized> SettingsScope<'a, C> {
    /// Apply `settings` to `camera`, recording what they replace.
    ///
    /// `None` applies nothing. If a write fails, the settings applied so far
    /// are restored before the error is returned.
    pub fn apply(camera: &'a mut C, settings: Option<&Settings>) -> Result<Self> {
        let mut scope = Self {
            camera,
            backup: Backup::default(),
            restored: false,
        };

        for (key, value) in settings.into_iter().flatten() {
            let prior = scope.camera.get_setting(key)?;
            scope.backup.entries.push((key.clone(), prior));
            scope.camera.set_setting(key, value.clone())?;
            debug!("Applied {key}={value}");
        }

        Ok(scope)
    }

    /// What the scope will restore.
    pub const fn backup(&self) -> &Backup {
        &self.backup
    }

    /// Restore the camera and close the scope.
    pub fn finish(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        self.restored = true;
        let mut first_err = None;

        for (key, prior) in self.backup.entries.drain(..).rev() {
            let outcome = match prior {
                Some(value) => {
                    debug!("Restoring {key}={value}");
                    self.camera.set_setting(&key, value)
                }
                None => {
                    debug!("Removing {key}");
                    self.camera.remove_setting(&key)
                }
            };
            if let Err(err) = outcome {
                if first_err.is_none() {
                    first_err = Some(err);
                } else {
                    warn!("Failed to restore {key}: {err}");
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

impl<C: CameraHandle + ?Sized> Deref for SettingsScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.camera
    }
}

impl<C: CameraHandle + ?Sized> DerefMut for SettingsScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.camera
    }
}

impl<C: CameraHandle + ?Sized> Drop for SettingsScope<'_, C> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(err) = self.restore() {
                warn!("Failed to restore camera settings: {err}");
            }
        }
    }
}

/// Run `body` with `settings` applied to `camera`, restoring afterwards.
///
/// An error from `body` takes precedence over a restore error, which is then
/// only logged.
pub fn with_settings<C, T, F>(camera: &mut C, settings: Option<&Settings>, body: F) -> Result<T>
where
    C: CameraHandle + ?Sized,
    F: FnOnce(&mut C) -> Result<T>,
{
    let mut scope = SettingsScope::apply(camera, settings)?;
    let outcome = body(&mut *scope);
    let restored = scope.finish();

    match outcome {
        Ok(value) => restored.map(|()| value),
        Err(err) => {
            if let Err(restore_err) = restored {
                warn!("Failed to restore camera settings: {restore_err}");
            }
            Err(err)
        }
    }
}
