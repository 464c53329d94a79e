//! V4L2 camera handle implementation using the v4l crate.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use v4l::buffer::Type;
use v4l::control::{self, Control, Description, MenuItem, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::traits::{CameraError, CameraHandle, Result, SettingValue};

/// Buffers used for a still capture.
const CAPTURE_BUFFERS: u32 = 4;

/// Buffers used while recording.
const RECORD_BUFFERS: u32 = 8;

const MJPG: [u8; 4] = *b"MJPG";
const YUYV: [u8; 4] = *b"YUYV";

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

struct Recording {
    location: PathBuf,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<Result<u64>>,
}

/// Camera handle backed by a V4L2 device such as `/dev/video0`.
///
/// Settings map onto V4L2 controls by normalized name; `exposure_mode` and
/// `awb_mode` are aliases for the auto exposure and white balance preset
/// menus. V4L2 has no viewfinder, so preview is tracked as state only and a
/// capture drops a few warm-up frames instead.
pub struct V4L2Camera {
    index: u32,
    device: Device,
    capabilities: DeviceCapabilities,
    controls: Vec<Description>,
    warmup_frames: u32,
    previewing: bool,
    recording: Option<Recording>,
}

impl V4L2Camera {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        let device = open_device(index)?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        let controls = device
            .query_controls()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;
        debug!(
            "{} controls: {:?}",
            capabilities.card,
            controls.iter().map(|desc| &desc.name).collect::<Vec<_>>()
        );

        let mut camera = Self {
            index,
            device,
            capabilities,
            controls,
            warmup_frames: crate::config::DEFAULT_WARMUP_FRAMES,
            previewing: false,
            recording: None,
        };
        camera.prefer_mjpeg()?;
        Ok(camera)
    }

    /// Set how many frames a capture drops before saving one.
    #[must_use]
    pub fn with_warmup_frames(mut self, warmup_frames: u32) -> Self {
        self.warmup_frames = warmup_frames;
        self
    }

    /// Get device capabilities.
    pub const fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Whether a preview is active.
    pub const fn is_previewing(&self) -> bool {
        self.previewing
    }

    /// Ask the driver for MJPG output so captures need no encoding. The
    /// driver may keep another format.
    fn prefer_mjpeg(&mut self) -> Result<()> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        fmt.fourcc = FourCC::new(&MJPG);

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        debug!(
            "Capture format: {}x{} {}",
            fmt.width,
            fmt.height,
            fourcc_name(fmt.fourcc)
        );
        Ok(())
    }

    /// Driver default for `key`, or `None` if the device has no such control.
    pub fn default_setting(&self, key: &str) -> Result<Option<SettingValue>> {
        self.control(key)
            .map(|desc| decode_value(desc, raw_value(desc, desc.default)))
            .transpose()
    }

    fn control(&self, key: &str) -> Option<&Description> {
        let wanted = control_name(key);
        self.controls
            .iter()
            .find(|desc| normalize_name(&desc.name) == wanted)
    }

    fn menu_entries(&self, key: &str) -> Vec<String> {
        self.control(key)
            .and_then(|desc| desc.items.as_ref())
            .map(|items| {
                items
                    .iter()
                    .map(|(_, item)| match item {
                        MenuItem::Name(name) => normalize_name(name),
                        MenuItem::Value(value) => value.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl CameraHandle for V4L2Camera {
    fn get_setting(&self, key: &str) -> Result<Option<SettingValue>> {
        let Some(desc) = self.control(key) else {
            return Ok(None);
        };
        let ctrl = self
            .device
            .control(desc.id)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        decode_value(desc, ctrl.value).map(Some)
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) -> Result<()> {
        let desc = self
            .control(key)
            .ok_or_else(|| CameraError::UnknownSetting(key.to_owned()))?;
        let encoded = encode_value(desc, key, &value)?;
        self.device
            .set_control(Control {
                id: desc.id,
                value: encoded,
            })
            .map_err(|err| CameraError::InvalidValue {
                key: key.to_owned(),
                value,
                reason: err.to_string(),
            })
    }

    /// Controls cannot be deleted; this resets the control to its default.
    ///
    /// A scope only removes keys that `get_setting` reported absent, and
    /// those have no control here, so scoped restores never reach the reset.
    /// Unknown keys are ignored.
    fn remove_setting(&mut self, key: &str) -> Result<()> {
        let Some(desc) = self.control(key) else {
            return Ok(());
        };
        self.device
            .set_control(Control {
                id: desc.id,
                value: raw_value(desc, desc.default),
            })
            .map_err(|err| CameraError::StreamError(err.to_string()))
    }

    fn start_preview(&mut self) -> Result<()> {
        if self.previewing {
            debug!("Preview already running");
        }
        self.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        self.previewing = false;
        Ok(())
    }

    fn capture(&mut self, location: &Path) -> Result<()> {
        let format = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, CAPTURE_BUFFERS)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        for _ in 0..self.warmup_frames {
            stream
                .next()
                .map_err(|err| CameraError::StreamError(err.to_string()))?;
        }

        let (buf, meta) = stream
            .next()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        let used = usize::try_from(meta.bytesused).map_or(buf.len(), |used| used.min(buf.len()));

        write_frame(location, buf.get(..used).unwrap_or(buf), &format)?;
        info!("Saved {} ({used} bytes)", location.display());
        Ok(())
    }

    fn start_recording(&mut self, location: &Path) -> Result<()> {
        if let Some(recording) = &self.recording {
            return Err(CameraError::StreamError(format!(
                "already recording to {}",
                recording.location.display()
            )));
        }

        let format = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        ensure_recordable(format.fourcc)?;

        let out = BufWriter::new(File::create(location)?);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let index = self.index;

        let worker = thread::Builder::new()
            .name("v4l-record".to_owned())
            .spawn(move || record_frames(index, out, &flag))?;

        self.recording = Some(Recording {
            location: location.to_path_buf(),
            stop,
            worker,
        });
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let recording = self
            .recording
            .take()
            .ok_or_else(|| CameraError::StreamError("not recording".to_owned()))?;

        let frames = finish_recording(recording.stop, recording.worker)?;
        info!(
            "Recorded {frames} frames to {}",
            recording.location.display()
        );
        Ok(())
    }

    fn exposure_modes(&self) -> Result<Vec<String>> {
        Ok(self.menu_entries("exposure_mode"))
    }

    fn awb_modes(&self) -> Result<Vec<String>> {
        Ok(self.menu_entries("awb_mode"))
    }
}

impl Drop for V4L2Camera {
    fn drop(&mut self) {
        if let Some(recording) = self.recording.take() {
            if let Err(err) = finish_recording(recording.stop, recording.worker) {
                warn!("Recording to {} failed: {err}", recording.location.display());
            }
        }
    }
}

fn open_device(index: u32) -> Result<Device> {
    Device::new(index as usize).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            CameraError::DeviceNotFound(index)
        } else {
            CameraError::DeviceOpenFailed(err.to_string())
        }
    })
}

/// Recordings are a concatenated MJPG stream; raw formats have no framing.
fn ensure_recordable(fourcc: FourCC) -> Result<()> {
    if fourcc.repr == MJPG {
        Ok(())
    } else {
        Err(CameraError::FormatNotSupported(fourcc_name(fourcc)))
    }
}

/// Append frames from a fresh handle on the same device until `stop` is set.
fn record_frames(index: u32, mut out: BufWriter<File>, stop: &AtomicBool) -> Result<u64> {
    let device = open_device(index)?;
    let mut stream = Stream::with_buffers(&device, Type::VideoCapture, RECORD_BUFFERS)
        .map_err(|err| CameraError::StreamError(err.to_string()))?;

    let mut frames = 0;
    while !stop.load(Ordering::Relaxed) {
        let (buf, meta) = stream
            .next()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        let used = usize::try_from(meta.bytesused).map_or(buf.len(), |used| used.min(buf.len()));
        out.write_all(buf.get(..used).unwrap_or(buf))?;
        frames += 1;
    }

    out.flush()?;
    Ok(frames)
}

fn finish_recording(stop: Arc<AtomicBool>, worker: JoinHandle<Result<u64>>) -> Result<u64> {
    stop.store(true, Ordering::Relaxed);
    worker
        .join()
        .map_err(|_| CameraError::StreamError("recording thread panicked".to_owned()))?
}

/// Store one frame at `location`. MJPG is written as-is; YUYV is converted
/// and encoded according to the file extension.
fn write_frame(location: &Path, data: &[u8], format: &Format) -> Result<()> {
    let (width, height) = (format.width, format.height);
    match format.fourcc.repr {
        MJPG => {
            fs::write(location, data)?;
            Ok(())
        }
        YUYV => {
            // A stride of 0 means rows are packed.
            let row_bytes = width as usize * 2;
            let stride = (format.stride as usize).max(row_bytes);
            let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
            for row in data.chunks(stride).take(height as usize) {
                rgb.extend(yuyv_to_rgb(row.get(..row_bytes).unwrap_or(row)));
            }
            let image = image::RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
                CameraError::Encode(format!(
                    "short frame: {} bytes for {width}x{height}",
                    data.len()
                ))
            })?;
            image
                .save(location)
                .map_err(|err| CameraError::Encode(err.to_string()))
        }
        _ => Err(CameraError::FormatNotSupported(fourcc_name(format.fourcc))),
    }
}

fn fourcc_name(fourcc: FourCC) -> String {
    String::from_utf8_lossy(&fourcc.repr).into_owned()
}

/// Lowercase `name` and collapse every run of other characters into `_`,
/// so "White Balance, Auto & Preset" becomes `white_balance_auto_preset`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// V4L2 control name for a setting key.
fn control_name(key: &str) -> String {
    match key {
        "exposure_mode" => "auto_exposure".to_owned(),
        "awb_mode" => "white_balance_auto_preset".to_owned(),
        other => normalize_name(other),
    }
}

fn raw_value(desc: &Description, raw: i64) -> Value {
    if matches!(desc.typ, control::Type::Boolean) {
        Value::Boolean(raw != 0)
    } else {
        Value::Integer(raw)
    }
}

fn decode_value(desc: &Description, value: Value) -> Result<SettingValue> {
    match value {
        Value::Integer(raw) => {
            let name = desc.items.as_ref().and_then(|items| {
                items
                    .iter()
                    .find(|(index, _)| i64::from(*index) == raw)
                    .and_then(|(_, item)| match item {
                        MenuItem::Name(name) => Some(normalize_name(name)),
                        MenuItem::Value(_) => None,
                    })
            });
            Ok(name.map_or(SettingValue::Int(raw), SettingValue::Text))
        }
        Value::Boolean(flag) => Ok(SettingValue::Int(i64::from(flag))),
        Value::String(text) => Ok(SettingValue::Text(text)),
        _ => Err(CameraError::StreamError(format!(
            "unsupported value type for control {}",
            desc.name
        ))),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_value(desc: &Description, key: &str, value: &SettingValue) -> Result<Value> {
    let invalid = |reason: String| CameraError::InvalidValue {
        key: key.to_owned(),
        value: value.clone(),
        reason,
    };

    let raw = match value {
        SettingValue::Text(name) => {
            if let Some(items) = &desc.items {
                let wanted = normalize_name(name);
                return items
                    .iter()
                    .find_map(|(index, item)| match item {
                        MenuItem::Name(entry) if normalize_name(entry) == wanted => {
                            Some(Value::Integer(i64::from(*index)))
                        }
                        _ => None,
                    })
                    .ok_or_else(|| invalid("no such menu entry".to_owned()));
            }
            if matches!(desc.typ, control::Type::String) {
                return Ok(Value::String(name.clone()));
            }
            return Err(invalid("expected a number".to_owned()));
        }
        SettingValue::Int(raw) => *raw,
        SettingValue::Float(raw) => {
            let rounded = raw.round();
            if !rounded.is_finite() {
                return Err(invalid("not a finite number".to_owned()));
            }
            rounded as i64
        }
    };

    if raw < desc.minimum || raw > desc.maximum {
        return Err(invalid(format!(
            "outside {}..={}",
            desc.minimum, desc.maximum
        )));
    }
    Ok(raw_value(desc, raw))
}

/// Convert a packed YUYV buffer to RGB24.
pub fn yuyv_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for chunk in data.chunks_exact(4) {
        // YUYV format: [Y0 U Y1 V], each pair of pixels shares U and V
        if let &[y0, u, y1, v] = chunk {
            let (r, g, b) = yuv_to_rgb(y0, u, v);
            rgb.extend_from_slice(&[r, g, b]);
            let (r, g, b) = yuv_to_rgb(y1, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

/// Convert YUV values to RGB using ITU-R BT.601.
#[must_use]
#[allow(clippy::many_single_char_names)]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |val: f32| -> u8 { val.clamp(0.0, 255.0) as u8 };

    (clamp(r), clamp(g), clamp(b))
}
