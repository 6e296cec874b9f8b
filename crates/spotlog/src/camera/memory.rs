//! In-memory camera backend.
//!
//! Produces synthetic test-pattern frames with programmable latency and
//! failures, and pairs with [`ScriptedPermission`] to play back permission
//! prompts. Useful wherever real hardware is absent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::{CameraBackend, CameraDevice, DeviceInfo, DevicePosition, PermissionGate, PermissionStatus};
use crate::error::{Error, Result};

/// Default synthetic frame size.
const DEFAULT_FRAME_SIZE: (u32, u32) = (64, 48);

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    captured: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    failures: Mutex<VecDeque<String>>,
    per_device: Mutex<HashMap<String, usize>>,
}

/// A camera backend that lives entirely in memory.
#[derive(Debug)]
pub struct MemoryCamera {
    devices: Vec<DeviceInfo>,
    unopenable: HashSet<String>,
    frame_size: (u32, u32),
    latency: Duration,
    open_latency: Duration,
    counters: Arc<Counters>,
}

impl Default for MemoryCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCamera {
    /// One rear-facing device.
    #[must_use]
    pub fn new() -> Self {
        Self::empty().with_device(DeviceInfo::new("back", "Back Camera", DevicePosition::Back))
    }

    /// Rear- and front-facing devices.
    #[must_use]
    pub fn dual() -> Self {
        Self::new().with_device(DeviceInfo::new("front", "Front Camera", DevicePosition::Front))
    }

    /// No devices at all, like a machine without camera hardware.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            devices: Vec::new(),
            unopenable: HashSet::new(),
            frame_size: DEFAULT_FRAME_SIZE,
            latency: Duration::ZERO,
            open_latency: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Add a device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.devices.push(device);
        self
    }

    /// Make a device refuse to open.
    #[must_use]
    pub fn with_unopenable(mut self, device_id: impl Into<String>) -> Self {
        self.unopenable.insert(device_id.into());
        self
    }

    /// Delay every capture by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay every device open by `latency`.
    #[must_use]
    pub fn with_open_latency(mut self, latency: Duration) -> Self {
        self.open_latency = latency;
        self
    }

    /// Set the synthetic frame dimensions.
    #[must_use]
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width.max(1), height.max(1));
        self
    }

    /// Make the next capture on any device fail with `message`.
    pub fn fail_next_capture(&self, message: impl Into<String>) {
        self.counters
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.into());
    }

    /// Number of devices opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of devices closed so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Number of successful captures across all devices.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.counters.captured.load(Ordering::SeqCst)
    }

    /// Most captures ever running at the same time, across all devices.
    #[must_use]
    pub fn peak_concurrent_captures(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of successful captures on one device.
    #[must_use]
    pub fn captures_on(&self, device_id: &str) -> usize {
        self.counters
            .per_device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CameraBackend for MemoryCamera {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    async fn open(&self, device: &DeviceInfo) -> Result<Box<dyn CameraDevice>> {
        if self.unopenable.contains(&device.id) || !self.devices.contains(device) {
            return Err(Error::device_unavailable(format!(
                "device '{}' could not be opened",
                device.id
            )));
        }
        if !self.open_latency.is_zero() {
            tokio::time::sleep(self.open_latency).await;
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryDevice {
            info: device.clone(),
            frame_size: self.frame_size,
            latency: self.latency,
            counters: self.counters.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryDevice {
    info: DeviceInfo,
    frame_size: (u32, u32),
    latency: Duration,
    counters: Arc<Counters>,
}

#[async_trait]
impl CameraDevice for MemoryDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn capture_still(&mut self) -> Result<Vec<u8>> {
        let running = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .counters
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(message) = failure {
            return Err(Error::capture_failed(&self.info.id, message));
        }

        let sequence = self.counters.captured.fetch_add(1, Ordering::SeqCst);
        *self
            .counters
            .per_device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(self.info.id.clone())
            .or_default() += 1;

        test_pattern(self.frame_size, sequence)
            .map_err(|e| Error::capture_failed(&self.info.id, e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Encode a gradient frame whose blue channel shifts with `sequence`.
fn test_pattern((width, height): (u32, u32), sequence: usize) -> image::ImageResult<Vec<u8>> {
    let tint = u8::try_from(sequence % 256).unwrap_or(0);
    let frame = RgbImage::from_fn(width, height, |x, y| {
        let r = u8::try_from(x * 255 / width.max(1)).unwrap_or(u8::MAX);
        let g = u8::try_from(y * 255 / height.max(1)).unwrap_or(u8::MAX);
        Rgb([r, g, tint])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(frame).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Permission gate with a fixed answer to the prompt.
#[derive(Debug)]
pub struct ScriptedPermission {
    status: Mutex<PermissionStatus>,
    answer: PermissionStatus,
    delay: Duration,
    requests: AtomicUsize,
}

impl ScriptedPermission {
    /// Already granted.
    #[must_use]
    pub fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted)
    }

    /// Already denied.
    #[must_use]
    pub fn denied() -> Self {
        Self::with_status(PermissionStatus::Denied)
    }

    /// Restricted by policy.
    #[must_use]
    pub fn restricted() -> Self {
        Self::with_status(PermissionStatus::Restricted)
    }

    /// Not yet asked; the prompt will be answered with `answer`.
    #[must_use]
    pub fn undetermined(answer: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(PermissionStatus::NotDetermined),
            answer,
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }

    /// Simulate the user taking `delay` to answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many times the prompt was shown.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn with_status(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            answer: status,
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermissionGate for ScriptedPermission {
    fn status(&self) -> PermissionStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *status == PermissionStatus::NotDetermined {
            *status = self.answer;
        }
        *status
    }
}
