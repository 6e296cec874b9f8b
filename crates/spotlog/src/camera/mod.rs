//! Camera hardware abstraction and the capture session controller.
//!
//! This module defines the traits a camera backend must fulfill, the
//! permission gate consulted before a device is opened, and the
//! [`CaptureSession`] state machine that drives them.

pub mod file;
pub mod lease;
pub mod memory;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileCamera;
pub use lease::{DeviceLease, DeviceRegistry};
pub use memory::{MemoryCamera, ScriptedPermission};
pub use session::{CaptureSession, SessionState};

/// Which way a capture device faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    /// Rear-facing camera.
    #[default]
    Back,
    /// Front-facing camera.
    Front,
    /// Externally attached or virtual device.
    External,
}

impl std::fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Back => write!(f, "back"),
            Self::Front => write!(f, "front"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Description of a capture device a backend can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable identifier, unique per physical device.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Which way the device faces.
    pub position: DevicePosition,
}

impl DeviceInfo {
    /// Create a new device description.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            position,
        }
    }
}

/// Camera permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// Capture is allowed.
    Granted,
    /// The user refused.
    Denied,
    /// Policy forbids capture (parental controls, MDM).
    Restricted,
}

impl PermissionStatus {
    /// Whether capture may proceed.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// An opened capture device.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// The device this handle was opened for.
    fn info(&self) -> &DeviceInfo;

    /// Take one still frame and return its encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CaptureFailed`] if the device could not deliver a frame.
    async fn capture_still(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying hardware.
    ///
    /// # Errors
    ///
    /// Returns an error if the device did not shut down cleanly.
    async fn close(&mut self) -> Result<()>;
}

/// A source of capture devices.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// The name of this backend (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Enumerate devices in a stable order.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Open a device for exclusive use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeviceUnavailable`] if the device cannot be opened.
    async fn open(&self, device: &DeviceInfo) -> Result<Box<dyn CameraDevice>>;
}

/// Platform camera permission check.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Current permission status, without prompting.
    fn status(&self) -> PermissionStatus;

    /// Ask the user for permission. May wait for as long as the user takes
    /// to answer; `Denied` is an ordinary answer.
    async fn request(&self) -> PermissionStatus;
}

/// Permission gate for backends that need no user consent, such as reading
/// stills from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissionRequired;

#[async_trait]
impl PermissionGate for NoPermissionRequired {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

/// Get instructions for how to grant camera permission.
#[must_use]
pub fn permission_instructions() -> &'static str {
    "open Settings > Privacy & Security > Camera and allow spotlog to use the camera, \
     then try again"
}
