//! The capture session controller.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Capturing -> Ready
//!                                  Ready -> SwitchingDevice -> Ready
//! any state -> Failed(reason);  stop(): any state -> Uninitialized
//! ```
//!
//! Hardware operations run one at a time behind an async mutex that plays
//! the role of the session's sequential capture queue. The observable state
//! lives in a `watch` channel so presentation code can follow it from its
//! own thread.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::lease::{DeviceLease, DeviceRegistry};
use super::{CameraBackend, CameraDevice, DeviceInfo, DevicePosition, PermissionGate, PermissionStatus};
use crate::error::{Error, Result};

/// Lifecycle state of a [`CaptureSession`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No device is open.
    #[default]
    Uninitialized,
    /// Permission check and device configuration in progress.
    Initializing,
    /// A device is open and idle.
    Ready,
    /// A still capture is in flight.
    Capturing,
    /// The active device is being swapped.
    SwitchingDevice,
    /// An unrecoverable hardware error occurred.
    Failed(String),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Capturing => write!(f, "capturing"),
            Self::SwitchingDevice => write!(f, "switching_device"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// An open device together with its ownership lease.
struct OpenDevice {
    device: Box<dyn CameraDevice>,
    _lease: DeviceLease,
}

impl OpenDevice {
    fn info(&self) -> &DeviceInfo {
        self.device.info()
    }
}

/// An in-progress transition. On drop the state moves from `during` to
/// `after`, unless something else changed it meanwhile. Runs on cancellation
/// too, so an abandoned operation never leaves the session stuck.
struct Transition<'a> {
    state: &'a watch::Sender<SessionState>,
    during: SessionState,
    after: SessionState,
}

impl Transition<'_> {
    /// Settle on `next` instead of the default outcome.
    fn finish(mut self, next: SessionState) {
        self.after = next;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        let after = std::mem::take(&mut self.after);
        self.state.send_if_modified(|state| {
            if *state == self.during {
                debug!("Capture session {} -> {}", state, after);
                *state = after;
                true
            } else {
                false
            }
        });
    }
}

/// Controls one camera session: permission, start/stop, device switching
/// and single-shot still capture.
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    permission: Arc<dyn PermissionGate>,
    registry: DeviceRegistry,
    preferred: DevicePosition,
    state: watch::Sender<SessionState>,
    queue: Mutex<Option<OpenDevice>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("backend", &self.backend.name())
            .field("preferred", &self.preferred)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    /// Create a session over `backend`, sharing device ownership through
    /// `registry` with every other session in the process.
    #[must_use]
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        permission: Arc<dyn PermissionGate>,
        registry: DeviceRegistry,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            backend,
            permission,
            registry,
            preferred: DevicePosition::default(),
            state,
            queue: Mutex::new(None),
        }
    }

    /// Choose which device position `initialize` tries first.
    #[must_use]
    pub fn with_preferred_position(mut self, position: DevicePosition) -> Self {
        self.preferred = position;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The device currently open, if any. Waits behind queued operations.
    pub async fn active_device(&self) -> Option<DeviceInfo> {
        self.queue.lock().await.as_ref().map(|open| open.info().clone())
    }

    /// Check permission and open a capture device.
    ///
    /// Calling this on a session that already has a device open is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if permission is denied or restricted;
    ///   the session stays `Uninitialized`
    /// - [`Error::DeviceUnavailable`] if no device can be opened; the
    ///   session moves to `Failed`
    pub async fn initialize(&self) -> Result<()> {
        let (mut active, transition) = self
            .lock_settled(|state, has_device| {
                (!has_device).then(|| {
                    self.begin(state, SessionState::Initializing, SessionState::Uninitialized)
                })
            })
            .await;
        let Some(transition) = transition else {
            debug!("Capture session already initialized");
            return Ok(());
        };

        // Dropping the transition on denial returns to Uninitialized.
        self.ensure_permission().await?;

        match self.open_first_available(None).await {
            Ok(open) => {
                info!(
                    "Capture session ready on {} ({})",
                    open.info().id,
                    open.info().position
                );
                *active = Some(open);
                transition.finish(SessionState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("Capture session failed to initialize: {}", e);
                transition.finish(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Capture one still frame from the active device.
    ///
    /// Only one capture may be in flight; a second call made while the
    /// first is pending fails instead of queueing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is not `Ready`
    /// - [`Error::CaptureInProgress`] if another capture is pending
    /// - [`Error::CaptureFailed`] if the device failed; the session returns to `Ready`
    pub async fn capture_photo(&self) -> Result<Vec<u8>> {
        let mut admitted = Err(Error::NotInitialized);
        self.state.send_if_modified(|state| match state {
            SessionState::Ready => {
                admitted = Ok(self.begin(state, SessionState::Capturing, SessionState::Ready));
                true
            }
            SessionState::Capturing => {
                admitted = Err(Error::CaptureInProgress);
                false
            }
            _ => false,
        });
        let admission = admitted?;

        let mut active = self.queue.lock().await;
        let Some(open) = active.as_mut() else {
            return Err(Error::NotInitialized);
        };

        let result = open.device.capture_still().await;
        match &result {
            Ok(bytes) => debug!("Captured {} bytes from {}", bytes.len(), open.info().id),
            Err(e) => warn!("Capture failed on {}: {}", open.info().id, e),
        }

        // Back to Ready before the queue is released.
        drop(admission);
        result
    }

    /// Swap to the next available device.
    ///
    /// A switch requested while a capture is in flight runs after it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if no device is open
    /// - [`Error::NoAlternateDevice`] if the backend has only one device
    /// - [`Error::DeviceUnavailable`] if no other device could be opened;
    ///   the current device stays active
    pub async fn switch_device(&self) -> Result<DeviceInfo> {
        let (mut active, transition) = self
            .lock_settled(|state, has_device| {
                (has_device && *state == SessionState::Ready)
                    .then(|| self.begin(state, SessionState::SwitchingDevice, SessionState::Ready))
            })
            .await;
        let (Some(current), Some(_transition)) = (active.as_mut(), transition) else {
            return Err(Error::NotInitialized);
        };
        if self.backend.devices().len() < 2 {
            return Err(Error::NoAlternateDevice);
        }

        let current_id = current.info().id.clone();
        match self.open_first_available(Some(&current_id)).await {
            Ok(next) => {
                let mut previous = std::mem::replace(current, next);
                if let Err(e) = previous.device.close().await {
                    warn!("Device {} did not close cleanly: {}", current_id, e);
                }
                drop(previous);
                let info = current.info().clone();
                info!("Switched capture device {} -> {}", current_id, info.id);
                Ok(info)
            }
            Err(e) => {
                warn!("Device switch failed, staying on {}: {}", current_id, e);
                Err(e)
            }
        }
    }

    /// Close the active device and return to `Uninitialized`.
    ///
    /// Waits for an in-flight capture to settle first. Safe to call in any
    /// state and any number of times.
    pub async fn stop(&self) {
        let (mut active, ()) = self
            .lock_settled(|state, _| {
                if *state != SessionState::Uninitialized {
                    debug!("Capture session {} -> {}", state, SessionState::Uninitialized);
                    *state = SessionState::Uninitialized;
                }
            })
            .await;
        if let Some(mut open) = active.take() {
            if let Err(e) = open.device.close().await {
                warn!("Device {} did not close cleanly: {}", open.info().id, e);
            }
            info!("Capture session stopped, released {}", open.info().id);
        }
    }

    /// Move `state` into `during` and return the guard that leaves it.
    fn begin(
        &self,
        state: &mut SessionState,
        during: SessionState,
        after: SessionState,
    ) -> Transition<'_> {
        debug!("Capture session {} -> {}", state, during);
        *state = during.clone();
        Transition {
            state: &self.state,
            during,
            after,
        }
    }

    /// Lock the queue once no admitted capture is waiting for it.
    ///
    /// `claim` sees the state and whether a device is open, and runs in the
    /// same atomic step capture admission uses, so no capture can slip in
    /// between the check and the state it sets.
    async fn lock_settled<T>(
        &self,
        mut claim: impl FnMut(&mut SessionState, bool) -> T,
    ) -> (MutexGuard<'_, Option<OpenDevice>>, T) {
        loop {
            let guard = self.queue.lock().await;
            let has_device = guard.is_some();
            let mut outcome = None;
            self.state.send_if_modified(|state| {
                if *state == SessionState::Capturing {
                    return false;
                }
                let before = state.clone();
                outcome = Some(claim(state, has_device));
                *state != before
            });
            if let Some(outcome) = outcome {
                return (guard, outcome);
            }
            drop(guard);
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|s| *s != SessionState::Capturing).await;
        }
    }

    async fn ensure_permission(&self) -> Result<()> {
        let status = match self.permission.status() {
            PermissionStatus::NotDetermined => {
                info!("Requesting camera permission");
                self.permission.request().await
            }
            other => other,
        };
        if status.is_granted() {
            Ok(())
        } else {
            warn!("Camera permission {:?}", status);
            Err(Error::permission_denied())
        }
    }

    /// Open the first device that can be leased and opened.
    ///
    /// Without `after`, devices at the preferred position are tried first.
    /// With `after`, devices are tried in backend order starting after that
    /// id, wrapping around and skipping it.
    async fn open_first_available(&self, after: Option<&str>) -> Result<OpenDevice> {
        let devices = self.backend.devices();
        if devices.is_empty() {
            return Err(Error::device_unavailable(format!(
                "{} backend reports no capture devices",
                self.backend.name()
            )));
        }

        let candidates: Vec<DeviceInfo> = match after {
            None => {
                let (mut first, rest): (Vec<_>, Vec<_>) = devices
                    .into_iter()
                    .partition(|d| d.position == self.preferred);
                first.extend(rest);
                first
            }
            Some(current) => {
                let start = devices
                    .iter()
                    .position(|d| d.id == current)
                    .map_or(0, |i| i + 1);
                let len = devices.len();
                (0..len)
                    .map(|offset| devices[(start + offset) % len].clone())
                    .filter(|d| d.id != current)
                    .collect()
            }
        };

        let mut last_error = None;
        for info in candidates {
            let lease = match self.registry.acquire(&info.id) {
                Ok(lease) => lease,
                Err(e) => {
                    debug!("Skipping {}: {}", info.id, e);
                    last_error = Some(e);
                    continue;
                }
            };
            match self.backend.open(&info).await {
                Ok(device) => {
                    return Ok(OpenDevice {
                        device,
                        _lease: lease,
                    })
                }
                Err(e) => {
                    warn!("Could not open {}: {}", info.id, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::device_unavailable("no capture device could be opened")))
    }
}
