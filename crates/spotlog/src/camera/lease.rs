//! Exclusive ownership of capture devices.
//!
//! A [`DeviceRegistry`] is shared by every capture session in the process.
//! A session must hold a [`DeviceLease`] for a device before opening it; the
//! lease is released when dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{Error, Result};

/// Tracks which devices are currently owned by a session.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership of a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if another session holds it.
    pub fn acquire(&self, device_id: &str) -> Result<DeviceLease> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(device_id.to_string()) {
            return Err(Error::device_unavailable(format!(
                "device '{device_id}' is in use by another session"
            )));
        }
        debug!("Acquired lease on device {}", device_id);
        Ok(DeviceLease {
            device_id: device_id.to_string(),
            registry: self.clone(),
        })
    }

    /// Whether a device is currently leased.
    #[must_use]
    pub fn is_held(&self, device_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(device_id)
    }

    /// Number of devices currently leased.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, device_id: &str) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id);
        debug!("Released lease on device {}", device_id);
    }
}

/// Proof of exclusive ownership of one device.
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
    registry: DeviceRegistry,
}

impl DeviceLease {
    /// The leased device.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.registry.release(&self.device_id);
    }
}
