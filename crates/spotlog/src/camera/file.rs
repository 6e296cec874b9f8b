//! Still-file camera backend.
//!
//! Each device is backed by an image file; "capturing" reads the file. This
//! lets photos taken on another device go through the same capture and
//! recording pipeline as a live camera.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{CameraBackend, CameraDevice, DeviceInfo, DevicePosition};
use crate::error::{Error, Result};

/// A backend whose devices read stills from files.
#[derive(Debug, Clone, Default)]
pub struct FileCamera {
    sources: Vec<(DeviceInfo, PathBuf)>,
}

impl FileCamera {
    /// A backend with one device reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::default().with_source("file", DevicePosition::External, path)
    }

    /// Add a device reading from `path`.
    #[must_use]
    pub fn with_source(
        mut self,
        id: impl Into<String>,
        position: DevicePosition,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        self.sources.push((DeviceInfo::new(id, label, position), path));
        self
    }

    fn path_for(&self, device: &DeviceInfo) -> Option<&Path> {
        self.sources
            .iter()
            .find(|(info, _)| info.id == device.id)
            .map(|(_, path)| path.as_path())
    }
}

#[async_trait]
impl CameraBackend for FileCamera {
    fn name(&self) -> &'static str {
        "file"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.sources.iter().map(|(info, _)| info.clone()).collect()
    }

    async fn open(&self, device: &DeviceInfo) -> Result<Box<dyn CameraDevice>> {
        let path = self
            .path_for(device)
            .ok_or_else(|| Error::device_unavailable(format!("unknown device '{}'", device.id)))?;

        let is_file = tokio::fs::metadata(path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            return Err(Error::device_unavailable(format!(
                "still source {} is not a readable file",
                path.display()
            )));
        }

        debug!("Opened still source {}", path.display());
        Ok(Box::new(FileDevice {
            info: device.clone(),
            path: path.to_path_buf(),
        }))
    }
}

#[derive(Debug)]
struct FileDevice {
    info: DeviceInfo,
    path: PathBuf,
}

#[async_trait]
impl CameraDevice for FileDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn capture_still(&mut self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::capture_failed(&self.info.id, e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
