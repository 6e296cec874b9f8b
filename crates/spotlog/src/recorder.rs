//! Turns a captured photo into a log entry.
//!
//! The photo is written to the [`ImageStore`] first and the [`LogEntry`] is
//! only built once that write succeeded, so an entry handed back by the
//! recorder always points at a file that exists. Committing the entry is up
//! to the caller (see [`crate::journal::Journal::commit_entry`]).

use tracing::{info, warn};
use uuid::Uuid;

use crate::camera::CaptureSession;
use crate::error::{Error, Result};
use crate::image_store::{ImageStore, PhotoFormat};
use crate::model::{EntryForm, LogEntry, Spot};

/// Records captures for spots.
#[derive(Debug, Clone)]
pub struct ObservationRecorder {
    store: ImageStore,
    format: PhotoFormat,
}

impl ObservationRecorder {
    /// Create a recorder that writes photos into `store` as JPEG.
    #[must_use]
    pub fn new(store: ImageStore) -> Self {
        Self {
            store,
            format: PhotoFormat::default(),
        }
    }

    /// Use `format` for generated filenames.
    #[must_use]
    pub fn with_format(mut self, format: PhotoFormat) -> Self {
        self.format = format;
        self
    }

    /// The store photos are written to.
    #[must_use]
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Persist `image_bytes` under a fresh name and build the entry for it.
    ///
    /// Form values are copied as given; an out-of-range pain score is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImagePersistenceFailed`] wrapping the store error if
    /// the photo could not be saved. No entry is produced in that case.
    pub async fn record_capture(
        &self,
        spot: &Spot,
        image_bytes: &[u8],
        form: EntryForm,
    ) -> Result<LogEntry> {
        let filename = self.generate_filename();

        if let Err(source) = self.store.save(image_bytes, &filename).await {
            warn!("Photo for spot {} not saved: {}", spot.id, source);
            return Err(Error::ImagePersistenceFailed {
                filename,
                source: Box::new(source),
            });
        }

        let entry = LogEntry::new(spot, filename, form);
        info!(
            "Recorded entry {} for spot '{}' ({})",
            entry.id, spot.title, entry.image_filename
        );
        Ok(entry)
    }

    /// Capture a frame from `session` and record it.
    ///
    /// # Errors
    ///
    /// Returns the session's capture error, or the recording error.
    pub async fn shutter(
        &self,
        session: &CaptureSession,
        spot: &Spot,
        form: EntryForm,
    ) -> Result<LogEntry> {
        let bytes = session.capture_photo().await?;
        self.record_capture(spot, &bytes, form).await
    }

    fn generate_filename(&self) -> String {
        format!("{}.{}", Uuid::new_v4(), self.format.extension())
    }
}
