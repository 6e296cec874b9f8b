//! Error types for spotlog.
//!
//! This module defines all error types used throughout the spotlog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for spotlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Camera Errors ===
    /// Camera permission was denied or is restricted on this device.
    #[error("camera permission denied: {instructions}")]
    PermissionDenied {
        /// Instructions for granting the permission.
        instructions: String,
    },

    /// No capture device could be opened.
    #[error("capture device unavailable: {reason}")]
    DeviceUnavailable {
        /// Why no device could be opened.
        reason: String,
    },

    /// The capture session is not in the `Ready` state.
    #[error("capture session is not initialized")]
    NotInitialized,

    /// A still capture is already in flight on this session.
    #[error("a capture is already in progress")]
    CaptureInProgress,

    /// Device switching was requested but only one device exists.
    #[error("no alternate capture device available")]
    NoAlternateDevice,

    /// The device failed to deliver a still frame. Not fatal to the session.
    #[error("capture failed on device '{device}': {message}")]
    CaptureFailed {
        /// Identifier of the device that failed.
        device: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Image Store Errors ===
    /// The bytes handed to the store are not a decodable raster image.
    #[error("invalid image data: {reason}")]
    InvalidImage {
        /// Why the image was rejected.
        reason: String,
    },

    /// The filename is empty or escapes the photo directory.
    #[error("invalid photo filename {filename:?}")]
    InvalidFilename {
        /// The rejected filename.
        filename: String,
    },

    /// The filename extension is not one of png, jpg, jpeg.
    #[error("unsupported photo format for {filename:?}")]
    UnsupportedFormat {
        /// The rejected filename.
        filename: String,
    },

    /// No photo with this name exists in the store.
    #[error("photo not found: {filename}")]
    FileNotFound {
        /// The missing filename.
        filename: String,
    },

    /// A stored photo could not be decoded (truncated or corrupted on disk).
    #[error("stored photo {filename} is unreadable: {reason}")]
    ImageDecode {
        /// The corrupted filename.
        filename: String,
        /// Decoder message.
        reason: String,
    },

    /// Persisting the captured photo failed, so no entry was produced.
    #[error("failed to persist photo {filename}: {source}")]
    ImagePersistenceFailed {
        /// The generated filename that could not be written.
        filename: String,
        /// The underlying image store error.
        #[source]
        source: Box<Error>,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The record type ("profile", "spot", "entry").
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for spotlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a permission denied error with the standard settings hint.
    #[must_use]
    pub fn permission_denied() -> Self {
        Self::PermissionDenied {
            instructions: crate::camera::permission_instructions().to_string(),
        }
    }

    /// Create a device unavailable error.
    #[must_use]
    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a capture failure error for the given device.
    #[must_use]
    pub fn capture_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CaptureFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create an invalid filename error.
    #[must_use]
    pub fn invalid_filename(filename: impl Into<String>) -> Self {
        Self::InvalidFilename {
            filename: filename.into(),
        }
    }

    /// Create a not-found error for a record.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a permission issue.
    ///
    /// Presentation code routes these to the system settings instead of
    /// showing a dismissible message.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if the user can simply try the same action again.
    #[must_use]
    pub fn is_user_retryable(&self) -> bool {
        match self {
            Self::CaptureInProgress | Self::CaptureFailed { .. } => true,
            Self::ImagePersistenceFailed { source, .. } => source.is_user_retryable(),
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Walk through `ImagePersistenceFailed` wrappers to the store error.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::ImagePersistenceFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::NotInitialized.to_string(),
            "capture session is not initialized"
        );
        assert_eq!(
            Error::CaptureInProgress.to_string(),
            "a capture is already in progress"
        );
        let err = Error::device_unavailable("no cameras attached");
        assert_eq!(
            err.to_string(),
            "capture device unavailable: no cameras attached"
        );
    }

    #[test]
    fn test_permission_error_mentions_settings() {
        let err = Error::permission_denied();
        assert!(err.is_permission_error());
        assert!(err.to_string().contains("Settings"));
        assert!(!Error::NoAlternateDevice.is_permission_error());
    }

    #[test]
    fn test_user_retryable() {
        assert!(Error::CaptureInProgress.is_user_retryable());
        assert!(Error::capture_failed("back", "shutter jammed").is_user_retryable());
        assert!(!Error::permission_denied().is_user_retryable());
        assert!(!Error::invalid_filename("../x.png").is_user_retryable());
    }

    #[test]
    fn test_image_persistence_failed_keeps_source() {
        let err = Error::ImagePersistenceFailed {
            filename: "abc.jpg".to_string(),
            source: Box::new(Error::InvalidImage {
                reason: "not an image".to_string(),
            }),
        };
        assert!(err.to_string().contains("abc.jpg"));
        assert!(matches!(err.root(), Error::InvalidImage { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("spot", "1234");
        assert_eq!(err.to_string(), "spot not found: 1234");
    }

    #[test]
    fn test_capture_failed_display() {
        let err = Error::capture_failed("front", "sensor timeout");
        let msg = err.to_string();
        assert!(msg.contains("front"));
        assert!(msg.contains("sensor timeout"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "jpeg_quality out of range".to_string(),
        };
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }
}
