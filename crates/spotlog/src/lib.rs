//! `spotlog` - A photo journal for tracking skin spots over time
//!
//! Family members ([`model::UserProfile`]) own tracked [`model::Spot`]s, and
//! every observation of a spot is a [`model::LogEntry`] with a photo and a
//! few structured symptoms. The capture pipeline is:
//!
//! 1. [`camera::CaptureSession`] grabs a still from an exclusively owned device
//! 2. [`ObservationRecorder`] saves it to the [`ImageStore`], then builds the entry
//! 3. [`Journal`] commits the entry, and removes photos when records are deleted
//!
//! [`overlay`] provides the faint guide image of the previous photo.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod image_store;
pub mod journal;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod recorder;
pub mod storage;

pub use camera::{CaptureSession, SessionState};
pub use config::Config;
pub use error::{Error, Result};
pub use image_store::{ImageStore, PhotoFormat};
pub use journal::{CleanupReport, Journal};
pub use logging::init_logging;
pub use model::{EntryForm, LogEntry, Spot, UserProfile};
pub use recorder::ObservationRecorder;
pub use storage::{Storage, StorageStats};
