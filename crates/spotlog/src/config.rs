//! Configuration management for spotlog.
//!
//! Layered with figment: defaults, then the TOML file, then `SPOTLOG_`
//! environment variables. Nested keys use a double underscore, e.g.
//! `SPOTLOG_CAPTURE__JPEG_QUALITY=80`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::camera::DevicePosition;
use crate::error::{Error, Result};
use crate::image_store::{PhotoFormat, DEFAULT_JPEG_QUALITY};
use crate::journal::DEFAULT_ORPHAN_GRACE_MINUTES;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name under the platform config and data dirs.
const APP_DIR_NAME: &str = "spotlog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "journal.db";

/// Default photo directory name.
const IMAGES_DIR_NAME: &str = "photos";

/// Environment variable prefix.
const ENV_PREFIX: &str = "SPOTLOG_";

/// Application configuration.
///
/// Precedence, highest first:
/// 1. Environment variables (`SPOTLOG_`)
/// 2. `~/.config/spotlog/config.toml`
/// 3. Defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where records and photos live.
    pub storage: StorageConfig,
    /// Capture behavior.
    pub capture: CaptureConfig,
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Defaults to `<data dir>/spotlog/journal.db`.
    pub database_path: Option<PathBuf>,
    /// Photo directory. Defaults to `<data dir>/spotlog/photos`.
    pub images_dir: Option<PathBuf>,
    /// Photos and temp files younger than this are never collected as
    /// orphans; a capture may still be about to commit them.
    pub orphan_grace_minutes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            images_dir: None,
            orphan_grace_minutes: DEFAULT_ORPHAN_GRACE_MINUTES,
        }
    }
}

/// Capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Format of newly recorded photos.
    pub photo_format: PhotoFormat,
    /// Camera opened first when several are present.
    pub preferred_position: DevicePosition,
    /// JPEG encoder quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            photo_format: PhotoFormat::Jpg,
            preferred_position: DevicePosition::Back,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing, or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing, or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "jpeg_quality must be between 1 and 100, got {}",
                    self.capture.jpeg_quality
                ),
            });
        }

        if self.images_dir() == self.database_path() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "images_dir and database_path must differ ({})",
                    self.images_dir().display()
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Minimum age of a photo before orphan collection may remove it.
    #[must_use]
    pub fn orphan_grace(&self) -> Duration {
        Duration::from_secs(self.storage.orphan_grace_minutes.saturating_mul(60))
    }

    /// Get the photo directory, resolving defaults if not set.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.storage
            .images_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(IMAGES_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.capture.photo_format, PhotoFormat::Jpg);
        assert_eq!(config.capture.preferred_position, DevicePosition::Back);
        assert_eq!(config.capture.jpeg_quality, 90);
        assert!(config.storage.database_path.is_none());
        assert!(config.storage.images_dir.is_none());
        assert_eq!(config.orphan_grace(), Duration::from_secs(600));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_jpeg_quality() {
        let mut config = Config::default();
        config.capture.jpeg_quality = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("jpeg_quality"));

        config.capture.jpeg_quality = 101;
        assert!(config.validate().is_err());

        config.capture.jpeg_quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_images_dir_clashes_with_database() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/data/spotlog"));
        config.storage.images_dir = Some(PathBuf::from("/data/spotlog"));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("images_dir"));
    }

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert!(config.database_path().ends_with("spotlog/journal.db"));
        assert!(config.images_dir().ends_with("spotlog/photos"));
    }

    #[test]
    fn test_custom_paths() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/journal.sqlite"));
        config.storage.images_dir = Some(PathBuf::from("/custom/pics"));
        assert_eq!(config.database_path(), PathBuf::from("/custom/journal.sqlite"));
        assert_eq!(config.images_dir(), PathBuf::from("/custom/pics"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.ends_with("spotlog/config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_load_from_toml() {
        let (_dir, path) = write_config(
            r#"
            [storage]
            images_dir = "/srv/photos"
            orphan_grace_minutes = 0

            [capture]
            photo_format = "png"
            preferred_position = "front"
            jpeg_quality = 75
            "#,
        );
        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.images_dir(), PathBuf::from("/srv/photos"));
        assert_eq!(config.orphan_grace(), Duration::ZERO);
        assert_eq!(config.capture.photo_format, PhotoFormat::Png);
        assert_eq!(config.capture.preferred_position, DevicePosition::Front);
        assert_eq!(config.capture.jpeg_quality, 75);
    }

    #[test]
    fn test_load_accepts_jpeg_alias() {
        let (_dir, path) = write_config("[capture]\nphoto_format = \"jpeg\"\n");
        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.capture.photo_format, PhotoFormat::Jpg);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let (_dir, path) = write_config("[capture]\njpeg_quality = 0\n");
        assert!(matches!(
            Config::load_from(Some(path)),
            Err(Error::ConfigValidation { .. })
        ));

        let (_dir, path) = write_config("[capture]\nphoto_format = \"gif\"\n");
        assert!(matches!(
            Config::load_from(Some(path)),
            Err(Error::ConfigLoad(_))
        ));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("jpeg_quality"));
        assert!(json.contains("\"preferred_position\":\"back\""));
    }
}
