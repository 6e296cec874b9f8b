//! Sandboxed photo storage for spotlog.
//!
//! Photos live in one flat directory, one file per photo, named by the
//! caller. There is no manifest: a file's existence is the only record that
//! it was stored. Writes go to a hidden temporary file in the same directory
//! and are renamed into place, so readers never observe a partial photo.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default JPEG encoder quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Matches temporary files left behind by an interrupted write.
const TEMP_FILE_PATTERN: &str = r"^\..+\.tmp\.[0-9a-f]{32}$";

fn temp_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TEMP_FILE_PATTERN).expect("temp file pattern is valid"))
}

/// On-disk photo formats the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFormat {
    /// Lossless PNG.
    Png,
    /// JPEG, stored with a `.jpg` or `.jpeg` extension.
    #[default]
    #[serde(alias = "jpeg")]
    Jpg,
}

impl PhotoFormat {
    /// The extension used when generating filenames.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }

    /// Determine the format from a filename extension (case-insensitive).
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhotoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// File-backed photo store rooted at a single directory.
///
/// Cloning is cheap and every clone addresses the same directory, so a
/// store can be handed to background tasks freely.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    jpeg_quality: u8,
}

impl ImageStore {
    /// Open the store, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|source| Error::DirectoryCreate {
                path: root.clone(),
                source,
            })?;
        }
        debug!("Photo store opened at {}", root.display());
        Ok(Self {
            root,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// Set the quality used when re-encoding JPEG photos.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// The sandbox directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a filename to its path inside the sandbox.
    ///
    /// Only a single plain path component is accepted: no separators, no
    /// `.`/`..`, no leading dot (that namespace holds temporary files).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilename`] for anything else.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if filename.trim().is_empty()
            || filename.starts_with('.')
            || filename.contains(['/', '\\', '\0'])
        {
            return Err(Error::invalid_filename(filename));
        }

        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => {
                Ok(self.root.join(name))
            }
            _ => Err(Error::invalid_filename(filename)),
        }
    }

    /// Persist a photo under `filename`.
    ///
    /// The bytes are decoded and re-encoded in the format named by the
    /// extension, so the on-disk format always matches the name.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFilename`] if the name is empty or escapes the sandbox
    /// - [`Error::UnsupportedFormat`] if the extension is not png/jpg/jpeg
    /// - [`Error::InvalidImage`] if the bytes are not a decodable image
    /// - [`Error::Io`] if the write or rename fails
    pub async fn save(&self, image_bytes: &[u8], filename: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        let format = PhotoFormat::from_filename(filename).ok_or_else(|| {
            Error::UnsupportedFormat {
                filename: filename.to_string(),
            }
        })?;

        let bytes = image_bytes.to_vec();
        let quality = self.jpeg_quality;
        let temp = self.temp_path_for(filename);

        tokio::task::spawn_blocking(move || {
            let encoded = reencode(&bytes, format, quality)?;
            write_atomic(&temp, &path, &encoded)
        })
        .await
        .map_err(|e| Error::internal(format!("photo write task failed: {e}")))??;

        info!("Stored photo {}", filename);
        Ok(())
    }

    /// Read a stored photo's bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFilename`] if the name is empty or escapes the sandbox
    /// - [`Error::FileNotFound`] if no such photo exists
    /// - [`Error::ImageDecode`] if the stored bytes are not a valid image
    pub async fn load(&self, filename: &str) -> Result<Vec<u8>> {
        let (bytes, _) = self.read_decoded(filename).await?;
        Ok(bytes)
    }

    /// Read and decode a stored photo.
    ///
    /// # Errors
    ///
    /// Same as [`ImageStore::load`].
    pub async fn load_image(&self, filename: &str) -> Result<DynamicImage> {
        let (_, image) = self.read_decoded(filename).await?;
        Ok(image)
    }

    /// Remove a stored photo.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFilename`] if the name is empty or escapes the sandbox
    /// - [`Error::FileNotFound`] if no such photo exists
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted photo {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound {
                filename: filename.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a photo with this name is stored. Never fails.
    pub async fn exists(&self, filename: &str) -> bool {
        let Ok(path) = self.resolve(filename) else {
            return false;
        };
        // Symlinks are refused by load, so they do not count as stored.
        tokio::fs::symlink_metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    /// List stored photo filenames, sorted. Temporary files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<String>> {
        self.list_older_than(Duration::ZERO).await
    }

    /// List stored photos last modified at least `min_age` ago, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list_older_than(&self, min_age: Duration) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || PhotoFormat::from_filename(&name).is_none() {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() && modified_before(&meta, min_age) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove temporary files left by interrupted writes.
    ///
    /// Only files last modified at least `min_age` ago are touched, so a
    /// save still writing its temp file is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a file cannot be removed.
    pub async fn sweep_temp_files(&self, min_age: Duration) -> Result<usize> {
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !temp_file_regex().is_match(name) {
                continue;
            }
            match entry.metadata().await {
                Ok(meta) if modified_before(&meta, min_age) => {}
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!("Removed stale temp file {}", name);
                    removed += 1;
                }
                // Renamed into place or swept by someone else meanwhile.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            warn!("Swept {} interrupted photo writes", removed);
        }
        Ok(removed)
    }

    fn temp_path_for(&self, filename: &str) -> PathBuf {
        self.root
            .join(format!(".{filename}.tmp.{}", Uuid::new_v4().simple()))
    }

    async fn read_decoded(&self, filename: &str) -> Result<(Vec<u8>, DynamicImage)> {
        let path = self.resolve(filename)?;

        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::invalid_filename(filename));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound {
                    filename: filename.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound {
                    filename: filename.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let name = filename.to_string();
        tokio::task::spawn_blocking(move || match image::load_from_memory(&bytes) {
            Ok(image) => Ok((bytes, image)),
            Err(e) => Err(Error::ImageDecode {
                filename: name,
                reason: e.to_string(),
            }),
        })
        .await
        .map_err(|e| Error::internal(format!("photo decode task failed: {e}")))?
    }
}

/// Whether a file was last modified at least `min_age` ago. An unreadable
/// or future mtime counts as recent.
fn modified_before(meta: &std::fs::Metadata, min_age: Duration) -> bool {
    if min_age.is_zero() {
        return true;
    }
    meta.modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= min_age)
}

/// Decode arbitrary raster bytes and encode them as `format`.
fn reencode(bytes: &[u8], format: PhotoFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::InvalidImage {
        reason: e.to_string(),
    })?;

    let mut encoded = Vec::new();
    let written = match format {
        PhotoFormat::Png => image.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png),
        PhotoFormat::Jpg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, jpeg_quality)),
    };
    written.map_err(|e| Error::InvalidImage {
        reason: e.to_string(),
    })?;
    Ok(encoded)
}

/// Write `bytes` to `temp`, flush it, and rename it over `path`.
fn write_atomic(temp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write as _;

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(temp, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(temp);
        return Err(e.into());
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
