//! Journal operations that keep the database and the photo directory in step.
//!
//! Row deletion cascades inside the database but never reaches the photo
//! directory, so every delete here collects the affected filenames first,
//! removes the rows, then removes the files and reports what happened.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::image_store::ImageStore;
use crate::model::LogEntry;
use crate::storage::Storage;

/// Default minimum age, in minutes, before an unreferenced photo counts as
/// an orphan.
pub const DEFAULT_ORPHAN_GRACE_MINUTES: u64 = 10;

/// Outcome of removing the photos behind deleted records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Photos removed from the store.
    pub deleted: Vec<String>,
    /// Photos that were already gone.
    pub missing: Vec<String>,
    /// Photos that could not be removed.
    pub failed: Vec<String>,
}

impl CleanupReport {
    /// Whether every referenced photo is gone from disk.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of an orphan collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Stored photos no entry refers to, older than the grace period.
    pub orphans: Vec<String>,
    /// Orphans removed from the store.
    pub removed: Vec<String>,
    /// Orphans that could not be removed.
    pub failed: Vec<String>,
    /// Whether the orphans were left in place.
    pub dry_run: bool,
    /// Interrupted-write leftovers removed.
    pub temp_files_removed: usize,
}

/// Database plus photo store.
#[derive(Debug)]
pub struct Journal {
    storage: Storage,
    store: ImageStore,
    orphan_grace: Duration,
}

impl Journal {
    /// Pair a database with a photo store.
    #[must_use]
    pub fn new(storage: Storage, store: ImageStore) -> Self {
        Self {
            storage,
            store,
            orphan_grace: Duration::from_secs(DEFAULT_ORPHAN_GRACE_MINUTES * 60),
        }
    }

    /// Leave photos and temp files younger than `grace` out of orphan
    /// collection. A capture writes its photo before the entry is committed,
    /// possibly from another process.
    #[must_use]
    pub fn with_orphan_grace(mut self, grace: Duration) -> Self {
        self.orphan_grace = grace;
        self
    }

    /// The database.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The photo store.
    #[must_use]
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Commit an entry produced by the recorder.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if the entry names a photo that is not stored
    /// - [`Error::NotFound`] if the spot does not exist
    pub async fn commit_entry(&self, entry: &LogEntry) -> Result<()> {
        if entry.has_photo() && !self.store.exists(&entry.image_filename).await {
            return Err(Error::FileNotFound {
                filename: entry.image_filename.clone(),
            });
        }
        self.storage.insert_entry(entry)?;
        info!("Committed entry {} for spot {}", entry.id, entry.spot_id);
        Ok(())
    }

    /// Delete an entry and its photo.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    pub async fn delete_entry(&self, id: &Uuid) -> Result<CleanupReport> {
        let entry = self
            .storage
            .get_entry(id)?
            .ok_or_else(|| Error::not_found("entry", id))?;
        self.storage.delete_entry(id)?;

        let names: Vec<String> = if entry.has_photo() {
            vec![entry.image_filename]
        } else {
            Vec::new()
        };
        self.remove_photos(names).await
    }

    /// Delete a spot, its entries, and their photos.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the spot does not exist.
    pub async fn delete_spot(&self, id: &Uuid) -> Result<CleanupReport> {
        let names = self.storage.image_filenames_for_spot(id)?;
        if !self.storage.delete_spot(id)? {
            return Err(Error::not_found("spot", id));
        }
        self.remove_photos(names).await
    }

    /// Delete a profile, everything it owns, and all related photos.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the profile does not exist.
    pub async fn delete_profile(&self, id: &Uuid) -> Result<CleanupReport> {
        let names = self.storage.image_filenames_for_profile(id)?;
        if !self.storage.delete_profile(id)? {
            return Err(Error::not_found("profile", id));
        }
        self.remove_photos(names).await
    }

    /// Find stored photos no entry refers to and remove them unless
    /// `dry_run`. Temporary files from interrupted writes are swept too.
    /// Anything younger than the orphan grace period is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or photo directory cannot be read.
    pub async fn collect_orphans(&self, dry_run: bool) -> Result<OrphanReport> {
        // Listed before the references are read, so a photo committed in
        // between is seen as referenced.
        let candidates = self.store.list_older_than(self.orphan_grace).await?;
        let referenced: HashSet<String> =
            self.storage.referenced_image_filenames()?.into_iter().collect();
        let orphans: Vec<String> = candidates
            .into_iter()
            .filter(|name| !referenced.contains(name))
            .collect();

        let mut report = OrphanReport {
            orphans,
            dry_run,
            ..OrphanReport::default()
        };
        if dry_run {
            info!("{} orphaned photos found (dry run)", report.orphans.len());
            return Ok(report);
        }

        for name in &report.orphans {
            match self.store.delete(name).await {
                Ok(()) | Err(Error::FileNotFound { .. }) => report.removed.push(name.clone()),
                Err(e) => {
                    warn!("Could not remove orphan {}: {}", name, e);
                    report.failed.push(name.clone());
                }
            }
        }
        report.temp_files_removed = self.store.sweep_temp_files(self.orphan_grace).await?;
        info!(
            "Removed {} orphaned photos and {} temp files",
            report.removed.len(),
            report.temp_files_removed
        );

        Ok(report)
    }

    async fn remove_photos(&self, names: Vec<String>) -> Result<CleanupReport> {
        // A name still referenced elsewhere stays on disk.
        let still_referenced: HashSet<String> = if names.is_empty() {
            HashSet::new()
        } else {
            self.storage.referenced_image_filenames()?.into_iter().collect()
        };

        let mut report = CleanupReport::default();
        for name in names {
            if still_referenced.contains(&name) {
                debug!("Keeping {}, still referenced", name);
                continue;
            }
            match self.store.delete(&name).await {
                Ok(()) => report.deleted.push(name),
                Err(Error::FileNotFound { .. }) => report.missing.push(name),
                Err(e) => {
                    warn!("Could not remove photo {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        debug!(
            "Cleanup: {} deleted, {} missing, {} failed",
            report.deleted.len(),
            report.missing.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_store::tests::{age_file, png_bytes};
    use crate::model::{EntryForm, Spot, UserProfile};
    use crate::recorder::ObservationRecorder;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        journal: Journal,
        recorder: ObservationRecorder,
        profile: UserProfile,
        spot: Spot,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::open(dir.path().join("photos")).unwrap();
        let storage = Storage::open_in_memory().unwrap();
        let profile = UserProfile::new("Alex", "Me");
        let spot = Spot::new(&profile, "Left Arm Mole", "Left arm");
        storage.insert_profile(&profile).unwrap();
        storage.insert_spot(&spot).unwrap();
        Fixture {
            _dir: dir,
            recorder: ObservationRecorder::new(store.clone()),
            journal: Journal::new(storage, store),
            profile,
            spot,
        }
    }

    async fn record(f: &Fixture, spot: &Spot) -> LogEntry {
        let entry = f
            .recorder
            .record_capture(spot, &png_bytes(8, 8), EntryForm::default())
            .await
            .unwrap();
        f.journal.commit_entry(&entry).await.unwrap();
        entry
    }

    #[tokio::test]
    async fn test_commit_recorded_entry() {
        let f = fixture();
        let entry = record(&f, &f.spot).await;
        let stored = f.journal.storage().get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(stored, entry);
    }

    #[tokio::test]
    async fn test_commit_rejects_missing_photo() {
        let f = fixture();
        let entry = LogEntry::new(&f.spot, "never-saved.jpg", EntryForm::default());
        let err = f.journal.commit_entry(&entry).await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
        assert!(f.journal.storage().get_entry(&entry.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_entry_without_photo() {
        let f = fixture();
        let entry = LogEntry::new(&f.spot, "", EntryForm::default());
        f.journal.commit_entry(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_entry_removes_photo() {
        let f = fixture();
        let entry = record(&f, &f.spot).await;

        let report = f.journal.delete_entry(&entry.id).await.unwrap();
        assert_eq!(report.deleted, vec![entry.image_filename.clone()]);
        assert!(report.is_clean());
        assert!(!f.journal.store().exists(&entry.image_filename).await);

        let err = f.journal.delete_entry(&entry.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "entry", .. }));
    }

    #[tokio::test]
    async fn test_delete_spot_removes_all_photos() {
        let f = fixture();
        let a = record(&f, &f.spot).await;
        let b = record(&f, &f.spot).await;

        let report = f.journal.delete_spot(&f.spot.id).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(!f.journal.store().exists(&a.image_filename).await);
        assert!(!f.journal.store().exists(&b.image_filename).await);
        assert!(f.journal.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_spot_reports_missing_photo() {
        let f = fixture();
        let entry = record(&f, &f.spot).await;
        f.journal.store().delete(&entry.image_filename).await.unwrap();

        let report = f.journal.delete_spot(&f.spot.id).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.missing, vec![entry.image_filename]);
    }

    #[tokio::test]
    async fn test_delete_profile_removes_photos_of_every_spot() {
        let f = fixture();
        let second = Spot::new(&f.profile, "Rash", "Neck");
        f.journal.storage().insert_spot(&second).unwrap();
        record(&f, &f.spot).await;
        record(&f, &second).await;

        let report = f.journal.delete_profile(&f.profile.id).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(f.journal.storage().get_spot(&second.id).unwrap().is_none());
        assert!(f.journal.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_leaves_other_spots_alone() {
        let f = fixture();
        let other = Spot::new(&f.profile, "Rash", "Neck");
        f.journal.storage().insert_spot(&other).unwrap();
        record(&f, &f.spot).await;
        let kept = record(&f, &other).await;

        f.journal.delete_spot(&f.spot.id).await.unwrap();
        assert!(f.journal.store().exists(&kept.image_filename).await);
    }

    #[tokio::test]
    async fn test_shared_photo_kept_while_referenced() {
        let f = fixture();
        let first = record(&f, &f.spot).await;
        let twin = LogEntry::new(&f.spot, first.image_filename.clone(), EntryForm::default());
        f.journal.commit_entry(&twin).await.unwrap();

        let report = f.journal.delete_entry(&first.id).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(f.journal.store().exists(&first.image_filename).await);
    }

    #[tokio::test]
    async fn test_delete_unknown_records() {
        let f = fixture();
        let id = Uuid::new_v4();
        assert!(matches!(
            f.journal.delete_spot(&id).await,
            Err(Error::NotFound { kind: "spot", .. })
        ));
        assert!(matches!(
            f.journal.delete_profile(&id).await,
            Err(Error::NotFound { kind: "profile", .. })
        ));
    }

    #[tokio::test]
    async fn test_collect_orphans() {
        let f = fixture();
        let kept = record(&f, &f.spot).await;
        let root = f.journal.store().root().to_path_buf();
        f.journal
            .store()
            .save(&png_bytes(4, 4), "orphan.png")
            .await
            .unwrap();
        let temp = root.join(".x.png.tmp.0123456789abcdef0123456789abcdef");
        std::fs::write(&temp, b"partial").unwrap();
        let hour = Duration::from_secs(3600);
        age_file(&root.join("orphan.png"), hour);
        age_file(&root.join(&kept.image_filename), hour);
        age_file(&temp, hour);

        let dry = f.journal.collect_orphans(true).await.unwrap();
        assert_eq!(dry.orphans, vec!["orphan.png".to_string()]);
        assert!(dry.removed.is_empty());
        assert!(f.journal.store().exists("orphan.png").await);

        let report = f.journal.collect_orphans(false).await.unwrap();
        assert_eq!(report.orphans, vec!["orphan.png".to_string()]);
        assert_eq!(report.removed, vec!["orphan.png".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.temp_files_removed, 1);
        assert!(!f.journal.store().exists("orphan.png").await);
        assert!(f.journal.store().exists(&kept.image_filename).await);
    }

    #[tokio::test]
    async fn test_collect_orphans_spares_uncommitted_capture() {
        let f = fixture();
        let entry = f
            .recorder
            .record_capture(&f.spot, &png_bytes(8, 8), EntryForm::default())
            .await
            .unwrap();

        let report = f.journal.collect_orphans(false).await.unwrap();
        assert!(report.orphans.is_empty());
        assert!(report.removed.is_empty());

        f.journal.commit_entry(&entry).await.unwrap();
        assert!(f.journal.store().exists(&entry.image_filename).await);
    }

    #[tokio::test]
    async fn test_collect_orphans_without_grace() {
        let f = fixture();
        let journal = Journal::new(
            Storage::open_in_memory().unwrap(),
            f.journal.store().clone(),
        )
        .with_orphan_grace(Duration::ZERO);
        journal
            .store()
            .save(&png_bytes(4, 4), "fresh.png")
            .await
            .unwrap();

        let report = journal.collect_orphans(false).await.unwrap();
        assert_eq!(report.removed, vec!["fresh.png".to_string()]);
        assert!(!journal.store().exists("fresh.png").await);
    }
}
