//! Storage layer for spotlog.
//!
//! `SQLite` persistence for profiles, spots, and log entries. Foreign keys
//! cascade row deletion from profile to spot to entry; photo files are not
//! touched here (see [`crate::journal`]).

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{LogEntry, Spot, UserProfile};
use crate::overlay::EntrySource;

const ENTRY_COLUMNS: &str = "id, spot_id, timestamp, image_filename, note, pain_score, \
     has_bleeding, has_itching, is_swollen, estimated_size_mm";

const SPOT_COLUMNS: &str = "id, profile_id, title, body_part, is_active, created_at";

const PROFILE_COLUMNS: &str = "id, name, relation, avatar_color, created_at";

/// Journal database.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create the journal database at `path`.
    ///
    /// Creates parent directories as needed and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::prepare(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::prepare(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn prepare(conn: &Connection) -> Result<()> {
        // Cascades only fire with enforcement on, and it is per connection.
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(conn)
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Profiles ===

    /// Insert a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_profile(&self, profile: &UserProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO profiles (id, name, relation, avatar_color, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.to_string(),
                profile.name,
                profile.relation,
                profile.avatar_color,
                format_timestamp(&profile.created_at),
            ],
        )?;
        debug!("Inserted profile {}", profile.id);
        Ok(())
    }

    /// Get a profile by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_profile(&self, id: &Uuid) -> Result<Option<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], Self::row_to_profile)
            .optional()?)
    }

    /// All profiles, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_profiles(&self) -> Result<Vec<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// Delete a profile and, by cascade, its spots and entries.
    ///
    /// Returns `true` if a profile was deleted. Photo files are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_profile(&self, id: &Uuid) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM profiles WHERE id = ?1", [id.to_string()])?;
        Ok(affected > 0)
    }

    // === Spots ===

    /// Insert a spot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the owning profile does not exist.
    pub fn insert_spot(&self, spot: &Spot) -> Result<()> {
        if self.get_profile(&spot.profile_id)?.is_none() {
            return Err(Error::not_found("profile", spot.profile_id));
        }
        self.conn.execute(
            "INSERT INTO spots (id, profile_id, title, body_part, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                spot.id.to_string(),
                spot.profile_id.to_string(),
                spot.title,
                spot.body_part,
                spot.is_active,
                format_timestamp(&spot.created_at),
            ],
        )?;
        debug!("Inserted spot {}", spot.id);
        Ok(())
    }

    /// Get a spot by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_spot(&self, id: &Uuid) -> Result<Option<Spot>> {
        let sql = format!("SELECT {SPOT_COLUMNS} FROM spots WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], Self::row_to_spot)
            .optional()?)
    }

    /// All spots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_spots(&self) -> Result<Vec<Spot>> {
        let sql = format!("SELECT {SPOT_COLUMNS} FROM spots ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let spots = stmt
            .query_map([], Self::row_to_spot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(spots)
    }

    /// Spots owned by a profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn spots_for_profile(&self, profile_id: &Uuid) -> Result<Vec<Spot>> {
        let sql = format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE profile_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let spots = stmt
            .query_map([profile_id.to_string()], Self::row_to_spot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(spots)
    }

    /// Mark a spot as watched or resolved.
    ///
    /// Returns `true` if the spot exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_spot_active(&self, id: &Uuid, is_active: bool) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE spots SET is_active = ?2 WHERE id = ?1",
            params![id.to_string(), is_active],
        )?;
        Ok(affected > 0)
    }

    /// Delete a spot and, by cascade, its entries.
    ///
    /// Returns `true` if a spot was deleted. Photo files are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_spot(&self, id: &Uuid) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM spots WHERE id = ?1", [id.to_string()])?;
        Ok(affected > 0)
    }

    // === Log entries ===

    /// Insert a log entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the owning spot does not exist.
    pub fn insert_entry(&self, entry: &LogEntry) -> Result<()> {
        if self.get_spot(&entry.spot_id)?.is_none() {
            return Err(Error::not_found("spot", entry.spot_id));
        }
        self.conn.execute(
            "INSERT INTO log_entries (id, spot_id, timestamp, image_filename, note, pain_score,
                                      has_bleeding, has_itching, is_swollen, estimated_size_mm)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id.to_string(),
                entry.spot_id.to_string(),
                format_timestamp(&entry.timestamp),
                entry.image_filename,
                entry.note,
                entry.pain_score,
                entry.has_bleeding,
                entry.has_itching,
                entry.is_swollen,
                entry.estimated_size_mm,
            ],
        )?;
        debug!("Inserted entry {} for spot {}", entry.id, entry.spot_id);
        Ok(())
    }

    /// Get an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_entry(&self, id: &Uuid) -> Result<Option<LogEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM log_entries WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], Self::row_to_entry)
            .optional()?)
    }

    /// A spot's entries, newest first. Equal timestamps order by descending id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn entries_for_spot(&self, spot_id: &Uuid) -> Result<Vec<LogEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries WHERE spot_id = ?1
             ORDER BY timestamp DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([spot_id.to_string()], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Delete an entry. Returns `true` if one was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_entry(&self, id: &Uuid) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM log_entries WHERE id = ?1", [id.to_string()])?;
        Ok(affected > 0)
    }

    // === Photo references ===

    /// Photo filenames referenced by a spot's entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn image_filenames_for_spot(&self, spot_id: &Uuid) -> Result<Vec<String>> {
        self.filenames(
            "SELECT DISTINCT image_filename FROM log_entries
             WHERE spot_id = ?1 AND image_filename != '' ORDER BY image_filename",
            params![spot_id.to_string()],
        )
    }

    /// Photo filenames referenced by entries of any of a profile's spots.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn image_filenames_for_profile(&self, profile_id: &Uuid) -> Result<Vec<String>> {
        self.filenames(
            "SELECT DISTINCT e.image_filename FROM log_entries e
             JOIN spots s ON s.id = e.spot_id
             WHERE s.profile_id = ?1 AND e.image_filename != '' ORDER BY e.image_filename",
            params![profile_id.to_string()],
        )
    }

    /// Every photo filename referenced by any entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn referenced_image_filenames(&self) -> Result<Vec<String>> {
        self.filenames(
            "SELECT DISTINCT image_filename FROM log_entries
             WHERE image_filename != '' ORDER BY image_filename",
            params![],
        )
    }

    fn filenames(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names = stmt
            .query_map(args, |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let profiles = count("SELECT COUNT(*) FROM profiles")?;
        let spots = count("SELECT COUNT(*) FROM spots")?;
        let active_spots = count("SELECT COUNT(*) FROM spots WHERE is_active = 1")?;
        let entries = count("SELECT COUNT(*) FROM log_entries")?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM log_entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            profiles,
            spots,
            active_spots,
            entries,
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            relation: row.get(2)?,
            avatar_color: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    }

    fn row_to_spot(row: &rusqlite::Row) -> rusqlite::Result<Spot> {
        Ok(Spot {
            id: uuid_column(row, 0)?,
            profile_id: uuid_column(row, 1)?,
            title: row.get(2)?,
            body_part: row.get(3)?,
            is_active: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
        Ok(LogEntry {
            id: uuid_column(row, 0)?,
            spot_id: uuid_column(row, 1)?,
            timestamp: timestamp_column(row, 2)?,
            image_filename: row.get(3)?,
            note: row.get(4)?,
            pain_score: row.get(5)?,
            has_bleeding: row.get(6)?,
            has_itching: row.get(7)?,
            is_swollen: row.get(8)?,
            estimated_size_mm: row.get(9)?,
        })
    }
}

impl EntrySource for Storage {
    fn entries_for_spot(&self, spot_id: &Uuid) -> Result<Vec<LogEntry>> {
        Storage::entries_for_spot(self, spot_id)
    }
}

/// Statistics about the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of profiles.
    pub profiles: i64,
    /// Number of spots.
    pub spots: i64,
    /// Number of spots still being watched.
    pub active_spots: i64,
    /// Number of log entries.
    pub entries: i64,
    /// Timestamp of the oldest entry.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Timestamp of the newest entry.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Fixed-width so text order matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn uuid_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryForm;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    /// A profile with one spot, both inserted.
    fn seeded() -> (Storage, UserProfile, Spot) {
        let storage = create_test_storage();
        let profile = UserProfile::new("Alex", "Me");
        let spot = Spot::new(&profile, "Left Arm Mole", "Left arm");
        storage.insert_profile(&profile).unwrap();
        storage.insert_spot(&spot).unwrap();
        (storage, profile, spot)
    }

    fn entry_at(spot: &Spot, filename: &str, ts: DateTime<Utc>) -> LogEntry {
        LogEntry::at(spot, filename, EntryForm::default(), ts)
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("journal.db");
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn test_profile_roundtrip() {
        let storage = create_test_storage();
        let profile = UserProfile::new("Sam", "Son").with_avatar_color("#00FF00");
        storage.insert_profile(&profile).unwrap();

        let loaded = storage.get_profile(&profile.id).unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(storage.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        let id = Uuid::new_v4();
        assert!(storage.get_profile(&id).unwrap().is_none());
        assert!(storage.get_spot(&id).unwrap().is_none());
        assert!(storage.get_entry(&id).unwrap().is_none());
    }

    #[test]
    fn test_spot_requires_profile() {
        let storage = create_test_storage();
        let orphan = Spot::new(&UserProfile::new("Ghost", "None"), "Rash", "Neck");
        let err = storage.insert_spot(&orphan).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "profile", .. }));
    }

    #[test]
    fn test_entry_requires_spot() {
        let storage = create_test_storage();
        let spot = Spot::new(&UserProfile::new("Alex", "Me"), "Rash", "Neck");
        let err = storage
            .insert_entry(&LogEntry::new(&spot, "", EntryForm::default()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "spot", .. }));
    }

    #[test]
    fn test_spots_for_profile() {
        let (storage, profile, spot) = seeded();
        let other = UserProfile::new("Sam", "Son");
        storage.insert_profile(&other).unwrap();
        storage
            .insert_spot(&Spot::new(&other, "Freckle", "Back"))
            .unwrap();

        let spots = storage.spots_for_profile(&profile.id).unwrap();
        assert_eq!(spots, vec![spot]);
        assert_eq!(storage.list_spots().unwrap().len(), 2);
    }

    #[test]
    fn test_set_spot_active() {
        let (storage, _, spot) = seeded();
        assert!(storage.set_spot_active(&spot.id, false).unwrap());
        assert!(!storage.get_spot(&spot.id).unwrap().unwrap().is_active);
        assert!(!storage.set_spot_active(&Uuid::new_v4(), false).unwrap());
    }

    #[test]
    fn test_entry_roundtrip_keeps_all_fields() {
        let (storage, _, spot) = seeded();
        let form = EntryForm {
            note: "redness reduced".to_string(),
            pain_score: 42,
            has_bleeding: false,
            has_itching: true,
            is_swollen: true,
            estimated_size_mm: Some(4.8),
        };
        let entry = LogEntry::new(&spot, "b.jpg", form);
        storage.insert_entry(&entry).unwrap();

        let loaded = storage.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn test_entries_for_spot_newest_first() {
        let (storage, _, spot) = seeded();
        let now = Utc::now();
        let t1 = entry_at(&spot, "a.png", now - Duration::days(2));
        let t3 = entry_at(&spot, "c.png", now);
        let t2 = entry_at(&spot, "b.png", now - Duration::days(1));
        for entry in [&t1, &t3, &t2] {
            storage.insert_entry(entry).unwrap();
        }

        let ids: Vec<Uuid> = storage
            .entries_for_spot(&spot.id)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![t3.id, t2.id, t1.id]);
    }

    #[test]
    fn test_sub_second_ordering() {
        let (storage, _, spot) = seeded();
        let base = Utc::now();
        let early = entry_at(&spot, "", base);
        let late = entry_at(&spot, "", base + Duration::milliseconds(5));
        storage.insert_entry(&late).unwrap();
        storage.insert_entry(&early).unwrap();

        let entries = storage.entries_for_spot(&spot.id).unwrap();
        assert_eq!(entries[0].id, late.id);
    }

    #[test]
    fn test_delete_profile_cascades() {
        let (storage, profile, spot) = seeded();
        let entry = entry_at(&spot, "a.png", Utc::now());
        storage.insert_entry(&entry).unwrap();

        assert!(storage.delete_profile(&profile.id).unwrap());
        assert!(storage.get_spot(&spot.id).unwrap().is_none());
        assert!(storage.get_entry(&entry.id).unwrap().is_none());
        assert!(!storage.delete_profile(&profile.id).unwrap());
    }

    #[test]
    fn test_delete_spot_cascades() {
        let (storage, profile, spot) = seeded();
        let entry = entry_at(&spot, "a.png", Utc::now());
        storage.insert_entry(&entry).unwrap();

        assert!(storage.delete_spot(&spot.id).unwrap());
        assert!(storage.get_entry(&entry.id).unwrap().is_none());
        assert!(storage.get_profile(&profile.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_entry() {
        let (storage, _, spot) = seeded();
        let entry = entry_at(&spot, "", Utc::now());
        storage.insert_entry(&entry).unwrap();
        assert!(storage.delete_entry(&entry.id).unwrap());
        assert!(!storage.delete_entry(&entry.id).unwrap());
    }

    #[test]
    fn test_image_filename_queries() {
        let (storage, profile, spot) = seeded();
        let second = Spot::new(&profile, "Rash", "Neck");
        storage.insert_spot(&second).unwrap();
        let other_profile = UserProfile::new("Sam", "Son");
        let other_spot = Spot::new(&other_profile, "Freckle", "Back");
        storage.insert_profile(&other_profile).unwrap();
        storage.insert_spot(&other_spot).unwrap();

        let now = Utc::now();
        storage.insert_entry(&entry_at(&spot, "a.png", now)).unwrap();
        storage.insert_entry(&entry_at(&spot, "", now)).unwrap();
        storage.insert_entry(&entry_at(&second, "b.jpg", now)).unwrap();
        storage.insert_entry(&entry_at(&other_spot, "c.jpg", now)).unwrap();

        assert_eq!(storage.image_filenames_for_spot(&spot.id).unwrap(), vec!["a.png"]);
        assert_eq!(
            storage.image_filenames_for_profile(&profile.id).unwrap(),
            vec!["a.png", "b.jpg"]
        );
        assert_eq!(
            storage.referenced_image_filenames().unwrap(),
            vec!["a.png", "b.jpg", "c.jpg"]
        );
    }

    #[test]
    fn test_entry_source_impl() {
        let (storage, _, spot) = seeded();
        storage.insert_entry(&entry_at(&spot, "a.png", Utc::now())).unwrap();
        let source: &dyn EntrySource = &storage;
        assert_eq!(source.entries_for_spot(&spot.id).unwrap().len(), 1);
    }

    #[test]
    fn test_stats() {
        let (storage, profile, spot) = seeded();
        let resolved = Spot::new(&profile, "Old scratch", "Knee");
        storage.insert_spot(&resolved).unwrap();
        storage.set_spot_active(&resolved.id, false).unwrap();

        let now = Utc::now();
        let first = entry_at(&spot, "", now - Duration::days(1));
        storage.insert_entry(&first).unwrap();
        storage.insert_entry(&entry_at(&spot, "", now)).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.profiles, 1);
        assert_eq!(stats.spots, 2);
        assert_eq!(stats.active_spots, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.oldest_entry, Some(first.timestamp));
        assert_eq!(stats.newest_entry, Some(now));
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_empty() {
        let stats = create_test_storage().stats().unwrap();
        assert_eq!(stats.entries, 0);
        assert!(stats.oldest_entry.is_none());
        assert!(stats.newest_entry.is_none());
    }

    #[test]
    fn test_format_timestamp_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + Duration::nanoseconds(123_456_789);
        assert_eq!(format_timestamp(&a).len(), format_timestamp(&b).len());
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(parse_timestamp(&format_timestamp(&b)), Some(b));
    }
}
