//! `SQLite` schema definitions for spotlog.
//!
//! Ids are stored as hyphenated UUID text and timestamps as fixed-width
//! RFC 3339 text, so both sort correctly as strings.

/// Family members whose spots are tracked.
pub const CREATE_PROFILES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    relation TEXT NOT NULL,
    avatar_color TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Tracked spots. Deleting a profile removes its spots.
pub const CREATE_SPOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS spots (
    id TEXT PRIMARY KEY,
    profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    body_part TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
)
";

/// Dated observations. Deleting a spot removes its entries.
///
/// `pain_score` has no CHECK constraint: scores are stored as entered.
pub const CREATE_LOG_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS log_entries (
    id TEXT PRIMARY KEY,
    spot_id TEXT NOT NULL REFERENCES spots(id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    image_filename TEXT NOT NULL DEFAULT '',
    note TEXT NOT NULL DEFAULT '',
    pain_score INTEGER NOT NULL,
    has_bleeding INTEGER NOT NULL,
    has_itching INTEGER NOT NULL,
    is_swollen INTEGER NOT NULL,
    estimated_size_mm REAL
)
";

/// Index for listing a profile's spots.
pub const CREATE_SPOTS_PROFILE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_spots_profile ON spots(profile_id)
";

/// Index for a spot's entries, newest first.
pub const CREATE_ENTRIES_SPOT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_log_entries_spot ON log_entries(spot_id, timestamp DESC)
";

/// Index for orphan checks against photo filenames.
pub const CREATE_ENTRIES_IMAGE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_log_entries_image ON log_entries(image_filename)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PROFILES_TABLE,
    CREATE_SPOTS_TABLE,
    CREATE_LOG_ENTRIES_TABLE,
    CREATE_SPOTS_PROFILE_INDEX,
    CREATE_ENTRIES_SPOT_INDEX,
    CREATE_METADATA_TABLE,
];
