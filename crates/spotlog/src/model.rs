//! Core journal types for spotlog.
//!
//! A [`UserProfile`] owns [`Spot`]s, and a spot owns dated [`LogEntry`]
//! observations. Values are created here and handed to the storage layer,
//! which enforces the ownership cascade.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Documented pain scale. Scores outside it are stored as given.
pub const PAIN_SCORE_RANGE: RangeInclusive<i32> = 0..=10;

/// Avatar color used when a profile is created without one.
pub const DEFAULT_AVATAR_COLOR: &str = "#4A90D9";

/// A family member whose spots are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Relation label ("Me", "Daughter", ...).
    pub relation: String,
    /// Hex color tag, only interpreted by rendering layers.
    pub avatar_color: String,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Create a new profile stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            relation: relation.into(),
            avatar_color: DEFAULT_AVATAR_COLOR.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Set the avatar color tag.
    #[must_use]
    pub fn with_avatar_color(mut self, color: impl Into<String>) -> Self {
        self.avatar_color = color.into();
        self
    }
}

/// A tracked body location or condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning profile.
    pub profile_id: Uuid,
    /// Title, e.g. "Left Arm Mole".
    pub title: String,
    /// Body-part label.
    pub body_part: String,
    /// Whether the spot is still being watched.
    pub is_active: bool,
    /// When the spot was created.
    pub created_at: DateTime<Utc>,
}

impl Spot {
    /// Create a new active spot owned by `profile`.
    #[must_use]
    pub fn new(profile: &UserProfile, title: impl Into<String>, body_part: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: profile.id,
            title: title.into(),
            body_part: body_part.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Form fields the user fills in alongside a photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryForm {
    /// Free-text note.
    pub note: String,
    /// Pain score, nominally 0-10.
    pub pain_score: i32,
    /// Bleeding observed.
    pub has_bleeding: bool,
    /// Itching reported.
    pub has_itching: bool,
    /// Swelling observed.
    pub is_swollen: bool,
    /// Estimated size in millimeters.
    pub estimated_size_mm: Option<f64>,
}

/// One dated observation of a spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning spot.
    pub spot_id: Uuid,
    /// When the observation was made.
    pub timestamp: DateTime<Utc>,
    /// Photo filename in the image store. Empty means no photo.
    pub image_filename: String,
    /// Free-text note.
    pub note: String,
    /// Pain score exactly as entered.
    pub pain_score: i32,
    /// Bleeding observed.
    pub has_bleeding: bool,
    /// Itching reported.
    pub has_itching: bool,
    /// Swelling observed.
    pub is_swollen: bool,
    /// Estimated size in millimeters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_size_mm: Option<f64>,
}

impl LogEntry {
    /// Build an entry for `spot` from form data, stamped with the current time.
    #[must_use]
    pub fn new(spot: &Spot, image_filename: impl Into<String>, form: EntryForm) -> Self {
        Self::at(spot, image_filename, form, Utc::now())
    }

    /// Build an entry with an explicit timestamp.
    #[must_use]
    pub fn at(
        spot: &Spot,
        image_filename: impl Into<String>,
        form: EntryForm,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            spot_id: spot.id,
            timestamp,
            image_filename: image_filename.into(),
            note: form.note,
            pain_score: form.pain_score,
            has_bleeding: form.has_bleeding,
            has_itching: form.has_itching,
            is_swollen: form.is_swollen,
            estimated_size_mm: form.estimated_size_mm,
        }
    }

    /// Whether a photo is attached.
    #[must_use]
    pub fn has_photo(&self) -> bool {
        !self.image_filename.is_empty()
    }

    /// Whether the pain score lies on the documented scale.
    #[must_use]
    pub fn pain_in_nominal_range(&self) -> bool {
        PAIN_SCORE_RANGE.contains(&self.pain_score)
    }
}

/// Pick the most recent entry. Equal timestamps fall back to the larger id.
#[must_use]
pub fn latest_entry(entries: &[LogEntry]) -> Option<&LogEntry> {
    entries
        .iter()
        .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
}
