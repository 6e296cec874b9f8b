//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::model::EntryForm;

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Add a family member
    Add {
        /// Display name
        name: String,

        /// Relation label (e.g. "Me", "Daughter")
        #[arg(short, long, default_value = "Me")]
        relation: String,

        /// Avatar color as a hex tag
        #[arg(long)]
        color: Option<String>,
    },

    /// List profiles
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove a profile with all of its spots, entries, and photos
    Remove {
        /// Profile id
        id: Uuid,
    },
}

/// Spot commands.
#[derive(Debug, Subcommand)]
pub enum SpotCommand {
    /// Start tracking a spot
    Add {
        /// Owning profile id
        #[arg(short, long)]
        profile: Uuid,

        /// Title (e.g. "Left Arm Mole")
        title: String,

        /// Body part label
        #[arg(short, long, default_value = "")]
        body_part: String,
    },

    /// List spots
    List {
        /// Only spots of this profile
        #[arg(short, long)]
        profile: Option<Uuid>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Mark a spot as resolved (or active again with --reopen)
    Resolve {
        /// Spot id
        id: Uuid,

        /// Mark active instead
        #[arg(long)]
        reopen: bool,
    },

    /// Remove a spot with its entries and photos
    Remove {
        /// Spot id
        id: Uuid,
    },
}

/// Log entry commands.
#[derive(Debug, Subcommand)]
pub enum EntryCommand {
    /// List a spot's entries, newest first
    List {
        /// Spot id
        #[arg(short, long)]
        spot: Uuid,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove an entry and its photo
    Remove {
        /// Entry id
        id: Uuid,
    },
}

/// Capture command arguments.
#[derive(Debug, Args)]
pub struct CaptureCommand {
    /// Spot the observation belongs to
    #[arg(short, long)]
    pub spot: Uuid,

    /// Still image to record as the photo
    #[arg(short, long, value_name = "FILE")]
    pub frame: PathBuf,

    /// Free-text note
    #[arg(short, long, default_value = "")]
    pub note: String,

    /// Pain score (0-10 scale; other values are kept as entered)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub pain: i32,

    /// Bleeding observed
    #[arg(long)]
    pub bleeding: bool,

    /// Itching reported
    #[arg(long)]
    pub itching: bool,

    /// Swelling observed
    #[arg(long)]
    pub swollen: bool,

    /// Estimated size in millimeters
    #[arg(long, value_name = "MM")]
    pub size: Option<f64>,
}

impl CaptureCommand {
    /// The form fields carried by this command.
    #[must_use]
    pub fn form(&self) -> EntryForm {
        EntryForm {
            note: self.note.clone(),
            pain_score: self.pain,
            has_bleeding: self.bleeding,
            has_itching: self.itching,
            is_swollen: self.swollen,
            estimated_size_mm: self.size,
        }
    }
}

/// Ghost preview arguments.
#[derive(Debug, Args)]
pub struct GhostCommand {
    /// Spot whose latest photo is the ghost
    #[arg(short, long)]
    pub spot: Uuid,

    /// Live frame to draw the ghost over
    #[arg(short, long, value_name = "FILE")]
    pub frame: PathBuf,

    /// Where to write the blended preview (.png or .jpg)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Orphan collection arguments.
#[derive(Debug, Args)]
pub struct GcCommand {
    /// List orphaned photos without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip photos modified within this many minutes (overrides config)
    #[arg(long, value_name = "MINUTES")]
    pub grace_minutes: Option<u64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
