//! Command-line interface for spotlog.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CaptureCommand, ConfigCommand, EntryCommand, GcCommand, GhostCommand, ProfileCommand,
    SpotCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// spotlog - Photo journal for skin spots
///
/// Track moles, rashes and wounds over time: one photo and a few notes per
/// observation, with the previous photo as an alignment guide.
#[derive(Debug, Parser)]
#[command(name = "spotlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage family member profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage tracked spots
    #[command(subcommand)]
    Spot(SpotCommand),

    /// Inspect or remove log entries
    #[command(subcommand)]
    Entry(EntryCommand),

    /// Record an observation from a still image
    Capture(CaptureCommand),

    /// Blend the latest photo of a spot over a live frame
    Ghost(GhostCommand),

    /// Remove photos no entry refers to
    Gc(GcCommand),

    /// Show journal status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
