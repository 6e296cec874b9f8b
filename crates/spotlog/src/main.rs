//! `spotlog` - CLI for the spot photo journal.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::DynamicImage;

use spotlog::camera::{CaptureSession, DeviceRegistry, FileCamera, NoPermissionRequired};
use spotlog::cli::{
    CaptureCommand, Cli, Command, ConfigCommand, EntryCommand, GhostCommand, ProfileCommand,
    SpotCommand,
};
use spotlog::image_store::PhotoFormat;
use spotlog::journal::CleanupReport;
use spotlog::model::{Spot, UserProfile};
use spotlog::overlay::{composite, load_ghost};
use spotlog::{init_logging, Config, Error, ImageStore, Journal, ObservationRecorder, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    // These two must work even when the config file is broken.
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", Config::default_config_path().display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            let path = file
                .clone()
                .or_else(|| cli.config.clone())
                .unwrap_or_else(Config::default_config_path);
            return handle_validate(&path);
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    if let Command::Config(ConfigCommand::Show { json }) = cli.command {
        return handle_config_show(&config, json);
    }

    let journal = open_journal(&config)?;

    match cli.command {
        Command::Profile(cmd) => handle_profile(&journal, cmd).await,
        Command::Spot(cmd) => handle_spot(&journal, cmd).await,
        Command::Entry(cmd) => handle_entry(&journal, cmd).await,
        Command::Capture(cmd) => handle_capture(&config, &journal, &cmd).await,
        Command::Ghost(cmd) => handle_ghost(&journal, &cmd).await,
        Command::Gc(cmd) => {
            let journal = match cmd.grace_minutes {
                Some(minutes) => {
                    journal.with_orphan_grace(Duration::from_secs(minutes.saturating_mul(60)))
                }
                None => journal,
            };
            handle_gc(&journal, cmd.dry_run).await
        }
        Command::Status(cmd) => handle_status(&config, &journal, cmd.json).await,
        Command::Config(_) => Ok(()),
    }
}

fn open_journal(config: &Config) -> Result<Journal> {
    let storage = Storage::open(config.database_path())?;
    let store = ImageStore::open(config.images_dir())?.with_jpeg_quality(config.capture.jpeg_quality);
    Ok(Journal::new(storage, store).with_orphan_grace(config.orphan_grace()))
}

fn find_spot(journal: &Journal, id: &uuid::Uuid) -> Result<Spot> {
    Ok(journal
        .storage()
        .get_spot(id)?
        .ok_or_else(|| Error::not_found("spot", id))?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_cleanup(what: &str, report: &CleanupReport) {
    println!(
        "Removed {what}: {} photos deleted, {} already missing",
        report.deleted.len(),
        report.missing.len()
    );
    for name in &report.failed {
        eprintln!("  could not delete photo {name}");
    }
}

async fn handle_profile(journal: &Journal, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Add {
            name,
            relation,
            color,
        } => {
            let mut profile = UserProfile::new(name, relation);
            if let Some(color) = color {
                profile = profile.with_avatar_color(color);
            }
            journal.storage().insert_profile(&profile)?;
            println!("{}", profile.id);
        }
        ProfileCommand::List { json } => {
            let profiles = journal.storage().list_profiles()?;
            if json {
                return print_json(&profiles);
            }
            for p in profiles {
                println!("{}  {:<20} {:<12} {}", p.id, p.name, p.relation, p.avatar_color);
            }
        }
        ProfileCommand::Remove { id } => {
            let report = journal.delete_profile(&id).await?;
            print_cleanup("profile", &report);
        }
    }
    Ok(())
}

async fn handle_spot(journal: &Journal, cmd: SpotCommand) -> Result<()> {
    match cmd {
        SpotCommand::Add {
            profile,
            title,
            body_part,
        } => {
            let owner = journal
                .storage()
                .get_profile(&profile)?
                .ok_or_else(|| Error::not_found("profile", profile))?;
            let spot = Spot::new(&owner, title, body_part);
            journal.storage().insert_spot(&spot)?;
            println!("{}", spot.id);
        }
        SpotCommand::List { profile, json } => {
            let spots = match profile {
                Some(id) => journal.storage().spots_for_profile(&id)?,
                None => journal.storage().list_spots()?,
            };
            if json {
                return print_json(&spots);
            }
            for s in spots {
                let status = if s.is_active { "active" } else { "resolved" };
                println!("{}  {:<24} {:<16} {}", s.id, s.title, s.body_part, status);
            }
        }
        SpotCommand::Resolve { id, reopen } => {
            if !journal.storage().set_spot_active(&id, reopen)? {
                return Err(Error::not_found("spot", id).into());
            }
        }
        SpotCommand::Remove { id } => {
            let report = journal.delete_spot(&id).await?;
            print_cleanup("spot", &report);
        }
    }
    Ok(())
}

async fn handle_entry(journal: &Journal, cmd: EntryCommand) -> Result<()> {
    match cmd {
        EntryCommand::List { spot, json } => {
            let spot = find_spot(journal, &spot)?;
            let entries = journal.storage().entries_for_spot(&spot.id)?;
            if json {
                return print_json(&entries);
            }
            for e in entries {
                let photo = if e.has_photo() { e.image_filename.as_str() } else { "-" };
                println!(
                    "{}  {}  pain={:<3} {}  {}",
                    e.id,
                    e.timestamp.format("%Y-%m-%d %H:%M"),
                    e.pain_score,
                    photo,
                    e.note
                );
            }
        }
        EntryCommand::Remove { id } => {
            let report = journal.delete_entry(&id).await?;
            print_cleanup("entry", &report);
        }
    }
    Ok(())
}

async fn handle_capture(config: &Config, journal: &Journal, cmd: &CaptureCommand) -> Result<()> {
    let spot = find_spot(journal, &cmd.spot)?;

    let session = CaptureSession::new(
        Arc::new(FileCamera::new(&cmd.frame)),
        Arc::new(NoPermissionRequired),
        DeviceRegistry::new(),
    )
    .with_preferred_position(config.capture.preferred_position);
    let recorder =
        ObservationRecorder::new(journal.store().clone()).with_format(config.capture.photo_format);

    session.initialize().await?;
    let recorded = recorder.shutter(&session, &spot, cmd.form()).await;
    session.stop().await;
    let entry = recorded?;

    if let Err(e) = journal.commit_entry(&entry).await {
        // Leave no orphan behind for a record that was never written.
        if let Err(cleanup) = journal.store().delete(&entry.image_filename).await {
            tracing::warn!("Could not remove uncommitted photo: {}", cleanup);
        }
        return Err(e.into());
    }

    println!("{}", entry.id);
    Ok(())
}

async fn handle_ghost(journal: &Journal, cmd: &GhostCommand) -> Result<()> {
    let spot = find_spot(journal, &cmd.spot)?;
    let live = image::open(&cmd.frame)
        .with_context(|| format!("reading {}", cmd.frame.display()))?
        .to_rgba8();

    let preview = match load_ghost(journal.storage(), journal.store(), &spot).await {
        Some(ghost) => {
            println!("Ghost: {}", ghost.filename);
            composite(&live, &ghost.image)
        }
        None => {
            println!("No ghost for '{}', writing the frame unchanged", spot.title);
            live
        }
    };

    let preview = DynamicImage::ImageRgba8(preview);
    match PhotoFormat::from_filename(&cmd.output.to_string_lossy()) {
        Some(PhotoFormat::Png) => preview.save(&cmd.output)?,
        Some(PhotoFormat::Jpg) => preview.to_rgb8().save(&cmd.output)?,
        None => bail!("output must end in .png, .jpg or .jpeg"),
    }
    Ok(())
}

async fn handle_gc(journal: &Journal, dry_run: bool) -> Result<()> {
    let report = journal.collect_orphans(dry_run).await?;
    if dry_run {
        for name in &report.orphans {
            println!("{name}");
        }
        println!("{} orphaned photos (not removed)", report.orphans.len());
        return Ok(());
    }

    for name in &report.removed {
        println!("{name}");
    }
    for name in &report.failed {
        eprintln!("  could not delete photo {name}");
    }
    println!(
        "Removed {} orphaned photos and {} temp files",
        report.removed.len(),
        report.temp_files_removed
    );
    if !report.failed.is_empty() {
        bail!("{} orphaned photos could not be removed", report.failed.len());
    }
    Ok(())
}

async fn handle_status(config: &Config, journal: &Journal, json: bool) -> Result<()> {
    let stats = journal.storage().stats()?;
    let photos = journal.store().list().await?.len();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "images_dir": config.images_dir(),
            "photos": photos,
            "stats": stats,
        });
        return print_json(&status);
    }

    println!("spotlog status");
    println!("--------------");
    println!("Database:      {}", config.database_path().display());
    println!("Photos dir:    {}", config.images_dir().display());
    println!("Profiles:      {}", stats.profiles);
    println!(
        "Spots:         {} ({} active)",
        stats.spots, stats.active_spots
    );
    println!("Entries:       {}", stats.entries);
    println!("Photos:        {photos}");
    if let Some(newest) = stats.newest_entry {
        println!("Last entry:    {}", newest.format("%Y-%m-%d %H:%M"));
    }
    println!("DB size:       {} bytes", stats.db_size_bytes);
    Ok(())
}

fn handle_validate(path: &Path) -> Result<()> {
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path.to_path_buf())) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => bail!("configuration error: {e}"),
    }
    Ok(())
}

fn handle_config_show(config: &Config, json: bool) -> Result<()> {
    if json {
        return print_json(config);
    }
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Storage]");
    println!("  Database path:      {}", config.database_path().display());
    println!("  Images dir:         {}", config.images_dir().display());
    println!("  Orphan grace:       {} min", config.storage.orphan_grace_minutes);
    println!();
    println!("[Capture]");
    println!("  Photo format:       {}", config.capture.photo_format);
    println!("  Preferred camera:   {}", config.capture.preferred_position);
    println!("  JPEG quality:       {}", config.capture.jpeg_quality);
    Ok(())
}
