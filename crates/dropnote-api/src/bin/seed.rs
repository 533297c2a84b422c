//! dropnote-seed - load notes from a JSON file into the database.
//!
//! ```text
//! dropnote-seed notes.json
//! dropnote-seed --dry-run notes.json
//! dropnote-seed --ignore-cap --database-url postgres://... notes.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dropnote_api::config::LogConfig;
use dropnote_api::seed::{check_capacity, parse_seed_notes};
use dropnote_api::telemetry::init_tracing;
use dropnote_core::defaults;
use dropnote_core::logging::{RESULT_COUNT, SUBSYSTEM};
use dropnote_db::{Database, NoteRepository};

#[derive(Debug, Parser)]
#[command(name = "dropnote-seed", version, about = "Load notes from a JSON file")]
struct Cli {
    /// JSON array of {title, content, username?, tags?, visibility?} objects
    file: PathBuf,

    /// PostgreSQL connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = dropnote_api::config::DEFAULT_DATABASE_URL
    )]
    database_url: String,

    /// Refuse to load past this many notes in total
    #[arg(long, env = "MAX_NOTES", default_value_t = defaults::MAX_NOTES)]
    max_notes: i64,

    /// Load even if the total would exceed --max-notes
    #[arg(long)]
    ignore_cap: bool,

    /// Validate the file without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Apply pending migrations before loading
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing(&LogConfig::from_env(), "dropnote_seed=info,dropnote_db=info");

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let notes = parse_seed_notes(&raw)?;
    info!(
        { SUBSYSTEM } = "seed",
        { RESULT_COUNT } = notes.len(),
        file = %cli.file.display(),
        "Seed file validated"
    );

    if cli.dry_run {
        println!("{} notes valid, nothing written (dry run)", notes.len());
        return Ok(());
    }

    let db = Database::connect(&cli.database_url).await?;
    if cli.migrate {
        db.migrate().await?;
    }

    if !cli.ignore_cap {
        let existing = db.notes.count().await?;
        check_capacity(existing, notes.len(), cli.max_notes)?;
    }

    let created = db.notes.create_bulk(notes).await?;
    for note in &created {
        println!(
            "{}\t{}\t{}",
            note.note.id,
            note.modification_code.as_str(),
            note.note.title
        );
    }
    info!(
        { SUBSYSTEM } = "seed",
        { RESULT_COUNT } = created.len(),
        "Seed complete"
    );
    Ok(())
}
