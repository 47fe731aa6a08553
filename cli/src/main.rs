mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sms_archive_core::config::IngestOptions;
use sms_archive_core::importer::{self, IngestStats};
use sms_archive_core::{diagnostics, open_archive, query, ArchiveDb};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Ingest SMS/MMS XML backups into a SQLite archive", long_about = None)]
struct Args {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one export file or every .xml file under a directory
    Ingest {
        path: PathBuf,

        #[arg(short, long, env = "SMS_ARCHIVE_DB")]
        archive: PathBuf,

        /// Defaults to `media/` beside the archive
        #[arg(long, env = "SMS_ARCHIVE_MEDIA_DIR")]
        media_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,

        /// Record attachments without downloading them
        #[arg(long)]
        no_fetch: bool,

        /// Directory for the diagnostics journal
        #[arg(long, env = "SMS_ARCHIVE_LOG_DIR")]
        log_dir: Option<PathBuf>,
    },
    /// Print row counts for an archive
    Stats {
        #[arg(short, long, env = "SMS_ARCHIVE_DB")]
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log_level)?;

    match args.command {
        Command::Ingest {
            path,
            archive,
            media_dir,
            timeout_secs,
            no_fetch,
            log_dir,
        } => {
            let mut options = IngestOptions::for_archive(&archive);
            if let Some(dir) = media_dir {
                options.media_dir = dir;
            }
            options.fetch_timeout = Duration::from_secs(timeout_secs);
            options.fetch_media = !no_fetch;
            run_ingest(&path, &archive, &options, log_dir.as_deref())
        }
        Command::Stats { archive } => {
            let db = open_archive(&archive).with_context(|| format!("opening {}", archive.display()))?;
            let stats = query::archive_stats(&db.conn)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn run_ingest(path: &Path, archive: &Path, options: &IngestOptions, log_dir: Option<&Path>) -> Result<()> {
    let journal = |kind: &str, message: &str| {
        if let Some(dir) = log_dir {
            let _ = diagnostics::log_event(dir, kind, message);
        }
    };
    journal("ingest_start", "ingest requested");
    info!(source = %path.display(), archive = %archive.display(), "starting ingest");

    match ingest(path, archive, options) {
        Ok(stats) => {
            journal("ingest_success", &format!("{} inserted, {} failed", stats.inserted, stats.failed));
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "ingest failed");
            journal("ingest_error", &err.to_string());
            Err(err)
        }
    }
}

fn ingest(path: &Path, archive: &Path, options: &IngestOptions) -> Result<IngestStats> {
    let db: ArchiveDb = open_archive(archive).with_context(|| format!("opening {}", archive.display()))?;
    let fetcher = options.build_fetcher().context("preparing media directory")?;
    let progress = |msg: &str| info!("{}", msg);

    let stats = if path.is_dir() {
        importer::ingest_directory_with_progress(&db, &fetcher, path, progress)?
    } else {
        importer::ingest_file_with_progress(&db, &fetcher, path, progress)
            .with_context(|| format!("ingesting {}", path.display()))?
    };
    Ok(stats)
}
