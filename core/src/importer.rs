use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::ArchiveDb;
use crate::error::CoreError;
use crate::identity::{resolve_contact, resolve_conversation};
use crate::reader::{ExportReader, RawRecord};
use crate::store::{self, NewAttachment};

#[path = "importer/attachments.rs"]
pub mod attachments;
#[path = "importer/normalize.rs"]
pub mod normalize;
#[path = "importer/walker.rs"]
pub mod walker;

pub use attachments::{HttpFetcher, MediaFetcher, OfflineFetcher};
use normalize::{normalize, NormalizedMessage};

const PROGRESS_EVERY: u64 = 1000;

/// Diagnostic counts for one file or one directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub files: u64,
    pub files_failed: u64,
    pub records: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub attachments: u64,
    pub attachments_failed: u64,
}

impl IngestStats {
    fn absorb(&mut self, other: &IngestStats) {
        self.files += other.files;
        self.files_failed += other.files_failed;
        self.records += other.records;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.attachments += other.attachments;
        self.attachments_failed += other.attachments_failed;
    }

    fn summary(&self) -> String {
        format!(
            "{} records: {} inserted, {} duplicates, {} failed; attachments {} ({} without payload)",
            self.records, self.inserted, self.duplicates, self.failed, self.attachments, self.attachments_failed
        )
    }
}

/// What happened to a single export record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted { attachments: u64, attachments_failed: u64 },
    Duplicate,
    Failed(String),
}

pub fn ingest_file<M: MediaFetcher>(db: &ArchiveDb, media: &M, path: &Path) -> Result<IngestStats, CoreError> {
    ingest_file_with_progress(db, media, path, |_| {})
}

/// Streams one export file into the store. Records are committed one by one,
/// so an error returned here never undoes earlier records.
pub fn ingest_file_with_progress<M, F>(
    db: &ArchiveDb,
    media: &M,
    path: &Path,
    progress: F,
) -> Result<IngestStats, CoreError>
where
    M: MediaFetcher,
    F: Fn(&str),
{
    let source = path.display().to_string();
    let reader = ExportReader::open(path)?;
    let import_id = Uuid::new_v4().to_string();
    store::begin_import(&db.conn, &import_id, Utc::now().timestamp_millis(), &source)?;
    info!(file = %source, "ingesting export");
    progress(&format!("Importing {}...", source));

    let mut stats = IngestStats {
        files: 1,
        ..IngestStats::default()
    };
    let result = ingest_records(db, media, reader, &mut stats, &progress);

    let (status, stats_json) = match &result {
        Ok(()) => ("success", serde_json::to_string(&stats).unwrap_or_else(|_| "{}".to_string())),
        Err(err) => (
            "failed",
            serde_json::json!({ "error": err.to_string(), "stats": &stats }).to_string(),
        ),
    };
    // the ingest error wins over a failure to record it
    let finished = store::finish_import(&db.conn, &import_id, status, &stats_json);
    result?;
    finished?;

    info!(file = %source, inserted = stats.inserted, duplicates = stats.duplicates, failed = stats.failed, "export ingested");
    progress(&format!("Imported {}: {}", source, stats.summary()));
    Ok(stats)
}

fn ingest_records<R, M, F>(
    db: &ArchiveDb,
    media: &M,
    reader: ExportReader<R>,
    stats: &mut IngestStats,
    progress: &F,
) -> Result<(), CoreError>
where
    R: std::io::BufRead,
    M: MediaFetcher,
    F: Fn(&str),
{
    for item in reader {
        let record = match item {
            Ok(record) => record,
            Err(err) if err.is_fatal() => return Err(CoreError::Xml(err.to_string())),
            Err(err) => {
                stats.records += 1;
                stats.failed += 1;
                warn!(error = %err, "skipping malformed element");
                continue;
            }
        };
        stats.records += 1;
        match ingest_record(db, media, &record)? {
            RecordOutcome::Inserted {
                attachments,
                attachments_failed,
            } => {
                stats.inserted += 1;
                stats.attachments += attachments;
                stats.attachments_failed += attachments_failed;
            }
            RecordOutcome::Duplicate => stats.duplicates += 1,
            RecordOutcome::Failed(reason) => {
                stats.failed += 1;
                warn!(kind = record.kind(), reason = %reason, "skipping record");
            }
        }
        if stats.records % PROGRESS_EVERY == 0 {
            progress(&format!("Importing... {}", stats.summary()));
        }
    }
    Ok(())
}

/// Normalize, gate, resolve, persist. Only persistence errors escape; a record
/// that cannot be normalized is reported as `Failed`.
pub fn ingest_record<M: MediaFetcher>(
    db: &ArchiveDb,
    media: &M,
    record: &RawRecord,
) -> Result<RecordOutcome, CoreError> {
    let message = match normalize(record) {
        Ok(message) => message,
        Err(err) => return Ok(RecordOutcome::Failed(err.to_string())),
    };
    if !store::should_ingest(&db.conn, &message.fingerprint)? {
        return Ok(RecordOutcome::Duplicate);
    }

    let conversation = resolve_conversation(db, message.thread_id)?;
    let sender_id = match &message.sender {
        Some(sender) => Some(resolve_contact(db, &sender.phone_number, sender.name.as_deref())?.id),
        None => None,
    };
    let message_id = match store::insert_message(&db.conn, &message, conversation.id, sender_id)? {
        Some(id) => id,
        None => return Ok(RecordOutcome::Duplicate),
    };

    let (attachments, attachments_failed) = store_attachments(db, media, &message, message_id)?;
    Ok(RecordOutcome::Inserted {
        attachments,
        attachments_failed,
    })
}

fn store_attachments<M: MediaFetcher>(
    db: &ArchiveDb,
    media: &M,
    message: &NormalizedMessage,
    message_id: i64,
) -> Result<(u64, u64), CoreError> {
    let mut stored = 0;
    let mut failed = 0;
    for pending in &message.attachments {
        let file_name = attachments::storage_name(&message.fingerprint, &pending.locator);
        let file_path = match media.fetch(&pending.locator, &message.fingerprint) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(err) => {
                warn!(locator = %pending.locator, error = %err, "attachment not retrieved");
                failed += 1;
                String::new()
            }
        };
        let inserted = store::insert_attachment(
            &db.conn,
            &NewAttachment {
                message_id,
                content_type: pending.content_type.as_deref(),
                file_name: &file_name,
                file_path: &file_path,
                source_url: &pending.locator,
            },
        )?;
        if inserted {
            stored += 1;
        }
    }
    Ok((stored, failed))
}

pub fn ingest_directory<M: MediaFetcher>(db: &ArchiveDb, media: &M, root: &Path) -> Result<IngestStats, CoreError> {
    ingest_directory_with_progress(db, media, root, |_| {})
}

/// Ingests every export under `root` with one shared store handle. Files that
/// cannot be read or parsed are skipped; store errors abort the run.
pub fn ingest_directory_with_progress<M, F>(
    db: &ArchiveDb,
    media: &M,
    root: &Path,
    progress: F,
) -> Result<IngestStats, CoreError>
where
    M: MediaFetcher,
    F: Fn(&str),
{
    if !root.is_dir() {
        return Err(CoreError::InvalidArgument(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let files = walker::xml_files(root);
    progress(&format!("Found {} export files", files.len()));
    let mut total = IngestStats::default();
    for path in &files {
        match ingest_file_with_progress(db, media, path, &progress) {
            Ok(stats) => total.absorb(&stats),
            Err(CoreError::Sqlite(err)) => return Err(CoreError::Sqlite(err)),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping export file");
                progress(&format!("Skipped {}: {}", path.display(), err));
                total.files += 1;
                total.files_failed += 1;
            }
        }
    }
    progress(&format!("Done: {} files, {}", total.files, total.summary()));
    Ok(total)
}
