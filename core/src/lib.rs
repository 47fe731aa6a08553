pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod importer;
pub mod models;
pub mod query;
pub mod reader;
pub mod store;
mod migrations;

pub use db::{open_archive, ArchiveDb};
pub use error::{CoreError, FetchFailure, RecordError};
pub use fingerprint::fingerprint;
pub use importer::{ingest_directory, ingest_file, IngestStats};
