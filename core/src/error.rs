use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Why a single export record could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing attribute `{0}`")]
    MissingAttribute(&'static str),
    #[error("attribute `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("malformed element: {0}")]
    Malformed(String),
}

/// Soft failure while retrieving remote media for an MMS part.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("locator is not an http(s) url: {0}")]
    UnsupportedLocator(String),
    #[error("remote returned status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("media write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("media fetching disabled")]
    Disabled,
}
