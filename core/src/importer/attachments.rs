use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use url::Url;

use crate::error::{CoreError, FetchFailure};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const NAME_PREFIX_LEN: usize = 16;
const MAX_EXTENSION_LEN: usize = 10;

/// Retrieves the payload behind an MMS part locator into local storage.
pub trait MediaFetcher {
    fn fetch(&self, locator: &str, fingerprint: &str) -> Result<PathBuf, FetchFailure>;
}

impl<T: MediaFetcher + ?Sized> MediaFetcher for Box<T> {
    fn fetch(&self, locator: &str, fingerprint: &str) -> Result<PathBuf, FetchFailure> {
        (**self).fetch(locator, fingerprint)
    }
}

/// Blocking HTTP(S) fetcher writing into a flat media directory.
pub struct HttpFetcher {
    client: Client,
    media_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(media_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        HttpFetcher::with_client(media_dir, client)
    }

    /// Uses a caller-configured client; the media directory is created if absent.
    pub fn with_client(media_dir: impl Into<PathBuf>, client: Client) -> Result<Self, CoreError> {
        let media_dir = media_dir.into();
        fs::create_dir_all(&media_dir)?;
        Ok(HttpFetcher { client, media_dir })
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }
}

impl MediaFetcher for HttpFetcher {
    fn fetch(&self, locator: &str, fingerprint: &str) -> Result<PathBuf, FetchFailure> {
        let url = remote_url(locator).ok_or_else(|| FetchFailure::UnsupportedLocator(locator.to_string()))?;
        let dest = self.media_dir.join(storage_name(fingerprint, locator));
        if dest.exists() {
            return Ok(dest);
        }
        let mut response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(FetchFailure::Status(response.status().as_u16()));
        }
        let mut temp = NamedTempFile::new_in(&self.media_dir)?;
        response.copy_to(&mut temp)?;
        temp.persist(&dest).map_err(|e| FetchFailure::Io(e.error))?;
        Ok(dest)
    }
}

/// Records every attachment without touching the network.
pub struct OfflineFetcher;

impl MediaFetcher for OfflineFetcher {
    fn fetch(&self, _locator: &str, _fingerprint: &str) -> Result<PathBuf, FetchFailure> {
        Err(FetchFailure::Disabled)
    }
}

fn remote_url(locator: &str) -> Option<Url> {
    let url = Url::parse(locator).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

/// `{fingerprint prefix}_{locator digest prefix}[.ext]`. Stable across runs
/// and processes.
pub fn storage_name(fingerprint: &str, locator: &str) -> String {
    let prefix: String = fingerprint.chars().take(NAME_PREFIX_LEN).collect();
    let locator_digest = hex::encode(Sha256::digest(locator.as_bytes()));
    let stem = format!("{}_{}", prefix, &locator_digest[..NAME_PREFIX_LEN]);
    match file_extension(locator) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Extension of the locator's last path segment, ignoring query and fragment.
pub fn file_extension(locator: &str) -> Option<String> {
    let segment = match Url::parse(locator) {
        Ok(url) => url.path_segments().and_then(|mut s| s.next_back()).map(str::to_string)?,
        Err(_) => {
            let path = locator.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        }
    };
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
