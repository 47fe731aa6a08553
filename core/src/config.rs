use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;
use crate::importer::attachments::{HttpFetcher, MediaFetcher, OfflineFetcher, DEFAULT_FETCH_TIMEOUT};

pub const MEDIA_DIR_NAME: &str = "media";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub media_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub fetch_media: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            media_dir: PathBuf::from(MEDIA_DIR_NAME),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_media: true,
        }
    }
}

impl IngestOptions {
    /// Media lands in `media/` beside the archive file.
    pub fn for_archive(archive_path: &Path) -> Self {
        let base = archive_path.parent().unwrap_or_else(|| Path::new("."));
        IngestOptions {
            media_dir: base.join(MEDIA_DIR_NAME),
            ..IngestOptions::default()
        }
    }

    /// Creates the media root when fetching is enabled.
    pub fn build_fetcher(&self) -> Result<Box<dyn MediaFetcher>, CoreError> {
        if !self.fetch_media {
            return Ok(Box::new(OfflineFetcher));
        }
        Ok(Box::new(HttpFetcher::new(&self.media_dir, self.fetch_timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn media_dir_defaults_next_to_archive() {
        let opts = IngestOptions::for_archive(Path::new("/data/archive.sqlite"));
        assert_eq!(opts.media_dir, PathBuf::from("/data/media"));
        assert_eq!(opts.fetch_timeout, Duration::from_secs(5));
        assert!(opts.fetch_media);
    }

    #[test]
    fn build_fetcher_creates_media_root() {
        let tmp = tempdir().expect("temp");
        let opts = IngestOptions::for_archive(&tmp.path().join("archive.sqlite"));
        opts.build_fetcher().expect("fetcher");
        assert!(tmp.path().join("media").is_dir());
    }

    #[test]
    fn offline_fetcher_skips_media_root() {
        let tmp = tempdir().expect("temp");
        let opts = IngestOptions {
            fetch_media: false,
            ..IngestOptions::for_archive(&tmp.path().join("archive.sqlite"))
        };
        opts.build_fetcher().expect("fetcher");
        assert!(!tmp.path().join("media").exists());
    }
}
