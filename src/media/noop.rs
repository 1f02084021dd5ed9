//! No-op extractor for graceful degradation

use super::traits::{MediaExtractor, VideoInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// No-op extractor used when yt-dlp is unavailable
///
/// Every call returns `Error::NotSupported`. Articles still get their HTML
/// bundle; only their video children are skipped.
///
/// # Examples
///
/// ```
/// use kb_harvest::media::{MediaExtractor, NoOpExtractor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = NoOpExtractor;
/// assert!(extractor.probe("https://www.youtube.com/watch?v=abc").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct NoOpExtractor;

const UNSUPPORTED: &str = "Video extraction requires external yt-dlp binary. \
                           Configure media.ytdlp_path in config or ensure yt-dlp is in PATH.";

#[async_trait]
impl MediaExtractor for NoOpExtractor {
    async fn probe(&self, _locator: &str) -> crate::Result<VideoInfo> {
        Err(crate::Error::NotSupported(UNSUPPORTED.into()))
    }

    async fn download(&self, _locator: &str, _dir: &Path, _format: &str) -> crate::Result<PathBuf> {
        Err(crate::Error::NotSupported(UNSUPPORTED.into()))
    }

    async fn playlist_entries(&self, _locator: &str) -> crate::Result<Vec<String>> {
        Err(crate::Error::NotSupported(UNSUPPORTED.into()))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
