//! Traits and types for video extraction

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Metadata reported by an extractor for one video
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// Video id on the hosting platform
    pub id: String,
    /// Video title
    pub title: String,
    /// Languages of the subtitle tracks offered by the source (manual subtitles only)
    pub subtitle_languages: Vec<String>,
}

/// Trait for video metadata extraction and download
///
/// This trait defines the interface the media resolver drives. Implementations
/// can wrap an external binary or provide stub functionality for graceful
/// degradation when no extractor is installed.
///
/// # Examples
///
/// ```no_run
/// use kb_harvest::media::{MediaExtractor, YtDlpExtractor};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = YtDlpExtractor::from_path()
///     .expect("yt-dlp binary not found");
///
/// let info = extractor.probe("https://www.youtube.com/watch?v=abc").await?;
/// let path = extractor
///     .download("https://www.youtube.com/watch?v=abc", Path::new("videos"), "best")
///     .await?;
/// println!("{} -> {}", info.title, path.display());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch the metadata of a single video without downloading it
    ///
    /// # Arguments
    ///
    /// * `locator` - Watch URL of the video
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Unavailable` for removed, private or region-locked
    /// videos and `MediaError::Transient` for connection-level failures.
    async fn probe(&self, locator: &str) -> crate::Result<VideoInfo>;

    /// Download a single video into `dir`
    ///
    /// # Arguments
    ///
    /// * `locator` - Watch URL of the video
    /// * `dir` - Target directory; the file is named `<video_id>.mp4`
    /// * `format` - Format selector passed to the extractor
    ///
    /// # Returns
    ///
    /// Path of the downloaded file as reported by the extractor.
    async fn download(&self, locator: &str, dir: &Path, format: &str) -> crate::Result<PathBuf>;

    /// List the watch URLs of the entries of a playlist, in playlist order
    async fn playlist_entries(&self, locator: &str) -> crate::Result<Vec<String>>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
