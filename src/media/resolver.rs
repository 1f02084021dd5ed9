//! Video reference discovery and resolution

use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cli::YtDlpExtractor;
use super::noop::NoOpExtractor;
use super::traits::{MediaExtractor, VideoInfo};
use crate::config::{MediaConfig, RetryConfig};
use crate::error::{Error, MediaError, Result};
use crate::retry::with_retry;
use crate::types::{MediaReference, SubtitleTrack};
use crate::utils::is_non_empty_file;

/// Canonical watch URL prefix used for short links
const WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Path fragments of channel and user pages, which are never single videos
const CHANNEL_MARKERS: &[&str] = &["/user/", "/channel/", "/c/"];

/// Find video references in a detail fragment
///
/// Must run on the raw fragment, before cleaning removes iframes. Anchors
/// count when their href mentions a video host or their text is "youtube";
/// iframes count when their src is a video embed that is not a channel.
/// Locators are normalized and deduplicated in discovery order.
pub fn discover_references(fragment: &str, resolution_cap: u32) -> Vec<MediaReference> {
    let (Ok(anchors), Ok(iframes)) = (Selector::parse("a"), Selector::parse("iframe")) else {
        return Vec::new();
    };
    let document = Html::parse_fragment(fragment);
    let mut found: Vec<MediaReference> = Vec::new();
    let mut push = |locator: String, is_embedded: bool| {
        if !locator.is_empty() && !found.iter().any(|r| r.locator == locator) {
            found.push(MediaReference::new(locator, is_embedded, resolution_cap));
        }
    };

    for anchor in document.select(&anchors) {
        let href = anchor.value().attr("href").unwrap_or_default();
        let text = anchor.text().collect::<String>();
        if mentions_video_host(href) || text.trim().eq_ignore_ascii_case("youtube") {
            push(normalize_locator(href), false);
        }
    }

    for iframe in document.select(&iframes) {
        let src = iframe.value().attr("src").unwrap_or_default();
        if mentions_video_host(src) && !src.contains("user") && !src.contains("/c/") {
            push(normalize_locator(src), true);
        }
    }

    found
}

fn mentions_video_host(url: &str) -> bool {
    url.contains("youtube") || url.contains("youtu.be")
}

/// Normalize a raw href or embed src into a watch locator
///
/// - embed URLs drop their query and `embed/` becomes `watch?v=`
/// - `youtu.be/<id>` becomes a canonical watch URL
/// - protocol-relative URLs get `https:`
/// - a trailing `/` is trimmed
pub fn normalize_locator(raw: &str) -> String {
    let mut locator = raw.trim().to_string();
    if locator.starts_with("//") {
        locator = format!("https:{locator}");
    }

    if locator.contains("embed/") {
        locator = locator
            .split('?')
            .next()
            .unwrap_or_default()
            .replace("embed/", "watch?v=");
    } else if let Some((_, rest)) = locator.split_once("youtu.be/") {
        let id = rest.split(['?', '&', '/', '#']).next().unwrap_or_default();
        if !id.is_empty() {
            locator = format!("{WATCH_PREFIX}{id}");
        }
    }

    while locator.ends_with('/') {
        locator.pop();
    }
    locator
}

/// Returns true if the locator names a single watchable video
pub fn is_watch_locator(locator: &str) -> bool {
    locator.contains("watch?") && !CHANNEL_MARKERS.iter().any(|m| locator.contains(m))
}

/// Returns true if the locator is a playlist page rather than a video
pub fn is_playlist(locator: &str) -> bool {
    locator.contains("list=") && !locator.contains("watch?")
}

/// Format selector for a resolution cap: muxed mp4 first, then separate streams
pub fn format_selector(cap: u32) -> String {
    format!("best[height<={cap}][ext=mp4]/bestvideo[height<={cap}][ext=mp4]+bestaudio[ext=m4a]")
}

/// A successfully resolved video
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    /// The reference with `resolved_path` and `subtitle_tracks` filled in
    pub reference: MediaReference,
    /// Video id on the hosting platform
    pub video_id: String,
    /// Video title as reported by the source
    pub title: String,
    /// Downloaded file; `None` for a metadata-only resolution
    pub path: Option<PathBuf>,
    /// Subtitle tracks offered by the source
    pub subtitles: Vec<SubtitleTrack>,
}

/// Resolves video references through a [`MediaExtractor`]
#[derive(Clone)]
pub struct MediaResolver {
    extractor: Arc<dyn MediaExtractor>,
    retry: RetryConfig,
    resolution_cap: u32,
}

impl std::fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResolver")
            .field("extractor", &self.extractor.name())
            .field("retry", &self.retry)
            .field("resolution_cap", &self.resolution_cap)
            .finish()
    }
}

impl MediaResolver {
    /// Create a resolver around an explicit extractor
    pub fn new(extractor: Arc<dyn MediaExtractor>, config: &MediaConfig) -> Self {
        Self {
            extractor,
            retry: config.retry.clone(),
            resolution_cap: config.resolution_cap,
        }
    }

    /// Create a resolver, selecting the extractor from configuration
    ///
    /// An explicit `ytdlp_path` wins; otherwise PATH is searched when
    /// `search_path` is set. Without a binary every resolution reports
    /// `NotSupported` and articles keep only their bundles.
    pub fn from_config(config: &MediaConfig) -> Self {
        let extractor: Arc<dyn MediaExtractor> = if let Some(ref ytdlp_path) = config.ytdlp_path {
            // Use explicitly configured binary path
            Arc::new(YtDlpExtractor::new(ytdlp_path.clone()))
        } else if config.search_path {
            // Search PATH for yt-dlp
            YtDlpExtractor::from_path()
                .map(|e| Arc::new(e) as Arc<dyn MediaExtractor>)
                .unwrap_or_else(|| Arc::new(NoOpExtractor))
        } else {
            Arc::new(NoOpExtractor)
        };

        tracing::info!(
            extractor = extractor.name(),
            resolution_cap = config.resolution_cap,
            download_videos = config.download_videos,
            "Media extractor initialized"
        );
        Self::new(extractor, config)
    }

    /// Name of the extractor in use
    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Maximum video height requested from the extractor
    pub fn resolution_cap(&self) -> u32 {
        self.resolution_cap
    }

    /// Expand a playlist reference into its video references
    ///
    /// Entries that are not single-video locators are dropped. The expanded
    /// references inherit `is_embedded` from the playlist reference.
    pub async fn expand_playlist(&self, reference: &MediaReference) -> Result<Vec<MediaReference>> {
        let entries = with_retry(&self.retry, &reference.locator, || {
            self.extractor.playlist_entries(&reference.locator)
        })
        .await?;

        let expanded: Vec<MediaReference> = entries
            .iter()
            .map(|entry| normalize_locator(entry))
            .filter(|locator| is_watch_locator(locator))
            .map(|locator| MediaReference::new(locator, reference.is_embedded, self.resolution_cap))
            .collect();

        tracing::debug!(
            playlist = %reference.locator,
            entries = entries.len(),
            videos = expanded.len(),
            "Expanded playlist"
        );
        Ok(expanded)
    }

    /// Replace playlist references by their entries, keeping order
    ///
    /// A playlist that cannot be expanded is logged and dropped; duplicates
    /// introduced by expansion are removed.
    pub async fn expand_all(&self, references: Vec<MediaReference>) -> Vec<MediaReference> {
        let mut out: Vec<MediaReference> = Vec::with_capacity(references.len());
        for reference in references {
            let batch = if is_playlist(&reference.locator) {
                match self.expand_playlist(&reference).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(
                            locator = %reference.locator,
                            error = %e,
                            failure_kind = %e.failure_kind(),
                            "Skipping playlist"
                        );
                        Vec::new()
                    }
                }
            } else {
                vec![reference]
            };
            for item in batch {
                if !out.iter().any(|r| r.locator == item.locator) {
                    out.push(item);
                }
            }
        }
        out
    }

    /// Resolve one reference: probe, then optionally download
    ///
    /// # Arguments
    ///
    /// * `reference` - A discovered video reference
    /// * `download_to` - Directory for the video file; `None` probes only
    ///
    /// # Errors
    ///
    /// - `MediaError::Rejected` without calling the extractor if the locator
    ///   is not a single video
    /// - `MediaError::Unavailable` on the first terminal extraction failure
    /// - `MediaError::EmptyArtifact` if the download produced no bytes (the
    ///   empty file is removed)
    /// - the last transient error once the retry budget is spent
    pub async fn resolve(&self, reference: &MediaReference, download_to: Option<&Path>) -> Result<ResolvedMedia> {
        if !is_watch_locator(&reference.locator) {
            return Err(Error::Media(MediaError::Rejected {
                locator: reference.locator.clone(),
            }));
        }

        with_retry(&self.retry, &reference.locator, || self.resolve_once(reference, download_to)).await
    }

    async fn resolve_once(&self, reference: &MediaReference, download_to: Option<&Path>) -> Result<ResolvedMedia> {
        let info = self.extractor.probe(&reference.locator).await?;

        let path = match download_to {
            Some(dir) => Some(self.download(reference, &info, dir).await?),
            None => None,
        };

        let subtitles: Vec<SubtitleTrack> = info
            .subtitle_languages
            .iter()
            .map(|language| SubtitleTrack::new(language.clone(), info.id.clone()))
            .collect();

        let mut resolved = reference.clone();
        resolved.resolved_path = path.clone();
        resolved.subtitle_tracks = info.subtitle_languages.iter().cloned().collect();

        Ok(ResolvedMedia {
            reference: resolved,
            video_id: info.id,
            title: info.title,
            path,
            subtitles,
        })
    }

    async fn download(&self, reference: &MediaReference, info: &VideoInfo, dir: &Path) -> Result<PathBuf> {
        let expected = dir.join(format!("{}.mp4", info.id));
        if is_non_empty_file(&expected).await {
            tracing::debug!(locator = %reference.locator, path = %expected.display(), "Video already downloaded");
            return Ok(expected);
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = self
            .extractor
            .download(&reference.locator, dir, &format_selector(self.resolution_cap))
            .await?;

        if !is_non_empty_file(&path).await {
            if let Err(e) = tokio::fs::remove_file(&path).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove empty video file");
            }
            return Err(Error::Media(MediaError::EmptyArtifact { path }));
        }

        tracing::info!(locator = %reference.locator, path = %path.display(), "Video downloaded");
        Ok(path)
    }
}
