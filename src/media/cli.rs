//! CLI-based extractor using the external yt-dlp binary

use super::traits::{MediaExtractor, VideoInfo};
use crate::error::{Error, MediaError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Socket timeout handed to yt-dlp, in seconds
const SOCKET_TIMEOUT_SECS: &str = "30";

/// Stderr fragments meaning the video will never be extractable
const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "has been removed",
    "not available in your country",
    "not made this video available",
    "members-only",
    "sign in to confirm your age",
    "this video is unavailable",
    "unsupported url",
    "incomplete youtube id",
];

/// Stderr fragments meaning the failure is transport-level
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "temporary failure in name resolution",
    "network is unreachable",
    "http error 5",
    "http error 429",
    "unable to download webpage",
    "incompleteread",
];

/// CLI-based extractor using the external yt-dlp binary
///
/// Each call spawns one yt-dlp process and waits for it to exit. Failures are
/// classified from stderr into terminal (`MediaError::Unavailable`) and
/// retryable (`MediaError::Transient`) errors.
///
/// # Examples
///
/// ```no_run
/// use kb_harvest::media::{MediaExtractor, YtDlpExtractor};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let extractor = YtDlpExtractor::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let extractor = YtDlpExtractor::from_path()
///     .expect("yt-dlp not found in PATH");
///
/// let info = extractor.probe("https://www.youtube.com/watch?v=abc").await?;
/// # Ok(())
/// # }
/// ```
pub struct YtDlpExtractor {
    binary_path: PathBuf,
}

impl YtDlpExtractor {
    /// Create a new CLI extractor with an explicit binary path
    ///
    /// # Arguments
    ///
    /// * `binary_path` - Path to the yt-dlp binary
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// # Returns
    ///
    /// `Some(YtDlpExtractor)` if the binary is found, `None` otherwise.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    async fn run(&self, locator: &str, args: &[&str]) -> crate::Result<Output> {
        tracing::debug!(binary = %self.binary_path.display(), locator, ?args, "Running yt-dlp");

        let output = Command::new(&self.binary_path)
            .args(["--socket-timeout", SOCKET_TIMEOUT_SECS, "--no-warnings"])
            .args(args)
            .arg(locator)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(classify_failure(locator, &String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// Subset of the `-J` metadata document we read
#[derive(Debug, Deserialize)]
struct ProbeDocument {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitles: Option<BTreeMap<String, serde_json::Value>>,
}

/// Parse yt-dlp `-J` output into [`VideoInfo`]
pub(crate) fn parse_probe(stdout: &[u8]) -> crate::Result<VideoInfo> {
    let doc: ProbeDocument = serde_json::from_slice(stdout)?;
    let subtitle_languages = doc
        .subtitles
        .unwrap_or_default()
        .into_keys()
        // live_chat is a replay of the chat, not a subtitle track
        .filter(|lang| lang != "live_chat")
        .collect();

    Ok(VideoInfo {
        id: doc.id,
        title: doc.title,
        subtitle_languages,
    })
}

/// Turn a failed run's stderr into a media error
///
/// Anything not recognized as transport-level is terminal so an unknown
/// extraction failure is attempted only once.
pub(crate) fn classify_failure(locator: &str, stderr: &str) -> Error {
    let reason = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp exited with failure")
        .to_string();
    let lowered = stderr.to_lowercase();

    let is_unavailable = UNAVAILABLE_MARKERS.iter().any(|m| lowered.contains(m));
    let is_transient = TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m));

    let media = if is_transient && !is_unavailable {
        MediaError::Transient {
            locator: locator.to_string(),
            reason,
        }
    } else {
        MediaError::Unavailable {
            locator: locator.to_string(),
            reason,
        }
    };
    Error::Media(media)
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn probe(&self, locator: &str) -> crate::Result<VideoInfo> {
        let output = self
            .run(locator, &["--dump-single-json", "--no-playlist", "--skip-download"])
            .await?;
        parse_probe(&output.stdout)
    }

    async fn download(&self, locator: &str, dir: &Path, format: &str) -> crate::Result<PathBuf> {
        let template = dir.join("%(id)s.%(ext)s");
        let template = template.to_string_lossy();
        let output = self
            .run(
                locator,
                &[
                    "--no-playlist",
                    "--no-progress",
                    "-f",
                    format,
                    "--merge-output-format",
                    "mp4",
                    "-o",
                    &template,
                    "--print",
                    "after_move:filepath",
                ],
            )
            .await?;

        let reported = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .next_back()
            .map(PathBuf::from)
            .ok_or_else(|| {
                Error::ExternalTool(format!("yt-dlp did not report an output file for {locator}"))
            })?;

        Ok(if reported.is_absolute() {
            reported
        } else {
            dir.join(reported)
        })
    }

    async fn playlist_entries(&self, locator: &str) -> crate::Result<Vec<String>> {
        let output = self
            .run(locator, &["--flat-playlist", "--skip-download", "--print", "webpage_url"])
            .await?;

        let mut entries: Vec<String> = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let line = line.trim();
            if !line.is_empty() && !entries.iter().any(|e| e == line) {
                entries.push(line.to_string());
            }
        }
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}
