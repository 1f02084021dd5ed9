//! Error types for kb-harvest
//!
//! This module provides the error taxonomy for the harvester:
//! - Domain-specific error types (Protocol, Content, Media)
//! - A coarse [`FailureKind`] classification used in structured skip logs
//! - Context information (URL, selector, locator, path)
//!
//! Almost every error is recoverable at the node level: the builder logs it and
//! omits the affected node. Only [`FailureKind::Fatal`] errors abort a run.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kb-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kb-harvest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "site.base_url")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network-layer error (timeout, connection reset, unreadable body)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Protocol-layer error (HTTP status, redirect loop)
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Expected markup is absent or the response has the wrong shape
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// Media resolution error
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// Bundle archive error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, disabled feature)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Unrecoverable setup failure (output directory, support assets)
    #[error("fatal: {0}")]
    Fatal(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Protocol-layer failures reported by the HTTP transport
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        /// The HTTP status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// Redirect chain exceeded the client limit
    #[error("too many redirects for {url}")]
    TooManyRedirects {
        /// The requested URL
        url: String,
    },
}

/// Content-shape failures: the page was fetched but is not what we expected
#[derive(Debug, Error)]
pub enum ContentError {
    /// A required element is missing from the page
    #[error("no element matching `{selector}` in {url}")]
    MissingElement {
        /// The CSS selector that matched nothing
        selector: String,
        /// The page URL
        url: String,
    },

    /// A required attribute is missing or empty
    #[error("element `{selector}` in {url} has no `{attribute}`")]
    MissingAttribute {
        /// The CSS selector of the element
        selector: String,
        /// The missing attribute name
        attribute: String,
        /// The page URL
        url: String,
    },

    /// The response is not of an accepted type
    #[error("unexpected content type `{content_type}` for {url}")]
    UnexpectedType {
        /// The content type that was received
        content_type: String,
        /// The requested URL
        url: String,
    },

    /// The page parsed but yielded nothing usable
    #[error("no usable content in {url}")]
    Empty {
        /// The page URL
        url: String,
    },
}

/// Media resolution failures
#[derive(Debug, Error)]
pub enum MediaError {
    /// Locator does not name a single watchable video
    #[error("not a single-video locator: {locator}")]
    Rejected {
        /// The rejected locator
        locator: String,
    },

    /// Video is removed, private, region-locked or otherwise unextractable
    #[error("media unavailable for {locator}: {reason}")]
    Unavailable {
        /// The video locator
        locator: String,
        /// Extractor-provided reason
        reason: String,
    },

    /// Transient I/O failure while probing or downloading
    #[error("transient media failure for {locator}: {reason}")]
    Transient {
        /// The video locator
        locator: String,
        /// Extractor-provided reason
        reason: String,
    },

    /// The downloaded artifact has zero length
    #[error("downloaded artifact is empty: {path}")]
    EmptyArtifact {
        /// Path of the removed empty file
        path: PathBuf,
    },
}

/// Coarse failure classification used when a node is skipped
///
/// Mirrors the harvest error taxonomy: transient and protocol failures have
/// already exhausted their retry budget by the time they are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeouts, resets, connection errors
    TransientNetwork,
    /// HTTP error status, redirect loops
    Protocol,
    /// Expected markup absent, wrong content type, empty content
    ContentShape,
    /// Video removed, region-locked, or extraction failure
    MediaUnavailable,
    /// Aborts the whole run
    Fatal,
}

impl FailureKind {
    /// Machine-readable name for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientNetwork => "transient_network",
            FailureKind::Protocol => "protocol",
            FailureKind::ContentShape => "content_shape",
            FailureKind::MediaUnavailable => "media_unavailable",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for structured logging
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Network(_) => FailureKind::TransientNetwork,
            Error::Io(e) if crate::retry::is_transient_io(e) => FailureKind::TransientNetwork,
            Error::Protocol(_) => FailureKind::Protocol,
            Error::Content(_) | Error::InvalidUrl(_) => FailureKind::ContentShape,
            Error::Media(_) | Error::ExternalTool(_) | Error::NotSupported(_) => {
                FailureKind::MediaUnavailable
            }
            Error::Fatal(_) | Error::Config { .. } => FailureKind::Fatal,
            // Local write failures surface as content failures of the node being built
            Error::Io(_) | Error::Archive(_) | Error::Serialization(_) | Error::Other(_) => {
                FailureKind::ContentShape
            }
        }
    }

    /// Shorthand for a missing-element content error
    pub fn missing(selector: impl Into<String>, url: impl Into<String>) -> Self {
        Error::Content(ContentError::MissingElement {
            selector: selector.into(),
            url: url.into(),
        })
    }
}
