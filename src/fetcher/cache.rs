//! On-disk response cache
//!
//! One JSON metadata file and one body file per URL, both named by the
//! SHA-256 of the URL. The cache is advisory: read and write failures are
//! logged and treated as misses.

use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::{sha256_hex, write_atomic};

/// Caching policy applied to a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// Any stored response is served without touching the network
    Forever,
    /// Freshness and revalidation follow the response headers
    Negotiated,
}

/// Cache-relevant response directives
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    /// `Cache-Control: no-store` was present
    pub no_store: bool,
    /// `Cache-Control: max-age` in seconds
    pub max_age: Option<u64>,
    /// `ETag` validator
    pub etag: Option<String>,
    /// `Last-Modified` validator
    pub last_modified: Option<String>,
}

impl CacheDirectives {
    /// Read directives from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut directives = Self::default();

        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else { continue };
            for part in value.split(',') {
                let part = part.trim().to_ascii_lowercase();
                if part == "no-store" {
                    directives.no_store = true;
                } else if let Some(age) = part.strip_prefix("max-age=") {
                    directives.max_age = age.trim_matches('"').parse().ok();
                }
            }
        }

        directives.etag = header_string(headers, ETAG.as_str());
        directives.last_modified = header_string(headers, LAST_MODIFIED.as_str());
        directives
    }

    /// Returns true if a response with these directives is worth storing under `policy`
    pub fn storable(&self, policy: CachePolicy) -> bool {
        match policy {
            CachePolicy::Forever => true,
            CachePolicy::Negotiated => {
                !self.no_store
                    && (self.max_age.is_some() || self.etag.is_some() || self.last_modified.is_some())
            }
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Metadata stored next to a cached body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMeta {
    /// Requested URL
    pub url: String,
    /// When the response was stored or last revalidated
    pub stored_at: DateTime<Utc>,
    /// Freshness lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
    /// `ETag` validator
    #[serde(default)]
    pub etag: Option<String>,
    /// `Last-Modified` validator
    #[serde(default)]
    pub last_modified: Option<String>,
    /// Response content type
    #[serde(default)]
    pub content_type: Option<String>,
}

impl CachedMeta {
    /// Build metadata for a response received now
    pub fn from_response(url: &str, headers: &HeaderMap) -> Self {
        let directives = CacheDirectives::from_headers(headers);
        Self {
            url: url.to_string(),
            stored_at: Utc::now(),
            max_age: directives.max_age,
            etag: directives.etag,
            last_modified: directives.last_modified,
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
        }
    }

    /// Returns true while the entry is within its `max-age`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.max_age {
            Some(age) => {
                let age = i64::try_from(age).unwrap_or(i64::MAX);
                now.signed_duration_since(self.stored_at).num_seconds() < age
            }
            None => false,
        }
    }

    /// Returns true if the entry carries a validator for a conditional request
    pub fn can_revalidate(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// A cached response
#[derive(Clone, Debug)]
pub struct CachedResponse {
    /// Stored metadata
    pub meta: CachedMeta,
    /// Stored body
    pub body: Vec<u8>,
}

/// Response cache rooted at a directory
#[derive(Clone, Debug)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a cache rooted at `dir`; the directory is created lazily
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = sha256_hex(url);
        (
            self.dir.join(format!("{key}.json")),
            self.dir.join(format!("{key}.body")),
        )
    }

    /// Look up a stored response
    pub async fn lookup(&self, url: &str) -> Option<CachedResponse> {
        let (meta_path, body_path) = self.paths(url);
        let raw = tokio::fs::read(&meta_path).await.ok()?;
        let meta: CachedMeta = match serde_json::from_slice(&raw) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(url, error = %e, "Ignoring unreadable cache metadata");
                return None;
            }
        };
        // Hash collisions are not expected; a mismatch means a stale foreign entry
        if meta.url != url {
            return None;
        }
        match tokio::fs::read(&body_path).await {
            Ok(body) => Some(CachedResponse { meta, body }),
            Err(e) => {
                tracing::warn!(url, error = %e, "Cache metadata without body");
                None
            }
        }
    }

    /// Store a response; failures are logged and ignored
    pub async fn store(&self, meta: &CachedMeta, body: &[u8]) {
        let (meta_path, body_path) = self.paths(&meta.url);
        let json = match serde_json::to_vec_pretty(meta) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(url = %meta.url, error = %e, "Failed to encode cache metadata");
                return;
            }
        };
        // Body first: metadata without a body is treated as a miss
        if let Err(e) = write_atomic(&body_path, body).await {
            tracing::warn!(url = %meta.url, error = %e, "Failed to write cache body");
            return;
        }
        if let Err(e) = write_atomic(&meta_path, &json).await {
            tracing::warn!(url = %meta.url, error = %e, "Failed to write cache metadata");
        }
    }

    /// Refresh an entry after a `304 Not Modified`
    pub async fn refresh(&self, mut cached: CachedResponse, headers: &HeaderMap) -> Vec<u8> {
        let directives = CacheDirectives::from_headers(headers);
        cached.meta.stored_at = Utc::now();
        if directives.max_age.is_some() {
            cached.meta.max_age = directives.max_age;
        }
        if directives.etag.is_some() {
            cached.meta.etag = directives.etag;
        }
        if directives.last_modified.is_some() {
            cached.meta.last_modified = directives.last_modified;
        }
        self.store(&cached.meta, &cached.body).await;
        cached.body
    }
}
