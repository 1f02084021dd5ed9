//! Resilient HTTP retrieval
//!
//! [`HttpFetcher`] wraps one `reqwest::Client` per run (with a cookie store so
//! session cookies carry over between requests) and adds:
//! - a bounded fixed-delay retry loop around every request ([`crate::retry`])
//! - an on-disk response cache ([`cache`]) with a cache-forever policy for
//!   the primary site and header-negotiated freshness for everything else
//!
//! Failures are returned as `Err` after the retry budget is spent. Callers
//! skip the resource; nothing here aborts a harvest.

pub mod cache;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::{Config, RetryConfig};
use crate::error::{Error, ProtocolError, Result};
use crate::retry::with_retry;
use crate::utils::filename_from_content_disposition;
use cache::{CacheDirectives, CachePolicy, CachedMeta, CachedResponse, ResponseCache};

/// A fetched HTML page
///
/// Holds the raw text; parsing is done on demand so no parsed document is
/// kept alive across await points.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    /// Requested URL
    pub url: String,
    /// Response body decoded as UTF-8 (lossy)
    pub body: String,
    /// True if served from the response cache
    pub from_cache: bool,
}

impl FetchedPage {
    /// Parse the page into a queryable document
    pub fn html(&self) -> scraper::Html {
        scraper::Html::parse_document(&self.body)
    }
}

/// A downloaded attachment (document file)
#[derive(Clone, Debug)]
pub struct Attachment {
    /// Response content type (empty if absent)
    pub content_type: String,
    /// File name from Content-Disposition, or the URL basename
    pub filename: String,
    /// File content
    pub bytes: Vec<u8>,
}

/// Source of asset bytes for bundle writing
///
/// Implemented by [`HttpFetcher`]; tests substitute in-memory sources.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the bytes of one remote asset
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>>;
}

/// Outcome of a single HTTP exchange
enum Exchange {
    Body { headers: HeaderMap, bytes: Vec<u8> },
    NotModified { headers: HeaderMap },
}

/// HTTP fetcher with retry and response caching
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    cache: Option<ResponseCache>,
    primary: Url,
    retry: RetryConfig,
    page_timeout: Duration,
    asset_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from the run configuration
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| Error::Fatal(format!("failed to create HTTP client: {e}")))?;

        let cache = config
            .http
            .cache_enabled
            .then(|| ResponseCache::new(config.http.cache_dir.clone()));

        Ok(Self {
            client,
            cache,
            primary: config.base_url()?,
            retry: config.http.retry.clone(),
            page_timeout: config.http.page_timeout,
            asset_timeout: config.http.asset_timeout,
        })
    }

    /// Policy for `url`: forever on the primary site, negotiated elsewhere
    pub fn policy_for(&self, url: &str) -> CachePolicy {
        match Url::parse(url) {
            Ok(parsed) if parsed.origin() == self.primary.origin() => CachePolicy::Forever,
            _ => CachePolicy::Negotiated,
        }
    }

    /// Fetch an HTML page through the cache
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let (bytes, from_cache) = self.get_cached(url, self.page_timeout).await?;
        Ok(FetchedPage {
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            from_cache,
        })
    }

    /// Fetch an HTML page without consulting or filling the cache
    ///
    /// Used where the request must establish session cookies for a follow-up
    /// download, so a cached copy would not do.
    pub async fn fetch_page_fresh(&self, url: &str) -> Result<FetchedPage> {
        let (_, bytes) = self.get_uncached(url, self.page_timeout).await?;
        Ok(FetchedPage {
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            from_cache: false,
        })
    }

    /// Fetch raw bytes (images, thumbnails, support files) through the cache
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let (bytes, _) = self.get_cached(url, self.asset_timeout).await?;
        Ok(bytes)
    }

    /// Download an attachment, keeping its content type and file name
    pub async fn fetch_attachment(&self, url: &str) -> Result<Attachment> {
        let (headers, bytes) = self.get_uncached(url, self.page_timeout).await?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let disposition = headers.get(CONTENT_DISPOSITION).and_then(|v| v.to_str().ok());
        Ok(Attachment {
            content_type,
            filename: filename_from_content_disposition(disposition, url),
            bytes,
        })
    }

    async fn get_uncached(&self, url: &str, timeout: Duration) -> Result<(HeaderMap, Vec<u8>)> {
        match self.exchange_with_retry(url, timeout, None).await? {
            Exchange::Body { headers, bytes } => Ok((headers, bytes)),
            // Only conditional requests can produce a 304
            Exchange::NotModified { .. } => Err(Error::Protocol(ProtocolError::Status {
                status: StatusCode::NOT_MODIFIED.as_u16(),
                url: url.to_string(),
            })),
        }
    }

    async fn get_cached(&self, url: &str, timeout: Duration) -> Result<(Vec<u8>, bool)> {
        let Some(cache) = &self.cache else {
            let (_, bytes) = self.get_uncached(url, timeout).await?;
            return Ok((bytes, false));
        };

        let policy = self.policy_for(url);
        let stored = cache.lookup(url).await;
        let mut revalidate: Option<CachedResponse> = None;

        if let Some(hit) = stored {
            match policy {
                CachePolicy::Forever => {
                    tracing::debug!(url, "Cache hit (forever)");
                    return Ok((hit.body, true));
                }
                CachePolicy::Negotiated if hit.meta.is_fresh(chrono::Utc::now()) => {
                    tracing::debug!(url, "Cache hit (fresh)");
                    return Ok((hit.body, true));
                }
                CachePolicy::Negotiated if hit.meta.can_revalidate() => revalidate = Some(hit),
                CachePolicy::Negotiated => {}
            }
        }

        let validators = revalidate.as_ref().map(|hit| &hit.meta);
        match self.exchange_with_retry(url, timeout, validators).await? {
            Exchange::NotModified { headers } => match revalidate {
                Some(hit) => {
                    tracing::debug!(url, "Cache revalidated (304)");
                    Ok((cache.refresh(hit, &headers).await, true))
                }
                None => Err(Error::Protocol(ProtocolError::Status {
                    status: StatusCode::NOT_MODIFIED.as_u16(),
                    url: url.to_string(),
                })),
            },
            Exchange::Body { headers, bytes } => {
                if CacheDirectives::from_headers(&headers).storable(policy) {
                    cache
                        .store(&CachedMeta::from_response(url, &headers), &bytes)
                        .await;
                }
                Ok((bytes, false))
            }
        }
    }

    async fn exchange_with_retry(
        &self,
        url: &str,
        timeout: Duration,
        validators: Option<&CachedMeta>,
    ) -> Result<Exchange> {
        let mut attempt = 0u32;
        with_retry(&self.retry, url, || {
            attempt += 1;
            self.exchange(url, timeout, validators, attempt)
        })
        .await
    }

    async fn exchange(
        &self,
        url: &str,
        timeout: Duration,
        validators: Option<&CachedMeta>,
        attempt: u32,
    ) -> Result<Exchange> {
        tracing::debug!(
            url,
            attempt,
            max_attempts = self.retry.max_attempts,
            conditional = validators.is_some(),
            "GET"
        );

        let mut headers = HeaderMap::new();
        if let Some(meta) = validators {
            if let Some(etag) = &meta.etag
                && let Ok(value) = HeaderValue::from_str(etag)
            {
                headers.insert(IF_NONE_MATCH, value);
            }
            if let Some(last_modified) = &meta.last_modified
                && let Ok(value) = HeaderValue::from_str(last_modified)
            {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, url))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED && validators.is_some() {
            return Ok(Exchange::NotModified {
                headers: response.headers().clone(),
            });
        }
        if !status.is_success() {
            return Err(Error::Protocol(ProtocolError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }));
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(e, url))?
            .to_vec();
        Ok(Exchange::Body { headers, bytes })
    }
}

#[async_trait]
impl AssetSource for HttpFetcher {
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(url).await
    }
}

fn classify_transport_error(e: reqwest::Error, url: &str) -> Error {
    if e.is_redirect() {
        Error::Protocol(ProtocolError::TooManyRedirects {
            url: url.to_string(),
        })
    } else {
        Error::Network(e)
    }
}
