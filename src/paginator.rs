//! Listing pagination
//!
//! A listing is walked as `base_url?page=1`, `base_url?page=2`, ... The page
//! count is read once from page 1. When it cannot be determined the sequence
//! is unbounded and the caller must stop it (see
//! [`PaginationConfig::max_unbounded_pages`](crate::config::PaginationConfig)).

use scraper::{Html, Selector};

use crate::error::Result;
use crate::fetcher::HttpFetcher;

/// Page-count indicator of the listing UI
const PAGE_JUMP_SELECTOR: &str = "li.ipsPagination_pageJump input";

/// Lazy cursor over the page URLs of one listing
///
/// `current_page` only increases. Iteration ends after `last_page`, or never
/// when `last_page` is unknown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingCursor {
    base_url: String,
    page_param: String,
    current_page: u32,
    last_page: Option<u32>,
}

impl ListingCursor {
    /// Create a cursor positioned at page 1
    pub fn new(base_url: impl Into<String>, page_param: impl Into<String>, last_page: Option<u32>) -> Self {
        Self {
            base_url: base_url.into(),
            page_param: page_param.into(),
            current_page: 1,
            last_page,
        }
    }

    /// Next page number to be produced
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Last page, if known
    pub fn last_page(&self) -> Option<u32> {
        self.last_page
    }

    /// URL of page `n`
    pub fn page_url(&self, n: u32) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", self.base_url, separator, self.page_param, n)
    }
}

impl Iterator for ListingCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(last) = self.last_page
            && self.current_page > last
        {
            return None;
        }
        let url = self.page_url(self.current_page);
        self.current_page = self.current_page.saturating_add(1);
        Some(url)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.last_page {
            Some(last) => {
                let remaining = last.saturating_sub(self.current_page.saturating_sub(1)) as usize;
                (remaining, Some(remaining))
            }
            None => (usize::MAX, None),
        }
    }
}

/// Page-count discovery for one listing
#[derive(Clone, Debug)]
pub struct Paginator {
    base_url: String,
    page_param: String,
    last_page: Option<u32>,
}

impl Paginator {
    /// Fetch page 1 of a listing and read its page count
    ///
    /// # Arguments
    ///
    /// * `fetcher` - HTTP fetcher (page 1 is usually served from cache afterwards)
    /// * `base_url` - Listing URL without a page parameter
    /// * `page_param` - Name of the page-number query parameter
    ///
    /// # Errors
    ///
    /// Returns error if page 1 cannot be fetched; the listing is then skipped.
    pub async fn discover(fetcher: &HttpFetcher, base_url: &str, page_param: &str) -> Result<Self> {
        let page = fetcher.fetch_page(base_url).await?;
        let last_page = read_last_page(&page.html());
        tracing::debug!(url = base_url, last_page = ?last_page, "Discovered listing page count");
        Ok(Self::with_last_page(base_url, page_param, last_page))
    }

    /// Build a paginator with a known (or unknown) page count
    pub fn with_last_page(base_url: &str, page_param: &str, last_page: Option<u32>) -> Self {
        Self {
            base_url: base_url.to_string(),
            page_param: page_param.to_string(),
            last_page,
        }
    }

    /// Last page, `None` when unknown
    pub fn last_page(&self) -> Option<u32> {
        self.last_page
    }

    /// Fresh cursor over the page URLs; each call restarts at page 1
    pub fn pages(&self) -> ListingCursor {
        ListingCursor::new(self.base_url.clone(), self.page_param.clone(), self.last_page)
    }
}

/// Read the page count from a listing document
///
/// - indicator absent: single page, `Some(1)`
/// - indicator with a positive integer `max`: `Some(max)`
/// - indicator with a missing, unparseable or zero `max`: `None` (unknown)
pub fn read_last_page(document: &Html) -> Option<u32> {
    let Ok(selector) = Selector::parse(PAGE_JUMP_SELECTOR) else {
        return Some(1);
    };
    match document.select(&selector).next() {
        None => Some(1),
        Some(input) => input
            .value()
            .attr("max")
            .and_then(|max| max.trim().parse::<u32>().ok())
            .filter(|max| *max > 0),
    }
}
