//! Asset localization
//!
//! Turns a detail-page fragment into bundle-ready HTML: interactive markup is
//! stripped ([`clean`]) and every remote `<img>` is rewritten to a
//! bundle-local `images/<name>`. The mapping from remote URL to local name is
//! recorded in an [`AssetMap`] for the bundle writer.

mod clean;

pub use clean::{LinkPolicy, clean};

use dom_query::Document;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

use crate::utils::{name_from_url, sha256_hex};

/// Directory inside a bundle holding localized images
pub const IMAGES_DIR: &str = "images";

/// Mapping from remote asset URL to bundle-local file name
///
/// A URL maps to exactly one local name and a local name is never assigned
/// to two URLs. `data:` URIs are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetMap {
    by_url: BTreeMap<String, String>,
    used: BTreeSet<String>,
}

impl AssetMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a remote URL to its local name, assigning one if needed
    ///
    /// Returns `None` for `data:` URIs. A URL seen before keeps its name. A
    /// basename already taken by another URL is prefixed with 8 hex
    /// characters of the URL hash.
    pub fn insert(&mut self, url: &str) -> Option<String> {
        if is_data_uri(url) {
            return None;
        }
        if let Some(name) = self.by_url.get(url) {
            return Some(name.clone());
        }

        let hash = sha256_hex(url);
        let base = name_from_url(url).unwrap_or_else(|| hash[..16].to_string());
        let mut name = base.clone();
        let mut salt = 0u32;
        while self.used.contains(&name) {
            name = if salt == 0 {
                format!("{}_{}", &hash[..8], base)
            } else {
                format!("{}_{}_{}", &hash[..8], salt, base)
            };
            salt += 1;
        }

        self.used.insert(name.clone());
        self.by_url.insert(url.to_string(), name.clone());
        Some(name)
    }

    /// Local name previously assigned to `url`
    pub fn get(&self, url: &str) -> Option<&str> {
        self.by_url.get(url).map(String::as_str)
    }

    /// Number of mapped assets
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Returns true if no asset is mapped
    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Iterate over `(remote_url, local_name)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_url.iter().map(|(u, n)| (u.as_str(), n.as_str()))
    }
}

/// Result of localizing one fragment
#[derive(Clone, Debug)]
pub struct Localized {
    /// Cleaned and rewritten HTML
    pub html: String,
    /// Assets the HTML now references
    pub assets: AssetMap,
}

/// Clean and localize a fragment with its own asset map
///
/// # Arguments
///
/// * `fragment` - Detail-page HTML (an `<article>` element or its content)
/// * `base` - Site base URL used to resolve relative references
/// * `policy` - Link handling for this item kind
pub fn localize(fragment: &str, base: &Url, policy: LinkPolicy) -> Localized {
    let mut assets = AssetMap::new();
    let html = localize_into(fragment, base, policy, &mut assets);
    Localized { html, assets }
}

/// Clean and localize a fragment into a shared asset map
///
/// Used when several fragments end up in one bundle (question threads), so a
/// picture repeated across posts is stored once.
pub fn localize_into(fragment: &str, base: &Url, policy: LinkPolicy, assets: &mut AssetMap) -> String {
    let document = Document::from(fragment);
    clean(&document, policy);

    for img in document.select("img").iter() {
        let Some(src) = img.attr("src") else { continue };
        let Some(remote) = resolve_asset_url(&src, base) else {
            continue;
        };
        if let Some(name) = assets.insert(&remote) {
            img.set_attr("src", &format!("{IMAGES_DIR}/{name}"));
            img.remove_attr("srcset");
        }
    }

    document.select("body").inner_html().to_string()
}

/// Resolve an image reference to an absolute http(s) URL
///
/// Returns `None` for empty references, `data:` URIs and anything that does
/// not resolve to http or https.
pub fn resolve_asset_url(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || is_data_uri(src) {
        return None;
    }
    let resolved = base.join(src).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn is_data_uri(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}
