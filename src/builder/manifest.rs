//! Per-article media manifest
//!
//! Written next to an article bundle so a rerun can rebuild the article's
//! video children from disk instead of refetching the detail page.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::types::MediaReference;
use crate::utils::write_atomic;

/// File name of the manifest inside an item directory
pub const MANIFEST_FILE: &str = "media.json";

/// One media reference as recorded on disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized locator
    pub locator: String,
    /// Found in an embed rather than a link
    #[serde(default)]
    pub is_embedded: bool,
}

/// Media references discovered in one article body
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemManifest {
    /// Detail-page URL the references were found in
    pub source_id: String,
    /// References in discovery order
    #[serde(default)]
    pub media: Vec<ManifestEntry>,
}

impl ItemManifest {
    /// Record the references of `source_id`
    pub fn new(source_id: impl Into<String>, references: &[MediaReference]) -> Self {
        Self {
            source_id: source_id.into(),
            media: references
                .iter()
                .map(|r| ManifestEntry {
                    locator: r.locator.clone(),
                    is_embedded: r.is_embedded,
                })
                .collect(),
        }
    }

    /// Read a manifest; a missing or unreadable file yields `None`
    pub async fn load(path: &Path) -> Option<Self> {
        let raw = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable media manifest");
                None
            }
        }
    }

    /// Write the manifest atomically
    pub async fn store(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json).await?;
        Ok(())
    }

    /// Rebuild unresolved references with the given resolution cap
    pub fn references(&self, resolution_cap: u32) -> Vec<MediaReference> {
        self.media
            .iter()
            .map(|entry| MediaReference::new(entry.locator.clone(), entry.is_embedded, resolution_cap))
            .collect()
    }
}
