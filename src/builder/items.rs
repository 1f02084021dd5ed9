//! Per-kind item handling: articles, question threads, documents

use scraper::Selector;
use std::path::{Path, PathBuf};

use super::Harvester;
use super::manifest::{ItemManifest, MANIFEST_FILE};
use crate::bundle::{BundleOutcome, PageShell};
use crate::error::{ContentError, Error, Result};
use crate::localizer::{AssetMap, LinkPolicy, localize, localize_into};
use crate::media::discover_references;
use crate::site::ListingItem;
use crate::site::listing::absolute;
use crate::types::{MediaReference, NodeKind, Payload, TreeNode};
use crate::utils::{is_non_empty_file, sanitize_filename, sha256_hex, write_atomic};

/// Only documents of this type are kept
const PDF_CONTENT_TYPE: &str = "application/pdf";

impl Harvester {
    /// Article: one topic node holding the bundle leaf and a leaf per video
    pub(super) async fn harvest_article(&mut self, item: &ListingItem, item_dir: &Path) -> Option<TreeNode> {
        let bundle_path = bundle_path(item_dir, &item.title);
        let manifest_path = item_dir.join(MANIFEST_FILE);

        let (bundle, references) = if is_non_empty_file(&bundle_path).await {
            self.stats.cached_bundles += 1;
            tracing::debug!(source_id = %item.url, stage = "packaged", "Article bundle already on disk");
            let references = ItemManifest::load(&manifest_path)
                .await
                .map(|m| m.references(self.media.resolution_cap()))
                .unwrap_or_default();
            (Some(bundle_path), references)
        } else {
            match self.package_article(item, &bundle_path, &manifest_path).await {
                Ok((bundle, references)) => (bundle, references),
                Err(e) => {
                    self.skip(NodeKind::Topic, &item.url, "item_fetched", &e);
                    return None;
                }
            }
        };

        let mut node = TreeNode::topic(item.url.clone(), item.title.clone(), &self.defaults)
            .with_description(item.description.clone())
            .with_author(item.author.clone())
            .with_thumbnail_url(item.thumbnail_url.clone());
        self.materialize(&mut node).await;

        if let Some(path) = bundle {
            let mut leaf = TreeNode::leaf(Payload::Bundle { path }, item.url.clone(), item.title.clone(), &self.defaults)
                .with_author(item.author.clone())
                .with_thumbnail_url(item.thumbnail_url.clone());
            self.materialize(&mut leaf).await;
            if node.attach(leaf) {
                self.stats.attached.bump(NodeKind::Html5);
            }
        }

        if self.config.media.download_videos {
            let videos_dir = item_dir.join("videos");
            let references = self.media.expand_all(references).await;
            for reference in &references {
                if let Some(leaf) = self.harvest_video(reference, &videos_dir).await {
                    if node.attach(leaf) {
                        self.stats.attached.bump(NodeKind::Video);
                    }
                }
            }
        }

        if node.is_empty() {
            tracing::warn!(source_id = %item.url, stage = "skipped", "Article produced no content, omitting");
            self.stats.skipped.bump(NodeKind::Topic);
            return None;
        }
        Some(node)
    }

    /// Fetch, localize and bundle an article; returns the bundle (if written) and its media
    async fn package_article(
        &mut self,
        item: &ListingItem,
        bundle_path: &Path,
        manifest_path: &Path,
    ) -> Result<(Option<PathBuf>, Vec<MediaReference>)> {
        let page = self.fetcher.fetch_page(&item.url).await?;
        let fragment = {
            let selector = Selector::parse("article").map_err(|e| Error::Other(e.to_string()))?;
            let document = page.html();
            let article = document.select(&selector).next();
            article
                .map(|a| a.html())
                .ok_or_else(|| Error::missing("article", &item.url))?
        };
        tracing::debug!(source_id = %item.url, from_cache = page.from_cache, stage = "item_fetched", "Article fetched");

        let references = discover_references(&fragment, self.media.resolution_cap());
        let localized = localize(&fragment, &self.base, LinkPolicy::Unwrap);
        tracing::debug!(
            source_id = %item.url,
            assets = localized.assets.len(),
            videos = references.len(),
            stage = "localized",
            "Article localized"
        );

        let bundle = match self
            .bundles
            .write(&self.fetcher, bundle_path, &localized.html, PageShell::Article, &localized.assets)
            .await
        {
            Ok(outcome) => {
                log_packaged(&item.url, &outcome);
                Some(bundle_path.to_path_buf())
            }
            Err(e) => {
                self.skip(NodeKind::Html5, &item.url, "packaged", &e);
                None
            }
        };

        if bundle.is_some()
            && let Err(e) = ItemManifest::new(&item.url, &references).store(manifest_path).await
        {
            tracing::warn!(source_id = %item.url, error = %e, "Failed to write media manifest");
        }
        Ok((bundle, references))
    }

    async fn harvest_video(&mut self, reference: &MediaReference, videos_dir: &Path) -> Option<TreeNode> {
        match self.media.resolve(reference, Some(videos_dir)).await {
            Ok(media) => {
                let path = media.path?;
                tracing::debug!(source_id = %reference.locator, stage = "packaged", "Video resolved");
                Some(TreeNode::leaf(
                    Payload::Video {
                        path,
                        subtitles: media.subtitles,
                    },
                    reference.locator.clone(),
                    media.title,
                    &self.defaults,
                ))
            }
            Err(e) => {
                self.skip(NodeKind::Video, &reference.locator, "packaged", &e);
                None
            }
        }
    }

    /// Question thread: a single bundle leaf with every post of the thread
    pub(super) async fn harvest_question(&mut self, item: &ListingItem, item_dir: &Path) -> Option<TreeNode> {
        let bundle_path = bundle_path(item_dir, &item.title);

        if is_non_empty_file(&bundle_path).await {
            self.stats.cached_bundles += 1;
            tracing::debug!(source_id = %item.url, stage = "packaged", "Thread bundle already on disk");
        } else if let Err(e) = self.package_question(item, &bundle_path).await {
            self.skip(NodeKind::Html5, &item.url, "item_fetched", &e);
            return None;
        }

        Some(
            TreeNode::leaf(
                Payload::Bundle { path: bundle_path },
                item.url.clone(),
                item.title.clone(),
                &self.defaults,
            )
            .with_author(item.author.clone()),
        )
    }

    async fn package_question(&mut self, item: &ListingItem, bundle_path: &Path) -> Result<()> {
        let page = self.fetcher.fetch_page(&item.url).await?;
        let mut assets = AssetMap::new();
        let mut content = format!("<h2>{}</h2>", html_escape::encode_text(&item.title));
        let posts = {
            let selector = Selector::parse("article").map_err(|e| Error::Other(e.to_string()))?;
            let document = page.html();
            document.select(&selector).map(|post| post.html()).collect::<Vec<String>>()
        };
        if posts.is_empty() {
            return Err(Error::missing("article", &item.url));
        }
        tracing::debug!(source_id = %item.url, posts = posts.len(), stage = "item_fetched", "Thread fetched");

        for post in &posts {
            content.push_str(&localize_into(post, &self.base, LinkPolicy::Inert, &mut assets));
        }
        tracing::debug!(source_id = %item.url, assets = assets.len(), stage = "localized", "Thread localized");

        let outcome = self
            .bundles
            .write(&self.fetcher, bundle_path, &content, PageShell::Thread, &assets)
            .await?;
        log_packaged(&item.url, &outcome);
        Ok(())
    }

    /// Document: a leaf holding the downloaded PDF
    pub(super) async fn harvest_document(&mut self, item: &ListingItem, item_dir: &Path) -> Option<TreeNode> {
        let path = match existing_document(item_dir).await {
            Some(path) => {
                tracing::debug!(source_id = %item.url, path = %path.display(), stage = "packaged", "Document already on disk");
                path
            }
            None => match self.download_document(item, item_dir).await {
                Ok(path) => path,
                Err(e) => {
                    self.skip(NodeKind::Document, &item.url, "item_fetched", &e);
                    return None;
                }
            },
        };

        let mut node = TreeNode::leaf(Payload::Document { path }, item.url.clone(), item.title.clone(), &self.defaults)
            .with_description(item.description.clone())
            .with_author(item.author.clone())
            .with_thumbnail_url(item.thumbnail_url.clone());
        self.materialize(&mut node).await;
        Some(node)
    }

    async fn download_document(&mut self, item: &ListingItem, item_dir: &Path) -> Result<PathBuf> {
        // The download link is only valid within the session of a fresh detail page
        let page = self.fetcher.fetch_page_fresh(&item.url).await?;
        let download_url = {
            let selector = Selector::parse("aside a").map_err(|e| Error::Other(e.to_string()))?;
            let document = page.html();
            let anchor = document
                .select(&selector)
                .next()
                .ok_or_else(|| Error::missing("aside a", &item.url))?;
            anchor
                .value()
                .attr("href")
                .and_then(|href| absolute(href, &self.base))
                .ok_or_else(|| {
                    Error::Content(ContentError::MissingAttribute {
                        selector: "aside a".into(),
                        attribute: "href".into(),
                        url: item.url.clone(),
                    })
                })?
        };

        let attachment = self.fetcher.fetch_attachment(&download_url).await?;
        if !attachment.content_type.contains(PDF_CONTENT_TYPE) {
            return Err(Error::Content(ContentError::UnexpectedType {
                content_type: attachment.content_type,
                url: download_url,
            }));
        }
        if attachment.bytes.is_empty() {
            return Err(Error::Content(ContentError::Empty { url: download_url }));
        }

        let path = item_dir.join(document_filename(&attachment.filename));
        write_atomic(&path, &attachment.bytes).await?;
        tracing::info!(
            source_id = %item.url,
            path = %path.display(),
            bytes = attachment.bytes.len(),
            stage = "packaged",
            "Document saved"
        );
        Ok(path)
    }
}

/// `<item_dir>/<sha256(title)>.zip`
fn bundle_path(item_dir: &Path, title: &str) -> PathBuf {
    item_dir.join(format!("{}.zip", sha256_hex(title)))
}

/// Local file name of a saved document; always ends in `.pdf`
fn document_filename(attachment_name: &str) -> String {
    let name = sanitize_filename(attachment_name);
    if is_pdf(Path::new(&name)) {
        name
    } else {
        format!("{name}.pdf")
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// First non-empty PDF in a document item directory
///
/// Item directories are keyed by title, so an article or thread with the same
/// title may share the directory; only PDFs count as a saved document.
async fn existing_document(item_dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(item_dir).await.ok()?;
    let mut found: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if is_pdf(&path) && is_non_empty_file(&path).await {
            found.push(path);
        }
    }
    // read_dir order is unspecified
    found.sort();
    found.into_iter().next()
}

fn log_packaged(source_id: &str, outcome: &BundleOutcome) {
    match outcome {
        BundleOutcome::Cached => {
            tracing::debug!(source_id, stage = "packaged", "Bundle already on disk");
        }
        BundleOutcome::Written {
            assets_written,
            assets_skipped,
        } => {
            tracing::debug!(source_id, assets_written, assets_skipped, stage = "packaged", "Bundle packaged");
        }
    }
}
