//! Content-tree construction
//!
//! [`Harvester`] walks the fixed site hierarchy (categories, topics, listing
//! pages, items) and composes the harvested nodes into a [`ChannelTree`].
//! Every node moves through the stages
//! `discovered → listing → item_fetched → localized → packaged → attached`;
//! any failure moves it to `skipped` instead, which omits the node and never
//! aborts the run. Each transition is logged with a `stage` field.
//!
//! The walk is strictly sequential. Artifact paths derive from titles:
//! `<data_dir>/<sha256(topic)>/<sha256(item)>/`, so a rerun finds completed
//! bundles, documents and videos where it left them and skips them.

mod items;
mod manifest;

pub use manifest::{ItemManifest, MANIFEST_FILE, ManifestEntry};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

use crate::bundle::{BundleWriter, SupportAssets};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::HttpFetcher;
use crate::media::MediaResolver;
use crate::paginator::Paginator;
use crate::site::{self, Category, TopicLink, parse_listing};
use crate::types::{ChannelTree, HarvestStats, ListingKind, NodeDefaults, NodeKind, TreeNode};
use crate::utils::{extension_from_url, is_non_empty_file, sha256_hex, truncate_chars, write_atomic};

/// Orchestrates one harvest run
#[derive(Debug)]
pub struct Harvester {
    config: Arc<Config>,
    base: Url,
    fetcher: HttpFetcher,
    bundles: BundleWriter,
    media: MediaResolver,
    defaults: NodeDefaults,
    stats: HarvestStats,
}

impl Harvester {
    /// Prepare a run: output directory, HTTP client, support assets, extractor
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if the data directory cannot be created or the
    /// support assets cannot be fetched.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let media = MediaResolver::from_config(&config.media);
        Self::with_media(config, media).await
    }

    /// Prepare a run with an explicit media resolver
    pub async fn with_media(config: Arc<Config>, media: MediaResolver) -> Result<Self> {
        let data_dir = &config.output.data_dir;
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| Error::Fatal(format!("cannot create data directory {}: {e}", data_dir.display())))?;

        let fetcher = HttpFetcher::new(&config)?;
        let support = SupportAssets::fetch(&fetcher, &config.support, data_dir).await?;

        let defaults = NodeDefaults {
            language: config.site.language.clone(),
            author: config.site.author.clone(),
            license: config.site.license.clone(),
        };

        Ok(Self {
            base: config.base_url()?,
            fetcher,
            bundles: BundleWriter::new(support),
            media,
            defaults,
            stats: HarvestStats::default(),
            config,
        })
    }

    /// Counters of the run so far
    pub fn stats(&self) -> &HarvestStats {
        &self.stats
    }

    /// Harvest the whole site into a tree
    ///
    /// An unreachable home page yields a tree without categories; the run
    /// itself only fails on setup errors, which [`Harvester::new`] reports.
    pub async fn run(&mut self) -> Result<ChannelTree> {
        let labels = &self.config.site;
        let mut tree = ChannelTree {
            source_domain: labels.base_url.clone(),
            source_id: labels.source_id.clone(),
            title: labels.title.clone(),
            language: labels.language.clone(),
            description: truncate_chars(&labels.description, labels.description_max_chars),
            thumbnail: None,
            author: labels.author.clone(),
            license: labels.license.clone(),
            children: Vec::new(),
        };

        let categories = match site::discover_categories(&self.fetcher, &self.base, &labels.categories).await {
            Ok(categories) => categories,
            Err(e) => {
                tracing::error!(
                    url = %self.base,
                    error = %e,
                    failure_kind = %e.failure_kind(),
                    "Home page unavailable, no category can be harvested"
                );
                Vec::new()
            }
        };

        for category in &categories {
            let span = tracing::info_span!("category", name = %category.config.name);
            if let Some(node) = self.harvest_category(category).instrument(span).await {
                if tree.attach(node) {
                    self.stats.attached.bump(NodeKind::Topic);
                }
            }
        }

        if let Some(url) = self.config.site.thumbnail_url.clone() {
            tree.thumbnail = self.materialize_url(&url).await;
        }

        tracing::info!(
            categories = tree.children.len(),
            nodes = tree.children.iter().map(TreeNode::count).sum::<usize>(),
            pages = self.stats.pages,
            cached_bundles = self.stats.cached_bundles,
            attached_html5 = self.stats.attached.html5,
            attached_documents = self.stats.attached.document,
            attached_videos = self.stats.attached.video,
            skipped = self.stats.skipped.total(),
            "Harvest finished"
        );
        Ok(tree)
    }

    async fn harvest_category(&mut self, category: &Category) -> Option<TreeNode> {
        let anchor = &category.config.anchor_text;
        let mut node = TreeNode::topic(anchor.clone(), anchor.clone(), &self.defaults);

        for topic in &category.topics {
            let span = tracing::info_span!("topic", title = %topic.title);
            if let Some(child) = self.harvest_topic(category.config.kind, topic).instrument(span).await {
                if node.attach(child) {
                    self.stats.attached.bump(NodeKind::Topic);
                }
            }
        }

        if node.is_empty() {
            tracing::warn!(source_id = %node.source_id, stage = "skipped", "Category has no content, omitting");
            self.stats.skipped.bump(NodeKind::Topic);
            return None;
        }
        Some(node)
    }

    async fn harvest_topic(&mut self, kind: ListingKind, topic: &TopicLink) -> Option<TreeNode> {
        tracing::info!(source_id = %topic.url, title = %topic.title, stage = "discovered", "Topic");
        let page_param = self.config.pagination.page_param.clone();

        let paginator = match Paginator::discover(&self.fetcher, &topic.url, &page_param).await {
            Ok(paginator) => paginator,
            Err(e) => {
                self.skip(NodeKind::Topic, &topic.url, "listing", &e);
                return None;
            }
        };

        let topic_dir = self.config.output.data_dir.join(sha256_hex(&topic.title));
        let mut node = TreeNode::topic(topic.url.clone(), topic.title.clone(), &self.defaults);
        let last_page = paginator.last_page();
        let max_unbounded = self.config.pagination.max_unbounded_pages;

        for (page_number, page_url) in (1u32..).zip(paginator.pages()) {
            if last_page.is_none() && page_number > max_unbounded {
                tracing::warn!(
                    source_id = %topic.url,
                    max_pages = max_unbounded,
                    "Unbounded listing reached the page limit, stopping"
                );
                break;
            }

            let page = match self.fetcher.fetch_page(&page_url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        url = %page_url,
                        error = %e,
                        failure_kind = %e.failure_kind(),
                        stage = "listing",
                        "Listing page unavailable"
                    );
                    // Without a page count a failed page is the end of the listing
                    if last_page.is_none() {
                        break;
                    }
                    continue;
                }
            };
            self.stats.pages += 1;

            let items = parse_listing(kind, &page.html(), &self.base);
            tracing::info!(
                url = %page_url,
                page = page_number,
                last_page = ?last_page,
                items = items.len(),
                stage = "listing",
                "Listing page"
            );
            if items.is_empty() && last_page.is_none() {
                break;
            }

            for item in &items {
                let item_dir = topic_dir.join(sha256_hex(&item.title));
                let child = match kind {
                    ListingKind::Article => self.harvest_article(item, &item_dir).await,
                    ListingKind::Question => self.harvest_question(item, &item_dir).await,
                    ListingKind::Document => self.harvest_document(item, &item_dir).await,
                };
                if let Some(child) = child {
                    tracing::debug!(source_id = %child.source_id, kind = %child.kind, stage = "attached", "Item attached");
                    let kind = child.kind;
                    if node.attach(child) {
                        self.stats.attached.bump(kind);
                    }
                }
            }
        }

        if node.is_empty() {
            tracing::warn!(source_id = %topic.url, stage = "skipped", "Topic has no content, omitting");
            self.stats.skipped.bump(NodeKind::Topic);
            return None;
        }
        Some(node)
    }

    /// Log a skipped node with its failure kind and count it
    fn skip(&mut self, kind: NodeKind, source_id: &str, stage: &str, error: &Error) {
        tracing::warn!(
            source_id,
            kind = %kind,
            stage,
            failure_kind = %error.failure_kind(),
            error = %error,
            "Skipping node"
        );
        self.stats.skipped.bump(kind);
    }

    /// Turn a node's remote thumbnail reference into a local file
    async fn materialize(&mut self, node: &mut TreeNode) {
        let path = match node.thumbnail_url().map(str::to_string) {
            Some(url) => self.materialize_url(&url).await,
            None => None,
        };
        node.set_materialized_thumbnail(path);
    }

    /// Download a thumbnail once; `None` if it cannot be obtained
    async fn materialize_url(&self, url: &str) -> Option<PathBuf> {
        let path = thumbnail_path(&self.config.output.thumbnails_dir(), url);
        if is_non_empty_file(&path).await {
            return Some(path);
        }

        let stored = match self.fetcher.fetch_bytes(url).await {
            Ok(bytes) if !bytes.is_empty() => write_atomic(&path, &bytes).await.map_err(Error::from),
            Ok(_) => Err(Error::Content(crate::error::ContentError::Empty { url: url.to_string() })),
            Err(e) => Err(e),
        };
        match stored {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(url, error = %e, failure_kind = %e.failure_kind(), "Dropping thumbnail");
                None
            }
        }
    }
}

/// Local file for a thumbnail URL: `<dir>/<sha256(url)>.<ext>`
pub fn thumbnail_path(dir: &Path, url: &str) -> PathBuf {
    let ext = extension_from_url(url).unwrap_or_else(|| "png".to_string());
    dir.join(format!("{}.{}", sha256_hex(url), ext))
}
