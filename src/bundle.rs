//! Self-contained HTML bundles
//!
//! A bundle is a zip archive holding `index.html`, the localized images under
//! `images/` and the two shared support files under `css/` and `js/`. Each
//! bundle is written through one [`BundleArchive`], opened once on a `.part`
//! file and renamed into place by [`BundleArchive::finish`]. An archive that is
//! dropped unfinished deletes its partial file, so a failed write never looks
//! complete to the next run.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SupportConfig;
use crate::error::{Error, Result};
use crate::fetcher::{AssetSource, HttpFetcher};
use crate::localizer::{AssetMap, IMAGES_DIR};
use crate::utils::{is_non_empty_file, write_atomic};

/// Archive entry of the shared stylesheet
pub const STYLESHEET_ENTRY: &str = "css/styles.css";
/// Archive entry of the shared script
pub const SCRIPT_ENTRY: &str = "js/scripts.js";
/// Archive entry of the page
pub const INDEX_ENTRY: &str = "index.html";

/// Fixed page shell wrapping bundle content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageShell {
    /// Single article
    Article,
    /// Question thread; right-aligned body for right-to-left text
    Thread,
}

impl PageShell {
    /// Wrap `content` in the shell
    pub fn render(&self, content: &str) -> String {
        let body_attrs = match self {
            PageShell::Article => "",
            PageShell::Thread => r#" style="text-align:right;""#,
        };
        format!(
            concat!(
                r#"<html><head><meta charset="utf-8"><link rel="stylesheet" href="{css}"></head>"#,
                r#"<body{attrs}><div class="main-content-with-sidebar">{content}</div>"#,
                r#"<script src="{js}"></script></body></html>"#
            ),
            css = STYLESHEET_ENTRY,
            js = SCRIPT_ENTRY,
            attrs = body_attrs,
            content = content,
        )
    }
}

/// Shared stylesheet and script, fetched once per run
#[derive(Clone, Debug)]
pub struct SupportAssets {
    stylesheet: Vec<u8>,
    script: Vec<u8>,
}

impl SupportAssets {
    /// Download both support files and keep a copy under `data_dir`
    ///
    /// # Errors
    ///
    /// Any failure is [`Error::Fatal`]: bundles without their support files are unusable.
    pub async fn fetch(fetcher: &HttpFetcher, config: &SupportConfig, data_dir: &Path) -> Result<Self> {
        let stylesheet = fetcher
            .fetch_bytes(&config.stylesheet_url)
            .await
            .map_err(|e| Error::Fatal(format!("cannot fetch stylesheet {}: {e}", config.stylesheet_url)))?;
        let script = fetcher
            .fetch_bytes(&config.script_url)
            .await
            .map_err(|e| Error::Fatal(format!("cannot fetch script {}: {e}", config.script_url)))?;

        for (name, bytes) in [("styles.css", &stylesheet), ("scripts.js", &script)] {
            write_atomic(&data_dir.join(name), bytes)
                .await
                .map_err(|e| Error::Fatal(format!("cannot store {name} in {}: {e}", data_dir.display())))?;
        }

        tracing::info!(
            stylesheet_bytes = stylesheet.len(),
            script_bytes = script.len(),
            "Support assets ready"
        );
        Ok(Self { stylesheet, script })
    }

    /// Build support assets from bytes already in hand
    pub fn from_bytes(stylesheet: impl Into<Vec<u8>>, script: impl Into<Vec<u8>>) -> Self {
        Self {
            stylesheet: stylesheet.into(),
            script: script.into(),
        }
    }
}

/// Scoped writer for one bundle archive
pub struct BundleArchive {
    final_path: PathBuf,
    part_path: PathBuf,
    zip: Option<zip::ZipWriter<std::fs::File>>,
}

impl BundleArchive {
    /// Open a new archive for `path`, writing to `<path>.part`
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut part = path.as_os_str().to_owned();
        part.push(".part");
        let part_path = PathBuf::from(part);
        let file = std::fs::File::create(&part_path)?;

        Ok(Self {
            final_path: path.to_path_buf(),
            part_path,
            zip: Some(zip::ZipWriter::new(file)),
        })
    }

    fn options() -> zip::write::FileOptions {
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated)
    }

    /// Add one entry
    pub fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let zip = self
            .zip
            .as_mut()
            .ok_or_else(|| Error::Other(format!("archive {} already closed", self.final_path.display())))?;
        zip.start_file(name, Self::options())?;
        zip.write_all(bytes)?;
        Ok(())
    }

    /// Add `index.html`
    pub fn write_index(&mut self, html: &str) -> Result<()> {
        self.write_entry(INDEX_ENTRY, html.as_bytes())
    }

    /// Close the archive and move it into place
    pub fn finish(mut self) -> Result<PathBuf> {
        let mut zip = self
            .zip
            .take()
            .ok_or_else(|| Error::Other(format!("archive {} already closed", self.final_path.display())))?;
        let closed = (|| -> Result<()> {
            let file = zip.finish()?;
            file.sync_all()?;
            drop(file);
            std::fs::rename(&self.part_path, &self.final_path)?;
            Ok(())
        })();
        if closed.is_err() {
            let _ = std::fs::remove_file(&self.part_path);
        }
        closed.map(|()| self.final_path.clone())
    }
}

impl Drop for BundleArchive {
    fn drop(&mut self) {
        if let Some(zip) = self.zip.take() {
            drop(zip);
            if let Err(e) = std::fs::remove_file(&self.part_path) {
                tracing::warn!(path = %self.part_path.display(), error = %e, "Failed to remove partial bundle");
            } else {
                tracing::debug!(path = %self.part_path.display(), "Removed partial bundle");
            }
        }
    }
}

/// Result of a bundle write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleOutcome {
    /// A non-empty archive was already present; nothing was fetched
    Cached,
    /// A new archive was written
    Written {
        /// Assets stored in the archive
        assets_written: usize,
        /// Assets that failed to fetch and were left out
        assets_skipped: usize,
    },
}

/// Writes bundles with the run's support assets
#[derive(Clone, Debug)]
pub struct BundleWriter {
    support: SupportAssets,
}

impl BundleWriter {
    /// Create a writer embedding `support` in every bundle
    pub fn new(support: SupportAssets) -> Self {
        Self { support }
    }

    /// Write a bundle unless a non-empty one already exists
    ///
    /// # Arguments
    ///
    /// * `source` - Where asset bytes come from
    /// * `bundle_path` - Final archive path
    /// * `content_html` - Localized content, wrapped by `shell`
    /// * `shell` - Page shell for the item kind
    /// * `assets` - Assets referenced by `content_html`
    ///
    /// # Errors
    ///
    /// Returns error if the archive cannot be created or written. Individual
    /// asset fetch failures are logged and skipped.
    pub async fn write(
        &self,
        source: &dyn AssetSource,
        bundle_path: &Path,
        content_html: &str,
        shell: PageShell,
        assets: &AssetMap,
    ) -> Result<BundleOutcome> {
        if is_non_empty_file(bundle_path).await {
            tracing::debug!(path = %bundle_path.display(), "Bundle already present");
            return Ok(BundleOutcome::Cached);
        }

        let mut archive = BundleArchive::create(bundle_path)?;
        archive.write_index(&shell.render(content_html))?;

        let mut assets_written = 0;
        let mut assets_skipped = 0;
        for (url, name) in assets.iter() {
            match source.fetch_asset(url).await {
                Ok(bytes) => {
                    archive.write_entry(&format!("{IMAGES_DIR}/{name}"), &bytes)?;
                    assets_written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        url,
                        bundle = %bundle_path.display(),
                        error = %e,
                        failure_kind = %e.failure_kind(),
                        "Skipping bundle asset"
                    );
                    assets_skipped += 1;
                }
            }
        }

        archive.write_entry(STYLESHEET_ENTRY, &self.support.stylesheet)?;
        archive.write_entry(SCRIPT_ENTRY, &self.support.script)?;
        archive.finish()?;

        tracing::info!(
            path = %bundle_path.display(),
            assets_written,
            assets_skipped,
            "Bundle written"
        );
        Ok(BundleOutcome::Written {
            assets_written,
            assets_skipped,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MapSource {
        assets: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssetSource for MapSource {
        async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.assets.get(url).cloned().ok_or_else(|| {
                Error::Protocol(ProtocolError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            })
        }
    }

    fn writer() -> BundleWriter {
        BundleWriter::new(SupportAssets::from_bytes("body{}", "void 0;"))
    }

    fn entries(path: &Path) -> Vec<String> {
        let file = std::fs::File::open(path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut out = String::new();
        entry.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn thread_shell_right_aligns_body() {
        let article = PageShell::Article.render("<p>x</p>");
        let thread = PageShell::Thread.render("<p>x</p>");

        assert!(article.contains(r#"<body><div class="main-content-with-sidebar"><p>x</p></div>"#));
        assert!(thread.contains(r#"<body style="text-align:right;">"#));
        assert!(article.contains(r#"href="css/styles.css""#));
        assert!(article.contains(r#"src="js/scripts.js""#));
    }

    #[tokio::test]
    async fn bundle_contains_index_assets_and_support_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t/i/i.zip");
        let mut assets = AssetMap::new();
        assets.insert("https://example.com/a.png").unwrap();
        let source = MapSource {
            assets: HashMap::from([("https://example.com/a.png".to_string(), vec![137, 80, 78, 71])]),
            ..Default::default()
        };

        let outcome = writer()
            .write(&source, &path, r#"<img src="images/a.png">"#, PageShell::Article, &assets)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BundleOutcome::Written {
                assets_written: 1,
                assets_skipped: 0
            }
        );
        let names = entries(&path);
        assert_eq!(
            names.len(),
            4,
            "index, one image, stylesheet and script: {names:?}"
        );
        for expected in ["index.html", "images/a.png", "css/styles.css", "js/scripts.js"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert!(read_entry(&path, "index.html").contains(r#"<img src="images/a.png">"#));
        assert_eq!(read_entry(&path, "css/styles.css"), "body{}");
        assert!(!dir.path().join("t/i/i.zip.part").exists());
    }

    #[tokio::test]
    async fn failing_asset_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.zip");
        let mut assets = AssetMap::new();
        assets.insert("https://example.com/gone.png").unwrap();

        let outcome = writer()
            .write(&MapSource::default(), &path, "<p>x</p>", PageShell::Thread, &assets)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BundleOutcome::Written {
                assets_written: 0,
                assets_skipped: 1
            }
        );
        assert_eq!(entries(&path).len(), 3);
    }

    #[tokio::test]
    async fn existing_bundle_is_not_rewritten_or_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.zip");
        std::fs::write(&path, b"already here").unwrap();
        let mut assets = AssetMap::new();
        assets.insert("https://example.com/a.png").unwrap();
        let source = MapSource::default();

        let outcome = writer()
            .write(&source, &path, "<p>new</p>", PageShell::Article, &assets)
            .await
            .unwrap();

        assert_eq!(outcome, BundleOutcome::Cached);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&path).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn empty_file_at_bundle_path_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.zip");
        std::fs::write(&path, b"").unwrap();

        let outcome = writer()
            .write(&MapSource::default(), &path, "<p>x</p>", PageShell::Article, &AssetMap::new())
            .await
            .unwrap();

        assert!(matches!(outcome, BundleOutcome::Written { .. }));
        assert!(entries(&path).contains(&"index.html".to_string()));
    }

    #[test]
    fn unfinished_archive_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.zip");
        {
            let mut archive = BundleArchive::create(&path).unwrap();
            archive.write_index("<p>half</p>").unwrap();
            assert!(dir.path().join("e.zip.part").exists());
        }
        assert!(!dir.path().join("e.zip.part").exists());
        assert!(!path.exists());
    }
}
