//! Embedded video handling
//!
//! This module finds video references in article bodies and turns them into
//! downloaded files with subtitle metadata. Extraction itself sits behind the
//! [`MediaExtractor`] trait:
//!
//! - [`YtDlpExtractor`]: runs the external `yt-dlp` binary
//! - [`NoOpExtractor`]: stub used when no binary is available
//!
//! [`MediaResolver`] drives an extractor with the classification rules,
//! resolution cap, bounded retry and empty-artifact check.
//!
//! ## Usage
//!
//! ```no_run
//! use kb_harvest::config::MediaConfig;
//! use kb_harvest::media::{MediaResolver, discover_references};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MediaConfig::default();
//! let resolver = MediaResolver::from_config(&config);
//!
//! let html = r#"<iframe src="https://www.youtube.com/embed/abc"></iframe>"#;
//! for reference in discover_references(html, config.resolution_cap) {
//!     let media = resolver.resolve(&reference, Some(Path::new("videos"))).await?;
//!     println!("{} ({} subtitle tracks)", media.title, media.subtitles.len());
//! }
//! # Ok(())
//! # }
//! ```

mod cli;
mod noop;
mod resolver;
mod traits;

pub use cli::YtDlpExtractor;
pub use noop::NoOpExtractor;
pub use resolver::{
    MediaResolver, ResolvedMedia, discover_references, format_selector, is_playlist, is_watch_locator,
    normalize_locator,
};
pub use traits::{MediaExtractor, VideoInfo};
