//! # kb-harvest
//!
//! Harvests a multi-section forum/knowledge-base site into an offline content
//! tree: topic nodes whose leaves are self-contained HTML bundles, downloaded
//! documents and downloaded videos with subtitle metadata.
//!
//! ## Design Philosophy
//!
//! kb-harvest is designed to be:
//! - **Failure tolerant** - Every network hop is retried within a fixed budget, then skipped
//! - **Rerunnable** - Completed artifacts are found on disk and never rebuilt
//! - **Deterministic** - Node ids derive from source references, order from discovery
//! - **Sensible defaults** - An empty configuration describes the original site
//!
//! ## Quick Start
//!
//! ```no_run
//! use kb_harvest::{Config, harvest};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.output.data_dir = "./chefdata".into();
//!     config.media.download_videos = false;
//!
//!     let (tree, stats) = harvest(config).await?;
//!     println!("{} categories, {} nodes skipped", tree.children.len(), stats.skipped.total());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Content-tree construction
pub mod builder;
/// Self-contained HTML bundles
pub mod bundle;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP retrieval with retry and response caching
pub mod fetcher;
/// Markup cleaning and asset localization
pub mod localizer;
/// Embedded video discovery and download
pub mod media;
/// Tree document output
pub mod output;
/// Listing pagination
pub mod paginator;
/// Retry logic with a fixed delay
pub mod retry;
/// Site navigation and listing extraction
pub mod site;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

use std::sync::Arc;

// Re-export commonly used types
pub use builder::Harvester;
pub use config::Config;
pub use error::{ContentError, Error, FailureKind, MediaError, ProtocolError, Result};
pub use fetcher::HttpFetcher;
pub use media::{MediaExtractor, MediaResolver, NoOpExtractor, YtDlpExtractor};
pub use types::{
    ChannelTree, HarvestStats, License, ListingKind, MediaReference, NodeId, NodeKind, Payload, SubtitleTrack,
    TreeNode,
};

/// Run one complete harvest and write the tree document
///
/// Builds a [`Harvester`] from `config`, walks the site and writes the tree
/// to `<data_dir>/trees/<tree_file>`.
///
/// # Errors
///
/// Only setup and output failures are returned (all [`FailureKind::Fatal`]);
/// content that cannot be harvested is skipped and counted in the stats.
pub async fn harvest(config: Config) -> Result<(ChannelTree, HarvestStats)> {
    config.validate()?;
    let tree_path = config.output.tree_path();

    let mut harvester = Harvester::new(Arc::new(config)).await?;
    let tree = harvester.run().await?;
    output::write_tree(&tree, &tree_path).await?;

    Ok((tree, harvester.stats().clone()))
}
