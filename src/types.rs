//! Core types for kb-harvest
//!
//! The content tree is the only shared data structure of a harvest. The
//! builder owns every [`TreeNode`] and is the only code that appends children;
//! other components return values and never hold references into the tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::utils::sha256_hex;

/// Number of hex characters kept from the SHA-256 digest for a node id
const NODE_ID_LEN: usize = 40;

/// Deterministic node identifier
///
/// Derived from the node kind and its remote source reference, so re-running
/// a harvest against an unchanged site produces identical ids.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Derive the id of a node of `kind` harvested from `source_id`
    pub fn derive(kind: NodeKind, source_id: &str) -> Self {
        let mut digest = sha256_hex(&format!("{}:{}", kind.as_str(), source_id));
        digest.truncate(NODE_ID_LEN);
        Self(digest)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a tree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Container node (category, topic, article with media)
    Topic,
    /// Self-contained HTML bundle
    Html5,
    /// Downloaded document
    Document,
    /// Downloaded video
    Video,
}

impl NodeKind {
    /// Namespace used in node ids and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Topic => "topic",
            NodeKind::Html5 => "html5",
            NodeKind::Document => "document",
            NodeKind::Video => "video",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the items of a category are listed and packaged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    /// CMS articles: one bundle per article plus its embedded videos
    Article,
    /// Downloadable files (PDF)
    Document,
    /// Forum question threads: one bundle per thread
    Question,
}

impl ListingKind {
    /// Name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Article => "article",
            ListingKind::Document => "document",
            ListingKind::Question => "question",
        }
    }
}

/// License carried by every node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// License identifier (e.g. "CC BY-NC-SA")
    pub license_id: String,
    /// Copyright holder
    pub copyright_holder: String,
}

/// Subtitle track attached to a video leaf
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Language code offered by the source
    pub language: String,
    /// Video id on the hosting platform
    pub youtube_id: String,
    /// Track type tag, always "subtitles"
    pub file_type: String,
}

impl SubtitleTrack {
    /// Create a subtitle track descriptor
    pub fn new(language: impl Into<String>, youtube_id: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            youtube_id: youtube_id.into(),
            file_type: "subtitles".to_string(),
        }
    }
}

/// File payload of a leaf node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Zipped HTML bundle
    Bundle {
        /// Archive path on disk
        path: PathBuf,
    },
    /// Downloaded document
    Document {
        /// Document path on disk
        path: PathBuf,
    },
    /// Downloaded video with optional subtitle tracks
    Video {
        /// Video path on disk
        path: PathBuf,
        /// Subtitle tracks offered by the source
        #[serde(default)]
        subtitles: Vec<SubtitleTrack>,
    },
}

impl Payload {
    /// Node kind implied by this payload
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Bundle { .. } => NodeKind::Html5,
            Payload::Document { .. } => NodeKind::Document,
            Payload::Video { .. } => NodeKind::Video,
        }
    }

    /// Path of the file this payload references
    pub fn path(&self) -> &PathBuf {
        match self {
            Payload::Bundle { path } | Payload::Document { path } | Payload::Video { path, .. } => {
                path
            }
        }
    }
}

/// Labels shared by every node of a run (language, fallback author, license)
#[derive(Clone, Debug)]
pub struct NodeDefaults {
    /// Language code
    pub language: String,
    /// Fallback author
    pub author: String,
    /// License
    pub license: License,
}

/// Node of the harvested content tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node kind
    pub kind: NodeKind,
    /// Deterministic id derived from `kind` and `source_id`
    pub id: NodeId,
    /// Remote source reference (usually the item URL)
    pub source_id: String,
    /// Display title
    pub title: String,
    /// Language code
    pub language: String,
    /// Description taken from the listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local path of the materialized thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    /// Author
    pub author: String,
    /// License
    pub license: License,
    /// File payload; `None` for topic nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Children in discovery order
    #[serde(default)]
    pub children: Vec<TreeNode>,
    // Remote thumbnail reference, turned into `thumbnail` by the materialize step
    #[serde(skip)]
    thumbnail_url: Option<String>,
}

impl TreeNode {
    /// Create a container node
    pub fn topic(source_id: impl Into<String>, title: impl Into<String>, defaults: &NodeDefaults) -> Self {
        Self::new(NodeKind::Topic, None, source_id.into(), title.into(), defaults)
    }

    /// Create a leaf node carrying a file payload
    pub fn leaf(
        payload: Payload,
        source_id: impl Into<String>,
        title: impl Into<String>,
        defaults: &NodeDefaults,
    ) -> Self {
        Self::new(payload.kind(), Some(payload), source_id.into(), title.into(), defaults)
    }

    fn new(
        kind: NodeKind,
        payload: Option<Payload>,
        source_id: String,
        title: String,
        defaults: &NodeDefaults,
    ) -> Self {
        Self {
            kind,
            id: NodeId::derive(kind, &source_id),
            source_id,
            title,
            language: defaults.language.clone(),
            description: None,
            thumbnail: None,
            author: defaults.author.clone(),
            license: defaults.license.clone(),
            payload,
            children: Vec::new(),
            thumbnail_url: None,
        }
    }

    /// Set the description; blank text is dropped
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    /// Override the author; blank names keep the default
    pub fn with_author(mut self, author: Option<String>) -> Self {
        if let Some(author) = author.map(|a| a.trim().to_string())
            && !author.is_empty()
        {
            self.author = author;
        }
        self
    }

    /// Record the remote thumbnail reference without fetching it
    pub fn with_thumbnail_url(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Remote thumbnail reference still awaiting materialization
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    /// Complete the two-phase thumbnail contract
    ///
    /// `Some(path)` sets the local thumbnail; `None` drops the reference.
    pub fn set_materialized_thumbnail(&mut self, path: Option<PathBuf>) {
        self.thumbnail_url = None;
        self.thumbnail = path;
    }

    /// Attach a child, deduplicating by `source_id`
    ///
    /// A child whose `source_id` is already present replaces the earlier one
    /// in place, so discovery order is kept and re-adding never duplicates.
    /// Returns true if the child was new.
    pub fn attach(&mut self, child: TreeNode) -> bool {
        attach_dedup(&mut self.children, child)
    }

    /// Returns true if this node has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

/// Root document describing a whole harvest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTree {
    /// Site the content was harvested from
    pub source_domain: String,
    /// Stable identifier of the harvest
    pub source_id: String,
    /// Title
    pub title: String,
    /// Language code
    pub language: String,
    /// Description, truncated to the configured character cap
    pub description: String,
    /// Local path of the materialized root thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    /// Author
    pub author: String,
    /// License
    pub license: License,
    /// Category nodes in navigation order
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl ChannelTree {
    /// Attach a category node with the same dedup rule as [`TreeNode::attach`]
    pub fn attach(&mut self, child: TreeNode) -> bool {
        attach_dedup(&mut self.children, child)
    }
}

fn attach_dedup(children: &mut Vec<TreeNode>, child: TreeNode) -> bool {
    match children
        .iter_mut()
        .find(|existing| existing.source_id == child.source_id)
    {
        Some(existing) => {
            *existing = child;
            false
        }
        None => {
            children.push(child);
            true
        }
    }
}

/// Reference to a remote video found in an item body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaReference {
    /// Normalized watch locator
    pub locator: String,
    /// True if found in an embed (iframe) rather than a link
    pub is_embedded: bool,
    /// Local file once downloaded
    pub resolved_path: Option<PathBuf>,
    /// Maximum video height in pixels
    pub resolution_cap: u32,
    /// Subtitle languages offered by the source
    pub subtitle_tracks: BTreeSet<String>,
}

impl MediaReference {
    /// Create an unresolved reference
    pub fn new(locator: impl Into<String>, is_embedded: bool, resolution_cap: u32) -> Self {
        Self {
            locator: locator.into(),
            is_embedded,
            resolved_path: None,
            resolution_cap,
            subtitle_tracks: BTreeSet::new(),
        }
    }
}

/// Per-kind node counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Topic nodes
    pub topic: u32,
    /// HTML bundles
    pub html5: u32,
    /// Documents
    pub document: u32,
    /// Videos
    pub video: u32,
}

impl KindCounts {
    /// Increment the counter for `kind`
    pub fn bump(&mut self, kind: NodeKind) {
        match kind {
            NodeKind::Topic => self.topic += 1,
            NodeKind::Html5 => self.html5 += 1,
            NodeKind::Document => self.document += 1,
            NodeKind::Video => self.video += 1,
        }
    }

    /// Sum over all kinds
    pub fn total(&self) -> u32 {
        self.topic + self.html5 + self.document + self.video
    }
}

/// Summary of one harvest run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    /// Nodes attached to the tree
    pub attached: KindCounts,
    /// Nodes omitted after a failure or empty content
    pub skipped: KindCounts,
    /// Listing pages fetched
    pub pages: u32,
    /// Bundles found already on disk
    pub cached_bundles: u32,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> NodeDefaults {
        NodeDefaults {
            language: "ar".into(),
            author: "Site".into(),
            license: License {
                license_id: "CC BY-NC-SA".into(),
                copyright_holder: "Site".into(),
            },
        }
    }

    #[test]
    fn node_id_is_deterministic_and_namespaced() {
        let a = NodeId::derive(NodeKind::Html5, "https://example.com/a");
        let b = NodeId::derive(NodeKind::Html5, "https://example.com/a");
        let c = NodeId::derive(NodeKind::Topic, "https://example.com/a");

        assert_eq!(a, b);
        assert_ne!(a, c, "same source under another kind must differ");
        assert_eq!(a.as_str().len(), 40);
        assert!(a.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn leaf_kind_follows_payload() {
        let node = TreeNode::leaf(
            Payload::Document {
                path: PathBuf::from("a.pdf"),
            },
            "https://example.com/file",
            "File",
            &defaults(),
        );
        assert_eq!(node.kind, NodeKind::Document);
        assert_eq!(node.id, NodeId::derive(NodeKind::Document, "https://example.com/file"));
    }

    #[test]
    fn attach_overwrites_same_source_in_place() {
        let d = defaults();
        let mut parent = TreeNode::topic("t", "Topic", &d);
        assert!(parent.attach(TreeNode::topic("a", "First A", &d)));
        assert!(parent.attach(TreeNode::topic("b", "B", &d)));
        assert!(!parent.attach(TreeNode::topic("a", "Second A", &d)));

        assert_eq!(parent.children.len(), 2);
        assert_eq!(parent.children[0].source_id, "a");
        assert_eq!(parent.children[0].title, "Second A");
        assert_eq!(parent.children[1].source_id, "b");
    }

    #[test]
    fn author_falls_back_to_default_when_blank() {
        let node = TreeNode::topic("s", "T", &defaults()).with_author(Some("  ".into()));
        assert_eq!(node.author, "Site");

        let node = TreeNode::topic("s", "T", &defaults()).with_author(Some(" Ali ".into()));
        assert_eq!(node.author, "Ali");
    }

    #[test]
    fn thumbnail_url_is_never_serialized() {
        let mut node = TreeNode::topic("s", "T", &defaults())
            .with_thumbnail_url(Some("https://example.com/t.png".into()));
        assert_eq!(node.thumbnail_url(), Some("https://example.com/t.png"));

        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("example.com/t.png"));

        node.set_materialized_thumbnail(Some(PathBuf::from("thumbs/x.png")));
        assert_eq!(node.thumbnail_url(), None);
        assert_eq!(node.thumbnail, Some(PathBuf::from("thumbs/x.png")));
    }

    #[test]
    fn video_payload_serializes_with_type_tag() {
        let payload = Payload::Video {
            path: PathBuf::from("videos/abc.mp4"),
            subtitles: vec![SubtitleTrack::new("en", "abc")],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["subtitles"][0]["file_type"], "subtitles");
        assert_eq!(json["subtitles"][0]["youtube_id"], "abc");
    }

    #[test]
    fn count_includes_descendants() {
        let d = defaults();
        let mut root = TreeNode::topic("r", "R", &d);
        let mut mid = TreeNode::topic("m", "M", &d);
        mid.attach(TreeNode::topic("l", "L", &d));
        root.attach(mid);
        assert_eq!(root.count(), 3);
    }

    #[test]
    fn kind_counts_bump_and_total() {
        let mut counts = KindCounts::default();
        counts.bump(NodeKind::Video);
        counts.bump(NodeKind::Video);
        counts.bump(NodeKind::Html5);
        assert_eq!(counts.video, 2);
        assert_eq!(counts.total(), 3);
    }
}
