//! Configuration types for kb-harvest

use crate::error::{Error, Result};
use crate::types::{License, ListingKind};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Site description: where to harvest from and how the root document is labelled
///
/// Defaults describe Hsoub Academy, the Arabic knowledge base this harvester
/// was first written for. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the site; its host receives the cache-forever policy
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Stable identifier of the root document (default: "kb-harvest-hsoub-academy")
    #[serde(default = "default_channel_source_id")]
    pub source_id: String,

    /// Root document title
    #[serde(default = "default_channel_title")]
    pub title: String,

    /// Root document description, truncated to `description_max_chars`
    #[serde(default = "default_channel_description")]
    pub description: String,

    /// Upper bound on the root description length in characters (default: 400)
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,

    /// Remote URL of the root thumbnail (materialized like every other thumbnail)
    #[serde(default = "default_channel_thumbnail")]
    pub thumbnail_url: Option<String>,

    /// Language code applied to every node (default: "ar")
    #[serde(default = "default_language")]
    pub language: String,

    /// Fallback author when a listing does not name one
    #[serde(default = "default_author")]
    pub author: String,

    /// License attached to every node
    #[serde(default = "default_license")]
    pub license: License,

    /// Fixed category list, in navigation order
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            source_id: default_channel_source_id(),
            title: default_channel_title(),
            description: default_channel_description(),
            description_max_chars: default_description_max_chars(),
            thumbnail_url: default_channel_thumbnail(),
            language: default_language(),
            author: default_author(),
            license: default_license(),
            categories: default_categories(),
        }
    }
}

/// One top-level category of the site navigation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// English display name, used in logs
    pub name: String,

    /// Exact anchor text locating the category in the navigation bar; also the node title
    pub anchor_text: String,

    /// How items under this category are listed and packaged
    pub kind: ListingKind,
}

/// Output locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root of every artifact written by a run (default: "./chefdata")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File name of the tree document under `<data_dir>/trees` (default: "ricecooker_json_tree.json")
    #[serde(default = "default_tree_file")]
    pub tree_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tree_file: default_tree_file(),
        }
    }
}

impl OutputConfig {
    /// Directory holding the tree document
    pub fn trees_dir(&self) -> PathBuf {
        self.data_dir.join("trees")
    }

    /// Full path of the tree document
    pub fn tree_path(&self) -> PathBuf {
        self.trees_dir().join(&self.tree_file)
    }

    /// Directory holding materialized thumbnails
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }
}

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for page and attachment requests (default: 60 seconds)
    #[serde(default = "default_page_timeout", with = "duration_ms_serde")]
    pub page_timeout: Duration,

    /// Timeout for image and thumbnail requests (default: 20 seconds)
    #[serde(default = "default_asset_timeout", with = "duration_ms_serde")]
    pub asset_timeout: Duration,

    /// On-disk response cache directory (default: ".webcache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Enable the response cache (default: true)
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Retry policy for every request (default: 4 attempts, 3 seconds apart)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            page_timeout: default_page_timeout(),
            asset_timeout: default_asset_timeout(),
            cache_dir: default_cache_dir(),
            cache_enabled: true,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (default: 4)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 3 seconds)
    #[serde(default = "default_retry_delay", with = "duration_ms_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Video acquisition settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Download embedded videos (default: true); false gives a metadata-only harvest
    #[serde(default = "default_true")]
    pub download_videos: bool,

    /// Maximum video height in pixels (default: 480)
    #[serde(default = "default_resolution_cap")]
    pub resolution_cap: u32,

    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Retry policy for transient media failures (default: 4 attempts, 800 ms apart)
    #[serde(default = "default_media_retry")]
    pub retry: RetryConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            download_videos: true,
            resolution_cap: default_resolution_cap(),
            ytdlp_path: None,
            search_path: true,
            retry: default_media_retry(),
        }
    }
}

/// Shared stylesheet and script embedded into every bundle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Stylesheet URL, stored in bundles as `css/styles.css`
    #[serde(default = "default_stylesheet_url")]
    pub stylesheet_url: String,

    /// Script URL, stored in bundles as `js/scripts.js`
    #[serde(default = "default_script_url")]
    pub script_url: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            stylesheet_url: default_stylesheet_url(),
            script_url: default_script_url(),
        }
    }
}

/// Listing pagination settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Query parameter carrying the page number (default: "page")
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Hard stop for listings whose page count cannot be determined (default: 100)
    #[serde(default = "default_max_unbounded_pages")]
    pub max_unbounded_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_param: default_page_param(),
            max_unbounded_pages: default_max_unbounded_pages(),
        }
    }
}

/// Main configuration for a harvest run
///
/// Fields are organized into logical sub-configs:
/// - [`site`](SiteConfig): base URL, root document labels, category list
/// - [`output`](OutputConfig): data directory and tree file
/// - [`http`](HttpConfig): user agent, timeouts, cache, retry
/// - [`media`](MediaConfig): video toggle, resolution cap, yt-dlp location
/// - [`support`](SupportConfig): shared bundle stylesheet and script
/// - [`pagination`](PaginationConfig): page parameter and unbounded stop
///
/// Every field has a default, so an empty JSON object is a valid configuration.
/// The configuration is built once per run and shared read-only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site description
    #[serde(default)]
    pub site: SiteConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Video acquisition settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Shared bundle assets
    #[serde(default)]
    pub support: SupportConfig,

    /// Pagination settings
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a JSON document; missing fields take their defaults
    ///
    /// # Returns
    ///
    /// The parsed and validated configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("cannot parse {}: {e}", path.display()),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.site.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL `{}`: {e}", self.site.base_url),
            key: Some("site.base_url".into()),
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(Error::Config {
                message: format!("base URL `{}` must be an http(s) URL with a host", base),
                key: Some("site.base_url".into()),
            });
        }
        if self.site.categories.is_empty() {
            return Err(Error::Config {
                message: "at least one category is required".into(),
                key: Some("site.categories".into()),
            });
        }
        if let Some(category) = self
            .site
            .categories
            .iter()
            .find(|c| c.anchor_text.trim().is_empty())
        {
            return Err(Error::Config {
                message: format!("category `{}` has an empty anchor text", category.name),
                key: Some("site.categories".into()),
            });
        }
        if self.pagination.page_param.is_empty() {
            return Err(Error::Config {
                message: "page parameter must not be empty".into(),
                key: Some("pagination.page_param".into()),
            });
        }
        if self.media.resolution_cap == 0 {
            return Err(Error::Config {
                message: "resolution cap must be positive".into(),
                key: Some("media.resolution_cap".into()),
            });
        }
        if self.output.tree_file.is_empty() {
            return Err(Error::Config {
                message: "tree file name must not be empty".into(),
                key: Some("output.tree_file".into()),
            });
        }
        Ok(())
    }

    /// Parsed base URL of the site
    pub fn base_url(&self) -> Result<url::Url> {
        Ok(url::Url::parse(&self.site.base_url)?)
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://academy.hsoub.com/".to_string()
}

fn default_channel_source_id() -> String {
    "kb-harvest-hsoub-academy".to_string()
}

fn default_channel_title() -> String {
    "Hsoub Academy".to_string()
}

fn default_channel_description() -> String {
    "Hsoub Academy provides online courses in the area of computer science and digital \
     literacy for adult learners and IT emerging professionals. Those courses include video \
     lessons and articles on what is trending in the coding and entrepreneurship world today."
        .to_string()
}

fn default_description_max_chars() -> usize {
    400
}

fn default_channel_thumbnail() -> Option<String> {
    Some(
        "https://academy.hsoub.com/uploads/monthly_2016_01/SiteLogo-346x108.png.dd3bdd5dfa0e4a7099ebc51f8484032e.png"
            .to_string(),
    )
}

fn default_language() -> String {
    "ar".to_string()
}

fn default_author() -> String {
    "Hsoub Academy".to_string()
}

fn default_license() -> License {
    License {
        license_id: "CC BY-NC-SA".to_string(),
        copyright_holder: "Hsoub Academy".to_string(),
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            name: "Lessons and Articles".to_string(),
            anchor_text: "دروس ومقالات".to_string(),
            kind: ListingKind::Article,
        },
        CategoryConfig {
            name: "Questions and Answers".to_string(),
            anchor_text: "أسئلة وأجوبة".to_string(),
            kind: ListingKind::Question,
        },
        CategoryConfig {
            name: "Books and Resources".to_string(),
            anchor_text: "كتب وملفات".to_string(),
            kind: ListingKind::Document,
        },
    ]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./chefdata")
}

fn default_tree_file() -> String {
    "ricecooker_json_tree.json".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; kb-harvest)".to_string()
}

fn default_page_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_asset_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".webcache")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_media_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        delay: Duration::from_millis(800),
    }
}

fn default_resolution_cap() -> u32 {
    480
}

fn default_stylesheet_url() -> String {
    "https://raw.githubusercontent.com/learningequality/html-app-starter/master/css/styles.css"
        .to_string()
}

fn default_script_url() -> String {
    "https://raw.githubusercontent.com/learningequality/html-app-starter/master/js/scripts.js"
        .to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_max_unbounded_pages() -> u32 {
    100
}

// Duration serialization helper (integer milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
