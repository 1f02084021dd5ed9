//! Test configuration pointing a harvest at a mock site

use std::path::Path;
use std::time::Duration;
use kb_harvest::Config;
use kb_harvest::config::RetryConfig;
use wiremock::MockServer;

/// Configuration for a harvest of `server` writing under `dir`
///
/// Retries are fast, video download is off and yt-dlp is never looked up,
/// so the run depends on nothing but the mock server.
pub fn site_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = format!("{}/", server.uri());
    config.site.thumbnail_url = Some(format!("{}/thumbs/site.png", server.uri()));
    config.output.data_dir = dir.join("data");
    config.http.cache_dir = dir.join("cache");
    config.http.retry = RetryConfig {
        max_attempts: 2,
        delay: Duration::from_millis(1),
    };
    config.support.stylesheet_url = format!("{}/support/styles.css", server.uri());
    config.support.script_url = format!("{}/support/scripts.js", server.uri());
    config.pagination.max_unbounded_pages = 5;
    config.media.download_videos = false;
    config.media.search_path = false;
    config
}
