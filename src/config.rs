//! Application configuration.
//!
//! Defaults live here; `ANILIBERTY_*` environment variables override them and
//! command-line flags (see `main.rs`) override both.

use std::path::PathBuf;
use std::time::Duration;

use crate::player::Quality;

/// Complete configuration, grouped by component.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub player: PlayerConfig,
    pub catalog: CatalogConfig,
}

/// Remote API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the JSON API, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://anilibria.top/api/v1".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("aniliberty-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Local persistence settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON file per stored key
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { cache_dir: PathBuf::from(".cache") }
    }
}

/// Playback session settings.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Automatic retries before the session stays in `Error`
    pub max_retries: u32,
    /// Fixed back-off before an automatic retry
    pub retry_delay: Duration,
    /// Quality used for a fresh session
    pub default_quality: Quality,
    /// Start playing as soon as the stream is ready
    pub autoplay: bool,
    /// Relative seek step for skip forward/back
    pub skip_step_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            default_quality: Quality::Medium,
            autoplay: true,
            skip_step_ms: 10_000,
        }
    }
}

/// Catalog listing settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Releases requested per catalog page
    pub page_size: u32,
    /// Releases requested for the "latest" feed
    pub latest_limit: u32,
    /// Releases requested for the "random" and "recommended" feeds
    pub feed_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { page_size: 20, latest_limit: 14, feed_limit: 5 }
    }
}

impl AppConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ANILIBERTY_API_URL") {
            config.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = env_parse::<u64>("ANILIBERTY_TIMEOUT_SECS") {
            config.api.timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("ANILIBERTY_CACHE_DIR") {
            config.storage.cache_dir = PathBuf::from(dir);
        }
        if let Some(retries) = env_parse::<u32>("ANILIBERTY_MAX_RETRIES") {
            config.player.max_retries = retries;
        }
        if let Some(quality) = std::env::var("ANILIBERTY_QUALITY").ok().and_then(|q| q.parse().ok()) {
            config.player.default_quality = quality;
        }
        if let Some(autoplay) = env_parse::<bool>("ANILIBERTY_AUTOPLAY") {
            config.player.autoplay = autoplay;
        }
        if let Some(page_size) = env_parse::<u32>("ANILIBERTY_PAGE_SIZE") {
            config.catalog.page_size = page_size.max(1);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
