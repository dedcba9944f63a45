use crate::services::cache_store::CacheStore;
use crate::services::youtube::{VideoSource, YouTubeClient, DEFAULT_API_BASE_URL};
use anyhow::{anyhow, Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_CACHE_DB_PATH: &str = "cache.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub youtube_api_key: String,
    pub cache_db_path: PathBuf,
    pub youtube_api_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let youtube_api_key = lookup("YOUTUBE_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY environment variable must be set"))?;

        let cache_db_path = lookup("CACHE_DB_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_DB_PATH.to_string());

        let youtube_api_base_url = lookup("YOUTUBE_API_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Url::parse(&youtube_api_base_url)
            .with_context(|| format!("Invalid YOUTUBE_API_BASE_URL: {youtube_api_base_url}"))?;

        Ok(Self {
            youtube_api_key,
            cache_db_path: PathBuf::from(cache_db_path),
            youtube_api_base_url,
        })
    }
}

/// Handles shared by every scan: the cache and the remote source.
pub struct AppState {
    pub store: CacheStore,
    pub source: Arc<dyn VideoSource>,
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting outlier finder backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn create_app_state(config: &AppConfig) -> Result<AppState> {
    let store = CacheStore::open(&config.cache_db_path)
        .with_context(|| format!("Failed to open cache at {}", config.cache_db_path.display()))?;

    info!("Using YouTube API at: {}", config.youtube_api_base_url);
    let source = YouTubeClient::with_base_url(
        config.youtube_api_key.clone(),
        config.youtube_api_base_url.clone(),
    );

    Ok(AppState {
        store,
        source: Arc::new(source),
    })
}
