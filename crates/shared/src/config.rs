use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub hn_api_base: String,
    pub gemini_api_base: String,
    pub fetch_concurrency: usize,
    pub item_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            hn_api_base: DEFAULT_HN_API_BASE.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            fetch_concurrency: 8,
            item_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let defaults = Self::default();

        // API_KEY is what the web build used
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        if gemini_api_key.is_none() {
            tracing::warn!(
                "GEMINI_API_KEY not found; titles will not be translated and summaries are disabled. \
                 Add it to ~/.config/hn-digest/.env"
            );
        }

        let hn_api_base = env::var("HN_API_BASE").unwrap_or(defaults.hn_api_base);
        let gemini_api_base = env::var("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base);

        let fetch_concurrency = match env::var("HN_FETCH_CONCURRENCY") {
            Ok(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("HN_FETCH_CONCURRENCY must be a positive integer, got {:?}", value)
                })?,
            Err(_) => defaults.fetch_concurrency,
        };

        let item_timeout = match env::var("HN_ITEM_TIMEOUT_SECS") {
            Ok(value) => Duration::from_secs(value.parse::<u64>().with_context(|| {
                format!("HN_ITEM_TIMEOUT_SECS must be a number of seconds, got {:?}", value)
            })?),
            Err(_) => defaults.item_timeout,
        };

        Ok(Self {
            gemini_api_key,
            hn_api_base: hn_api_base.trim_end_matches('/').to_string(),
            gemini_api_base: gemini_api_base.trim_end_matches('/').to_string(),
            fetch_concurrency,
            item_timeout,
        })
    }

    /// Default location of the persistent cache database.
    pub fn default_cache_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Could not determine local data directory")?
            .join("hn-digest");

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(data_dir.join("cache.sqlite3"))
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/hn-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("hn-digest").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}
