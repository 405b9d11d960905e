//! Environment-driven configuration with a default for every key.
//!
//! Values come from the process environment (a `.env` file is honored when
//! present); the allow-list of crawl targets comes from a local JSON
//! settings file.

use std::fs::File;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub navigation_timeout: Duration,
    pub max_scroll_attempts: u32,
    pub scroll_settle: Duration,
    /// Cap on listing links processed per location, 0 = unbounded.
    pub max_listings_per_location: usize,
    pub detail_batch_size: usize,
    pub chunk_size: usize,
    pub chunk_pause: Duration,
    pub sample_interval: Duration,
    pub cycle_interval: Duration,
    pub city_cache_ttl: Duration,
    pub divar_base_url: String,
    pub sheypoor_base_url: String,
    pub cities_api_url: String,
    pub database_url: String,
    pub app_settings_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            max_retries: env_positive("CRAWLER_MAX_RETRIES", 3) as u32,
            retry_delay: Duration::from_secs(env_positive("CRAWLER_RETRY_DELAY", 5)),
            navigation_timeout: Duration::from_millis(env_positive(
                "NAVIGATION_TIMEOUT_MS",
                30_000,
            )),
            max_scroll_attempts: env_positive("CRAWLER_MAX_SCROLL_ATTEMPTS", 5) as u32,
            scroll_settle: Duration::from_millis(env_positive("CRAWLER_SCROLL_SETTLE_MS", 2_000)),
            max_listings_per_location: env_or("CRAWLER_PAGE_LIMIT", 0),
            detail_batch_size: env_positive("CRAWLER_DETAIL_BATCH_SIZE", 15) as usize,
            chunk_size: env_positive("CRAWLER_CHUNK_SIZE", 10) as usize,
            chunk_pause: Duration::from_secs(env_positive("CRAWLER_CHUNK_PAUSE", 5)),
            sample_interval: Duration::from_secs(env_positive("RESOURCE_SAMPLE_INTERVAL", 2)),
            cycle_interval: Duration::from_secs(env_positive("CRAWLER_INTERVAL", 30) * 60),
            city_cache_ttl: Duration::from_secs(env_positive("CITY_CACHE_TTL_HOURS", 6) * 3_600),
            divar_base_url: env_string("DIVAR_BASE_URL", "https://divar.ir"),
            sheypoor_base_url: env_string("SHEYPOOR_BASE_URL", "https://www.sheypoor.com"),
            cities_api_url: env_string(
                "API_CITIES_URL",
                "https://api.divar.ir/v8/places/cities?level=all",
            ),
            database_url: env_string("DATABASE_URL", "sqlite://estate-scout.db?mode=rwc"),
            app_settings_path: env_string("APP_SETTINGS_PATH", "appsettings.json"),
        }
    }

    /// The subset handed to every site crawler.
    pub fn crawler(&self) -> CrawlerConfig {
        CrawlerConfig {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            max_scroll_attempts: self.max_scroll_attempts,
            scroll_settle: self.scroll_settle,
            max_listings_per_location: self.max_listings_per_location,
            detail_batch_size: self.detail_batch_size,
        }
    }
}

/// Retry, pagination and batching knobs for one site crawler.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_scroll_attempts: u32,
    pub scroll_settle: Duration,
    pub max_listings_per_location: usize,
    pub detail_batch_size: usize,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_positive(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[derive(Debug, Deserialize)]
struct AppSettings {
    #[serde(rename = "Provincial-Centers")]
    provincial_centers: Vec<ProvincialCenter>,
}

#[derive(Debug, Deserialize)]
struct ProvincialCenter {
    name: String,
}

/// Load the allow-listed location names from the settings file.
pub fn load_allowed_locations(path: &str) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening settings file {path}"))?;
    let settings: AppSettings =
        serde_json::from_reader(file).with_context(|| format!("decoding settings file {path}"))?;
    Ok(settings
        .provincial_centers
        .into_iter()
        .map(|center| center.name)
        .collect())
}
