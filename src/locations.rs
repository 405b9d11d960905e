//! Cached catalog of crawl-target cities.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::Location;

/// Where the full city catalog comes from. The production implementation
/// hits the remote places API; tests script responses.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Location>>;
}

/// Remote catalog behind the public places API
pub struct RemoteCatalog {
    client: reqwest::Client,
    url: String,
}

impl RemoteCatalog {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CityResponse {
    cities: Vec<Location>,
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    async fn fetch(&self) -> Result<Vec<Location>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("fetching city catalog from {}", self.url))?
            .error_for_status()
            .context("city catalog request rejected")?;
        let catalog: CityResponse = response
            .json()
            .await
            .context("decoding city catalog response")?;
        Ok(catalog.cities)
    }
}

struct CacheEntry {
    locations: Vec<Location>,
    fetched_at: Instant,
}

/// Serves the allow-listed crawl targets, refreshing the cached catalog
/// once its TTL has elapsed. A refresh failure surfaces to the caller and
/// leaves the previous cache untouched.
pub struct LocationService {
    source: Arc<dyn CatalogSource>,
    allowed: Vec<String>,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl LocationService {
    pub fn new(source: Arc<dyn CatalogSource>, allowed: Vec<String>, ttl: Duration) -> Self {
        Self {
            source,
            allowed,
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub async fn get_locations(&self) -> Result<Vec<Location>> {
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(locations = entry.locations.len(), "serving cached crawl targets");
                return Ok(entry.locations.clone());
            }
        }

        let catalog = self.source.fetch().await.context("refreshing city catalog")?;
        let locations: Vec<Location> = catalog
            .into_iter()
            .filter(|city| self.allowed.iter().any(|name| name == &city.name))
            .collect();
        info!(locations = locations.len(), "refreshed crawl target catalog");

        *cache = Some(CacheEntry {
            locations: locations.clone(),
            fetched_at: Instant::now(),
        });
        Ok(locations)
    }
}
