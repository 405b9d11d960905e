//! Top-level scheduler: chunked, sampled, cancellation-scoped crawl cycles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::locations::LocationService;
use crate::models::{CrawlRun, DraftListing, Location, Site};
use crate::normalize;
use crate::sampler;
use crate::scrapers::SiteCrawler;
use crate::store::ListingStore;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
    pub sample_interval: Duration,
    pub cycle_interval: Duration,
}

/// Partition locations into fixed-size chunks, preserving order.
pub fn chunk_locations(locations: &[Location], size: usize) -> Vec<Vec<Location>> {
    locations
        .chunks(size.max(1))
        .map(<[Location]>::to_vec)
        .collect()
}

/// Drives the whole pipeline: locations → chunks → per-chunk crawl tasks
/// with a resource sampler spanning each chunk → normalization → one
/// persisted run.
pub struct Orchestrator {
    crawlers: Vec<Arc<dyn SiteCrawler>>,
    locations: Arc<LocationService>,
    store: Arc<ListingStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        crawlers: Vec<Arc<dyn SiteCrawler>>,
        locations: Arc<LocationService>,
        store: Arc<ListingStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            crawlers,
            locations,
            store,
            config,
        }
    }

    /// Crawl forever on the configured interval. A failed cycle (typically
    /// the location catalog being unreachable) is logged and skipped; the
    /// next tick starts fresh.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(run) => info!(
                    listings = run.listings.len(),
                    failed_locations = run.failed_locations.len(),
                    "crawl cycle finished"
                ),
                Err(err) => warn!(error = %err, "crawl cycle skipped"),
            }
        }
    }

    /// One full crawl cycle across every site and allow-listed location.
    pub async fn run_cycle(&self) -> Result<CrawlRun> {
        let started_at = Utc::now();
        let locations = self
            .locations
            .get_locations()
            .await
            .context("fetching crawl targets")?;
        let chunks = chunk_locations(&locations, self.config.chunk_size);
        info!(
            locations = locations.len(),
            chunks = chunks.len(),
            sites = self.crawlers.len(),
            "starting crawl cycle"
        );

        let mut drafts: Vec<DraftListing> = Vec::new();
        let mut failed_locations: Vec<String> = Vec::new();
        let mut total_cpu = 0.0;
        let mut total_memory = 0.0;
        let mut completed_chunks = 0u32;

        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk = index, locations = chunk.len(), "dispatching chunk");
            let cancel = CancellationToken::new();

            let sampler_handle = tokio::spawn({
                let cancel = cancel.clone();
                let interval = self.config.sample_interval;
                async move { sampler::sample(&cancel, interval).await }
            });

            let mut tasks: JoinSet<(Site, String, Result<Vec<DraftListing>>)> = JoinSet::new();
            for crawler in &self.crawlers {
                for location in chunk {
                    let crawler = Arc::clone(crawler);
                    let location = location.clone();
                    let cancel = cancel.clone();
                    tasks.spawn(async move {
                        let result = crawler.crawl(&cancel, &location).await;
                        (crawler.site(), location.name, result)
                    });
                }
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((site, name, Ok(batch))) => {
                        debug!(site = %site, location = %name, listings = batch.len(), "location done");
                        drafts.extend(batch);
                    }
                    Ok((site, name, Err(err))) => {
                        warn!(site = %site, location = %name, error = %err, "location crawl failed");
                        failed_locations.push(format!("{site}:{name}"));
                    }
                    Err(err) => warn!(error = %err, "crawl task panicked"),
                }
            }

            // Barrier passed; the sampler window closes here.
            cancel.cancel();
            match sampler_handle.await {
                Ok(usage) => {
                    total_cpu += usage.avg_cpu;
                    total_memory += usage.avg_memory;
                }
                Err(err) => warn!(error = %err, "resource sampler task failed"),
            }
            completed_chunks += 1;

            if index + 1 < chunks.len() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
        }

        let finished_at = Utc::now();
        let mut listings = Vec::new();
        for draft in &drafts {
            match normalize::promote(draft, finished_at) {
                Some(listing) => listings.push(listing),
                None => warn!(link = %draft.link, "dropping listing without title or description"),
            }
        }

        let run = CrawlRun {
            started_at,
            finished_at,
            avg_cpu: chunk_average(total_cpu, completed_chunks),
            avg_memory: chunk_average(total_memory, completed_chunks),
            request_count: drafts.len() as u64,
            listings,
            failed_locations,
        };
        self.store
            .save_run(&run)
            .await
            .context("persisting crawl run")?;

        Ok(run)
    }
}

// Averages are only defined over chunks that actually ran.
fn chunk_average(total: f64, completed_chunks: u32) -> f64 {
    if completed_chunks == 0 {
        0.0
    } else {
        total / f64::from(completed_chunks)
    }
}
