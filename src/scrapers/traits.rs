use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::models::{DraftListing, Location, Site};
use crate::scrapers::pagination::{collect_listing_links, ScrollConfig};
use crate::scrapers::retry::{with_retries, RetryPolicy};

/// One rendered browser page. The production implementation drives a real
/// Chrome tab; tests script responses.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn content(&self) -> Result<String>;
    async fn scroll_to_bottom(&self) -> Result<()>;
    /// Click the "load more" control if one is present. Returns whether a
    /// click actually happened.
    async fn click_load_more(&self) -> Result<bool>;
}

/// Opens fresh page sessions with anti-blocking headers already applied.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>>;
}

/// Common contract for all site crawlers.
///
/// Implementations supply the site-specific pieces (search URL, link and
/// detail extraction); the crawl algorithm itself (retry loop, auto-scroll
/// pagination, batched detail fetches) is shared below and identical for
/// every site.
#[async_trait]
pub trait SiteCrawler: Send + Sync {
    /// Which site this crawler targets.
    fn site(&self) -> Site;

    fn config(&self) -> &CrawlerConfig;

    fn sessions(&self) -> &dyn SessionFactory;

    /// The listing-search page for one location.
    fn search_url(&self, location: &Location) -> String;

    /// Pull listing links out of a rendered search page.
    fn extract_listing_links(&self, html: &str) -> Vec<String>;

    /// Map a rendered listing page to a draft record.
    fn extract_details(&self, html: &str, link: &str) -> DraftListing;

    /// Harvest every listing currently visible for one location.
    ///
    /// Cancellation is not an error: the listings collected so far are
    /// returned as-is. A location whose search page cannot be fetched within
    /// the retry budget is an error for the caller to log and drop.
    async fn crawl(
        &self,
        cancel: &CancellationToken,
        location: &Location,
    ) -> Result<Vec<DraftListing>> {
        let config = self.config();
        let policy = RetryPolicy {
            attempts: config.max_retries,
            delay: config.retry_delay,
        };
        let scroll = ScrollConfig {
            max_attempts: config.max_scroll_attempts,
            settle: config.scroll_settle,
        };
        let url = self.search_url(location);
        info!(site = %self.site(), location = %location.name, url = %url, "crawling search page");

        let links = match with_retries(&policy, cancel, "collecting listing links", |attempt| {
            let url = url.clone();
            let scroll = scroll.clone();
            async move {
                let session = self
                    .sessions()
                    .open_session()
                    .await
                    .context("opening search session")?;
                session
                    .navigate(&url)
                    .await
                    .with_context(|| format!("navigating to {url} (attempt {attempt})"))?;
                collect_listing_links(
                    session.as_ref(),
                    |html| self.extract_listing_links(html),
                    &scroll,
                )
                .await
            }
        })
        .await
        {
            Ok(links) => links,
            Err(_) if cancel.is_cancelled() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut links = links;
        if config.max_listings_per_location > 0 && links.len() > config.max_listings_per_location {
            debug!(
                site = %self.site(),
                location = %location.name,
                found = links.len(),
                kept = config.max_listings_per_location,
                "applying listing page limit"
            );
            links.truncate(config.max_listings_per_location);
        }

        let mut listings = Vec::new();
        for batch in links.chunks(config.detail_batch_size.max(1)) {
            if cancel.is_cancelled() {
                info!(
                    site = %self.site(),
                    location = %location.name,
                    collected = listings.len(),
                    "cancelled mid-crawl, returning partial results"
                );
                return Ok(listings);
            }

            let results = join_all(batch.iter().map(|link| async move {
                match self.crawl_details(cancel, link).await {
                    Ok(draft) => Some(draft),
                    Err(err) => {
                        warn!(site = %self.site(), link = %link, error = %err, "dropping listing");
                        None
                    }
                }
            }))
            .await;

            for mut draft in results.into_iter().flatten() {
                draft.location = Some(location.clone());
                listings.push(draft);
            }
        }

        info!(
            site = %self.site(),
            location = %location.name,
            listings = listings.len(),
            "finished location"
        );
        Ok(listings)
    }

    /// Fetch and extract a single listing page. A page missing its title or
    /// description counts as a failed attempt; the first complete extraction
    /// wins.
    async fn crawl_details(&self, cancel: &CancellationToken, link: &str) -> Result<DraftListing> {
        let config = self.config();
        let policy = RetryPolicy {
            attempts: config.max_retries,
            delay: config.retry_delay,
        };

        with_retries(&policy, cancel, "crawling listing details", |attempt| {
            let link = link.to_string();
            async move {
                let session = self
                    .sessions()
                    .open_session()
                    .await
                    .context("opening detail session")?;
                session
                    .navigate(&link)
                    .await
                    .with_context(|| format!("navigating to {link} (attempt {attempt})"))?;
                let html = session.content().await.context("reading listing page")?;

                let draft = self.extract_details(&html, &link);
                if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
                    bail!("listing at {link} is missing title or description");
                }
                Ok(draft)
            }
        })
        .await
    }
}
