//! Auto-scroll pagination that stops once the link set stagnates.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::scrapers::traits::PageSession;

/// Consecutive scrolls yielding no unseen links before pagination stops.
/// This is the primary stopping rule; the attempt budget is the backstop.
const STAGNANT_SCROLL_LIMIT: u32 = 3;

#[derive(Debug, Clone)]
pub struct ScrollConfig {
    pub max_attempts: u32,
    pub settle: Duration,
}

/// Exhaustively discover listing links on an infinite-scroll search page.
///
/// Each pass scrolls to the bottom, waits for content to settle, re-extracts
/// links from the rendered page and merges them into an order-preserving
/// deduplicated list. A "load more" control, when present, is triggered once
/// per pass.
pub async fn collect_listing_links(
    session: &dyn PageSession,
    extract_links: impl Fn(&str) -> Vec<String>,
    config: &ScrollConfig,
) -> Result<Vec<String>> {
    let mut links: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stagnant = 0u32;

    for _ in 0..config.max_attempts {
        session.scroll_to_bottom().await?;
        tokio::time::sleep(config.settle).await;

        let html = session.content().await?;
        let mut found_new = false;
        for link in extract_links(&html) {
            if seen.insert(link.clone()) {
                links.push(link);
                found_new = true;
            }
        }

        if found_new {
            stagnant = 0;
        } else {
            stagnant += 1;
        }
        if stagnant >= STAGNANT_SCROLL_LIMIT {
            debug!(links = links.len(), "no new listings after repeated scrolls, stopping");
            break;
        }

        if session.click_load_more().await? {
            tokio::time::sleep(config.settle).await;
        }
    }

    Ok(links)
}
