//! End-to-end crawl scenarios against a scripted browser.
//!
//! The fake session factory serves canned divar-flavoured pages, so the
//! full pipeline (pagination, batched detail fetches, retries, promotion,
//! orchestration, persistence) runs exactly as in production minus Chrome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use estate_scout::config::CrawlerConfig;
use estate_scout::locations::{CatalogSource, LocationService};
use estate_scout::models::Location;
use estate_scout::orchestrator::{Orchestrator, OrchestratorConfig};
use estate_scout::scrapers::{DivarCrawler, PageSession, SessionFactory, SiteCrawler};
use estate_scout::store::ListingStore;

const BASE_URL: &str = "https://divar.ir";

fn link(id: &str) -> String {
    format!("{BASE_URL}/v/apartment/{id}")
}

fn search_page(ids: &[&str]) -> String {
    let cards: Vec<String> = ids
        .iter()
        .map(|id| format!(r#"<a href="/v/apartment/{id}"><div class="kt-post-card__body">{id}</div></a>"#))
        .collect();
    format!("<html><body><div class=\"post-list\">{}</div></body></html>", cards.join("\n"))
}

fn detail_page(title: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="kt-page-title__title">{title}</h1>
            <div class="post-page__section--padded">توضیحات کامل آگهی</div>
            <div class="kt-base-row">
                <p class="kt-unexpandable-row__title">قیمت کل</p>
                <p class="kt-unexpandable-row__value">۵٬۰۰۰٬۰۰۰٬۰۰۰ تومان</p>
            </div>
        </body></html>"#
    )
}

fn broken_page() -> String {
    "<html><body><p>صفحه در دسترس نیست</p></body></html>".to_string()
}

#[derive(Default)]
struct Fixture {
    /// Scripted responses per URL, consumed in order; the last repeats.
    detail_pages: HashMap<String, Vec<String>>,
    /// Served for any URL without a scripted response.
    search_html: String,
    nav_counts: HashMap<String, usize>,
    scrolls: usize,
}

#[derive(Clone)]
struct FakeSessions {
    state: Arc<Mutex<Fixture>>,
}

impl FakeSessions {
    fn new(search_html: String, detail_pages: HashMap<String, Vec<String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Fixture {
                detail_pages,
                search_html,
                ..Fixture::default()
            })),
        }
    }

    fn nav_count(&self, url: &str) -> usize {
        self.state
            .lock()
            .expect("fixture lock")
            .nav_counts
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn scroll_count(&self) -> usize {
        self.state.lock().expect("fixture lock").scrolls
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            current_url: Mutex::new(None),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<Fixture>>,
    current_url: Mutex<Option<String>>,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        {
            let mut state = self.state.lock().expect("fixture lock");
            *state.nav_counts.entry(url.to_string()).or_default() += 1;
        }
        *self.current_url.lock().expect("url lock") = Some(url.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let current = self
            .current_url
            .lock()
            .expect("url lock")
            .clone()
            .unwrap_or_default();
        let state = self.state.lock().expect("fixture lock");
        if let Some(pages) = state.detail_pages.get(&current) {
            let visits = state.nav_counts.get(&current).copied().unwrap_or(1);
            let index = visits.saturating_sub(1).min(pages.len().saturating_sub(1));
            return Ok(pages[index].clone());
        }
        Ok(state.search_html.clone())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.state.lock().expect("fixture lock").scrolls += 1;
        Ok(())
    }

    async fn click_load_more(&self) -> Result<bool> {
        Ok(false)
    }
}

fn fast_config() -> CrawlerConfig {
    CrawlerConfig {
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
        max_scroll_attempts: 10,
        scroll_settle: Duration::ZERO,
        max_listings_per_location: 0,
        detail_batch_size: 15,
    }
}

fn tehran() -> Location {
    Location {
        name: "Tehran".to_string(),
        slug: "tehran".to_string(),
        level: "city".to_string(),
    }
}

#[tokio::test]
async fn crawl_collects_every_listing_without_retries() {
    let sessions = FakeSessions::new(
        search_page(&["aaa", "bbb", "ccc"]),
        HashMap::from([
            (link("aaa"), vec![detail_page("آگهی اول")]),
            (link("bbb"), vec![detail_page("آگهی دوم")]),
            (link("ccc"), vec![detail_page("آگهی سوم")]),
        ]),
    );
    let crawler = DivarCrawler::new(
        BASE_URL.to_string(),
        Arc::new(sessions.clone()),
        fast_config(),
    );

    let cancel = CancellationToken::new();
    let listings = crawler
        .crawl(&cancel, &tehran())
        .await
        .expect("crawl succeeds");

    assert_eq!(listings.len(), 3);
    // one scroll finds everything, three more confirm stagnation
    assert_eq!(sessions.scroll_count(), 4);
    assert_eq!(
        sessions.nav_count("https://divar.ir/s/tehran/real-estate"),
        1
    );
    for id in ["aaa", "bbb", "ccc"] {
        assert_eq!(sessions.nav_count(&link(id)), 1, "listing {id}");
    }
    assert!(listings
        .iter()
        .all(|draft| draft.location.as_ref().map(|l| l.slug.as_str()) == Some("tehran")));
}

#[tokio::test]
async fn transient_detail_failures_recover_within_the_budget() {
    let sessions = FakeSessions::new(
        search_page(&["aaa", "bbb", "ccc"]),
        HashMap::from([
            (link("aaa"), vec![detail_page("آگهی اول")]),
            // broken twice, complete on the third attempt
            (
                link("bbb"),
                vec![broken_page(), broken_page(), detail_page("آگهی دوم")],
            ),
            (link("ccc"), vec![detail_page("آگهی سوم")]),
        ]),
    );
    let crawler = DivarCrawler::new(
        BASE_URL.to_string(),
        Arc::new(sessions.clone()),
        fast_config(),
    );

    let listings = crawler
        .crawl(&CancellationToken::new(), &tehran())
        .await
        .expect("crawl succeeds");

    assert_eq!(listings.len(), 3);
    assert_eq!(sessions.nav_count(&link("bbb")), 3);
}

#[tokio::test]
async fn a_permanently_broken_listing_is_dropped_not_fatal() {
    let sessions = FakeSessions::new(
        search_page(&["aaa", "bbb", "ccc"]),
        HashMap::from([
            (link("aaa"), vec![detail_page("آگهی اول")]),
            (link("bbb"), vec![detail_page("آگهی دوم")]),
            (link("ccc"), vec![broken_page()]),
        ]),
    );
    let crawler = DivarCrawler::new(
        BASE_URL.to_string(),
        Arc::new(sessions.clone()),
        fast_config(),
    );

    let listings = crawler
        .crawl(&CancellationToken::new(), &tehran())
        .await
        .expect("crawl still succeeds");

    assert_eq!(listings.len(), 2);
    assert!(listings.iter().all(|draft| draft.external_id != "ccc"));
    // exactly the retry budget, no more
    assert_eq!(sessions.nav_count(&link("ccc")), 3);
}

#[tokio::test]
async fn cancellation_returns_partial_results_without_error() {
    let sessions = FakeSessions::new(search_page(&["aaa"]), HashMap::new());
    let crawler = DivarCrawler::new(
        BASE_URL.to_string(),
        Arc::new(sessions.clone()),
        fast_config(),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let listings = crawler
        .crawl(&cancel, &tehran())
        .await
        .expect("cancellation is not an error");
    assert!(listings.is_empty());
    assert_eq!(sessions.scroll_count(), 0);
}

struct FakeCatalog {
    cities: Vec<Location>,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch(&self) -> Result<Vec<Location>> {
        Ok(self.cities.clone())
    }
}

#[tokio::test]
async fn a_full_cycle_lands_in_the_store() {
    let sessions = FakeSessions::new(
        search_page(&["aaa", "bbb", "ccc"]),
        HashMap::from([
            (link("aaa"), vec![detail_page("آگهی اول")]),
            (link("bbb"), vec![detail_page("آگهی دوم")]),
            (link("ccc"), vec![detail_page("آگهی سوم")]),
        ]),
    );
    let crawlers: Vec<Arc<dyn SiteCrawler>> = vec![Arc::new(DivarCrawler::new(
        BASE_URL.to_string(),
        Arc::new(sessions.clone()),
        fast_config(),
    ))];

    let locations = Arc::new(LocationService::new(
        Arc::new(FakeCatalog {
            cities: vec![
                tehran(),
                Location {
                    name: "Mashhad".to_string(),
                    slug: "mashhad".to_string(),
                    level: "city".to_string(),
                },
            ],
        }),
        vec!["Tehran".to_string(), "Mashhad".to_string()],
        Duration::from_secs(3600),
    ));

    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/scout.db?mode=rwc", dir.path().display());
    let store = Arc::new(ListingStore::connect(&url).await.expect("store"));

    let orchestrator = Orchestrator::new(
        crawlers,
        locations,
        Arc::clone(&store),
        OrchestratorConfig {
            chunk_size: 1, // two locations -> two chunks, two sampler windows
            chunk_pause: Duration::from_millis(1),
            sample_interval: Duration::from_millis(5),
            cycle_interval: Duration::from_secs(3600),
        },
    );

    let run = orchestrator.run_cycle().await.expect("cycle succeeds");

    assert_eq!(run.listings.len(), 6);
    assert!(run.failed_locations.is_empty());
    assert!(run.finished_at >= run.started_at);
    assert!(run.avg_cpu >= 0.0 && run.avg_memory >= 0.0);

    use sqlx::Row;
    let posts: i64 = sqlx::query("SELECT COUNT(*) FROM posts")
        .fetch_one(store.pool())
        .await
        .expect("count posts")
        .get(0);
    let histories: i64 = sqlx::query("SELECT COUNT(*) FROM post_histories")
        .fetch_one(store.pool())
        .await
        .expect("count histories")
        .get(0);
    let runs: i64 = sqlx::query("SELECT COUNT(*) FROM crawl_histories")
        .fetch_one(store.pool())
        .await
        .expect("count runs")
        .get(0);

    // both locations surface the same three ads, so identity collapses
    assert_eq!(posts, 3);
    assert_eq!(histories, 3);
    assert_eq!(runs, 1);
}
