use std::sync::Arc;

use estate_scout::config::{self, Config};
use estate_scout::locations::{LocationService, RemoteCatalog};
use estate_scout::orchestrator::{Orchestrator, OrchestratorConfig};
use estate_scout::scrapers::{
    ChromeSessionFactory, DivarCrawler, SessionFactory, SheypoorCrawler, SiteCrawler,
};
use estate_scout::store::ListingStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!("🏠 estate-scout starting");

    let store = Arc::new(ListingStore::connect(&config.database_url).await?);

    let allowed = config::load_allowed_locations(&config.app_settings_path)?;
    info!(allowed = allowed.len(), "loaded allow-listed locations");
    let locations = Arc::new(LocationService::new(
        Arc::new(RemoteCatalog::new(config.cities_api_url.clone())),
        allowed,
        config.city_cache_ttl,
    ));

    let sessions: Arc<dyn SessionFactory> =
        Arc::new(ChromeSessionFactory::new(config.navigation_timeout)?);
    let crawlers: Vec<Arc<dyn SiteCrawler>> = vec![
        Arc::new(DivarCrawler::new(
            config.divar_base_url.clone(),
            Arc::clone(&sessions),
            config.crawler(),
        )),
        Arc::new(SheypoorCrawler::new(
            config.sheypoor_base_url.clone(),
            sessions,
            config.crawler(),
        )),
    ];

    let orchestrator = Orchestrator::new(
        crawlers,
        locations,
        store,
        OrchestratorConfig {
            chunk_size: config.chunk_size,
            chunk_pause: config.chunk_pause,
            sample_interval: config.sample_interval,
            cycle_interval: config.cycle_interval,
        },
    );

    orchestrator.run().await;
    Ok(())
}
