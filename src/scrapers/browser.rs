//! Headless-Chrome page sessions with anti-blocking headers.
//!
//! One browser process is launched per factory; every session is a fresh
//! tab carrying a randomized user-agent and a generic referer. Chrome's CDP
//! client is blocking, so every call runs on the blocking thread pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use tracing::info;

use crate::scrapers::traits::{PageSession, SessionFactory};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.121 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Linux; Android 10; SM-G975F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15A372 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:92.0) Gecko/20100101 Firefox/92.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.96 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

const REFERER: &str = "https://google.com";

/// Scroll the viewport to the bottom of the document.
const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Click the "load more" control when the site renders one instead of
/// loading further results on scroll.
const LOAD_MORE_JS: &str = r#"(() => {
    const button = document.querySelector('div[class*="load-more"] button, button[class*="load-more"]');
    if (button) { button.click(); return true; }
    return false;
})()"#;

/// Launches one headless Chrome and hands out tabs as page sessions
pub struct ChromeSessionFactory {
    browser: Arc<Browser>,
    navigation_timeout: Duration,
}

impl ChromeSessionFactory {
    pub fn new(navigation_timeout: Duration) -> Result<Self> {
        info!("launching headless Chrome");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("building Chrome launch options")?;
        let browser = Browser::new(options).context("launching Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
            navigation_timeout,
        })
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        let browser = Arc::clone(&self.browser);
        let timeout = self.navigation_timeout;

        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser.new_tab().context("opening browser tab")?;
            tab.set_default_timeout(timeout);

            let user_agent = USER_AGENTS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(USER_AGENTS[0]);
            tab.set_user_agent(user_agent, None, None)
                .context("setting user agent")?;
            tab.set_extra_http_headers(HashMap::from([("Referer", REFERER)]))
                .context("setting referer header")?;

            Ok(tab)
        })
        .await
        .context("browser task panicked")??;

        Ok(Box::new(ChromeSession { tab }))
    }
}

struct ChromeSession {
    tab: Arc<Tab>,
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // The browser only reaps tabs at shutdown; close eagerly so long
        // runs do not accumulate renderer processes.
        let _ = self.tab.close(true);
    }
}

impl ChromeSession {
    async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || operation(tab))
            .await
            .context("browser task panicked")?
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .with_context(|| format!("navigating to {url}"))?;
            tab.wait_until_navigated().context("waiting for page load")?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        self.blocking(|tab| tab.get_content().context("reading rendered page content"))
            .await
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.blocking(|tab| {
            tab.evaluate(SCROLL_JS, false).context("scrolling page")?;
            Ok(())
        })
        .await
    }

    async fn click_load_more(&self) -> Result<bool> {
        self.blocking(|tab| {
            let result = tab
                .evaluate(LOAD_MORE_JS, false)
                .context("querying load-more control")?;
            Ok(matches!(result.value, Some(serde_json::Value::Bool(true))))
        })
        .await
    }
}
