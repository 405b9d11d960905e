pub mod browser;
pub mod divar;
pub mod pagination;
pub mod retry;
pub mod sheypoor;
pub mod traits;

pub use browser::ChromeSessionFactory;
pub use divar::DivarCrawler;
pub use sheypoor::SheypoorCrawler;
pub use traits::{PageSession, SessionFactory, SiteCrawler};

use scraper::{Html, Selector};

/// Trimmed text of the first element matching `selector`, or empty.
pub(crate) fn first_text(document: &Html, selector: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::traits::{PageSession, SessionFactory};

    /// Session factory for extractor tests that never touch a browser.
    pub struct NullSessions;

    #[async_trait]
    impl SessionFactory for NullSessions {
        async fn open_session(&self) -> Result<Box<dyn PageSession>> {
            bail!("no browser available in tests")
        }
    }
}
