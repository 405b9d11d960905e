//! Crawler for sheypoor.com real-estate listings.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::CrawlerConfig;
use crate::models::{DraftListing, Location, RentalMetadata, Site};
use crate::scrapers::first_text;
use crate::scrapers::traits::{SessionFactory, SiteCrawler};

pub struct SheypoorCrawler {
    base_url: String,
    sessions: Arc<dyn SessionFactory>,
    config: CrawlerConfig,
}

impl SheypoorCrawler {
    pub fn new(base_url: String, sessions: Arc<dyn SessionFactory>, config: CrawlerConfig) -> Self {
        Self {
            base_url,
            sessions,
            config,
        }
    }

    /// Feature rows are name/value paragraph pairs inside one container.
    fn feature_rows(document: &Html) -> Vec<(String, String)> {
        let row = Selector::parse("div.C7Rh9").unwrap();
        let name = Selector::parse("p._2e124").unwrap();
        let value = Selector::parse("p._874-x").unwrap();

        document
            .select(&row)
            .filter_map(|element| {
                let name = element.select(&name).next()?;
                let value = element.select(&value).next()?;
                let name = name.text().collect::<String>().trim().to_string();
                let value = value.text().collect::<String>().trim().to_string();
                if name.is_empty() || value.is_empty() {
                    return None;
                }
                Some((name, value))
            })
            .collect()
    }
}

#[async_trait]
impl SiteCrawler for SheypoorCrawler {
    fn site(&self) -> Site {
        Site::Sheypoor
    }

    fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    fn sessions(&self) -> &dyn SessionFactory {
        self.sessions.as_ref()
    }

    fn search_url(&self, location: &Location) -> String {
        format!("{}/s/{}/real-estate", self.base_url, location.slug)
    }

    fn extract_listing_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let anchor = Selector::parse("a.flex").unwrap();

        let mut links = Vec::new();
        for element in document.select(&anchor) {
            if let Some(href) = element.value().attr("href") {
                links.push(format!("{}{}", self.base_url, href));
            }
        }
        links
    }

    fn extract_details(&self, html: &str, link: &str) -> DraftListing {
        let document = Html::parse_document(html);
        let mut draft = DraftListing::new(Site::Sheypoor, link);

        draft.title = first_text(&document, "h1#listing-title");
        draft.description = first_text(&document, "div.VNOCj div.MQJ5W");
        draft.price = first_text(&document, "div.tOq3m span strong");

        // Breadcrumb: first entry is the city, the rest the neighborhood.
        let crumb = Selector::parse("nav#UVpPz ul li a").unwrap();
        let crumbs: Vec<String> = document
            .select(&crumb)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if crumbs.len() > 1 {
            draft.neighborhood = crumbs[1..].join("، ");
        }

        let rows = Self::feature_rows(&document);
        for (name, value) in &rows {
            match name.as_str() {
                "متراژ" => draft.area = value.clone(),
                "سال ساخت" => draft.year_built = value.clone(),
                "اتاق‌ها" => draft.rooms = value.clone(),
                "قیمت هر متر مربع" => draft.price_per_square_meter = value.clone(),
                "طبقه" => draft.floor = value.clone(),
                _ => {}
            }
            draft.features.push(format!("{name}: {value}"));
        }

        let slide = Selector::parse("div.swiper-slide img").unwrap();
        for image in document.select(&slide) {
            if let Some(src) = image.value().attr("src") {
                if !src.is_empty() {
                    draft.images.push(src.to_string());
                }
            }
        }

        let metadata = RentalMetadata {
            capacity: first_text(&document, "div.rental-capacity"),
            normal_day_price: first_text(&document, "span.normal-day-price"),
            weekend_price: first_text(&document, "span.weekend-price"),
            holiday_price: first_text(&document, "span.holiday-price"),
            extra_person_cost: first_text(&document, "span.extra-person-cost"),
        };
        if !metadata.is_empty() {
            draft.rental_metadata = Some(metadata);
        }

        draft
    }
}
