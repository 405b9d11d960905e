//! Crawler for divar.ir real-estate listings.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::config::CrawlerConfig;
use crate::models::{DraftListing, Location, RentalMetadata, Site};
use crate::scrapers::first_text;
use crate::scrapers::traits::{SessionFactory, SiteCrawler};

pub struct DivarCrawler {
    base_url: String,
    sessions: Arc<dyn SessionFactory>,
    config: CrawlerConfig,
}

impl DivarCrawler {
    pub fn new(base_url: String, sessions: Arc<dyn SessionFactory>, config: CrawlerConfig) -> Self {
        Self {
            base_url,
            sessions,
            config,
        }
    }

    /// Label/value pairs from the unexpandable detail rows.
    fn detail_rows(document: &Html) -> Vec<(String, String)> {
        let row = Selector::parse("div.kt-base-row").unwrap();
        let label = Selector::parse("p.kt-unexpandable-row__title").unwrap();
        let value = Selector::parse("p.kt-unexpandable-row__value").unwrap();

        document
            .select(&row)
            .filter_map(|element| {
                let label = element.select(&label).next()?;
                let value = element.select(&value).next()?;
                Some((
                    label.text().collect::<String>().trim().to_string(),
                    value.text().collect::<String>().trim().to_string(),
                ))
            })
            .collect()
    }

    fn extract_rental_metadata(rows: &[(String, String)]) -> RentalMetadata {
        let mut metadata = RentalMetadata::default();
        for (label, value) in rows {
            match label.as_str() {
                "ظرفیت" => metadata.capacity = value.clone(),
                "روزهای عادی" => metadata.normal_day_price = value.clone(),
                "آخر هفته" => metadata.weekend_price = value.clone(),
                "تعطیلات و مناسبت‌ها" => metadata.holiday_price = value.clone(),
                "هزینهٔ هر نفرِ اضافه" => metadata.extra_person_cost = value.clone(),
                _ => {}
            }
        }
        metadata
    }
}

#[async_trait]
impl SiteCrawler for DivarCrawler {
    fn site(&self) -> Site {
        Site::Divar
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
        // The card body carries no href; its parent anchor does.
        let card = Selector::parse("div.kt-post-card__body").unwrap();

        let mut links = Vec::new();
        for element in document.select(&card) {
            let Some(parent) = element.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if let Some(href) = parent.value().attr("href") {
                links.push(format!("{}{}", self.base_url, href));
            }
        }
        links
    }

    fn extract_details(&self, html: &str, link: &str) -> DraftListing {
        let document = Html::parse_document(html);
        let mut draft = DraftListing::new(Site::Divar, link);

        draft.title = first_text(&document, "h1.kt-page-title__title");
        draft.description = first_text(&document, "div.post-page__section--padded");

        let rows = Self::detail_rows(&document);
        let is_rental = rows
            .iter()
            .any(|(label, _)| label.contains("ودیعه") || label.contains("اجاره"));

        if is_rental {
            let page_text: String = document.root_element().text().collect();
            let is_daily = page_text.contains("روزانه") || page_text.contains("شب");
            if is_daily {
                let metadata = Self::extract_rental_metadata(&rows);
                if !metadata.is_empty() {
                    draft.rental_metadata = Some(metadata);
                }
            } else {
                for (label, value) in &rows {
                    match label.as_str() {
                        "ودیعه" => draft.deposit = value.clone(),
                        "اجارهٔ ماهانه" => draft.monthly_rent = value.clone(),
                        "قیمت کل" => draft.total_price = value.clone(),
                        "قیمت هر متر" => draft.price_per_square_meter = value.clone(),
                        "طبقه" => draft.floor = value.clone(),
                        _ => {}
                    }
                }
            }
        } else {
            for (label, value) in &rows {
                match label.as_str() {
                    "قیمت کل" => draft.total_price = value.clone(),
                    "قیمت هر متر" => draft.price_per_square_meter = value.clone(),
                    "طبقه" => draft.floor = value.clone(),
                    _ => {}
                }
            }
        }

        // Area, construction year and rooms are a positional header table.
        let info_row = Selector::parse("thead + tbody tr.kt-group-row__data-row").unwrap();
        let info_cell =
            Selector::parse("td.kt-group-row-item__value.kt-group-row-item--info-row").unwrap();
        if let Some(row) = document.select(&info_row).next() {
            let cells: Vec<String> = row
                .select(&info_cell)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            if let Some(area) = cells.first() {
                draft.area = area.clone();
            }
            if let Some(year) = cells.get(1) {
                draft.year_built = year.clone();
            }
            if let Some(rooms) = cells.get(2) {
                draft.rooms = rooms.clone();
            }
        }

        // Amenities live in the last group table; disabled cells are the
        // amenities the listing does not have.
        let table = Selector::parse("table.kt-group-row").unwrap();
        let feature_cell =
            Selector::parse("tbody tr.kt-group-row__data-row td.kt-group-row-item__value").unwrap();
        if let Some(features_table) = document.select(&table).last() {
            for cell in features_table.select(&feature_cell) {
                let class = cell.value().attr("class").unwrap_or_default();
                if class.contains("kt-body--stable") && !class.contains("kt-group-row-item--disabled")
                {
                    let feature = cell.text().collect::<String>().trim().to_string();
                    if !feature.is_empty() {
                        draft.features.push(feature);
                    }
                }
            }
        }

        let subtitle = first_text(&document, "div.kt-page-title__subtitle");
        if let Some(neighborhood) = subtitle.split('،').nth(1) {
            draft.neighborhood = neighborhood.trim().to_string();
        }

        let slide = Selector::parse("div.kt-base-carousel__slide img.kt-image-block__image").unwrap();
        for image in document.select(&slide) {
            if let Some(src) = image.value().attr("src") {
                draft.images.push(src.to_string());
            }
        }

        draft
    }
}
