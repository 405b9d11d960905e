use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source website of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Site {
    Divar,
    Sheypoor,
}

impl Site {
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Divar => "divar",
            Site::Sheypoor => "sheypoor",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crawl target from the remote city catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub level: String,
}

/// Short-term rental pricing, present on daily-rental listings only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RentalMetadata {
    pub capacity: String,
    pub normal_day_price: String,
    pub weekend_price: String,
    pub holiday_price: String,
    pub extra_person_cost: String,
}

impl RentalMetadata {
    pub fn is_empty(&self) -> bool {
        self.capacity.is_empty()
            && self.normal_day_price.is_empty()
            && self.weekend_price.is_empty()
            && self.holiday_price.is_empty()
            && self.extra_person_cost.is_empty()
    }
}

/// Unvalidated extraction result straight off a listing page.
///
/// All value fields are free text exactly as rendered by the site; they are
/// converted to canonical numbers only when the draft is promoted to a
/// [`NormalizedListing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftListing {
    pub external_id: String,
    pub link: String,
    pub site: Site,
    pub title: String,
    pub description: String,
    pub neighborhood: String,
    pub price: String,
    pub total_price: String,
    pub price_per_square_meter: String,
    pub deposit: String,
    pub monthly_rent: String,
    pub area: String,
    pub year_built: String,
    pub rooms: String,
    pub floor: String,
    pub features: Vec<String>,
    pub images: Vec<String>,
    pub rental_metadata: Option<RentalMetadata>,
    pub location: Option<Location>,
}

impl DraftListing {
    /// An empty draft for `link`, with the external id taken from the final
    /// path segment of the URL.
    pub fn new(site: Site, link: &str) -> Self {
        let external_id = link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            external_id,
            link: link.to_string(),
            site,
            title: String::new(),
            description: String::new(),
            neighborhood: String::new(),
            price: String::new(),
            total_price: String::new(),
            price_per_square_meter: String::new(),
            deposit: String::new(),
            monthly_rent: String::new(),
            area: String::new(),
            year_built: String::new(),
            rooms: String::new(),
            floor: String::new(),
            features: Vec::new(),
            images: Vec::new(),
            rental_metadata: None,
            location: None,
        }
    }
}

/// Listing with canonical numeric fields, safe to hand to persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub external_id: String,
    pub site: Site,
    pub link: String,
    pub title: String,
    pub description: String,
    pub city: String,
    pub neighborhood: String,
    pub price: i64,
    pub deposit: i64,
    pub rent: i64,
    pub area: i64,
    pub rooms: i64,
    pub age: i64,
    pub floor: i64,
    pub has_storage: bool,
    pub has_parking: bool,
    pub has_elevator: bool,
    pub images: Vec<String>,
    pub rental_metadata: Option<RentalMetadata>,
}

/// One full scheduled execution of the orchestrator across all chunks
#[derive(Debug, Clone, Serialize)]
pub struct CrawlRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub request_count: u64,
    pub listings: Vec<NormalizedListing>,
    pub failed_locations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_is_final_path_segment() {
        let draft = DraftListing::new(Site::Divar, "https://divar.ir/v/some-title/wZxkpq2e");
        assert_eq!(draft.external_id, "wZxkpq2e");

        let trailing = DraftListing::new(Site::Sheypoor, "https://www.sheypoor.com/v/12345/");
        assert_eq!(trailing.external_id, "12345");
    }
}
