//! Locale normalization for extracted listing text.
//!
//! Listing sites render every number with Persian (and occasionally
//! Arabic-Indic) digits and Persian separators. Everything here is a pure
//! function over the extracted strings so drafts can be promoted to
//! canonical listings without touching the network again.

use chrono::{DateTime, Datelike, Utc};

use crate::models::{DraftListing, NormalizedListing, RentalMetadata};

const STORAGE_FEATURE: &str = "انباری";
const PARKING_FEATURE: &str = "پارکینگ";
const ELEVATOR_FEATURE: &str = "آسانسور";

/// Replace Persian and Arabic-Indic digits with ASCII digits and the
/// Persian thousands separator with a plain comma. Idempotent.
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '۰'..='۹' => ascii_digit(ch as u32 - '۰' as u32),
            '٠'..='٩' => ascii_digit(ch as u32 - '٠' as u32),
            '٬' => ',',
            _ => ch,
        })
        .collect()
}

fn ascii_digit(value: u32) -> char {
    (b'0' + value as u8) as char
}

/// Parse a localized price such as "۱۲٬۵۰۰٬۰۰۰ تومان" into an integer.
/// Unparseable input yields 0, matching how the sites render absent prices.
pub fn parse_price(raw: &str) -> i64 {
    let cleaned = normalize_digits(raw)
        .replace("تومان", "")
        .replace("ریال", "")
        .replace(',', "");
    cleaned.trim().parse().unwrap_or(0)
}

/// Parse a localized count (area, rooms) by keeping only digit characters.
pub fn parse_count(raw: &str) -> i64 {
    let digits: String = normalize_digits(raw)
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Parse the floor number from values like "۳ از ۵" (3 out of 5).
pub fn parse_floor(raw: &str) -> i64 {
    normalize_digits(raw)
        .split_whitespace()
        .next()
        .map(parse_count)
        .unwrap_or(0)
}

/// Building age derived from the construction year.
///
/// Both sites publish Jalali years; anything in 1300..1500 is measured
/// against the current Jalali year (Gregorian minus the 621-year offset),
/// other values against the Gregorian year.
pub fn age_from_year(raw: &str, now: DateTime<Utc>) -> i64 {
    let year = parse_count(raw);
    if year == 0 {
        return 0;
    }
    let gregorian = i64::from(now.year());
    let current = if (1300..1500).contains(&year) {
        gregorian - 621
    } else {
        gregorian
    };
    (current - year).max(0)
}

/// True when any feature token mentions `needle`.
pub fn has_feature(features: &[String], needle: &str) -> bool {
    features.iter().any(|feature| feature.contains(needle))
}

fn normalize_rental(metadata: &RentalMetadata) -> RentalMetadata {
    RentalMetadata {
        capacity: normalize_digits(&metadata.capacity),
        normal_day_price: normalize_digits(&metadata.normal_day_price),
        weekend_price: normalize_digits(&metadata.weekend_price),
        holiday_price: normalize_digits(&metadata.holiday_price),
        extra_person_cost: normalize_digits(&metadata.extra_person_cost),
    }
}

/// Promote a draft to a normalized listing.
///
/// Returns `None` when the draft is missing a title or description; such
/// drafts are extraction failures and never reach persistence.
pub fn promote(draft: &DraftListing, now: DateTime<Utc>) -> Option<NormalizedListing> {
    if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
        return None;
    }

    let price = match parse_price(&draft.total_price) {
        0 => parse_price(&draft.price),
        value => value,
    };

    Some(NormalizedListing {
        external_id: draft.external_id.clone(),
        site: draft.site,
        link: draft.link.clone(),
        title: normalize_digits(draft.title.trim()),
        description: normalize_digits(draft.description.trim()),
        city: draft
            .location
            .as_ref()
            .map(|location| location.name.clone())
            .unwrap_or_default(),
        neighborhood: normalize_digits(draft.neighborhood.trim()),
        price,
        deposit: parse_price(&draft.deposit),
        rent: parse_price(&draft.monthly_rent),
        area: parse_count(&draft.area),
        rooms: parse_count(&draft.rooms),
        age: age_from_year(&draft.year_built, now),
        floor: parse_floor(&draft.floor),
        has_storage: has_feature(&draft.features, STORAGE_FEATURE),
        has_parking: has_feature(&draft.features, PARKING_FEATURE),
        has_elevator: has_feature(&draft.features, ELEVATOR_FEATURE),
        images: draft.images.clone(),
        rental_metadata: draft.rental_metadata.as_ref().map(normalize_rental),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Site;
    use chrono::TimeZone;

    #[test]
    fn digit_normalization_is_idempotent() {
        let samples = [
            "۱۲٬۵۰۰٬۰۰۰ تومان",
            "٣ اتاق",
            "already ascii 42",
            "",
            "مخلوط ۱۲ و ٣٤ و 56",
        ];
        for sample in samples {
            let once = normalize_digits(sample);
            assert_eq!(normalize_digits(&once), once, "input: {sample}");
        }
    }

    #[test]
    fn parses_localized_prices() {
        assert_eq!(parse_price("۱۲٬۵۰۰٬۰۰۰ تومان"), 12_500_000);
        assert_eq!(parse_price("2,000,000 ریال"), 2_000_000);
        assert_eq!(parse_price("توافقی"), 0);
        assert_eq!(parse_price(""), 0);
    }

    #[test]
    fn parses_counts_and_floors() {
        assert_eq!(parse_count("۷۵ متر"), 75);
        assert_eq!(parse_count("اتاق"), 0);
        assert_eq!(parse_floor("۳ از ۵"), 3);
        assert_eq!(parse_floor("همکف"), 0);
    }

    #[test]
    fn age_handles_jalali_years() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        // 2026 Gregorian is 1405 Jalali
        assert_eq!(age_from_year("۱۳۹۵", now), 10);
        assert_eq!(age_from_year("2020", now), 6);
        assert_eq!(age_from_year("", now), 0);
    }

    #[test]
    fn derives_amenity_flags() {
        let features = vec!["پارکینگ".to_string(), "انباری بزرگ".to_string()];
        assert!(has_feature(&features, PARKING_FEATURE));
        assert!(has_feature(&features, STORAGE_FEATURE));
        assert!(!has_feature(&features, ELEVATOR_FEATURE));
    }

    #[test]
    fn promotion_rejects_incomplete_drafts() {
        let now = Utc::now();
        let mut draft = DraftListing::new(Site::Divar, "https://divar.ir/v/abc");
        draft.description = "توضیحات".to_string();
        assert!(promote(&draft, now).is_none());

        draft.title = "آپارتمان ۷۵ متری".to_string();
        let listing = promote(&draft, now).expect("complete draft promotes");
        assert_eq!(listing.title, "آپارتمان 75 متری");
    }

    #[test]
    fn promotion_normalizes_numeric_fields() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let mut draft = DraftListing::new(Site::Divar, "https://divar.ir/v/abc");
        draft.title = "آپارتمان".to_string();
        draft.description = "توضیحات".to_string();
        draft.total_price = "۵٬۰۰۰٬۰۰۰٬۰۰۰ تومان".to_string();
        draft.area = "۷۵".to_string();
        draft.rooms = "۲".to_string();
        draft.year_built = "۱۴۰۰".to_string();
        draft.floor = "۳ از ۷".to_string();
        draft.features = vec!["آسانسور".to_string()];

        let listing = promote(&draft, now).expect("complete draft promotes");
        assert_eq!(listing.price, 5_000_000_000);
        assert_eq!(listing.area, 75);
        assert_eq!(listing.rooms, 2);
        assert_eq!(listing.age, 5);
        assert_eq!(listing.floor, 3);
        assert!(listing.has_elevator);
        assert!(!listing.has_parking);
    }
}
