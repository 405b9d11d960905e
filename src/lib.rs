//! Harvests real-estate listings from Iranian listing sites, normalizes the
//! localized page content into uniform records and persists them for
//! downstream search.
//!
//! The crate is organized leaf-first: [`normalize`] holds the pure
//! digit/price conversions, [`scrapers`] the per-site crawlers and their
//! shared pagination/retry machinery, [`sampler`] the per-chunk resource
//! monitor, and [`orchestrator`] the scheduler tying them together.

pub mod config;
pub mod locations;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod sampler;
pub mod scrapers;
pub mod store;
