//! Scraper module for the racing.hkjc.com race card pages and the
//! info.cld.hkjc.com GraphQL odds endpoint.
//!
//! Provides page/odds retrieval, politeness rate limiting, and the parsers
//! that turn raw markup into canonical records.

pub mod fetch;
pub mod parsers;
pub mod rate_limiter;

pub use fetch::{HttpFetcher, Lang, PageFetcher};
pub use rate_limiter::RateLimiter;

use chrono::NaiveDate;

/// Base URL for race card pages
pub const BASE_URL: &str = "https://racing.hkjc.com";

/// GraphQL endpoint for pool odds
pub const GRAPHQL_URL: &str = "https://info.cld.hkjc.com/graphql/base/";

/// Race card paths, Chinese variant (the site serves both casings)
pub const ZH_PATHS: [&str; 2] = [
    "/racing/information/Chinese/Racing/RaceCard.aspx",
    "/racing/information/Chinese/racing/RaceCard.aspx",
];

/// Race card paths, English variant
pub const EN_PATHS: [&str; 2] = [
    "/racing/information/English/Racing/RaceCard.aspx",
    "/racing/information/English/racing/RaceCard.aspx",
];

/// Date query keys the site has used across revisions
pub const DATE_KEYS: [&str; 3] = ["RaceDate", "RDate", "racedate"];

/// Build candidate race card URLs for one (date, venue, race) in one
/// language variant. The page has drifted between path casings and date
/// parameter names, so every combination is a candidate.
pub fn race_card_urls(paths: &[&str], date: NaiveDate, venue_code: &str, race_no: u8) -> Vec<String> {
    let date_str = date.format("%Y/%m/%d").to_string();
    let mut urls = Vec::with_capacity(paths.len() * DATE_KEYS.len());
    for path in paths {
        for key in DATE_KEYS {
            urls.push(format!(
                "{}{}?{}={}&RaceNo={}&Racecourse={}",
                BASE_URL, path, key, date_str, race_no, venue_code
            ));
        }
    }
    urls
}

/// Normalize a venue argument to the two known codes ("HV", else "ST").
pub fn normalize_venue(venue: &str) -> &'static str {
    if venue.eq_ignore_ascii_case("HV") {
        "HV"
    } else {
        "ST"
    }
}

/// Resolve an image reference against the site base when it is relative.
pub fn absolute_url(src: &str) -> String {
    if src.starts_with("http") {
        src.to_string()
    } else if src.starts_with('/') {
        format!("{}{}", BASE_URL, src)
    } else {
        format!("{}/{}", BASE_URL, src)
    }
}
