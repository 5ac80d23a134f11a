//! Page and odds retrieval behind a trait seam.
//!
//! The pipeline consumes already-rendered markup; retrieval is a
//! collaborator with bounded timeouts. A timed-out or missing page means
//! "no data this cycle"; the scheduler retries on its next eligible cycle,
//! never in-process.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use super::parsers::table::looks_like_race_card;
use super::rate_limiter::RateLimiter;
use super::{race_card_urls, EN_PATHS, GRAPHQL_URL, ZH_PATHS};
use crate::config::ScraperConfig;

/// Language variant of a race card page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Zh,
    En,
}

impl Lang {
    fn paths(&self) -> &'static [&'static str] {
        match self {
            Lang::Zh => &ZH_PATHS,
            Lang::En => &EN_PATHS,
        }
    }
}

/// Retrieval seam between the pipeline and the network.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch one race's page in one language variant. `None` means the
    /// page could not be retrieved at all this cycle.
    async fn race_card_page(
        &self,
        lang: Lang,
        date: NaiveDate,
        venue_code: &str,
        race_no: u8,
    ) -> Result<Option<String>>;

    /// Fetch the WIN/PLA odds JSON for one race.
    async fn odds_json(&self, date: NaiveDate, venue_code: &str, race_no: u8) -> Result<String>;
}

/// GraphQL query for the WIN/PLA pools of one race.
const ODDS_QUERY: &str = r#"
query racing($date: String, $venueCode: String, $oddsTypes: [OddsType], $raceNo: Int) {
  raceMeetings(date: $date, venueCode: $venueCode) {
    pmPools(oddsTypes: $oddsTypes, raceNo: $raceNo) {
      id
      status
      sellStatus
      oddsType
      lastUpdateTime
      oddsNodes {
        combString
        oddsValue
        hotFavourite
        oddsDropValue
      }
    }
  }
}
"#;

/// reqwest-backed fetcher with a politeness limiter.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl HttpFetcher {
    pub fn new(cfg: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120 Safari/537.36",
            )
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(cfg.requests_per_minute, cfg.fetch_delay_secs),
        })
    }
}

impl PageFetcher for HttpFetcher {
    /// The page has drifted across path casings and date parameter names;
    /// candidates are tried in order until one passes the starter-grid
    /// probe. The last retrieved body is returned otherwise, so the caller
    /// can still attempt a degraded parse.
    async fn race_card_page(
        &self,
        lang: Lang,
        date: NaiveDate,
        venue_code: &str,
        race_no: u8,
    ) -> Result<Option<String>> {
        let mut last_body: Option<String> = None;

        for url in race_card_urls(lang.paths(), date, venue_code, race_no) {
            self.limiter.acquire().await;

            let body = match self.client.get(&url).send().await {
                Ok(resp) => match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(url = %url, error = %e, "failed to read page body");
                        continue;
                    }
                },
                Err(e) => {
                    debug!(url = %url, error = %e, "page fetch failed");
                    continue;
                }
            };

            if looks_like_race_card(&body) {
                return Ok(Some(body));
            }
            last_body = Some(body);
        }

        Ok(last_body)
    }

    async fn odds_json(&self, date: NaiveDate, venue_code: &str, race_no: u8) -> Result<String> {
        self.limiter.acquire().await;

        let payload = json!({
            "operationName": "racing",
            "variables": {
                "date": date.format("%Y-%m-%d").to_string(),
                "venueCode": venue_code,
                "raceNo": race_no,
                "oddsTypes": ["WIN", "PLA"],
            },
            "query": ODDS_QUERY.trim(),
        });

        let resp = self
            .client
            .post(GRAPHQL_URL)
            .json(&payload)
            .send()
            .await
            .context("odds request failed")?
            .error_for_status()
            .context("odds request rejected")?;

        resp.text().await.context("failed to read odds body")
    }
}
