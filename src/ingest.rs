//! Ingestion cycles: the meeting crawl loop, the odds-only cycle, and the
//! scheduler-driven tick that decides which fixtures fire.
//!
//! Each cycle is synchronous end-to-end (fetch, parse, persist); no
//! fixture's failure halts the others, and nothing retries in-process;
//! the scheduler cadence is the retry mechanism.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use scraper::Html;
use tracing::{debug, info, warn};

use crate::scraper::parsers::race_card::detect_meeting_info;
use crate::scraper::parsers::{build_odds_map, RaceCardParser};
use crate::scraper::{Lang, PageFetcher};
use crate::scheduler::should_fire;
use crate::storage::{record_quotes, SnapshotStats, SqliteStore};
use crate::types::{Meeting, OddsQuote};

/// Hard cap on race numbers probed per meeting.
pub const MAX_RACES_PER_MEETING: u8 = 20;

/// Consecutive raceless race numbers that signal the end of the meeting.
pub const END_OF_MEETING_MISSES: u32 = 2;

/// Counts from one scheduler tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    pub meetings_crawled: usize,
    pub races_polled: usize,
}

/// Crawl a full meeting: race numbers ascending until the cap or until two
/// consecutive numbers yield no usable grid. Races with no valid entries
/// or reserves are skipped without ending the crawl.
pub async fn crawl_meeting<F: PageFetcher>(
    fetcher: &F,
    date: NaiveDate,
    venue_code: &str,
    max_races: Option<u8>,
) -> Result<Meeting> {
    let mut meeting = Meeting {
        date: Some(date),
        venue_code: venue_code.to_string(),
        venue_name: default_venue_name(venue_code).to_string(),
        races: Vec::new(),
    };

    let cap = max_races.unwrap_or(MAX_RACES_PER_MEETING).min(MAX_RACES_PER_MEETING);
    let mut consecutive_misses = 0u32;
    let mut last_ok_html: Option<String> = None;

    for race_no in 1..=cap {
        let html_zh = match fetcher.race_card_page(Lang::Zh, date, venue_code, race_no).await {
            Ok(body) => body,
            Err(e) => {
                warn!(race_no, error = %e, "local variant fetch failed");
                None
            }
        };
        let html_en = match fetcher.race_card_page(Lang::En, date, venue_code, race_no).await {
            Ok(body) => body,
            Err(e) => {
                warn!(race_no, error = %e, "foreign variant fetch failed");
                None
            }
        };

        let Some(mut race) =
            RaceCardParser::parse(html_zh.as_deref(), html_en.as_deref(), Some(date))
        else {
            consecutive_misses += 1;
            debug!(race_no, consecutive_misses, "no usable grid");
            if consecutive_misses >= END_OF_MEETING_MISSES {
                break;
            }
            continue;
        };

        consecutive_misses = 0;
        last_ok_html = html_zh.or(html_en);

        if race.entries.is_empty() && race.reserves.is_empty() {
            debug!(race_no, "grid present but no valid entries; skipping race");
            continue;
        }

        race.race_no = race_no;
        info!(
            race_no,
            entries = race.entries.len(),
            reserves = race.reserves.len(),
            "race parsed"
        );
        meeting.races.push(race);
    }

    // Correct meeting-level date and venue label from the last good page
    if let Some(html) = last_ok_html {
        let doc = Html::parse_document(&html);
        let (page_date, venue_name) = detect_meeting_info(&doc);
        if let Some(d) = page_date {
            meeting.date = Some(d);
        }
        if let Some(name) = venue_name {
            meeting.venue_name = name.to_string();
        }
    }

    Ok(meeting)
}

fn default_venue_name(venue_code: &str) -> &'static str {
    match venue_code {
        "HV" => "跑馬地",
        "ST" => "沙田",
        _ => "",
    }
}

/// Crawl and persist one meeting's race card. Returns (races, entries)
/// written.
pub async fn ingest_racecard<F: PageFetcher>(
    fetcher: &F,
    store: &mut SqliteStore,
    date: NaiveDate,
    venue_code: &str,
) -> Result<(usize, usize)> {
    let meeting = crawl_meeting(fetcher, date, venue_code, None).await?;
    let (races, entries) = store.store_meeting(&meeting)?;
    info!(%date, venue_code, races, entries, "race card stored");
    Ok((races, entries))
}

/// One odds-only cycle for a single race: fetch, decode, persist latest
/// projection plus change-only snapshots.
pub async fn ingest_odds<F: PageFetcher>(
    fetcher: &F,
    store: &mut SqliteStore,
    date: NaiveDate,
    venue_code: &str,
    race_no: u8,
    now: DateTime<FixedOffset>,
) -> Result<SnapshotStats> {
    let json = fetcher.odds_json(date, venue_code, race_no).await?;
    let odds = build_odds_map(&json)?;
    if odds.is_empty() {
        debug!(%date, venue_code, race_no, "empty odds map; nothing to persist");
        return Ok(SnapshotStats::default());
    }

    let stats = record_quotes(store, date, venue_code, race_no, &odds, now)?;
    info!(
        %date,
        venue_code,
        race_no,
        latest = stats.latest_updated,
        snapshots = stats.snapshots_appended,
        "odds recorded"
    );
    Ok(stats)
}

/// Flatten a decoded odds map into display quotes.
pub fn quotes_for_display(
    date: NaiveDate,
    venue_code: &str,
    race_no: u8,
    odds: &std::collections::BTreeMap<u32, crate::scraper::parsers::PoolOdds>,
) -> Vec<OddsQuote> {
    let mut quotes = Vec::new();
    for (&horse_no, pool_odds) in odds {
        for pool in crate::types::PoolType::ALL {
            quotes.push(OddsQuote {
                date,
                venue_code: venue_code.to_string(),
                race_no,
                horse_no,
                pool_type: pool.as_str(),
                value: pool_odds.get(pool),
            });
        }
    }
    quotes
}

/// One scheduler invocation: evaluate every registered fixture fresh and
/// fire whatever is due. Failures are isolated per fixture.
pub async fn run_tick<F: PageFetcher>(
    fetcher: &F,
    store: &mut SqliteStore,
    now: DateTime<FixedOffset>,
) -> Result<TickReport> {
    let mut report = TickReport::default();
    let today = now.date_naive();

    // Meeting-level pass: race cards from the draw-date gate onward
    for fixture in store.upcoming_meetings(today)? {
        if !fixture.watch_open(now) {
            continue;
        }
        if store.has_racecard(fixture.race_date, &fixture.venue_code)? {
            debug!(
                date = %fixture.race_date,
                venue = %fixture.venue_code,
                "race card already stored"
            );
            continue;
        }
        match ingest_racecard(fetcher, store, fixture.race_date, &fixture.venue_code).await {
            Ok(_) => report.meetings_crawled += 1,
            Err(e) => warn!(
                date = %fixture.race_date,
                venue = %fixture.venue_code,
                error = %e,
                "race card ingestion failed"
            ),
        }
    }

    // Race-level pass: odds for fixtures inside their watch windows
    for fixture in store.upcoming_races(today)? {
        let state = fixture.state(now);
        if !should_fire(now, state) {
            continue;
        }
        match ingest_odds(
            fetcher,
            store,
            fixture.race_date,
            &fixture.venue_code,
            fixture.race_no,
            now,
        )
        .await
        {
            Ok(_) => report.races_polled += 1,
            Err(e) => warn!(
                date = %fixture.race_date,
                venue = %fixture.venue_code,
                race_no = fixture.race_no,
                error = %e,
                "odds ingestion failed"
            ),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::TimeZone;

    use crate::storage::QuoteStore;
    use crate::types::{hk_offset, PoolType};

    /// Scripted fetcher; records every call for assertions.
    #[derive(Default)]
    struct FakeFetcher {
        zh_pages: HashMap<u8, String>,
        en_pages: HashMap<u8, String>,
        odds: HashMap<u8, String>,
        calls: RefCell<Vec<String>>,
    }

    impl PageFetcher for FakeFetcher {
        async fn race_card_page(
            &self,
            lang: Lang,
            _date: NaiveDate,
            _venue_code: &str,
            race_no: u8,
        ) -> Result<Option<String>> {
            self.calls.borrow_mut().push(format!("page:{:?}:{}", lang, race_no));
            let pages = match lang {
                Lang::Zh => &self.zh_pages,
                Lang::En => &self.en_pages,
            };
            Ok(pages.get(&race_no).cloned())
        }

        async fn odds_json(
            &self,
            _date: NaiveDate,
            _venue_code: &str,
            race_no: u8,
        ) -> Result<String> {
            self.calls.borrow_mut().push(format!("odds:{}", race_no));
            self.odds
                .get(&race_no)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no odds scripted for race {}", race_no))
        }
    }

    fn race_page(off_time: &str) -> String {
        format!(
            r#"<html><body>
            <h1>第 1 場 - 測試賽 {off_time}</h1>
            <div>2025年10月22日 跑馬地</div>
            <table class="f_fs12 table_bd">
              <tr><th>馬號</th><th>馬名</th><th>騎師</th><th>檔位</th><th>練馬師</th></tr>
              <tr><td>1</td><td><a href="/Horse/Horse.aspx?Id=1">好馬一</a></td>
                  <td>潘頓</td><td>3</td><td>呂健威</td></tr>
              <tr><td>2</td><td><a href="/Horse/Horse.aspx?Id=2">好馬二</a></td>
                  <td>何澤堯</td><td>7</td><td>姚本輝</td></tr>
            </table>
            </body></html>"#
        )
    }

    fn odds_json(win1: f64) -> String {
        format!(
            r#"{{"data":{{"raceMeetings":[{{"pmPools":[
                {{"oddsType":"WIN","oddsNodes":[
                    {{"combString":"01","oddsValue":{win1}}},
                    {{"combString":"02","oddsValue":"4.5"}}]}},
                {{"oddsType":"PLA","oddsNodes":[
                    {{"combString":"01","oddsValue":"2.1"}}]}}
            ]}}]}}}}"#
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 22).unwrap()
    }

    #[tokio::test]
    async fn test_crawl_stops_after_two_consecutive_misses() {
        let mut fetcher = FakeFetcher::default();
        fetcher.zh_pages.insert(1, race_page("14:00"));
        fetcher.zh_pages.insert(2, race_page("14:30"));
        // Races 3+ missing entirely

        let meeting = crawl_meeting(&fetcher, date(), "HV", None).await.unwrap();
        assert_eq!(meeting.races.len(), 2);
        assert_eq!(meeting.races[0].race_no, 1);
        assert_eq!(meeting.races[1].race_no, 2);
        assert_eq!(meeting.venue_name, "跑馬地");

        // Stopped at the second consecutive miss: races 3 and 4 probed, 5 never
        let calls = fetcher.calls.borrow();
        assert!(calls.iter().any(|c| c == "page:Zh:4"));
        assert!(!calls.iter().any(|c| c == "page:Zh:5"));
    }

    #[tokio::test]
    async fn test_crawl_survives_single_gap() {
        let mut fetcher = FakeFetcher::default();
        fetcher.zh_pages.insert(1, race_page("14:00"));
        // Race 2 missing, race 3 present: one miss does not end the meeting
        fetcher.zh_pages.insert(3, race_page("15:00"));

        let meeting = crawl_meeting(&fetcher, date(), "HV", Some(3)).await.unwrap();
        assert_eq!(meeting.races.len(), 2);
        assert_eq!(meeting.races[1].race_no, 3);
    }

    #[tokio::test]
    async fn test_crawl_degrades_to_foreign_variant() {
        let mut fetcher = FakeFetcher::default();
        let en_page = r#"<html><body>
            <h1>Race 1 - Test Stakes 14:00</h1>
            <table class="f_fs12">
              <tr><th>No.</th><th>Horse Name</th><th>Jockey</th><th>Draw</th><th>Trainer</th></tr>
              <tr><td>1</td><td><a href="/Horse/Horse.aspx?Id=1">FAST ONE</a></td>
                  <td>K. Teetan</td><td>2</td><td>C. Fownes</td></tr>
            </table></body></html>"#;
        fetcher.en_pages.insert(1, en_page.to_string());

        let meeting = crawl_meeting(&fetcher, date(), "ST", Some(1)).await.unwrap();
        assert_eq!(meeting.races.len(), 1);
        assert_eq!(meeting.races[0].entries[0].horse_name, "FAST ONE");
    }

    #[tokio::test]
    async fn test_tick_crawls_meeting_once_gate_open() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .register_meeting(date(), "HV", NaiveDate::from_ymd_opt(2025, 10, 20))
            .unwrap();

        let mut fetcher = FakeFetcher::default();
        fetcher.zh_pages.insert(1, race_page("19:45"));

        // Before the draw-date gate: nothing happens
        let before = hk_offset().with_ymd_and_hms(2025, 10, 20, 11, 0, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, before).await.unwrap();
        assert_eq!(report.meetings_crawled, 0);

        // After the gate: crawled and stored
        let after = hk_offset().with_ymd_and_hms(2025, 10, 21, 9, 0, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, after).await.unwrap();
        assert_eq!(report.meetings_crawled, 1);
        assert!(store.has_racecard(date(), "HV").unwrap());

        // A later tick does not re-crawl a stored meeting
        let fetches_before = fetcher.calls.borrow().len();
        let later = hk_offset().with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, later).await.unwrap();
        assert_eq!(report.meetings_crawled, 0);
        assert_eq!(fetcher.calls.borrow().len(), fetches_before);
    }

    #[tokio::test]
    async fn test_tick_polls_odds_in_close_watch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .register_meeting(date(), "HV", NaiveDate::from_ymd_opt(2025, 10, 20))
            .unwrap();

        let mut fetcher = FakeFetcher::default();
        fetcher.zh_pages.insert(1, race_page("19:45"));
        fetcher.odds.insert(1, odds_json(7.8));

        // Store the card first
        let morning = hk_offset().with_ymd_and_hms(2025, 10, 22, 9, 5, 0).unwrap();
        run_tick(&fetcher, &mut store, morning).await.unwrap();

        // Close watch (T-5m): odds fire on every invocation
        let close = hk_offset().with_ymd_and_hms(2025, 10, 22, 19, 40, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, close).await.unwrap();
        assert_eq!(report.races_polled, 1);

        let key = crate::storage::QuoteKey {
            race_date: date(),
            venue_code: "HV".to_string(),
            race_no: 1,
            horse_no: 1,
        };
        assert_eq!(store.get_last(&key, PoolType::Win).unwrap(), Some(7.8));

        // Hourly watch off the mark: no poll
        let off_mark = hk_offset().with_ymd_and_hms(2025, 10, 22, 15, 20, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, off_mark).await.unwrap();
        assert_eq!(report.races_polled, 0);

        // Expired (T+6m): no poll
        let expired = hk_offset().with_ymd_and_hms(2025, 10, 22, 19, 51, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, expired).await.unwrap();
        assert_eq!(report.races_polled, 0);
    }

    #[tokio::test]
    async fn test_odds_failure_is_isolated() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .register_meeting(date(), "HV", NaiveDate::from_ymd_opt(2025, 10, 20))
            .unwrap();

        let mut fetcher = FakeFetcher::default();
        fetcher.zh_pages.insert(1, race_page("19:45"));
        fetcher.zh_pages.insert(2, race_page("20:15"));
        // Odds scripted only for race 2: race 1's failure must not block it
        fetcher.odds.insert(2, odds_json(5.5));

        let morning = hk_offset().with_ymd_and_hms(2025, 10, 22, 9, 5, 0).unwrap();
        run_tick(&fetcher, &mut store, morning).await.unwrap();

        // Both races inside close watch; race 1's failure must not block race 2
        let close = hk_offset().with_ymd_and_hms(2025, 10, 22, 19, 50, 0).unwrap();
        let report = run_tick(&fetcher, &mut store, close).await.unwrap();
        assert_eq!(report.races_polled, 1);
    }

    #[test]
    fn test_quotes_for_display() {
        let odds = std::collections::BTreeMap::from([(
            1u32,
            crate::scraper::parsers::PoolOdds {
                win: Some(7.8),
                place: None,
            },
        )]);
        let quotes = quotes_for_display(date(), "HV", 1, &odds);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].pool_type, "WIN");
        assert_eq!(quotes[0].value, Some(7.8));
        assert_eq!(quotes[1].pool_type, "PLACE");
        assert_eq!(quotes[1].value, None);
    }
}
