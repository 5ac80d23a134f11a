//! CLI commands for hkrace-ingest.
//!
//! One-shot crawls for a meeting or a single race's odds, the
//! scheduler-driven tick, a long-running watch loop, and a summary view of
//! stored data.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::ingest;
use crate::scraper::parsers::build_odds_map;
use crate::scraper::{normalize_venue, HttpFetcher, PageFetcher};
use crate::storage::{record_quotes, SqliteStore};
use crate::types::now_hkt;

#[derive(Parser)]
#[command(name = "hkrace-ingest")]
#[command(version, about = "Race card and pool-odds ingestion for Hong Kong race meetings", long_about = None)]
pub struct Cli {
    /// Database path override
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl and store one meeting's race card
    Racecard {
        /// Meeting date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Venue code (ST or HV)
        #[arg(short, long)]
        venue: String,

        /// Probe at most this many race numbers
        #[arg(long)]
        max_races: Option<u8>,
    },

    /// Fetch and record WIN/PLACE odds for one race
    Odds {
        /// Meeting date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Venue code (ST or HV)
        #[arg(short, long)]
        venue: String,

        /// Race number
        #[arg(short, long)]
        race: u8,
    },

    /// Register a meeting fixture for the scheduler
    Register {
        /// Meeting date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Venue code (ST or HV)
        #[arg(short, long)]
        venue: String,

        /// Draw date (YYYY-MM-DD); the race-card gate opens at 12:00 local
        #[arg(long)]
        draw_date: NaiveDate,
    },

    /// Evaluate every registered fixture once and fire whatever is due
    Tick,

    /// Run the scheduler on an interval
    Watch {
        /// Seconds between scheduler invocations
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Summarize a stored meeting
    Show {
        /// Meeting date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Venue code (ST or HV)
        #[arg(short, long)]
        venue: String,
    },
}

fn open_store(config: &AppConfig, db: &Option<PathBuf>) -> Result<SqliteStore> {
    let path = db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.database.path));
    SqliteStore::open(&path)
}

/// Crawl one meeting, store it, and print the canonical records.
pub async fn run_racecard(
    config: &AppConfig,
    db: Option<PathBuf>,
    date: NaiveDate,
    venue: String,
    max_races: Option<u8>,
) -> Result<()> {
    let venue_code = normalize_venue(&venue);
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let mut store = open_store(config, &db)?;

    let meeting = ingest::crawl_meeting(&fetcher, date, venue_code, max_races).await?;
    let (races, entries) = store.store_meeting(&meeting)?;
    info!(races, entries, "meeting stored");

    println!("{}", serde_json::to_string_pretty(&meeting)?);
    Ok(())
}

/// Fetch one race's odds, apply the snapshot policy, and print the quotes.
pub async fn run_odds(
    config: &AppConfig,
    db: Option<PathBuf>,
    date: NaiveDate,
    venue: String,
    race_no: u8,
) -> Result<()> {
    let venue_code = normalize_venue(&venue);
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let mut store = open_store(config, &db)?;

    let json = fetcher.odds_json(date, venue_code, race_no).await?;
    let odds = build_odds_map(&json)?;
    let stats = record_quotes(&mut store, date, venue_code, race_no, &odds, now_hkt())?;
    info!(
        latest = stats.latest_updated,
        snapshots = stats.snapshots_appended,
        "odds recorded"
    );

    let quotes = ingest::quotes_for_display(date, venue_code, race_no, &odds);
    println!("{}", serde_json::to_string_pretty(&quotes)?);
    Ok(())
}

/// Register a meeting in the fixture registry.
pub fn run_register(
    config: &AppConfig,
    db: Option<PathBuf>,
    date: NaiveDate,
    venue: String,
    draw_date: NaiveDate,
) -> Result<()> {
    let venue_code = normalize_venue(&venue);
    let mut store = open_store(config, &db)?;
    store.register_meeting(date, venue_code, Some(draw_date))?;
    info!(%date, venue_code, %draw_date, "meeting registered");
    Ok(())
}

/// One scheduler invocation.
pub async fn run_tick(config: &AppConfig, db: Option<PathBuf>) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let mut store = open_store(config, &db)?;

    let report = ingest::run_tick(&fetcher, &mut store, now_hkt()).await?;
    info!(
        meetings = report.meetings_crawled,
        races = report.races_polled,
        "tick complete"
    );
    Ok(())
}

/// Scheduler loop: one tick per interval until interrupted.
pub async fn run_watch(config: &AppConfig, db: Option<PathBuf>, interval: Option<u64>) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let mut store = open_store(config, &db)?;

    let secs = interval.unwrap_or(config.watch.interval_secs);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
    info!(interval_secs = secs, "watch loop started");

    loop {
        ticker.tick().await;
        match ingest::run_tick(&fetcher, &mut store, now_hkt()).await {
            Ok(report) => info!(
                meetings = report.meetings_crawled,
                races = report.races_polled,
                "tick complete"
            ),
            Err(e) => tracing::warn!(error = %e, "tick failed"),
        }
    }
}

/// Print a stored meeting's per-race summary.
pub fn run_show(
    config: &AppConfig,
    db: Option<PathBuf>,
    date: NaiveDate,
    venue: String,
) -> Result<()> {
    let venue_code = normalize_venue(&venue);
    let store = open_store(config, &db)?;
    let summary = store.meeting_summary(date, venue_code)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
