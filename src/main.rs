//! hkrace-ingest
//!
//! Ingests race cards and WIN/PLACE pool odds for Hong Kong race meetings:
//! bilingual page markup in, canonical records and change-only odds history
//! out, gated by a time-windowed adaptive scheduler.

mod cli;
mod config;
mod ingest;
mod scheduler;
mod scraper;
mod storage;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hkrace_ingest=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Racecard {
            date,
            venue,
            max_races,
        } => cli::run_racecard(&config, cli.db, date, venue, max_races).await,
        Commands::Odds { date, venue, race } => {
            cli::run_odds(&config, cli.db, date, venue, race).await
        }
        Commands::Register {
            date,
            venue,
            draw_date,
        } => cli::run_register(&config, cli.db, date, venue, draw_date),
        Commands::Tick => cli::run_tick(&config, cli.db).await,
        Commands::Watch { interval } => cli::run_watch(&config, cli.db, interval).await,
        Commands::Show { date, venue } => cli::run_show(&config, cli.db, date, venue),
    }
}
