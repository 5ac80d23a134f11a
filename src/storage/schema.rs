//! SQLite schema for ingested race card and odds data.
//!
//! Tables:
//! - race_meetings: fixture registry read by the scheduler
//! - racecard_races: one row per race, upserted
//! - racecard_entries: one row per starter, upserted; also carries the
//!   latest-odds projection
//! - race_odds_snapshots: append-only odds history, written on change only

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Fixture registry: which meetings exist and when their cards are drawn
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_meetings (
            race_date TEXT NOT NULL,
            venue_code TEXT NOT NULL,
            draw_date TEXT,
            PRIMARY KEY (race_date, venue_code)
        )
        "#,
        [],
    )?;

    // Race-level records
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS racecard_races (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_date TEXT NOT NULL,
            venue_code TEXT NOT NULL,
            race_no INTEGER NOT NULL,
            name_local TEXT,
            name_foreign TEXT,
            off_time_local TEXT,
            off_time_zoned TEXT,
            off_time_utc TEXT,
            distance_m INTEGER,
            surface TEXT,
            course_config TEXT,
            going TEXT,
            class_text TEXT,
            handicap INTEGER NOT NULL DEFAULT 0,
            venue_name TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(race_date, venue_code, race_no)
        )
        "#,
        [],
    )?;

    // Entry-level records; win/place columns are the latest-odds projection
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS racecard_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_date TEXT NOT NULL,
            venue_code TEXT NOT NULL,
            race_no INTEGER NOT NULL,
            horse_no INTEGER NOT NULL,
            is_reserve INTEGER NOT NULL DEFAULT 0,
            horse_name TEXT,
            last6 TEXT,
            silks TEXT,
            brand_no TEXT,
            weight_lb INTEGER,
            jockey TEXT,
            draw INTEGER,
            trainer TEXT,
            rating INTEGER,
            rating_delta TEXT,
            declared_wt INTEGER,
            declared_wt_delta TEXT,
            age INTEGER,
            allowance TEXT,
            sex TEXT,
            season_stakes TEXT,
            priority TEXT,
            days_since_last_run TEXT,
            gear TEXT,
            owner TEXT,
            sire TEXT,
            dam TEXT,
            import_cat TEXT,
            win_odds REAL,
            place_odds REAL,
            last_odds_update TEXT,
            UNIQUE(race_date, venue_code, race_no, horse_no, is_reserve)
        )
        "#,
        [],
    )?;

    // Append-only odds history
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_odds_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_date TEXT NOT NULL,
            venue_code TEXT NOT NULL,
            race_no INTEGER NOT NULL,
            horse_no INTEGER NOT NULL,
            pool_type TEXT NOT NULL,
            odds REAL NOT NULL,
            snapshot_ts TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_odds_snapshots_key
        ON race_odds_snapshots(race_date, venue_code, race_no, horse_no, pool_type, snapshot_ts)
        "#,
        [],
    )?;

    Ok(())
}
