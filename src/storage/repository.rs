//! SQLite-backed store for race cards, odds projections, and snapshots.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::policy::{QuoteKey, QuoteStore};
use super::schema::create_tables;
use crate::scheduler::{MeetingFixture, RaceFixture};
use crate::scraper::parsers::PoolOdds;
use crate::types::{Entry, Meeting, PoolType, Race};

/// Repository over one SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

/// One line of the `show` summary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RaceSummary {
    pub race_no: u8,
    pub name_local: String,
    pub off_time_local: String,
    pub entries: i64,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let conn = Connection::open(path).context("failed to open database")?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Register (or refresh) a meeting in the fixture registry.
    pub fn register_meeting(
        &mut self,
        race_date: NaiveDate,
        venue_code: &str,
        draw_date: Option<NaiveDate>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO race_meetings (race_date, venue_code, draw_date)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(race_date, venue_code) DO UPDATE SET draw_date = excluded.draw_date
            "#,
            params![
                race_date.to_string(),
                venue_code,
                draw_date.map(|d| d.to_string())
            ],
        )?;
        Ok(())
    }

    /// Upsert a crawled meeting: every race and every numbered entry.
    /// Returns (races, entries) written.
    pub fn store_meeting(&mut self, meeting: &Meeting) -> Result<(usize, usize)> {
        let Some(date) = meeting.date else {
            return Ok((0, 0));
        };

        let mut races = 0;
        let mut entries = 0;
        for race in &meeting.races {
            self.upsert_race(date, &meeting.venue_code, &meeting.venue_name, race)?;
            races += 1;
            for entry in race.entries.iter().chain(race.reserves.iter()) {
                // Entries without a horse number have no stable key
                if entry.horse_no.is_some() {
                    self.upsert_entry(date, &meeting.venue_code, race.race_no, entry)?;
                    entries += 1;
                }
            }
        }
        Ok((races, entries))
    }

    fn upsert_race(
        &mut self,
        race_date: NaiveDate,
        venue_code: &str,
        venue_name: &str,
        race: &Race,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO racecard_races (
                race_date, venue_code, race_no, name_local, name_foreign,
                off_time_local, off_time_zoned, off_time_utc,
                distance_m, surface, course_config, going, class_text,
                handicap, venue_name
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
            ON CONFLICT(race_date, venue_code, race_no) DO UPDATE SET
                name_local = excluded.name_local,
                name_foreign = excluded.name_foreign,
                off_time_local = excluded.off_time_local,
                off_time_zoned = excluded.off_time_zoned,
                off_time_utc = excluded.off_time_utc,
                distance_m = excluded.distance_m,
                surface = excluded.surface,
                course_config = excluded.course_config,
                going = excluded.going,
                class_text = excluded.class_text,
                handicap = excluded.handicap,
                venue_name = excluded.venue_name
            "#,
            params![
                race_date.to_string(),
                venue_code,
                race.race_no,
                race.name_local,
                race.name_foreign,
                race.off_time.off_time_local,
                race.off_time.off_time_zoned,
                race.off_time.off_time_utc,
                race.distance_m,
                race.surface,
                race.course_config,
                race.going,
                race.class_text,
                race.handicap,
                venue_name,
            ],
        )?;
        Ok(())
    }

    fn upsert_entry(
        &mut self,
        race_date: NaiveDate,
        venue_code: &str,
        race_no: u8,
        entry: &Entry,
    ) -> Result<()> {
        // The latest-odds projection columns are deliberately absent from
        // the update set: re-ingesting a race card must not erase quotes.
        self.conn.execute(
            r#"
            INSERT INTO racecard_entries (
                race_date, venue_code, race_no, horse_no, is_reserve,
                horse_name, last6, silks, brand_no, weight_lb, jockey, draw,
                trainer, rating, rating_delta, declared_wt, declared_wt_delta,
                age, allowance, sex, season_stakes, priority,
                days_since_last_run, gear, owner, sire, dam, import_cat
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                      ?17,?18,?19,?20,?21,?22,?23,?24,?25,?26,?27,?28)
            ON CONFLICT(race_date, venue_code, race_no, horse_no, is_reserve)
            DO UPDATE SET
                horse_name = excluded.horse_name,
                last6 = excluded.last6,
                silks = excluded.silks,
                brand_no = excluded.brand_no,
                weight_lb = excluded.weight_lb,
                jockey = excluded.jockey,
                draw = excluded.draw,
                trainer = excluded.trainer,
                rating = excluded.rating,
                rating_delta = excluded.rating_delta,
                declared_wt = excluded.declared_wt,
                declared_wt_delta = excluded.declared_wt_delta,
                age = excluded.age,
                allowance = excluded.allowance,
                sex = excluded.sex,
                season_stakes = excluded.season_stakes,
                priority = excluded.priority,
                days_since_last_run = excluded.days_since_last_run,
                gear = excluded.gear,
                owner = excluded.owner,
                sire = excluded.sire,
                dam = excluded.dam,
                import_cat = excluded.import_cat
            "#,
            params![
                race_date.to_string(),
                venue_code,
                race_no,
                entry.horse_no,
                entry.is_reserve,
                entry.horse_name,
                entry.last6,
                entry.silks,
                entry.brand_no,
                entry.weight_lb,
                entry.jockey,
                entry.draw,
                entry.trainer,
                entry.rating,
                entry.rating_delta,
                entry.declared_wt,
                entry.declared_wt_delta,
                entry.age,
                entry.allowance,
                entry.sex,
                entry.season_stakes,
                entry.priority,
                entry.days_since_last_run,
                entry.gear,
                entry.owner,
                entry.sire,
                entry.dam,
                entry.import_cat,
            ],
        )?;
        Ok(())
    }

    /// Does the store already hold race-card rows for this meeting?
    pub fn has_racecard(&self, race_date: NaiveDate, venue_code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM racecard_races WHERE race_date = ?1 AND venue_code = ?2",
            params![race_date.to_string(), venue_code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Meeting fixtures from yesterday through the next week, for the
    /// race-card scheduler pass.
    pub fn upcoming_meetings(&self, today: NaiveDate) -> Result<Vec<MeetingFixture>> {
        let from = today - chrono::Duration::days(1);
        let to = today + chrono::Duration::days(7);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_date, venue_code, draw_date
            FROM race_meetings
            WHERE race_date >= ?1 AND race_date <= ?2 AND draw_date IS NOT NULL
            ORDER BY race_date, venue_code
            "#,
        )?;
        let rows = stmt.query_map(params![from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut fixtures = Vec::new();
        for row in rows {
            let (date, venue_code, draw) = row?;
            let Ok(race_date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                continue;
            };
            fixtures.push(MeetingFixture {
                race_date,
                venue_code,
                draw_date: draw.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            });
        }
        Ok(fixtures)
    }

    /// Race fixtures from yesterday through tomorrow with a known off time,
    /// for the odds scheduler pass.
    pub fn upcoming_races(&self, today: NaiveDate) -> Result<Vec<RaceFixture>> {
        let from = today - chrono::Duration::days(1);
        let to = today + chrono::Duration::days(1);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_date, venue_code, race_no, off_time_local
            FROM racecard_races
            WHERE race_date >= ?1 AND race_date <= ?2
            ORDER BY race_date, venue_code, race_no
            "#,
        )?;
        let rows = stmt.query_map(params![from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u8>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut fixtures = Vec::new();
        for row in rows {
            let (date, venue_code, race_no, off_local) = row?;
            let Ok(race_date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                continue;
            };
            // A race without a usable off time cannot be windowed
            let Some(off_time) = off_local
                .as_deref()
                .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
            else {
                continue;
            };
            fixtures.push(RaceFixture {
                race_date,
                venue_code,
                race_no,
                off_time,
            });
        }
        Ok(fixtures)
    }

    /// Per-race summary of a stored meeting.
    pub fn meeting_summary(
        &self,
        race_date: NaiveDate,
        venue_code: &str,
    ) -> Result<Vec<RaceSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.race_no, r.name_local, r.off_time_local,
                   (SELECT COUNT(*) FROM racecard_entries e
                    WHERE e.race_date = r.race_date
                      AND e.venue_code = r.venue_code
                      AND e.race_no = r.race_no
                      AND e.is_reserve = 0) AS entries
            FROM racecard_races r
            WHERE r.race_date = ?1 AND r.venue_code = ?2
            ORDER BY r.race_no
            "#,
        )?;
        let rows = stmt.query_map(params![race_date.to_string(), venue_code], |row| {
            Ok(RaceSummary {
                race_no: row.get(0)?,
                name_local: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                off_time_local: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                entries: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl QuoteStore for SqliteStore {
    fn upsert_latest(
        &mut self,
        key: &QuoteKey,
        quotes: PoolOdds,
        ts: DateTime<FixedOffset>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO racecard_entries (
                race_date, venue_code, race_no, horse_no, is_reserve,
                win_odds, place_odds, last_odds_update
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)
            ON CONFLICT(race_date, venue_code, race_no, horse_no, is_reserve)
            DO UPDATE SET
                win_odds = excluded.win_odds,
                place_odds = excluded.place_odds,
                last_odds_update = excluded.last_odds_update
            "#,
            params![
                key.race_date.to_string(),
                key.venue_code,
                key.race_no,
                key.horse_no,
                quotes.win,
                quotes.place,
                ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_last(&self, key: &QuoteKey, pool: PoolType) -> Result<Option<f64>> {
        let value = self
            .conn
            .query_row(
                r#"
                SELECT odds FROM race_odds_snapshots
                WHERE race_date = ?1 AND venue_code = ?2 AND race_no = ?3
                  AND horse_no = ?4 AND pool_type = ?5
                ORDER BY snapshot_ts DESC, id DESC
                LIMIT 1
                "#,
                params![
                    key.race_date.to_string(),
                    key.venue_code,
                    key.race_no,
                    key.horse_no,
                    pool.as_str(),
                ],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn append_snapshot(
        &mut self,
        key: &QuoteKey,
        pool: PoolType,
        value: f64,
        ts: DateTime<FixedOffset>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO race_odds_snapshots
                (race_date, venue_code, race_no, horse_no, pool_type, odds, snapshot_ts)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                key.race_date.to_string(),
                key.venue_code,
                key.race_no,
                key.horse_no,
                pool.as_str(),
                value,
                ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
