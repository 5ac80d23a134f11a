//! Change-detecting persistence policy for pool quotes.
//!
//! The store exposes three primitives: an unconditional overwrite of the
//! latest projection, a read of the most recent history value, and an
//! append-only history write. The policy always refreshes the latest
//! projection and appends history only when the observed value differs
//! from the last stored one, so consecutive snapshot rows for a key never
//! hold equal values.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

use crate::scraper::parsers::PoolOdds;
use crate::types::PoolType;

/// Natural key of one horse's quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteKey {
    pub race_date: NaiveDate,
    pub venue_code: String,
    pub race_no: u8,
    pub horse_no: u32,
}

/// Persistence contract consumed by the snapshot policy. Implementations
/// must make each call atomic per row; conflicts resolve last-write-wins.
pub trait QuoteStore {
    /// Unconditionally overwrite the latest projection for a key.
    fn upsert_latest(
        &mut self,
        key: &QuoteKey,
        quotes: PoolOdds,
        ts: DateTime<FixedOffset>,
    ) -> Result<()>;

    /// Most recent stored history value for (key, pool), or none.
    fn get_last(&self, key: &QuoteKey, pool: PoolType) -> Result<Option<f64>>;

    /// Append-only history write.
    fn append_snapshot(
        &mut self,
        key: &QuoteKey,
        pool: PoolType,
        value: f64,
        ts: DateTime<FixedOffset>,
    ) -> Result<()>;
}

/// Counts reported by one policy application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub latest_updated: usize,
    pub snapshots_appended: usize,
}

/// Apply the policy to a freshly observed quote map.
pub fn record_quotes<S: QuoteStore + ?Sized>(
    store: &mut S,
    race_date: NaiveDate,
    venue_code: &str,
    race_no: u8,
    odds: &BTreeMap<u32, PoolOdds>,
    now: DateTime<FixedOffset>,
) -> Result<SnapshotStats> {
    let mut stats = SnapshotStats::default();

    for (&horse_no, quotes) in odds {
        let key = QuoteKey {
            race_date,
            venue_code: venue_code.to_string(),
            race_no,
            horse_no,
        };

        store.upsert_latest(&key, *quotes, now)?;
        stats.latest_updated += 1;

        for pool in PoolType::ALL {
            let Some(value) = quotes.get(pool) else {
                continue;
            };
            let last = store.get_last(&key, pool)?;
            // Exact equality after numeric coercion decides "unchanged"
            if last != Some(value) {
                store.append_snapshot(&key, pool, value, now)?;
                stats.snapshots_appended += 1;
            } else {
                debug!(horse_no, pool = pool.as_str(), value, "odds unchanged");
            }
        }
    }

    Ok(stats)
}
