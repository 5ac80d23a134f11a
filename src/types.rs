//! Canonical record types produced by the ingestion pipeline.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Fixed offset for Hong Kong time (no DST).
pub fn hk_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// Zoned "now" in Hong Kong time.
pub fn now_hkt() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&hk_offset())
}

/// A race meeting: one calendar fixture at one venue.
///
/// Created once per (date, venue) and mutated by repeated ingestion;
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Meeting {
    pub date: Option<NaiveDate>,
    /// Venue code, "ST" or "HV"
    pub venue_code: String,
    /// Local venue label (沙田 / 跑馬地)
    pub venue_name: String,
    pub races: Vec<Race>,
}

/// The three co-derived representations of a race's off time.
///
/// All three are composed from one authoritative (date, "HH:MM") pair plus
/// the fixed +08:00 offset; they are never stored independently.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OffTime {
    /// Local wall clock, "HH:MM"
    pub off_time_local: String,
    /// Zoned local timestamp, ISO-8601 with +08:00 offset
    pub off_time_zoned: String,
    /// UTC timestamp, ISO-8601 with a literal "Z" suffix
    pub off_time_utc: String,
}

impl OffTime {
    /// Compose all three representations from the meeting date and a local
    /// "HH:MM" string. Returns the empty representation when either part
    /// is missing or unparseable.
    pub fn compose(date: Option<NaiveDate>, hhmm: &str) -> OffTime {
        let (Some(date), false) = (date, hhmm.is_empty()) else {
            return OffTime::default();
        };
        let Ok(time) = NaiveTime::parse_from_str(hhmm, "%H:%M") else {
            return OffTime::default();
        };
        let Some(local) = hk_offset()
            .from_local_datetime(&date.and_time(time))
            .single()
        else {
            return OffTime::default();
        };
        OffTime {
            off_time_local: hhmm.to_string(),
            off_time_zoned: local.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            off_time_utc: local
                .with_timezone(&Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.off_time_local.is_empty()
    }
}

/// One race within a meeting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Race {
    /// 1-based race number, unique within the meeting
    pub race_no: u8,
    pub name_local: String,
    pub name_foreign: String,
    #[serde(flatten)]
    pub off_time: OffTime,
    pub distance_m: Option<u32>,
    /// 草地 / AWT
    pub surface: String,
    /// Course configuration, e.g. "A", "B", "C+3"
    pub course_config: String,
    pub going: String,
    pub class_text: String,
    pub handicap: bool,
    pub entries: Vec<Entry>,
    pub reserves: Vec<Entry>,
}

/// One starter (or reserve) in a race.
///
/// horse_no is unique within (race, is_reserve). Fields that fail numeric
/// coercion are left unset rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Entry {
    pub horse_no: Option<u32>,
    /// Last six runs, e.g. "3/4/1/2/5/1"
    pub last6: String,
    /// Silks image reference (absolute URL) or its alternate text
    pub silks: String,
    pub horse_name: String,
    pub brand_no: String,
    /// Handicap weight carried, pounds
    pub weight_lb: Option<u32>,
    pub jockey: String,
    /// Barrier draw, 1..=20 when present
    pub draw: Option<u32>,
    pub trainer: String,
    pub rating: Option<i32>,
    pub rating_delta: String,
    /// Declared body weight
    pub declared_wt: Option<u32>,
    pub declared_wt_delta: String,
    pub age: Option<u32>,
    /// Weight-for-age allowance
    pub allowance: String,
    pub sex: String,
    pub season_stakes: String,
    pub priority: String,
    pub days_since_last_run: String,
    /// Gear / equipment codes
    pub gear: String,
    pub owner: String,
    pub sire: String,
    pub dam: String,
    pub import_cat: String,
    pub is_reserve: bool,
}

/// Wagering pool category under which a quote is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    Win,
    Place,
}

impl PoolType {
    pub const ALL: [PoolType; 2] = [PoolType::Win, PoolType::Place];

    /// Canonical name in output records
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Win => "WIN",
            PoolType::Place => "PLACE",
        }
    }

    /// Pool code on the upstream wire ("PLA", not "PLACE")
    pub fn wire_code(&self) -> &'static str {
        match self {
            PoolType::Win => "WIN",
            PoolType::Place => "PLA",
        }
    }

    pub fn from_wire(code: &str) -> Option<PoolType> {
        match code {
            "WIN" => Some(PoolType::Win),
            "PLA" => Some(PoolType::Place),
            _ => None,
        }
    }
}

/// Latest-value quote for one horse in one pool.
#[derive(Debug, Clone, Serialize)]
pub struct OddsQuote {
    pub date: NaiveDate,
    pub venue_code: String,
    pub race_no: u8,
    pub horse_no: u32,
    pub pool_type: &'static str,
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_time_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 22);
        let off = OffTime::compose(date, "19:45");
        assert_eq!(off.off_time_local, "19:45");
        assert_eq!(off.off_time_zoned, "2025-10-22T19:45:00+08:00");
        assert_eq!(off.off_time_utc, "2025-10-22T11:45:00Z");

        // Reading the local component back returns the original "HH:MM"
        let zoned = DateTime::parse_from_rfc3339(&off.off_time_zoned).unwrap();
        assert_eq!(zoned.format("%H:%M").to_string(), "19:45");
    }

    #[test]
    fn test_off_time_utc_crosses_midnight() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 22);
        let off = OffTime::compose(date, "02:30");
        assert_eq!(off.off_time_utc, "2025-10-21T18:30:00Z");
    }

    #[test]
    fn test_off_time_missing_parts() {
        assert!(OffTime::compose(None, "19:45").is_empty());
        let date = NaiveDate::from_ymd_opt(2025, 10, 22);
        assert!(OffTime::compose(date, "").is_empty());
        assert!(OffTime::compose(date, "25:99").is_empty());
    }

    #[test]
    fn test_pool_type_codes() {
        assert_eq!(PoolType::Place.wire_code(), "PLA");
        assert_eq!(PoolType::Place.as_str(), "PLACE");
        assert_eq!(PoolType::from_wire("PLA"), Some(PoolType::Place));
        assert_eq!(PoolType::from_wire("QIN"), None);
    }
}
