//! Time-windowed adaptive polling scheduler.
//!
//! Each fixture moves monotonically through Dormant → Hourly-Watch →
//! Close-Watch → Expired as its off time approaches. The state is computed
//! fresh at every invocation from (now, off time, watch-start); nothing is
//! stored, so invocations across fixtures need no shared coordination.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::types::hk_offset;

/// Close-watch opens this many minutes before the off.
pub const CLOSE_WATCH_BEFORE_MIN: i64 = 30;

/// A fixture expires this many minutes after the off.
pub const EXPIRE_AFTER_MIN: i64 = 5;

/// Race-level quotes are watched from the day before the race at this hour.
pub const RACE_WATCH_START_HOUR: u32 = 13;

/// Meeting-level race cards are watched from the draw date at this hour.
pub const MEETING_WATCH_START_HOUR: u32 = 12;

/// Clock minute on which Hourly-Watch fires.
pub const HOURLY_FIRE_MINUTE: u32 = 0;

/// Watch-window state for one fixture at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Before the watch-start: never fires
    Dormant,
    /// Watched, off more than 30 minutes away: fires once per hour
    HourlyWatch,
    /// Off within [-30, +5] minutes: fires on every invocation
    CloseWatch,
    /// More than 5 minutes past the off: never fires again
    Expired,
}

/// Classify a fixture. `watch_from` is `None` for always-watched fixtures.
pub fn watch_state(
    now: DateTime<FixedOffset>,
    off_time: DateTime<FixedOffset>,
    watch_from: Option<DateTime<FixedOffset>>,
) -> WatchState {
    if let Some(from) = watch_from {
        if now < from {
            return WatchState::Dormant;
        }
    }

    let until_off = off_time - now;
    if until_off < -Duration::minutes(EXPIRE_AFTER_MIN) {
        WatchState::Expired
    } else if until_off > Duration::minutes(CLOSE_WATCH_BEFORE_MIN) {
        WatchState::HourlyWatch
    } else {
        WatchState::CloseWatch
    }
}

/// Should this invocation fire the pipeline for a fixture in `state`?
/// Hourly-Watch only fires when the clock minute sits on the hourly mark,
/// so the effective cadence is once per hour regardless of how often the
/// scheduler itself runs.
pub fn should_fire(now: DateTime<FixedOffset>, state: WatchState) -> bool {
    use chrono::Timelike;
    match state {
        WatchState::Dormant | WatchState::Expired => false,
        WatchState::HourlyWatch => now.minute() == HOURLY_FIRE_MINUTE,
        WatchState::CloseWatch => true,
    }
}

/// Watch-start for a race's quote polling: the day before, 13:00 local.
pub fn race_watch_from(race_date: NaiveDate) -> DateTime<FixedOffset> {
    at_local(race_date - Duration::days(1), RACE_WATCH_START_HOUR)
}

/// Watch-start for a meeting's race card: the draw date, 12:00 local.
pub fn meeting_watch_from(draw_date: NaiveDate) -> DateTime<FixedOffset> {
    at_local(draw_date, MEETING_WATCH_START_HOUR)
}

fn at_local(date: NaiveDate, hour: u32) -> DateTime<FixedOffset> {
    hk_offset()
        .from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()))
        .unwrap()
}

/// A race-level fixture read from the registry.
#[derive(Debug, Clone)]
pub struct RaceFixture {
    pub race_date: NaiveDate,
    pub venue_code: String,
    pub race_no: u8,
    /// Authoritative local off time
    pub off_time: NaiveTime,
}

impl RaceFixture {
    pub fn off_datetime(&self) -> DateTime<FixedOffset> {
        hk_offset()
            .from_local_datetime(&self.race_date.and_time(self.off_time))
            .unwrap()
    }

    /// Fresh state for this invocation.
    pub fn state(&self, now: DateTime<FixedOffset>) -> WatchState {
        watch_state(now, self.off_datetime(), Some(race_watch_from(self.race_date)))
    }
}

/// A meeting-level fixture from the registry; its race card is crawled
/// once the draw-date gate opens.
#[derive(Debug, Clone)]
pub struct MeetingFixture {
    pub race_date: NaiveDate,
    pub venue_code: String,
    pub draw_date: Option<NaiveDate>,
}

impl MeetingFixture {
    /// The race-card gate: open from draw-date 12:00 local. A meeting with
    /// no draw date on record is never crawled automatically.
    pub fn watch_open(&self, now: DateTime<FixedOffset>) -> bool {
        match self.draw_date {
            Some(draw) => now >= meeting_watch_from(draw),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hkt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        hk_offset()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    fn fixture() -> RaceFixture {
        RaceFixture {
            race_date: NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
            venue_code: "HV".to_string(),
            race_no: 1,
            // Off at 19:45 HKT
            off_time: NaiveTime::from_hms_opt(19, 45, 0).unwrap(),
        }
    }

    #[test]
    fn test_window_classification() {
        let f = fixture();
        // T-45m: hourly watch
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 0)), WatchState::HourlyWatch);
        // T-30m: close watch opens
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 15)), WatchState::CloseWatch);
        // T-10m and T-3m: close watch
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 35)), WatchState::CloseWatch);
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 42)), WatchState::CloseWatch);
        // T+4m: still close watch
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 49)), WatchState::CloseWatch);
        // T+6m: expired
        assert_eq!(f.state(hkt(2025, 10, 22, 19, 51)), WatchState::Expired);
    }

    #[test]
    fn test_dormant_before_watch_start() {
        let f = fixture();
        // Day before, 12:59 local: watch opens at 13:00
        assert_eq!(f.state(hkt(2025, 10, 21, 12, 59)), WatchState::Dormant);
        assert_eq!(f.state(hkt(2025, 10, 21, 13, 0)), WatchState::HourlyWatch);
    }

    #[test]
    fn test_states_are_monotonic_over_time() {
        let f = fixture();
        let samples = [
            hkt(2025, 10, 21, 8, 0),
            hkt(2025, 10, 21, 13, 0),
            hkt(2025, 10, 22, 18, 0),
            hkt(2025, 10, 22, 19, 20),
            hkt(2025, 10, 22, 19, 50),
            hkt(2025, 10, 22, 19, 51),
            hkt(2025, 10, 23, 9, 0),
        ];
        let rank = |s: WatchState| match s {
            WatchState::Dormant => 0,
            WatchState::HourlyWatch => 1,
            WatchState::CloseWatch => 2,
            WatchState::Expired => 3,
        };
        let mut last = 0;
        for now in samples {
            let r = rank(f.state(now));
            assert!(r >= last, "state regressed at {}", now);
            last = r;
        }
    }

    #[test]
    fn test_hourly_fires_only_on_the_mark() {
        let f = fixture();
        let on_mark = hkt(2025, 10, 22, 17, 0);
        let off_mark = hkt(2025, 10, 22, 17, 25);
        assert!(should_fire(on_mark, f.state(on_mark)));
        assert!(!should_fire(off_mark, f.state(off_mark)));
    }

    #[test]
    fn test_close_watch_fires_every_invocation() {
        let f = fixture();
        for minute in [16, 30, 44] {
            let now = hkt(2025, 10, 22, 19, minute);
            assert!(should_fire(now, f.state(now)));
        }
    }

    #[test]
    fn test_expired_and_dormant_never_fire() {
        let f = fixture();
        let dormant = hkt(2025, 10, 20, 15, 0);
        let expired = hkt(2025, 10, 22, 21, 0);
        assert!(!should_fire(dormant, f.state(dormant)));
        assert!(!should_fire(expired, f.state(expired)));
    }

    #[test]
    fn test_always_watched_fixture_skips_dormant() {
        let off = hkt(2025, 10, 22, 19, 45);
        let now = hkt(2025, 1, 1, 0, 0);
        assert_eq!(watch_state(now, off, None), WatchState::HourlyWatch);
    }

    #[test]
    fn test_meeting_gate() {
        let m = MeetingFixture {
            race_date: NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
            venue_code: "HV".to_string(),
            draw_date: NaiveDate::from_ymd_opt(2025, 10, 20),
        };
        assert!(!m.watch_open(hkt(2025, 10, 20, 11, 59)));
        assert!(m.watch_open(hkt(2025, 10, 20, 12, 0)));
        assert!(m.watch_open(hkt(2025, 10, 21, 9, 0)));

        let no_draw = MeetingFixture {
            draw_date: None,
            ..m
        };
        assert!(!no_draw.watch_open(hkt(2025, 10, 21, 9, 0)));
    }
}
