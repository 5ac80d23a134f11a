//! Pool odds parser for the info.cld.hkjc.com GraphQL endpoint.
//!
//! Decodes the `pmPools` payload for the WIN and PLA pools into a
//! per-horse quote map. Multi-leg combinations and non-numeric odds
//! placeholders (scratched, not yet priced) are skipped leniently.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::types::PoolType;

/// Latest quotes for one horse across the two single-leg pools.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolOdds {
    pub win: Option<f64>,
    pub place: Option<f64>,
}

impl PoolOdds {
    pub fn get(&self, pool: PoolType) -> Option<f64> {
        match pool {
            PoolType::Win => self.win,
            PoolType::Place => self.place,
        }
    }
}

/// Decode a GraphQL odds response into `{horse_no: quotes}`.
///
/// An empty or meeting-less response yields an empty map, never an error;
/// only malformed JSON is a hard failure.
pub fn build_odds_map(json: &str) -> Result<BTreeMap<u32, PoolOdds>> {
    let response: OddsResponse = serde_json::from_str(json)?;

    let mut map: BTreeMap<u32, PoolOdds> = BTreeMap::new();
    let Some(meeting) = response
        .data
        .and_then(|d| d.race_meetings.into_iter().next())
    else {
        return Ok(map);
    };

    for pool in meeting.pm_pools {
        let Some(pool_type) = pool.odds_type.as_deref().and_then(PoolType::from_wire) else {
            continue;
        };

        for node in pool.odds_nodes {
            let Some(comb) = node.comb_string else {
                continue;
            };
            let comb = comb.trim_start_matches('0');
            let comb = if comb.is_empty() { "0" } else { comb };
            let Ok(horse_no) = comb.parse::<u32>() else {
                continue;
            };

            let value = node.odds_value.as_ref().and_then(lenient_f64);
            let quotes = map.entry(horse_no).or_default();
            match pool_type {
                PoolType::Win => quotes.win = value,
                PoolType::Place => quotes.place = value,
            }
        }
    }

    Ok(map)
}

/// Odds values arrive as JSON numbers or as strings, depending on pool
/// state; anything non-numeric ("SCR", "---") is treated as absent.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
struct OddsResponse {
    data: Option<OddsData>,
}

#[derive(Deserialize)]
struct OddsData {
    #[serde(rename = "raceMeetings", default)]
    race_meetings: Vec<RaceMeetingNode>,
}

#[derive(Deserialize)]
struct RaceMeetingNode {
    #[serde(rename = "pmPools", default)]
    pm_pools: Vec<PoolNode>,
}

#[derive(Deserialize)]
struct PoolNode {
    #[serde(rename = "oddsType")]
    odds_type: Option<String>,
    #[serde(rename = "oddsNodes", default)]
    odds_nodes: Vec<OddsNode>,
}

#[derive(Deserialize)]
struct OddsNode {
    #[serde(rename = "combString")]
    comb_string: Option<String>,
    #[serde(rename = "oddsValue")]
    odds_value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_odds_map() {
        let json = r#"{
            "data": {
                "raceMeetings": [{
                    "pmPools": [
                        {
                            "oddsType": "WIN",
                            "oddsNodes": [
                                {"combString": "01", "oddsValue": 7.8},
                                {"combString": "02", "oddsValue": "12.5"},
                                {"combString": "03", "oddsValue": "SCR"}
                            ]
                        },
                        {
                            "oddsType": "PLA",
                            "oddsNodes": [
                                {"combString": "01", "oddsValue": "3.0"},
                                {"combString": "02", "oddsValue": 4.1}
                            ]
                        }
                    ]
                }]
            }
        }"#;

        let map = build_odds_map(json).unwrap();
        assert_eq!(map.get(&1), Some(&PoolOdds { win: Some(7.8), place: Some(3.0) }));
        assert_eq!(map.get(&2), Some(&PoolOdds { win: Some(12.5), place: Some(4.1) }));
        // Scratched: present with no WIN value
        assert_eq!(map.get(&3), Some(&PoolOdds { win: None, place: None }));
    }

    #[test]
    fn test_unknown_pools_and_multi_leg_combs_skipped() {
        let json = r#"{
            "data": {
                "raceMeetings": [{
                    "pmPools": [
                        {
                            "oddsType": "QIN",
                            "oddsNodes": [{"combString": "01-02", "oddsValue": 55.0}]
                        },
                        {
                            "oddsType": "WIN",
                            "oddsNodes": [{"combString": "1,2", "oddsValue": 9.9},
                                          {"combString": "04", "oddsValue": 6.5}]
                        }
                    ]
                }]
            }
        }"#;

        let map = build_odds_map(json).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&4).and_then(|q| q.win), Some(6.5));
    }

    #[test]
    fn test_empty_meeting_yields_empty_map() {
        let map = build_odds_map(r#"{"data": {"raceMeetings": []}}"#).unwrap();
        assert!(map.is_empty());
        let map = build_odds_map(r#"{"data": null}"#).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(build_odds_map("<html>502</html>").is_err());
    }
}
