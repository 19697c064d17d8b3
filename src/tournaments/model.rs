// Tournament data model

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// A tournament as listed by the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tournament {
    pub id: i64,
    pub mode: String,
    #[serde(rename = "modeparams")]
    pub mode_params: String,
    pub name: String,
    pub location: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: NaiveDateTime,
    pub open_entry: bool,
    pub hide_results: bool,
    pub status: String,
}

impl From<&Tournament> for i64 {
    fn from(tournament: &Tournament) -> Self {
        tournament.id
    }
}

/// A tournament given either by id or by a full record
#[derive(Debug, Clone, Copy)]
pub enum TournamentRef<'a> {
    Id(i64),
    Record(&'a Tournament),
}

impl TournamentRef<'_> {
    /// Integer identity used in request paths
    pub fn id(&self) -> i64 {
        match self {
            TournamentRef::Id(id) => *id,
            TournamentRef::Record(tournament) => tournament.id,
        }
    }
}

impl From<i64> for TournamentRef<'_> {
    fn from(id: i64) -> Self {
        TournamentRef::Id(id)
    }
}

impl<'a> From<&'a Tournament> for TournamentRef<'a> {
    fn from(tournament: &'a Tournament) -> Self {
        TournamentRef::Record(tournament)
    }
}

/// Accepts ISO-8601 timestamps with or without offset; offsets are normalized to UTC
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("invalid timestamp {:?}: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn tournament_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "mode": "sum",
            "modeparams": "1+0+0",
            "name": format!("Tournament {}", id),
            "start": "2024-05-21T15:42:18.932526",
            "end": "2024-05-22T15:42:18.932534",
            "location": "The test environment",
            "open_entry": true,
            "hide_results": false,
            "status": "not_logged_in",
        })
    }

    #[test]
    fn test_deserialize() {
        let t: Tournament = serde_json::from_value(tournament_json(1)).unwrap();
        assert_eq!(t.id, 1);
        assert_eq!(t.name, "Tournament 1");
        assert_eq!(t.mode_params, "1+0+0");
        assert_eq!(t.start.year(), 2024);
        assert_eq!(t.start.hour(), 15);
        assert_eq!(t.end.day(), 22);
        assert!(t.open_entry);
        assert!(!t.hide_results);
    }

    #[test]
    fn test_deserialize_list_keeps_order() {
        let data = json!([tournament_json(2), tournament_json(1), tournament_json(3)]);
        let ts: Vec<Tournament> = serde_json::from_value(data).unwrap();
        let ids: Vec<i64> = ts.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_timestamp_with_offset() {
        let dt = parse_timestamp("2024-05-21T17:42:18+02:00").unwrap();
        assert_eq!(dt.hour(), 15);

        let dt = parse_timestamp("2024-05-21T15:42:18Z").unwrap();
        assert_eq!(dt.hour(), 15);

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_tournament_ref_id() {
        let t: Tournament = serde_json::from_value(tournament_json(42069)).unwrap();
        assert_eq!(TournamentRef::from(42069_i64).id(), 42069);
        assert_eq!(TournamentRef::from(&t).id(), 42069);
        assert_eq!(i64::from(&t), 42069);
    }
}
