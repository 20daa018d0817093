//! Column encodings shared by the query modules.
//!
//! Ids are stored as hyphenated UUID text. Timestamps are stored as
//! fixed-width RFC 3339 UTC strings with millisecond precision
//! (`2024-03-09T12:00:00.000Z`), so SQL string comparison orders them
//! chronologically and `BETWEEN` works for range filters.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use larder_types::models::{NotificationKind, Role};

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ts_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(ts)
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, format!("bad timestamp '{raw}': {e}")))
}

pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub fn get_ts_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

pub fn get_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| conversion_err(idx, format!("bad id '{raw}': {e}")))
}

pub fn get_role(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    Role::parse(&raw).ok_or_else(|| conversion_err(idx, format!("unknown role '{raw}'")))
}

pub fn get_kind(row: &Row<'_>, idx: usize) -> rusqlite::Result<NotificationKind> {
    let raw: String = row.get(idx)?;
    NotificationKind::parse(&raw)
        .ok_or_else(|| conversion_err(idx, format!("unknown notification type '{raw}'")))
}

pub fn get_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, format!("bad json: {e}")))
}

pub fn get_json_opt<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| serde_json::from_str(&r).map_err(|e| conversion_err(idx, format!("bad json: {e}"))))
        .transpose()
}

pub fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::TimeDelta::milliseconds(7);
        assert_eq!(ts(a), "2024-01-02T03:04:05.000Z");
        assert_eq!(ts(b), "2024-01-02T03:04:05.007Z");
        assert!(ts(a) < ts(b));
    }

    #[test]
    fn timestamps_round_trip_through_parse() {
        let at = now();
        assert_eq!(parse_ts(0, &ts(at)).unwrap(), at);
    }
}
