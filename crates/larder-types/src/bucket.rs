//! Wastage buckets: the day, month or year window a chart or reset applies to.
//!
//! Windows are inclusive on both ends and computed in UTC. `end` is the last
//! millisecond of the window, which matches the millisecond precision used
//! for stored timestamps.

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Years a stored timestamp can hold. The text columns use four-digit years,
/// so anything outside this range would not read back.
pub const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

pub fn is_storable(date: NaiveDate) -> bool {
    STORABLE_YEARS.contains(&date.year())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("Invalid mode parameter: {0}")]
    InvalidMode(String),

    #[error("Invalid or missing date")]
    InvalidDate,

    #[error("Invalid filter or missing date")]
    InvalidFilter,

    #[error("Date out of range")]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketMode {
    Day,
    Month,
    Year,
}

impl FromStr for BucketMode {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(BucketError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Bucket {
    pub fn resolve(mode: BucketMode, date: NaiveDate) -> Result<Self, BucketError> {
        let (first, next) = match mode {
            BucketMode::Day => (date, date.succ_opt()),
            BucketMode::Month => {
                let first = date - Days::new(u64::from(date.day0()));
                (first, first.checked_add_months(Months::new(1)))
            }
            BucketMode::Year => {
                let first = date - Days::new(u64::from(date.ordinal0()));
                (first, first.checked_add_months(Months::new(12)))
            }
        };
        // `next` is also where a reset moves expiry dates, so it must be storable too
        let next = next
            .filter(|n| is_storable(first) && is_storable(*n))
            .ok_or(BucketError::OutOfRange)?;

        Ok(Self {
            start: first.and_time(NaiveTime::MIN).and_utc(),
            end: next.and_time(NaiveTime::MIN).and_utc() - TimeDelta::milliseconds(1),
        })
    }

    /// Resolve the `mode`/`date` pair used by the chart and reset endpoints.
    pub fn from_query(mode: &str, date: Option<&str>) -> Result<Self, BucketError> {
        let mode: BucketMode = mode.parse()?;
        let date = parse_date(date.ok_or(BucketError::InvalidDate)?)?;
        Self::resolve(mode, date)
    }

    /// Resolve the named filters of the stats endpoint relative to `today`.
    pub fn for_filter(
        filter: &str,
        specific_date: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, BucketError> {
        match filter {
            "today" => Self::resolve(BucketMode::Day, today),
            "yesterday" => {
                let yesterday = today.pred_opt().ok_or(BucketError::OutOfRange)?;
                Self::resolve(BucketMode::Day, yesterday)
            }
            "month" => Self::resolve(BucketMode::Month, today),
            "year" => Self::resolve(BucketMode::Year, today),
            "date" => {
                let date = specific_date
                    .ok_or(BucketError::InvalidFilter)
                    .and_then(|d| parse_date(d).map_err(|_| BucketError::InvalidFilter))?;
                Self::resolve(BucketMode::Day, date)
            }
            _ => Err(BucketError::InvalidFilter),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Where reset moves expiry dates so they stop counting in this window.
    pub fn day_after_end(&self) -> DateTime<Utc> {
        self.end + TimeDelta::days(1)
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Result<NaiveDate, BucketError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| BucketError::InvalidDate)
        .and_then(|d| if is_storable(d) { Ok(d) } else { Err(BucketError::OutOfRange) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_bucket_spans_whole_day() {
        let b = Bucket::resolve(BucketMode::Day, ymd(2024, 3, 9)).unwrap();
        assert_eq!(b.start, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(
            b.end,
            Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999)
        );
    }

    #[test]
    fn month_bucket_handles_leap_february() {
        let b = Bucket::resolve(BucketMode::Month, ymd(2024, 2, 17)).unwrap();
        assert_eq!(b.start.date_naive(), ymd(2024, 2, 1));
        assert_eq!(b.end.date_naive(), ymd(2024, 2, 29));
    }

    #[test]
    fn year_bucket_runs_jan_to_dec() {
        let b = Bucket::resolve(BucketMode::Year, ymd(2023, 7, 4)).unwrap();
        assert_eq!(b.start.date_naive(), ymd(2023, 1, 1));
        assert_eq!(b.end.date_naive(), ymd(2023, 12, 31));
    }

    #[test]
    fn contains_is_inclusive() {
        let b = Bucket::resolve(BucketMode::Day, ymd(2024, 3, 9)).unwrap();
        assert!(b.contains(b.start));
        assert!(b.contains(b.end));
        assert!(!b.contains(b.end + TimeDelta::milliseconds(1)));
        assert!(!b.contains(b.start - TimeDelta::milliseconds(1)));
    }

    #[test]
    fn day_after_end_leaves_the_window() {
        let b = Bucket::resolve(BucketMode::Month, ymd(2024, 12, 5)).unwrap();
        let moved = b.day_after_end();
        assert!(!b.contains(moved));
        assert_eq!(moved.date_naive(), ymd(2025, 1, 1));
    }

    #[test]
    fn from_query_rejects_bad_input() {
        assert_eq!(
            Bucket::from_query("week", Some("2024-01-01")),
            Err(BucketError::InvalidMode("week".into()))
        );
        assert_eq!(Bucket::from_query("day", None), Err(BucketError::InvalidDate));
        assert_eq!(Bucket::from_query("day", Some("yesterday")), Err(BucketError::InvalidDate));
    }

    #[test]
    fn dates_past_four_digit_years_are_out_of_range() {
        assert_eq!(parse_date("+10000-01-01"), Err(BucketError::OutOfRange));
        assert_eq!(parse_date("9999-12-31"), Ok(ymd(9999, 12, 31)));

        // A reset here would move expiries into year 10000
        assert_eq!(
            Bucket::resolve(BucketMode::Day, ymd(9999, 12, 31)),
            Err(BucketError::OutOfRange)
        );
        assert_eq!(
            Bucket::resolve(BucketMode::Year, ymd(9999, 6, 1)),
            Err(BucketError::OutOfRange)
        );
        assert!(Bucket::resolve(BucketMode::Day, ymd(9999, 12, 30)).is_ok());
        assert!(Bucket::resolve(BucketMode::Day, ymd(-1, 3, 1)).is_err());
    }

    #[test]
    fn from_query_accepts_rfc3339() {
        let b = Bucket::from_query("day", Some("2024-05-01T15:30:00Z")).unwrap();
        assert_eq!(b.start.date_naive(), ymd(2024, 5, 1));
    }

    #[test]
    fn filters_resolve_relative_to_today() {
        let today = ymd(2024, 3, 1);
        let y = Bucket::for_filter("yesterday", None, today).unwrap();
        assert_eq!(y.start.date_naive(), ymd(2024, 2, 29));

        let m = Bucket::for_filter("month", None, today).unwrap();
        assert_eq!(m.end.date_naive(), ymd(2024, 3, 31));

        let d = Bucket::for_filter("date", Some("2023-11-11"), today).unwrap();
        assert_eq!(d.start.date_naive(), ymd(2023, 11, 11));

        assert_eq!(Bucket::for_filter("date", None, today), Err(BucketError::InvalidFilter));
        assert_eq!(Bucket::for_filter("decade", None, today), Err(BucketError::InvalidFilter));
    }
}
