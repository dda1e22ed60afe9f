//! `DD/MM/YYYY` date keys.
//!
//! The rendered form is both what users write in `DATE = ...` assignments and
//! the key that register data is aggregated under.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{1,4})$").unwrap());

/// Date parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    /// The text is not shaped like `DD/MM/YYYY`.
    #[error("invalid date {input:?}: expected DD/MM/YYYY")]
    Malformed { input: String },

    /// The fields are numeric but name no calendar day (e.g. 31/04).
    #[error("invalid date {input:?}: no such day")]
    OutOfRange { input: String },
}

/// A calendar day rendered as zero-padded `DD/MM/YYYY`.
///
/// Ordering is chronological, not textual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parses `D/M/Y` with one or two digit day and month.
    ///
    /// Years below 100 are expanded however many digits they are written
    /// with: `0`-`69` map to 2000-2069 and `70`-`99` to 1970-1999, so `26`
    /// and `0026` both mean 2026.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        let trimmed = input.trim();
        let malformed = || DateError::Malformed {
            input: input.to_string(),
        };
        let caps = DATE_RE.captures(trimmed).ok_or_else(malformed)?;

        let day: u32 = caps[1].parse().map_err(|_| malformed())?;
        let month: u32 = caps[2].parse().map_err(|_| malformed())?;
        let mut year: i32 = caps[3].parse().map_err(|_| malformed())?;
        if year < 100 {
            year += if year < 70 { 2000 } else { 1900 };
        }

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| DateError::OutOfRange {
                input: input.to_string(),
            })
    }

    /// The local calendar day of a filesystem timestamp.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(DateTime::<Local>::from(time).date_naive())
    }

    pub const fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%d/%m/%Y"))
    }
}

impl FromStr for DateKey {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> DateKey {
        DateKey::new(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn test_parse_and_render_zero_padded() {
        let date = DateKey::parse("1/2/2026").unwrap();
        assert_eq!(date, ymd(2026, 2, 1));
        assert_eq!(date.to_string(), "01/02/2026");
    }

    #[test]
    fn test_parse_trims_surrounding_whitespace() {
        assert_eq!(DateKey::parse("  15/01/2026 ").unwrap(), ymd(2026, 1, 15));
    }

    #[test]
    fn test_years_below_one_hundred_expand() {
        assert_eq!(DateKey::parse("01/02/26").unwrap(), ymd(2026, 2, 1));
        assert_eq!(DateKey::parse("01/02/85").unwrap(), ymd(1985, 2, 1));
        assert_eq!(DateKey::parse("01/02/0026").unwrap(), ymd(2026, 2, 1));
        assert_eq!(DateKey::parse("01/02/099").unwrap(), ymd(1999, 2, 1));
        assert_eq!(DateKey::parse("01/02/100").unwrap(), ymd(100, 2, 1));
    }

    #[test]
    fn test_rejects_impossible_days() {
        for input in ["31/04/2026", "29/02/2025", "00/01/2026", "01/13/2026"] {
            assert!(
                matches!(DateKey::parse(input), Err(DateError::OutOfRange { .. })),
                "{input} should be out of range"
            );
        }
        assert_eq!(DateKey::parse("29/02/2024").unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn test_rejects_malformed_text() {
        for input in ["", "2026-01-15", "15/01", "15/01/2026/1", "aa/bb/cccc", "15/01/20261"] {
            assert!(
                matches!(DateKey::parse(input), Err(DateError::Malformed { .. })),
                "{input:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_ordering_is_chronological() {
        let dates = ["31/01/2026", "01/02/2026", "15/12/2025"].map(|s| DateKey::parse(s).unwrap());
        let mut sorted = dates;
        sorted.sort();
        assert_eq!(
            sorted.map(|d| d.to_string()),
            ["15/12/2025", "31/01/2026", "01/02/2026"]
        );
    }

    #[test]
    fn test_serializes_as_rendered_string() {
        let json = serde_json::to_string(&ymd(2026, 2, 1)).unwrap();
        assert_eq!(json, "\"01/02/2026\"");
        let parsed: DateKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ymd(2026, 2, 1));
    }
}
