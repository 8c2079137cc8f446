//! Calendar-month periods used as the time axis of an ingestion unit.
//!
//! The upstream portal partitions transactions by `DEAL_YMD`, a six-digit
//! `YYYYMM` string. [`YearMonth`] is the validated form of that string.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Error returned when a `YYYYMM` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year-month '{input}': expected YYYYMM with month 01-12")]
pub struct ParseYearMonthError {
    /// The rejected input.
    pub input: String,
}

/// A calendar month (e.g. `202401`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a period, returning `None` if `month` is outside `1..=12` or
    /// `year` does not fit in four digits.
    #[must_use]
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if year < 0 || year > 9999 || month == 0 || month > 12 {
            return None;
        }
        Some(Self { year, month })
    }

    /// The period containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Four-digit year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month number, `1..=12`.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The following calendar month.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding calendar month.
    #[must_use]
    pub const fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Every month from `start` to `end`, both inclusive, ascending.
    ///
    /// Empty when `start > end`.
    #[must_use]
    pub fn range_inclusive(start: Self, end: Self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut cur = start;
        while cur <= end {
            out.push(cur);
            cur = cur.next();
        }
        out
    }

    /// The trailing `n` calendar months ending with (and including) the
    /// month of `today`, ascending and without duplicates.
    #[must_use]
    pub fn trailing(n: u32, today: NaiveDate) -> Vec<Self> {
        let mut out = Vec::with_capacity(n as usize);
        let mut cur = Self::from_date(today);
        for _ in 0..n {
            out.push(cur);
            cur = cur.prev();
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.len() != 6 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year = trimmed[..4].parse::<i32>().map_err(|_| err())?;
        let month = trimmed[4..].parse::<u32>().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ParseYearMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_formats_yyyymm() {
        let p = ym("202401");
        assert_eq!(p.year(), 2024);
        assert_eq!(p.month(), 1);
        assert_eq!(p.to_string(), "202401");
    }

    #[test]
    fn rejects_bad_month_and_length() {
        assert!("202413".parse::<YearMonth>().is_err());
        assert!("202400".parse::<YearMonth>().is_err());
        assert!("20241".parse::<YearMonth>().is_err());
        assert!("2024-1".parse::<YearMonth>().is_err());
    }

    #[test]
    fn range_crosses_year_boundary() {
        let months = YearMonth::range_inclusive(ym("202311"), ym("202402"));
        let rendered: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["202311", "202312", "202401", "202402"]);
    }

    #[test]
    fn range_is_empty_when_start_after_end() {
        assert!(YearMonth::range_inclusive(ym("202402"), ym("202401")).is_empty());
    }

    #[test]
    fn trailing_window_includes_current_month_ascending() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let months = YearMonth::trailing(3, today);
        let rendered: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["202312", "202401", "202402"]);
    }

    #[test]
    fn trailing_zero_is_empty() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert!(YearMonth::trailing(0, today).is_empty());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&ym("200601")).unwrap();
        assert_eq!(json, "\"200601\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("200601"));
    }
}
