//! Calendar year-month buckets.

use chrono::{Datelike, NaiveDate};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A calendar year-month. All series are aligned on periods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[display("{year:04}-{month:02}")]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, `None` when `month` is outside `1..=12`.
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if matches!(month, 1..=12) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The period containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Calendar year.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, `1..=12`.
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Months since year zero, for arithmetic.
    pub const fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Number of months elapsed since `earlier` (negative if `earlier` is later).
    pub const fn months_since(&self, earlier: &Self) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    /// The period `months` after this one.
    pub const fn offset(&self, months: i64) -> Self {
        let ordinal = self.ordinal() + months;
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

/// Error returned when a period string is not `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period `{0}`, expected YYYY-MM")]
pub struct ParsePeriodError(String);

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePeriodError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let year = year.parse().map_err(|_| err())?;
        let month = month.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

impl TryFrom<String> for Period {
    type Error = ParsePeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_display_and_parse() {
        let period = Period::new(2021, 3).unwrap();
        assert_eq!(period.to_string(), "2021-03");
        assert_eq!("2021-03".parse::<Period>().unwrap(), period);
        assert!("2021-13".parse::<Period>().is_err());
        assert!("202103".parse::<Period>().is_err());
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(12, true)]
    #[case(13, false)]
    fn test_new_month_bounds(#[case] month: u32, #[case] valid: bool) {
        assert_eq!(Period::new(2020, month).is_some(), valid);
    }

    #[rstest]
    #[case((2020, 1), (2020, 2), 1)]
    #[case((2019, 12), (2020, 1), 1)]
    #[case((2019, 11), (2020, 2), 3)]
    #[case((2020, 5), (2020, 5), 0)]
    fn test_months_since(#[case] from: (i32, u32), #[case] to: (i32, u32), #[case] gap: i64) {
        let from = Period::new(from.0, from.1).unwrap();
        let to = Period::new(to.0, to.1).unwrap();
        assert_eq!(to.months_since(&from), gap);
    }

    #[test]
    fn test_offset_wraps_years() {
        let period = Period::new(2020, 11).unwrap();
        assert_eq!(period.offset(3), Period::new(2021, 2).unwrap());
        assert_eq!(period.offset(-11), Period::new(2019, 12).unwrap());
    }

    #[test]
    fn test_from_date_and_order() {
        let date = NaiveDate::from_ymd_opt(2022, 7, 29).unwrap();
        assert_eq!(Period::from_date(date), Period::new(2022, 7).unwrap());
        assert!(Period::new(2021, 12).unwrap() < Period::new(2022, 1).unwrap());
    }
}
