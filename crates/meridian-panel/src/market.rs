//! Aggregate monthly market return series.

use crate::period::Period;
use meridian_data::MarketIndexRecord;
use std::collections::BTreeMap;
use tracing::debug;

/// Monthly market returns in percent, keyed by period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketReturns {
    returns: BTreeMap<Period, f64>,
}

impl MarketReturns {
    /// Build the series from index levels.
    ///
    /// The last level observed in each month is compared with the previous
    /// observed month. The first month has no return and is not part of the
    /// series; neither are non-finite changes from a zero level.
    pub fn from_levels(records: &[MarketIndexRecord]) -> Self {
        let mut levels: Vec<_> = records
            .iter()
            .filter_map(|r| Some((r.date?, r.level?)))
            .collect();
        levels.sort_by_key(|(date, _)| *date);

        let mut month_end: BTreeMap<Period, f64> = BTreeMap::new();
        for (date, level) in levels {
            month_end.insert(Period::from_date(date), level);
        }

        let returns: BTreeMap<Period, f64> = month_end
            .iter()
            .zip(month_end.iter().skip(1))
            .filter_map(|((_, previous), (period, current))| {
                let change = (current / previous - 1.0) * 100.0;
                change.is_finite().then_some((*period, change))
            })
            .collect();

        debug!(
            observations = records.len(),
            months = month_end.len(),
            returns = returns.len(),
            "built market return series"
        );
        Self { returns }
    }

    /// Market return of `period`, in percent.
    pub fn get(&self, period: Period) -> Option<f64> {
        self.returns.get(&period).copied()
    }

    /// Number of periods with a return.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Iterate in period order.
    pub fn iter(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        self.returns.iter().map(|(period, value)| (*period, *value))
    }
}

impl FromIterator<(Period, f64)> for MarketReturns {
    fn from_iter<T: IntoIterator<Item = (Period, f64)>>(iter: T) -> Self {
        Self {
            returns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn level(date: (i32, u32, u32), value: Option<f64>) -> MarketIndexRecord {
        MarketIndexRecord {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            level: value,
        }
    }

    #[test]
    fn test_first_month_excluded() {
        let market = MarketReturns::from_levels(&[
            level((2020, 1, 31), Some(100.0)),
            level((2020, 2, 28), Some(110.0)),
            level((2020, 3, 31), Some(99.0)),
        ]);

        assert_eq!(market.len(), 2);
        assert_eq!(market.get(Period::new(2020, 1).unwrap()), None);
        assert_relative_eq!(market.get(Period::new(2020, 2).unwrap()).unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(market.get(Period::new(2020, 3).unwrap()).unwrap(), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_last_level_of_month_used() {
        let market = MarketReturns::from_levels(&[
            level((2020, 2, 28), Some(120.0)),
            level((2020, 1, 31), Some(100.0)),
            level((2020, 1, 15), Some(50.0)),
            level((2020, 2, 3), None),
        ]);

        assert_relative_eq!(market.get(Period::new(2020, 2).unwrap()).unwrap(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_level_change_excluded() {
        let market = MarketReturns::from_levels(&[
            level((2020, 1, 31), Some(0.0)),
            level((2020, 2, 28), Some(10.0)),
        ]);
        assert!(market.is_empty());
    }
}
