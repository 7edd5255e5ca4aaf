//! Security returns in local and base currencies.
//!
//! For each `(entity, issue)` series, ordered by period:
//!
//! - adjusted close = price / adjustment factor × total-return factor
//! - local return = change of the adjusted close since the previous row
//! - FX return = change of the month-end rate since the previous row
//! - base-currency return = (1 + local)(1 + fx) − 1
//! - gap = months elapsed since the previous row
//! - monthly return = (1 + r)^(1 / gap) − 1
//!
//! Returns are stored in percent. Market values are shares outstanding ×
//! price, converted with the month-end rate.

use crate::currency::{CurrencyRateIndex, FxRate};
use crate::panel::{Panel, Periodic, PriceObservation};
use crate::period::Period;
use meridian_data::CurrencyCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scale of stored returns.
pub const PERCENT: f64 = 100.0;

/// One row of the security return panel.
///
/// Fields are optional while the row moves through the pipeline stages; they
/// are only guaranteed present after finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReturnRow {
    /// Period of the row
    pub period: Period,
    /// Quote currency
    pub currency: CurrencyCode,
    /// Adjusted close price
    pub adjusted_close: f64,
    /// Month-end FX rates of the quote currency
    pub fx: FxRate,
    /// Months elapsed since the previous row of the series
    pub gap: Option<u32>,
    /// Local-currency return, percent
    pub local_return: Option<f64>,
    /// USD FX return, percent
    pub usd_fx_return: Option<f64>,
    /// GBP FX return, percent
    pub gbp_fx_return: Option<f64>,
    /// USD return, percent
    pub usd_return: Option<f64>,
    /// GBP return, percent
    pub gbp_return: Option<f64>,
    /// Gap-standardized monthly local return, percent
    pub monthly_local_return: Option<f64>,
    /// Gap-standardized monthly USD return, percent
    pub monthly_usd_return: Option<f64>,
    /// Gap-standardized monthly GBP return, percent
    pub monthly_gbp_return: Option<f64>,
    /// Local-currency market value
    pub local_market_value: Option<f64>,
    /// USD market value
    pub usd_market_value: Option<f64>,
    /// GBP market value
    pub gbp_market_value: Option<f64>,
    /// Market return of the period, percent
    pub market_return: Option<f64>,
    /// Rolling beta against the market
    pub beta: Option<f64>,
}

impl Periodic for SecurityReturnRow {
    fn period(&self) -> Period {
        self.period
    }
}

/// Fractional change from `previous` to `current`.
pub fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    Some(current? / previous? - 1.0)
}

/// Compound a local return with a currency return (both fractional).
pub fn compound(local: f64, fx: f64) -> f64 {
    (1.0 + local) * (1.0 + fx) - 1.0
}

/// Equivalent single-period rate of a fractional return spanning `gap` periods.
pub fn standardize(ret: f64, gap: u32) -> f64 {
    (1.0 + ret).powf(1.0 / f64::from(gap)) - 1.0
}

/// Computes the return columns of each series.
#[derive(Debug, Clone, Copy)]
pub struct ReturnCalculator<'a> {
    rates: &'a CurrencyRateIndex,
}

impl<'a> ReturnCalculator<'a> {
    /// Create a calculator joining against `rates`.
    pub const fn new(rates: &'a CurrencyRateIndex) -> Self {
        Self { rates }
    }

    /// Compute returns for every series of the panel.
    pub fn compute(&self, prices: Panel<PriceObservation>) -> Panel<SecurityReturnRow> {
        let panel = prices.map_series(|_, observations| self.compute_series(&observations));
        debug!(
            rows = panel.len(),
            series = panel.series_count(),
            "computed security returns"
        );
        panel
    }

    /// Compute returns for one period-ordered series.
    pub fn compute_series(&self, observations: &[PriceObservation]) -> Vec<SecurityReturnRow> {
        let mut rows: Vec<SecurityReturnRow> = Vec::with_capacity(observations.len());

        for observation in observations {
            let adjusted_close = observation.close / observation.adjustment_factor
                * observation.total_return_factor;
            let fx = self.rates.monthly(&observation.currency, observation.period);
            let local_market_value = observation.shares_outstanding * observation.close;

            let previous = rows.last();
            let gap = previous.map(|p| observation.period.months_since(&p.period) as u32);
            let local = pct_change(previous.map(|p| p.adjusted_close), Some(adjusted_close));
            let usd_fx = pct_change(previous.and_then(|p| p.fx.to_usd), fx.to_usd);
            let gbp_fx = pct_change(previous.and_then(|p| p.fx.to_gbp), fx.to_gbp);
            let usd = local.zip(usd_fx).map(|(l, f)| compound(l, f));
            let gbp = local.zip(gbp_fx).map(|(l, f)| compound(l, f));
            let monthly = |ret: Option<f64>| ret.zip(gap).map(|(r, g)| standardize(r, g) * PERCENT);

            rows.push(SecurityReturnRow {
                period: observation.period,
                currency: observation.currency.clone(),
                adjusted_close,
                fx,
                gap,
                local_return: local.map(|r| r * PERCENT),
                usd_fx_return: usd_fx.map(|r| r * PERCENT),
                gbp_fx_return: gbp_fx.map(|r| r * PERCENT),
                usd_return: usd.map(|r| r * PERCENT),
                gbp_return: gbp.map(|r| r * PERCENT),
                monthly_local_return: monthly(local),
                monthly_usd_return: monthly(usd),
                monthly_gbp_return: monthly(gbp),
                local_market_value: Some(local_market_value),
                usd_market_value: fx.to_usd.map(|rate| local_market_value * rate),
                gbp_market_value: fx.to_gbp.map(|rate| local_market_value * rate),
                market_return: None,
                beta: None,
            });
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use meridian_data::ExchangeRate;
    use rstest::rstest;

    fn observation(year: i32, month: u32, close: f64) -> PriceObservation {
        PriceObservation {
            period: Period::new(year, month).unwrap(),
            date: NaiveDate::from_ymd_opt(year, month, 28).unwrap(),
            currency: CurrencyCode::new("EUR"),
            close,
            shares_outstanding: 2.0,
            adjustment_factor: 1.0,
            total_return_factor: 1.0,
        }
    }

    fn rate(year: i32, month: u32, usd: f64, gbp: f64) -> ExchangeRate {
        ExchangeRate {
            currency: Some(CurrencyCode::new("EUR")),
            date: NaiveDate::from_ymd_opt(year, month, 28),
            to_usd: Some(usd),
            to_gbp: Some(gbp),
        }
    }

    #[rstest]
    #[case(0.10, 0.0, 0.10)]
    #[case(0.10, 0.05, 0.155)]
    #[case(-0.20, 0.25, 0.0)]
    fn test_compound(#[case] local: f64, #[case] fx: f64, #[case] expected: f64) {
        assert_relative_eq!(compound(local, fx), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_single_period_is_identity() {
        assert_relative_eq!(standardize(0.07, 1), 0.07, epsilon = 1e-12);
        assert_relative_eq!(standardize(0.21, 2), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_series_returns_and_market_value() {
        let rates = CurrencyRateIndex::new(&[
            rate(2020, 1, 0.9, 0.8),
            rate(2020, 2, 0.99, 0.8),
        ]);
        let calculator = ReturnCalculator::new(&rates);
        let rows = calculator.compute_series(&[observation(2020, 1, 100.0), observation(2020, 2, 110.0)]);

        assert_eq!(rows[0].gap, None);
        assert_eq!(rows[0].local_return, None);
        assert_eq!(rows[0].monthly_local_return, None);
        assert_relative_eq!(rows[0].usd_market_value.unwrap(), 180.0, epsilon = 1e-9);

        let second = &rows[1];
        assert_eq!(second.gap, Some(1));
        assert_relative_eq!(second.local_return.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(second.usd_fx_return.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(second.gbp_fx_return.unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(second.usd_return.unwrap(), 21.0, epsilon = 1e-9);
        assert_relative_eq!(second.gbp_return.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(second.monthly_usd_return.unwrap(), 21.0, epsilon = 1e-9);
        assert_relative_eq!(second.local_market_value.unwrap(), 220.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gap_standardizes_multi_month_return() {
        let rates = CurrencyRateIndex::new(&[rate(2020, 1, 1.0, 1.0), rate(2020, 4, 1.0, 1.0)]);
        let rows = ReturnCalculator::new(&rates)
            .compute_series(&[observation(2020, 1, 100.0), observation(2020, 4, 133.1)]);

        assert_eq!(rows[1].gap, Some(3));
        assert_relative_eq!(rows[1].local_return.unwrap(), 33.1, epsilon = 1e-9);
        assert_relative_eq!(rows[1].monthly_local_return.unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_rate_leaves_fx_fields_missing() {
        let rates = CurrencyRateIndex::new(&[rate(2020, 1, 1.0, 1.0)]);
        let rows = ReturnCalculator::new(&rates)
            .compute_series(&[observation(2020, 1, 100.0), observation(2020, 2, 101.0)]);

        assert!(rows[1].local_return.is_some());
        assert_eq!(rows[1].usd_fx_return, None);
        assert_eq!(rows[1].usd_return, None);
        assert_eq!(rows[1].usd_market_value, None);
    }
}
