//! Look-ahead bias removal.
//!
//! Market value and beta computed at a row use that row's month-end data.
//! A forecast made at period `t` may only use what was known through `t-1`,
//! so these columns are lagged by one row within each series.

use crate::panel::Panel;
use crate::returns::SecurityReturnRow;
use tracing::debug;

/// The columns that are lagged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuardedValues {
    /// Local-currency market value
    pub local_market_value: Option<f64>,
    /// USD market value
    pub usd_market_value: Option<f64>,
    /// GBP market value
    pub gbp_market_value: Option<f64>,
    /// Rolling beta
    pub beta: Option<f64>,
}

impl GuardedValues {
    fn take(row: &mut SecurityReturnRow) -> Self {
        Self {
            local_market_value: row.local_market_value.take(),
            usd_market_value: row.usd_market_value.take(),
            gbp_market_value: row.gbp_market_value.take(),
            beta: row.beta.take(),
        }
    }

    const fn restore(self, row: &mut SecurityReturnRow) {
        row.local_market_value = self.local_market_value;
        row.usd_market_value = self.usd_market_value;
        row.gbp_market_value = self.gbp_market_value;
        row.beta = self.beta;
    }
}

/// Shifts forward-looking-sensitive columns by one row per series.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookAheadGuard;

impl LookAheadGuard {
    /// Lag the guarded columns of every series.
    pub fn apply(&self, panel: Panel<SecurityReturnRow>) -> Panel<SecurityReturnRow> {
        let panel = panel.map_series(|_, rows| self.shift_series(rows));
        debug!(rows = panel.len(), "lagged market value and beta");
        panel
    }

    /// Lag one series: row `t` receives the values computed at row `t-1`,
    /// and the first row's guarded columns become missing.
    pub fn shift_series(&self, mut rows: Vec<SecurityReturnRow>) -> Vec<SecurityReturnRow> {
        let mut carried = GuardedValues::default();
        for row in &mut rows {
            let current = GuardedValues::take(row);
            carried.restore(row);
            carried = current;
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::FxRate;
    use crate::period::Period;
    use meridian_data::CurrencyCode;

    fn row(month: u32, market_value: f64, beta: Option<f64>) -> SecurityReturnRow {
        SecurityReturnRow {
            period: Period::new(2020, month).unwrap(),
            currency: CurrencyCode::new("USD"),
            adjusted_close: 1.0,
            fx: FxRate::default(),
            gap: None,
            local_return: Some(month as f64),
            usd_fx_return: None,
            gbp_fx_return: None,
            usd_return: None,
            gbp_return: None,
            monthly_local_return: None,
            monthly_usd_return: None,
            monthly_gbp_return: None,
            local_market_value: Some(market_value),
            usd_market_value: Some(market_value * 2.0),
            gbp_market_value: None,
            market_return: None,
            beta,
        }
    }

    #[test]
    fn test_shift_by_one_row() {
        let rows = vec![
            row(1, 10.0, None),
            row(2, 20.0, Some(0.9)),
            row(3, 30.0, Some(1.1)),
        ];

        let shifted = LookAheadGuard.shift_series(rows);

        assert_eq!(shifted[0].local_market_value, None);
        assert_eq!(shifted[0].usd_market_value, None);
        assert_eq!(shifted[0].beta, None);
        assert_eq!(shifted[1].local_market_value, Some(10.0));
        assert_eq!(shifted[1].usd_market_value, Some(20.0));
        assert_eq!(shifted[1].beta, None);
        assert_eq!(shifted[2].local_market_value, Some(20.0));
        assert_eq!(shifted[2].beta, Some(0.9));
        // Unguarded columns stay in place
        assert_eq!(shifted[2].local_return, Some(3.0));
    }
}
