//! Panel-wide outlier trimming.
//!
//! Bounds are the lower and upper quantiles of each designated column over
//! the whole panel, not per series. A row survives only if every designated
//! value lies strictly inside its column's bounds.

use crate::error::{PanelError, Result};
use std::fmt::Debug;
use tracing::debug;

/// Records whose numeric columns can be addressed by a typed column id.
pub trait Columnar {
    /// Column identifier
    type Column: Copy + Debug;

    /// Value of `column` in this record.
    fn value(&self, column: Self::Column) -> f64;
}

/// Quantile of sorted values, linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Exclusive bounds of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower quantile
    pub lower: f64,
    /// Upper quantile
    pub upper: f64,
}

impl Bounds {
    /// Whether `value` lies strictly between the bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.lower < value && value < self.upper
    }
}

/// Configuration-driven outlier filter over typed columns.
#[derive(Debug, Clone)]
pub struct OutlierFilter<C> {
    columns: Vec<C>,
    lower_quantile: f64,
    upper_quantile: f64,
}

impl<C: Copy + Debug> OutlierFilter<C> {
    /// Default lower quantile (0.1th percentile).
    pub const DEFAULT_LOWER: f64 = 0.001;
    /// Default upper quantile (99.9th percentile).
    pub const DEFAULT_UPPER: f64 = 0.999;

    /// Filter on `columns` with the default quantiles.
    pub const fn new(columns: Vec<C>) -> Self {
        Self {
            columns,
            lower_quantile: Self::DEFAULT_LOWER,
            upper_quantile: Self::DEFAULT_UPPER,
        }
    }

    /// Filter on `columns` with custom quantiles.
    pub fn with_quantiles(columns: Vec<C>, lower: f64, upper: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
            return Err(PanelError::InvalidParameter(format!(
                "outlier quantiles must satisfy 0 <= lower < upper <= 1, got {lower} and {upper}"
            )));
        }
        Ok(Self {
            columns,
            lower_quantile: lower,
            upper_quantile: upper,
        })
    }

    /// Designated columns.
    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    /// Bounds of every designated column over `rows`.
    ///
    /// Columns without any finite value get no bounds.
    pub fn bounds<R>(&self, rows: &[R]) -> Vec<(C, Option<Bounds>)>
    where
        R: Columnar<Column = C>,
    {
        self.columns
            .iter()
            .map(|&column| {
                let mut values: Vec<f64> = rows
                    .iter()
                    .map(|row| row.value(column))
                    .filter(|v| v.is_finite())
                    .collect();
                values.sort_by(f64::total_cmp);
                let bounds = quantile(&values, self.lower_quantile)
                    .zip(quantile(&values, self.upper_quantile))
                    .map(|(lower, upper)| Bounds { lower, upper });
                (column, bounds)
            })
            .collect()
    }

    /// Keep the rows that lie inside the bounds of every designated column.
    pub fn apply<R>(&self, rows: Vec<R>) -> Vec<R>
    where
        R: Columnar<Column = C>,
    {
        if self.columns.is_empty() {
            return rows;
        }
        let bounds = self.bounds(&rows);
        let before = rows.len();
        let kept: Vec<R> = rows
            .into_iter()
            .filter(|row| {
                bounds.iter().all(|(column, bounds)| {
                    bounds.is_some_and(|b| b.contains(row.value(*column)))
                })
            })
            .collect();
        debug!(
            columns = ?self.columns,
            before,
            after = kept.len(),
            "trimmed outliers"
        );
        kept
    }
}
