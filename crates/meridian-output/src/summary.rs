//! Panel summary statistics.
//!
//! Summaries are computed over a projected panel frame: a `period` text
//! column in `YYYY-MM` form plus any number of `f64` columns. Key columns
//! that are not `f64` are skipped.

use crate::export::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics of one numeric column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,

    /// Number of non-null values.
    pub count: usize,

    /// Mean.
    pub mean: Option<f64>,

    /// Sample standard deviation.
    pub std: Option<f64>,

    /// Minimum.
    pub min: Option<f64>,

    /// Maximum.
    pub max: Option<f64>,
}

impl ColumnSummary {
    fn of(name: &str, values: &Float64Chunked) -> Self {
        Self {
            name: name.to_string(),
            count: values.len() - values.null_count(),
            mean: values.mean(),
            std: values.std(1),
            min: values.min(),
            max: values.max(),
        }
    }
}

/// Row, series and period coverage of a panel with per-column statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelSummary {
    /// Panel name.
    pub name: String,

    /// Number of rows.
    pub rows: usize,

    /// Number of distinct series.
    pub series: usize,

    /// Earliest period.
    pub first_period: Option<String>,

    /// Latest period.
    pub last_period: Option<String>,

    /// Statistics of the numeric columns, in frame order.
    pub columns: Vec<ColumnSummary>,
}

impl PanelSummary {
    /// Summarize `frame`, whose rows belong to `series` distinct series.
    pub fn from_frame(name: impl Into<String>, frame: &DataFrame, series: usize) -> Result<Self> {
        let (first_period, last_period) = match frame.column("period") {
            Ok(column) => {
                let periods = column.as_materialized_series().str()?;
                (
                    periods.into_iter().flatten().min().map(str::to_string),
                    periods.into_iter().flatten().max().map(str::to_string),
                )
            }
            Err(_) => (None, None),
        };

        let mut columns = Vec::new();
        for column in frame.get_columns() {
            if column.dtype() != &DataType::Float64 {
                continue;
            }
            let values = column.as_materialized_series().f64()?;
            columns.push(ColumnSummary::of(column.name().as_str(), values));
        }

        Ok(Self {
            name: name.into(),
            rows: frame.height(),
            series,
            first_period,
            last_period,
            columns,
        })
    }

    /// Summary of a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", self));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        if self.columns.is_empty() {
            return output;
        }

        output.push_str(&format!(
            "{:<24} {:>8} {:>11} {:>11} {:>11} {:>11}\n",
            "Column", "Count", "Mean", "Std", "Min", "Max"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        let cell = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        for column in &self.columns {
            output.push_str(&format!(
                "{:<24} {:>8} {:>11} {:>11} {:>11} {:>11}\n",
                column.name,
                column.count,
                cell(column.mean),
                cell(column.std),
                cell(column.min),
                cell(column.max)
            ));
        }

        output
    }
}

impl fmt::Display for PanelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} rows, {} series", self.name, self.rows, self.series)?;
        if let (Some(first), Some(last)) = (&self.first_period, &self.last_period) {
            write!(f, ", {first} to {last}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> DataFrame {
        df!(
            "entity_id" => ["1004", "1004", "1010"],
            "period" => ["2021-03", "2021-01", "2021-02"],
            "beta" => [0.5, 1.0, 1.5],
            "usd_market_value" => [100.0, 200.0, 600.0],
        )
        .unwrap()
    }

    #[test]
    fn test_summary_counts_and_range() {
        let summary = PanelSummary::from_frame("securities", &frame(), 2).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.series, 2);
        assert_eq!(summary.first_period.as_deref(), Some("2021-01"));
        assert_eq!(summary.last_period.as_deref(), Some("2021-03"));
        assert_eq!(summary.columns.len(), 2);
    }

    #[test]
    fn test_column_statistics() {
        let summary = PanelSummary::from_frame("securities", &frame(), 2).unwrap();
        let beta = summary.column("beta").unwrap();
        assert_eq!(beta.count, 3);
        assert_relative_eq!(beta.mean.unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(beta.std.unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(beta.min, Some(0.5));
        assert_eq!(beta.max, Some(1.5));
    }

    #[test]
    fn test_display_and_table() {
        let summary = PanelSummary::from_frame("securities", &frame(), 2).unwrap();
        assert_eq!(
            summary.to_string(),
            "securities: 3 rows, 2 series, 2021-01 to 2021-03"
        );
        let table = summary.to_ascii_table();
        assert!(table.contains("usd_market_value"));
        assert!(table.contains("1.0000"));
    }

    #[test]
    fn test_frame_without_period() {
        let frame = df!("revenue" => [1.0, 2.0]).unwrap();
        let summary = PanelSummary::from_frame("fundamentals", &frame, 1).unwrap();
        assert_eq!(summary.first_period, None);
        assert_eq!(summary.to_string(), "fundamentals: 2 rows, 1 series");
    }
}
