//! Finalized security panel.

use crate::error::Result;
use crate::outliers::{Columnar, OutlierFilter};
use crate::panel::{Panel, SeriesKey};
use crate::period::Period;
use crate::returns::SecurityReturnRow;
use meridian_data::{CurrencyCode, EntityId, IssueId};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A complete row of the finalized security panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRecord {
    /// Entity id
    pub entity_id: EntityId,
    /// Issue id
    pub issue_id: IssueId,
    /// Period
    pub period: Period,
    /// Quote currency
    pub currency: CurrencyCode,
    /// Calendar year of the period
    pub data_year: i32,
    /// Year before `data_year`, for linking annual data
    pub prior_year: i32,
    /// Months since the previous observation
    pub gap: u32,
    /// Adjusted close price
    pub adjusted_close: f64,
    /// Month-end rate against USD
    pub usd_rate: f64,
    /// Month-end rate against GBP
    pub gbp_rate: f64,
    /// Local return, percent
    pub local_return: f64,
    /// USD FX return, percent
    pub usd_fx_return: f64,
    /// GBP FX return, percent
    pub gbp_fx_return: f64,
    /// USD return, percent
    pub usd_return: f64,
    /// GBP return, percent
    pub gbp_return: f64,
    /// Monthly local return, percent
    pub monthly_local_return: f64,
    /// Monthly USD return, percent
    pub monthly_usd_return: f64,
    /// Monthly GBP return, percent
    pub monthly_gbp_return: f64,
    /// Lagged local market value
    pub local_market_value: f64,
    /// Lagged USD market value
    pub usd_market_value: f64,
    /// Lagged GBP market value
    pub gbp_market_value: f64,
    /// Market return, percent
    pub market_return: f64,
    /// Lagged rolling beta
    pub beta: f64,
}

impl SecurityRecord {
    /// Convert a pipeline row, `None` if any field is missing or non-finite.
    pub fn from_row(key: &SeriesKey, row: &SecurityReturnRow) -> Option<Self> {
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        Some(Self {
            entity_id: key.entity_id.clone(),
            issue_id: key.issue_id.clone(),
            period: row.period,
            currency: row.currency.clone(),
            data_year: row.period.year(),
            prior_year: row.period.year() - 1,
            gap: row.gap?,
            adjusted_close: finite(Some(row.adjusted_close))?,
            usd_rate: finite(row.fx.to_usd)?,
            gbp_rate: finite(row.fx.to_gbp)?,
            local_return: finite(row.local_return)?,
            usd_fx_return: finite(row.usd_fx_return)?,
            gbp_fx_return: finite(row.gbp_fx_return)?,
            usd_return: finite(row.usd_return)?,
            gbp_return: finite(row.gbp_return)?,
            monthly_local_return: finite(row.monthly_local_return)?,
            monthly_usd_return: finite(row.monthly_usd_return)?,
            monthly_gbp_return: finite(row.monthly_gbp_return)?,
            local_market_value: finite(row.local_market_value)?,
            usd_market_value: finite(row.usd_market_value)?,
            gbp_market_value: finite(row.gbp_market_value)?,
            market_return: finite(row.market_return)?,
            beta: finite(row.beta)?,
        })
    }
}

/// Numeric columns of [`SecurityRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityColumn {
    /// Months since the previous observation
    Gap,
    /// Adjusted close price
    AdjustedClose,
    /// Month-end rate against USD
    UsdRate,
    /// Month-end rate against GBP
    GbpRate,
    /// Local return
    LocalReturn,
    /// USD FX return
    UsdFxReturn,
    /// GBP FX return
    GbpFxReturn,
    /// USD return
    UsdReturn,
    /// GBP return
    GbpReturn,
    /// Monthly local return
    MonthlyLocalReturn,
    /// Monthly USD return
    MonthlyUsdReturn,
    /// Monthly GBP return
    MonthlyGbpReturn,
    /// Local market value
    LocalMarketValue,
    /// USD market value
    UsdMarketValue,
    /// GBP market value
    GbpMarketValue,
    /// Market return
    MarketReturn,
    /// Beta
    Beta,
    /// Calendar year
    DataYear,
    /// Prior calendar year
    PriorYear,
}

impl SecurityColumn {
    /// Every column, in record order.
    pub const ALL: [Self; 19] = [
        Self::Gap,
        Self::AdjustedClose,
        Self::UsdRate,
        Self::GbpRate,
        Self::LocalReturn,
        Self::UsdFxReturn,
        Self::GbpFxReturn,
        Self::UsdReturn,
        Self::GbpReturn,
        Self::MonthlyLocalReturn,
        Self::MonthlyUsdReturn,
        Self::MonthlyGbpReturn,
        Self::LocalMarketValue,
        Self::UsdMarketValue,
        Self::GbpMarketValue,
        Self::MarketReturn,
        Self::Beta,
        Self::DataYear,
        Self::PriorYear,
    ];

    /// Column name, matching the serialized field name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gap => "gap",
            Self::AdjustedClose => "adjusted_close",
            Self::UsdRate => "usd_rate",
            Self::GbpRate => "gbp_rate",
            Self::LocalReturn => "local_return",
            Self::UsdFxReturn => "usd_fx_return",
            Self::GbpFxReturn => "gbp_fx_return",
            Self::UsdReturn => "usd_return",
            Self::GbpReturn => "gbp_return",
            Self::MonthlyLocalReturn => "monthly_local_return",
            Self::MonthlyUsdReturn => "monthly_usd_return",
            Self::MonthlyGbpReturn => "monthly_gbp_return",
            Self::LocalMarketValue => "local_market_value",
            Self::UsdMarketValue => "usd_market_value",
            Self::GbpMarketValue => "gbp_market_value",
            Self::MarketReturn => "market_return",
            Self::Beta => "beta",
            Self::DataYear => "data_year",
            Self::PriorYear => "prior_year",
        }
    }
}

impl Columnar for SecurityRecord {
    type Column = SecurityColumn;

    fn value(&self, column: SecurityColumn) -> f64 {
        match column {
            SecurityColumn::Gap => f64::from(self.gap),
            SecurityColumn::AdjustedClose => self.adjusted_close,
            SecurityColumn::UsdRate => self.usd_rate,
            SecurityColumn::GbpRate => self.gbp_rate,
            SecurityColumn::LocalReturn => self.local_return,
            SecurityColumn::UsdFxReturn => self.usd_fx_return,
            SecurityColumn::GbpFxReturn => self.gbp_fx_return,
            SecurityColumn::UsdReturn => self.usd_return,
            SecurityColumn::GbpReturn => self.gbp_return,
            SecurityColumn::MonthlyLocalReturn => self.monthly_local_return,
            SecurityColumn::MonthlyUsdReturn => self.monthly_usd_return,
            SecurityColumn::MonthlyGbpReturn => self.monthly_gbp_return,
            SecurityColumn::LocalMarketValue => self.local_market_value,
            SecurityColumn::UsdMarketValue => self.usd_market_value,
            SecurityColumn::GbpMarketValue => self.gbp_market_value,
            SecurityColumn::MarketReturn => self.market_return,
            SecurityColumn::Beta => self.beta,
            SecurityColumn::DataYear => f64::from(self.data_year),
            SecurityColumn::PriorYear => f64::from(self.prior_year),
        }
    }
}

/// The finalized security panel, ordered by entity, issue and period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityPanel {
    records: Vec<SecurityRecord>,
}

impl SecurityPanel {
    /// Finalize pipeline rows, silently dropping incomplete ones.
    pub fn finalize(panel: Panel<SecurityReturnRow>) -> Self {
        let before = panel.len();
        let records: Vec<SecurityRecord> = panel
            .iter()
            .flat_map(|(key, rows)| rows.iter().filter_map(|row| SecurityRecord::from_row(key, row)))
            .collect();
        debug!(
            before,
            dropped = before - records.len(),
            "dropped incomplete security rows"
        );
        info!(rows = records.len(), "finalized security panel");
        Self { records }
    }

    /// Trim outliers panel-wide.
    pub fn trim_outliers(self, filter: &OutlierFilter<SecurityColumn>) -> Self {
        Self {
            records: filter.apply(self.records),
        }
    }

    /// Records in key order.
    pub fn records(&self) -> &[SecurityRecord] {
        &self.records
    }

    /// Consume the panel into its records.
    pub fn into_records(self) -> Vec<SecurityRecord> {
        self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the panel is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct `(entity, issue)` series.
    pub fn series_count(&self) -> usize {
        let mut count = 0;
        let mut previous: Option<(&EntityId, &IssueId)> = None;
        for record in &self.records {
            let key = (&record.entity_id, &record.issue_id);
            if previous != Some(key) {
                count += 1;
                previous = Some(key);
            }
        }
        count
    }

    /// Row of `(entity, issue, period)`.
    pub fn lookup(&self, entity: &EntityId, issue: &IssueId, period: Period) -> Option<&SecurityRecord> {
        self.records
            .binary_search_by(|record| {
                (&record.entity_id, &record.issue_id, record.period).cmp(&(entity, issue, period))
            })
            .ok()
            .map(|i| &self.records[i])
    }

    /// Project the panel to a frame of key columns followed by `columns`.
    pub fn select(&self, columns: &[SecurityColumn]) -> Result<DataFrame> {
        let mut frame_columns: Vec<Column> = vec![
            Series::new(
                "entity_id".into(),
                self.records.iter().map(|r| r.entity_id.as_str()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "issue_id".into(),
                self.records.iter().map(|r| r.issue_id.as_str()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "period".into(),
                self.records
                    .iter()
                    .map(|r| r.period.to_string())
                    .collect::<Vec<_>>(),
            )
            .into(),
        ];
        for column in columns {
            let values: Vec<f64> = self.records.iter().map(|r| r.value(*column)).collect();
            frame_columns.push(Series::new(column.name().into(), values).into());
        }
        Ok(DataFrame::new(frame_columns)?)
    }
}
