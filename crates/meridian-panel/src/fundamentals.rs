//! Currency-normalized company fundamentals.
//!
//! Balance-sheet figures (assets, equity) are stocks measured at the fiscal
//! year end and convert with the year-end rate. Income-statement figures
//! (operating income, revenue) accrue through the year and convert with the
//! year-average rate.

use crate::currency::{BaseCurrency, CurrencyRateIndex};
use crate::error::Result;
use crate::outliers::Columnar;
use crate::returns::PERCENT;
use meridian_data::{CurrencyCode, EntityId, FundamentalRecord};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Fundamentals of one entity and fiscal year, in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFundamentals {
    /// Entity id
    pub entity_id: EntityId,
    /// Fiscal year
    pub fiscal_year: i32,
    /// Reporting currency
    pub reporting_currency: CurrencyCode,
    /// Currency of the converted figures
    pub base_currency: BaseCurrency,
    /// Total assets
    pub total_assets: f64,
    /// Common equity
    pub common_equity: f64,
    /// Operating income
    pub operating_income: f64,
    /// Revenue
    pub revenue: f64,
    /// Change of total assets since the previous fiscal year, percent
    pub investment: f64,
    /// Operating income / revenue
    pub operating_profitability: f64,
}

/// Numeric columns of [`NormalizedFundamentals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalsColumn {
    /// Total assets
    TotalAssets,
    /// Common equity
    CommonEquity,
    /// Operating income
    OperatingIncome,
    /// Revenue
    Revenue,
    /// Investment
    Investment,
    /// Operating profitability
    OperatingProfitability,
}

impl FundamentalsColumn {
    /// Every column, in record order.
    pub const ALL: [Self; 6] = [
        Self::TotalAssets,
        Self::CommonEquity,
        Self::OperatingIncome,
        Self::Revenue,
        Self::Investment,
        Self::OperatingProfitability,
    ];

    /// Column name, matching the serialized field name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TotalAssets => "total_assets",
            Self::CommonEquity => "common_equity",
            Self::OperatingIncome => "operating_income",
            Self::Revenue => "revenue",
            Self::Investment => "investment",
            Self::OperatingProfitability => "operating_profitability",
        }
    }
}

impl Columnar for NormalizedFundamentals {
    type Column = FundamentalsColumn;

    fn value(&self, column: FundamentalsColumn) -> f64 {
        match column {
            FundamentalsColumn::TotalAssets => self.total_assets,
            FundamentalsColumn::CommonEquity => self.common_equity,
            FundamentalsColumn::OperatingIncome => self.operating_income,
            FundamentalsColumn::Revenue => self.revenue,
            FundamentalsColumn::Investment => self.investment,
            FundamentalsColumn::OperatingProfitability => self.operating_profitability,
        }
    }
}

/// A deduplicated, complete and converted report, before derivations.
#[derive(Debug, Clone)]
struct Converted {
    fiscal_year: i32,
    currency: CurrencyCode,
    total_assets: f64,
    common_equity: f64,
    operating_income: f64,
    revenue: f64,
}

/// Deduplicates, converts and derives ratios from fundamentals.
#[derive(Debug, Clone, Copy)]
pub struct FundamentalsNormalizer<'a> {
    rates: &'a CurrencyRateIndex,
    base: BaseCurrency,
}

impl<'a> FundamentalsNormalizer<'a> {
    /// Create a normalizer converting into `base`.
    pub const fn new(rates: &'a CurrencyRateIndex, base: BaseCurrency) -> Self {
        Self { rates, base }
    }

    /// Keep the first record of each (entity, fiscal year), in input order.
    ///
    /// Input order is the only tie-break; it is not assumed to be
    /// chronological. Records without an entity or fiscal year are kept
    /// as-is and fall out at the completeness check.
    pub fn deduplicate(records: &[FundamentalRecord]) -> Vec<&FundamentalRecord> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|record| match (&record.entity_id, record.fiscal_year) {
                (Some(entity), Some(year)) => seen.insert((entity, year)),
                _ => true,
            })
            .collect()
    }

    /// Normalize the reports, ordered by entity and fiscal year.
    pub fn normalize(&self, records: &[FundamentalRecord]) -> Vec<NormalizedFundamentals> {
        let unique = Self::deduplicate(records);
        let unique_count = unique.len();

        let mut by_entity: BTreeMap<EntityId, Vec<Converted>> = BTreeMap::new();
        let mut complete = 0usize;
        for record in unique {
            let Some((entity, report)) = complete_report(record) else {
                continue;
            };
            complete += 1;
            by_entity
                .entry(entity)
                .or_default()
                .push(self.convert(report));
        }

        let normalized: Vec<NormalizedFundamentals> = by_entity
            .into_iter()
            .flat_map(|(entity, mut reports)| {
                reports.sort_by_key(|r| r.fiscal_year);
                self.derive(&entity, &reports)
            })
            .collect();

        debug!(
            input = records.len(),
            duplicates = records.len() - unique_count,
            incomplete = unique_count - complete,
            "deduplicated fundamentals"
        );
        info!(
            rows = normalized.len(),
            base = %self.base,
            "normalized fundamentals"
        );
        normalized
    }

    /// Convert into the base currency. A missing rate converts to NaN, so
    /// the report still anchors the next year's investment as undefined.
    fn convert(&self, report: Converted) -> Converted {
        let point = self
            .rates
            .balance_sheet(&report.currency, report.fiscal_year)
            .rate(self.base)
            .unwrap_or(f64::NAN);
        let average = self
            .rates
            .income_statement(&report.currency, report.fiscal_year)
            .rate(self.base)
            .unwrap_or(f64::NAN);
        Converted {
            total_assets: report.total_assets * point,
            common_equity: report.common_equity * point,
            operating_income: report.operating_income * average,
            revenue: report.revenue * average,
            ..report
        }
    }

    fn derive(&self, entity: &EntityId, reports: &[Converted]) -> Vec<NormalizedFundamentals> {
        reports
            .windows(2)
            .filter_map(|pair| {
                let (previous, current) = (&pair[0], &pair[1]);
                let investment = (current.total_assets / previous.total_assets - 1.0) * PERCENT;
                let operating_profitability = current.operating_income / current.revenue;
                let row = NormalizedFundamentals {
                    entity_id: entity.clone(),
                    fiscal_year: current.fiscal_year,
                    reporting_currency: current.currency.clone(),
                    base_currency: self.base,
                    total_assets: current.total_assets,
                    common_equity: current.common_equity,
                    operating_income: current.operating_income,
                    revenue: current.revenue,
                    investment,
                    operating_profitability,
                };
                is_finite(&row).then_some(row)
            })
            .collect()
    }
}

/// Frame of `entity_id`, `fiscal_year` and every numeric column.
pub fn fundamentals_frame(rows: &[NormalizedFundamentals]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = vec![
        Series::new(
            "entity_id".into(),
            rows.iter().map(|r| r.entity_id.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "fiscal_year".into(),
            rows.iter().map(|r| r.fiscal_year).collect::<Vec<_>>(),
        )
        .into(),
    ];
    for column in FundamentalsColumn::ALL {
        let values: Vec<f64> = rows.iter().map(|r| r.value(column)).collect();
        columns.push(Series::new(column.name().into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}

fn complete_report(record: &FundamentalRecord) -> Option<(EntityId, Converted)> {
    Some((
        record.entity_id.clone()?,
        Converted {
            fiscal_year: record.fiscal_year?,
            currency: record.currency.clone()?,
            total_assets: record.total_assets?,
            common_equity: record.common_equity?,
            operating_income: record.operating_income?,
            revenue: record.revenue?,
        },
    ))
}

fn is_finite(row: &NormalizedFundamentals) -> bool {
    [
        row.total_assets,
        row.common_equity,
        row.operating_income,
        row.revenue,
        row.investment,
        row.operating_profitability,
    ]
    .iter()
    .all(|v| v.is_finite())
}
