//! Loading of delimited source tables into typed records.
//!
//! Tables are read with every column as text and converted column by column,
//! so identifiers keep their leading zeros and unparseable values become
//! missing rather than failing the whole load. Only an absent required column
//! is fatal.

use crate::emissions::{EntityMapping, RawEmissionsRecord};
use crate::error::{DataError, Result};
use crate::records::{
    CurrencyCode, EntityId, ExchangeRate, FundamentalRecord, IssueId, MarketIndexRecord,
    RawPriceRecord,
};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Input datasets understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Monthly security prices
    #[display("securities")]
    Securities,
    /// Daily exchange rates
    #[display("exchange rates")]
    ExchangeRates,
    /// Market index levels
    #[display("market index")]
    MarketIndex,
    /// Annual fundamentals
    #[display("fundamentals")]
    Fundamentals,
    /// Emissions disclosures
    #[display("emissions")]
    Emissions,
    /// Company id to entity id mapping
    #[display("entity mapping")]
    EntityMapping,
}

impl Dataset {
    /// Columns that must be present in the source table.
    pub const fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Securities => &[
                "gvkey", "iid", "datadate", "curcdm", "prccm", "ajexm", "trfm", "cshom",
            ],
            Self::ExchangeRates => &["curd", "datadate", "exratd_toUSD", "exratd_toGBP"],
            Self::MarketIndex => &["datadate", "prccm"],
            Self::Fundamentals => &["gvkey", "fyear", "curcd", "at", "ceq", "oiadp", "revt"],
            Self::Emissions => &[
                "institutionid",
                "companyid",
                "companyname",
                "gvkey",
                "fiscalyear",
                "periodenddate",
            ],
            Self::EntityMapping => &["companyid", "gvkey", "startdate", "enddate"],
        }
    }

    /// Fail with [`DataError::MissingColumn`] on the first absent required column.
    pub fn validate(&self, frame: &DataFrame) -> Result<()> {
        for column in self.required_columns() {
            if frame.column(column).is_err() {
                return Err(DataError::MissingColumn {
                    dataset: *self,
                    column: (*column).to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Read a delimited file with a header row, every column as text.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!(path = %path.display(), rows = frame.height(), "read source table");
    Ok(frame)
}

/// Convert a securities table into price records.
pub fn price_records(frame: &DataFrame) -> Result<Vec<RawPriceRecord>> {
    let dataset = Dataset::Securities;
    dataset.validate(frame)?;

    let entities = text_column(frame, dataset, "gvkey")?;
    let issues = text_column(frame, dataset, "iid")?;
    let dates = date_column(frame, dataset, "datadate")?;
    let currencies = text_column(frame, dataset, "curcdm")?;
    let closes = numeric_column(frame, dataset, "prccm")?;
    let adjustments = numeric_column(frame, dataset, "ajexm")?;
    let total_returns = numeric_column(frame, dataset, "trfm")?;
    let shares = numeric_column(frame, dataset, "cshom")?;

    Ok((0..frame.height())
        .map(|i| RawPriceRecord {
            entity_id: entities[i].as_deref().map(EntityId::new),
            issue_id: issues[i].as_deref().map(IssueId::new),
            date: dates[i],
            currency: currencies[i].as_deref().map(CurrencyCode::new),
            close: closes[i],
            shares_outstanding: shares[i],
            adjustment_factor: adjustments[i],
            total_return_factor: total_returns[i],
        })
        .collect())
}

/// Convert an exchange-rate table into rate observations.
pub fn exchange_rates(frame: &DataFrame) -> Result<Vec<ExchangeRate>> {
    let dataset = Dataset::ExchangeRates;
    dataset.validate(frame)?;

    let currencies = text_column(frame, dataset, "curd")?;
    let dates = date_column(frame, dataset, "datadate")?;
    let to_usd = numeric_column(frame, dataset, "exratd_toUSD")?;
    let to_gbp = numeric_column(frame, dataset, "exratd_toGBP")?;

    Ok((0..frame.height())
        .map(|i| ExchangeRate {
            currency: currencies[i].as_deref().map(CurrencyCode::new),
            date: dates[i],
            to_usd: to_usd[i],
            to_gbp: to_gbp[i],
        })
        .collect())
}

/// Convert a market index table into level observations.
pub fn market_index(frame: &DataFrame) -> Result<Vec<MarketIndexRecord>> {
    let dataset = Dataset::MarketIndex;
    dataset.validate(frame)?;

    let dates = date_column(frame, dataset, "datadate")?;
    let levels = numeric_column(frame, dataset, "prccm")?;

    Ok(dates
        .into_iter()
        .zip(levels)
        .map(|(date, level)| MarketIndexRecord { date, level })
        .collect())
}

/// Convert a fundamentals table into annual records, preserving input order.
pub fn fundamental_records(frame: &DataFrame) -> Result<Vec<FundamentalRecord>> {
    let dataset = Dataset::Fundamentals;
    dataset.validate(frame)?;

    let entities = text_column(frame, dataset, "gvkey")?;
    let years = year_column(frame, dataset, "fyear")?;
    let currencies = text_column(frame, dataset, "curcd")?;
    let assets = numeric_column(frame, dataset, "at")?;
    let equity = numeric_column(frame, dataset, "ceq")?;
    let operating_income = numeric_column(frame, dataset, "oiadp")?;
    let revenue = numeric_column(frame, dataset, "revt")?;

    Ok((0..frame.height())
        .map(|i| FundamentalRecord {
            entity_id: entities[i].as_deref().map(EntityId::new),
            fiscal_year: years[i],
            currency: currencies[i].as_deref().map(CurrencyCode::new),
            total_assets: assets[i],
            common_equity: equity[i],
            operating_income: operating_income[i],
            revenue: revenue[i],
        })
        .collect())
}

/// Convert an emissions table into raw emissions records.
///
/// Every column besides the required descriptive ones is read as a numeric
/// emissions metric.
pub fn emissions_records(frame: &DataFrame) -> Result<Vec<RawEmissionsRecord>> {
    let dataset = Dataset::Emissions;
    dataset.validate(frame)?;

    let institutions = text_column(frame, dataset, "institutionid")?;
    let companies = text_column(frame, dataset, "companyid")?;
    let names = text_column(frame, dataset, "companyname")?;
    let entities = text_column(frame, dataset, "gvkey")?;
    let years = year_column(frame, dataset, "fiscalyear")?;
    let period_ends = date_column(frame, dataset, "periodenddate")?;

    let required = dataset.required_columns();
    let mut metrics = Vec::new();
    for name in frame.get_column_names() {
        if !required.contains(&name.as_str()) {
            metrics.push((
                name.to_string(),
                numeric_column(frame, dataset, name.as_str())?,
            ));
        }
    }

    Ok((0..frame.height())
        .map(|i| RawEmissionsRecord {
            institution_id: institutions[i].clone(),
            company_id: companies[i].clone(),
            company_name: names[i].clone(),
            entity_id: entities[i].as_deref().map(EntityId::new),
            fiscal_year: years[i],
            period_end: period_ends[i],
            metrics: metrics
                .iter()
                .map(|(name, values)| (name.clone(), values[i]))
                .collect::<BTreeMap<_, _>>(),
        })
        .collect())
}

/// Convert an entity-mapping table into mapping rows.
pub fn entity_mappings(frame: &DataFrame) -> Result<Vec<EntityMapping>> {
    let dataset = Dataset::EntityMapping;
    dataset.validate(frame)?;

    let companies = text_column(frame, dataset, "companyid")?;
    let entities = text_column(frame, dataset, "gvkey")?;
    let starts = text_column(frame, dataset, "startdate")?;
    let ends = text_column(frame, dataset, "enddate")?;

    Ok((0..frame.height())
        .map(|i| EntityMapping {
            company_id: companies[i].clone(),
            entity_id: entities[i].as_deref().map(EntityId::new),
            start_flag: starts[i].clone(),
            end_flag: ends[i].clone(),
        })
        .collect())
}

fn require<'a>(frame: &'a DataFrame, dataset: Dataset, name: &str) -> Result<&'a Column> {
    frame.column(name).map_err(|_| DataError::MissingColumn {
        dataset,
        column: name.to_string(),
    })
}

/// Text values of a column, with blank cells treated as missing.
pub(crate) fn text_column(
    frame: &DataFrame,
    dataset: Dataset,
    name: &str,
) -> Result<Vec<Option<String>>> {
    let column = require(frame, dataset, name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
        .collect())
}

fn numeric_column(frame: &DataFrame, dataset: Dataset, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(text_column(frame, dataset, name)?
        .into_iter()
        .map(|value| {
            value
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| !v.is_nan())
        })
        .collect())
}

fn year_column(frame: &DataFrame, dataset: Dataset, name: &str) -> Result<Vec<Option<i32>>> {
    Ok(numeric_column(frame, dataset, name)?
        .into_iter()
        .map(|value| value.filter(|v| v.fract() == 0.0).map(|v| v as i32))
        .collect())
}

fn date_column(
    frame: &DataFrame,
    dataset: Dataset,
    name: &str,
) -> Result<Vec<Option<NaiveDate>>> {
    Ok(text_column(frame, dataset, name)?
        .into_iter()
        .map(|value| value.as_deref().and_then(parse_date))
        .collect())
}

/// Parse `YYYY-MM-DD` (optionally followed by a time) or `YYYYMMDD`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}
