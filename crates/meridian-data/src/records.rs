//! Typed raw records as they come out of the source tables.
//!
//! Every value field is optional: the sources are irregular and missing
//! values are only resolved (dropped) by the downstream stages.

use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

identifier!(
    /// Company/firm identifier (`gvkey` in the vendor files).
    EntityId
);

identifier!(
    /// Identifier of a tradable issue of an entity (`iid`).
    IssueId
);

identifier!(
    /// ISO currency code.
    CurrencyCode
);

impl EntityId {
    /// Create an entity id.
    ///
    /// Purely numeric ids are canonicalized without leading zeros, so that
    /// `"001004"` and `"1004"` name the same entity across sources.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let stripped = trimmed.trim_start_matches('0');
            Self(if stripped.is_empty() { "0" } else { stripped }.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }
}

impl IssueId {
    /// Create an issue id.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }
}

impl CurrencyCode {
    /// Create a currency code, normalized to upper case.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_uppercase())
    }
}

/// One security price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    /// Entity id
    pub entity_id: Option<EntityId>,
    /// Issue id
    pub issue_id: Option<IssueId>,
    /// Observation date
    pub date: Option<NaiveDate>,
    /// Currency the price is quoted in
    pub currency: Option<CurrencyCode>,
    /// Close price
    pub close: Option<f64>,
    /// Shares outstanding
    pub shares_outstanding: Option<f64>,
    /// Cumulative price-adjustment factor
    pub adjustment_factor: Option<f64>,
    /// Total-return factor
    pub total_return_factor: Option<f64>,
}

/// Daily exchange rate observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Currency code
    pub currency: Option<CurrencyCode>,
    /// Observation date
    pub date: Option<NaiveDate>,
    /// Units of the currency per USD
    pub to_usd: Option<f64>,
    /// Units of the currency per GBP
    pub to_gbp: Option<f64>,
}

/// Market index level observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndexRecord {
    /// Observation date
    pub date: Option<NaiveDate>,
    /// Index level
    pub level: Option<f64>,
}

/// Annual company fundamentals as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalRecord {
    /// Entity id
    pub entity_id: Option<EntityId>,
    /// Fiscal year
    pub fiscal_year: Option<i32>,
    /// Reporting currency
    pub currency: Option<CurrencyCode>,
    /// Total assets
    pub total_assets: Option<f64>,
    /// Common equity
    pub common_equity: Option<f64>,
    /// Operating income
    pub operating_income: Option<f64>,
    /// Revenue
    pub revenue: Option<f64>,
}
