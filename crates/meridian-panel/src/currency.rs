//! Currency conversion lookups built from daily exchange rates.
//!
//! Three lookups are kept per currency:
//! - month-end rates, for point-in-time valuation of monthly series;
//! - year-end rates, for balance-sheet (stock) figures;
//! - year-average rates, for income-statement (flow) figures, which accrue
//!   through the year.
//!
//! USD and GBP rates are resolved independently: a missing USD rate on the
//! last day of a month does not hide the GBP rate of that day.

use crate::period::Period;
use chrono::Datelike;
use meridian_data::{CurrencyCode, ExchangeRate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Base currencies that conversions target.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum BaseCurrency {
    /// US dollar
    #[default]
    #[display("USD")]
    Usd,
    /// Pound sterling
    #[display("GBP")]
    Gbp,
}

/// Conversion rates of one currency into the base currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    /// Rate against USD
    pub to_usd: Option<f64>,
    /// Rate against GBP
    pub to_gbp: Option<f64>,
}

impl FxRate {
    /// Rate against `base`.
    pub const fn rate(&self, base: BaseCurrency) -> Option<f64> {
        match base {
            BaseCurrency::Usd => self.to_usd,
            BaseCurrency::Gbp => self.to_gbp,
        }
    }

    /// Overwrite each rate with `newer` where `newer` has one.
    fn carry_forward(&mut self, newer: &ExchangeRate) {
        self.to_usd = newer.to_usd.or(self.to_usd);
        self.to_gbp = newer.to_gbp.or(self.to_gbp);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RateMean {
    usd_sum: f64,
    usd_count: usize,
    gbp_sum: f64,
    gbp_count: usize,
}

impl RateMean {
    fn add(&mut self, observation: &ExchangeRate) {
        if let Some(rate) = observation.to_usd {
            self.usd_sum += rate;
            self.usd_count += 1;
        }
        if let Some(rate) = observation.to_gbp {
            self.gbp_sum += rate;
            self.gbp_count += 1;
        }
    }

    fn finish(self) -> FxRate {
        FxRate {
            to_usd: (self.usd_count > 0).then(|| self.usd_sum / self.usd_count as f64),
            to_gbp: (self.gbp_count > 0).then(|| self.gbp_sum / self.gbp_count as f64),
        }
    }
}

/// Monthly and yearly FX lookups.
#[derive(Debug, Clone, Default)]
pub struct CurrencyRateIndex {
    monthly: HashMap<CurrencyCode, BTreeMap<Period, FxRate>>,
    year_end: HashMap<CurrencyCode, BTreeMap<i32, FxRate>>,
    year_average: HashMap<CurrencyCode, BTreeMap<i32, FxRate>>,
}

impl CurrencyRateIndex {
    /// Build the lookups from daily observations.
    ///
    /// Observations without a currency or date are ignored. Same-day
    /// observations resolve in input order, the later one winning.
    pub fn new(observations: &[ExchangeRate]) -> Self {
        let mut usable: Vec<&ExchangeRate> = observations
            .iter()
            .filter(|o| o.currency.is_some() && o.date.is_some())
            .collect();
        usable.sort_by(|a, b| a.currency.cmp(&b.currency).then(a.date.cmp(&b.date)));

        let mut index = Self::default();
        let mut means: HashMap<CurrencyCode, BTreeMap<i32, RateMean>> = HashMap::new();

        for observation in &usable {
            let (Some(currency), Some(date)) = (&observation.currency, observation.date) else {
                continue;
            };
            index
                .monthly
                .entry(currency.clone())
                .or_default()
                .entry(Period::from_date(date))
                .or_default()
                .carry_forward(observation);
            index
                .year_end
                .entry(currency.clone())
                .or_default()
                .entry(date.year())
                .or_default()
                .carry_forward(observation);
            means
                .entry(currency.clone())
                .or_default()
                .entry(date.year())
                .or_default()
                .add(observation);
        }

        index.year_average = means
            .into_iter()
            .map(|(currency, years)| {
                let years = years
                    .into_iter()
                    .map(|(year, mean)| (year, mean.finish()))
                    .collect();
                (currency, years)
            })
            .collect();

        debug!(
            observations = observations.len(),
            usable = usable.len(),
            currencies = index.monthly.len(),
            "built currency rate index"
        );
        index
    }

    /// Month-end rate of `currency` in `period`; missing rates on a miss.
    pub fn monthly(&self, currency: &CurrencyCode, period: Period) -> FxRate {
        self.monthly
            .get(currency)
            .and_then(|months| months.get(&period))
            .copied()
            .unwrap_or_default()
    }

    /// Year-end rate, for balance-sheet figures.
    pub fn balance_sheet(&self, currency: &CurrencyCode, year: i32) -> FxRate {
        self.year_end
            .get(currency)
            .and_then(|years| years.get(&year))
            .copied()
            .unwrap_or_default()
    }

    /// Year-average rate, for income-statement figures.
    pub fn income_statement(&self, currency: &CurrencyCode, year: i32) -> FxRate {
        self.year_average
            .get(currency)
            .and_then(|years| years.get(&year))
            .copied()
            .unwrap_or_default()
    }

    /// Currencies with at least one observation.
    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.monthly.keys()
    }
}
