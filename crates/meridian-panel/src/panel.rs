//! Panels: rows grouped by `(entity, issue)` into period-ordered series.
//!
//! Every per-series stage is expressed through [`Panel::map_series`], which
//! processes series independently on the rayon pool. Series never share
//! state, so the only ordering guarantee needed is within a series.

use crate::period::Period;
use chrono::NaiveDate;
use meridian_data::{CurrencyCode, EntityId, IssueId, RawPriceRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Composite key of a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Entity id
    pub entity_id: EntityId,
    /// Issue id
    pub issue_id: IssueId,
}

impl SeriesKey {
    /// Create a series key.
    pub fn new(entity_id: impl Into<EntityId>, issue_id: impl Into<IssueId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            issue_id: issue_id.into(),
        }
    }
}

/// Rows that belong to a period.
pub trait Periodic {
    /// Period of the row.
    fn period(&self) -> Period;
}

/// Rows grouped into series, each sorted by strictly increasing period.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel<R> {
    series: BTreeMap<SeriesKey, Vec<R>>,
}

impl<R> Default for Panel<R> {
    fn default() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }
}

impl<R: Periodic> Panel<R> {
    /// Build a panel from already grouped series.
    ///
    /// Each series is stably sorted by period; when several rows share a
    /// period, the one appearing last wins. Empty series are discarded.
    pub fn from_series(series: BTreeMap<SeriesKey, Vec<R>>) -> Self {
        let series = series
            .into_iter()
            .filter_map(|(key, mut rows)| {
                rows.sort_by_key(Periodic::period);
                let mut unique: Vec<R> = Vec::with_capacity(rows.len());
                for row in rows {
                    match unique.last_mut() {
                        Some(last) if last.period() == row.period() => *last = row,
                        _ => unique.push(row),
                    }
                }
                (!unique.is_empty()).then_some((key, unique))
            })
            .collect();
        Self { series }
    }

    /// Build a panel from keyed rows.
    pub fn from_rows(rows: impl IntoIterator<Item = (SeriesKey, R)>) -> Self {
        let mut series: BTreeMap<SeriesKey, Vec<R>> = BTreeMap::new();
        for (key, row) in rows {
            series.entry(key).or_default().push(row);
        }
        Self::from_series(series)
    }
}

impl<R> Panel<R> {
    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Rows of one series.
    pub fn series(&self, key: &SeriesKey) -> Option<&[R]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Iterate over series in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &[R])> {
        self.series.iter().map(|(key, rows)| (key, rows.as_slice()))
    }

    /// Consume the panel into keyed rows, in key then period order.
    pub fn into_rows(self) -> impl Iterator<Item = (SeriesKey, R)> {
        self.series
            .into_iter()
            .flat_map(|(key, rows)| rows.into_iter().map(move |row| (key.clone(), row)))
    }

    /// Transform every series independently, in parallel.
    ///
    /// `f` must keep rows in period order; series it empties are dropped.
    pub fn map_series<U, F>(self, f: F) -> Panel<U>
    where
        R: Send,
        U: Send,
        F: Fn(&SeriesKey, Vec<R>) -> Vec<U> + Sync + Send,
    {
        let series = self
            .series
            .into_par_iter()
            .filter_map(|(key, rows)| {
                let rows = f(&key, rows);
                (!rows.is_empty()).then_some((key, rows))
            })
            .collect();
        Panel { series }
    }
}

/// A complete, monthly-keyed price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Period of the observation
    pub period: Period,
    /// Source date
    pub date: NaiveDate,
    /// Quote currency
    pub currency: CurrencyCode,
    /// Close price
    pub close: f64,
    /// Shares outstanding
    pub shares_outstanding: f64,
    /// Cumulative price-adjustment factor
    pub adjustment_factor: f64,
    /// Total-return factor
    pub total_return_factor: f64,
}

impl Periodic for PriceObservation {
    fn period(&self) -> Period {
        self.period
    }
}

/// Keys raw records into panels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelIndexer;

impl PanelIndexer {
    /// Index raw price records into a price panel.
    ///
    /// Records missing any field are dropped. Within a month the
    /// chronologically last observation is kept.
    pub fn index_prices(&self, records: &[RawPriceRecord]) -> Panel<PriceObservation> {
        let mut keyed: Vec<(SeriesKey, PriceObservation)> = records
            .iter()
            .filter_map(|record| {
                let date = record.date?;
                let observation = PriceObservation {
                    period: Period::from_date(date),
                    date,
                    currency: record.currency.clone()?,
                    close: record.close?,
                    shares_outstanding: record.shares_outstanding?,
                    adjustment_factor: record.adjustment_factor?,
                    total_return_factor: record.total_return_factor?,
                };
                let key = SeriesKey {
                    entity_id: record.entity_id.clone()?,
                    issue_id: record.issue_id.clone()?,
                };
                Some((key, observation))
            })
            .collect();
        let complete = keyed.len();

        keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.date.cmp(&b.1.date)));
        let panel = Panel::from_rows(keyed);

        debug!(
            input = records.len(),
            incomplete = records.len() - complete,
            rows = panel.len(),
            series = panel.series_count(),
            "indexed price records"
        );
        panel
    }
}
