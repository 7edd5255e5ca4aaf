//! Rolling market beta.
//!
//! Beta = Cov(R_i, R_m) / Var(R_m) over a trailing window of rows of the
//! series. The window must be full of valid (return, market) pairs; any
//! missing value inside the window leaves beta undefined for that row.
//!
//! Each row pushes one slot into a sliding window and evicts the oldest.
//! Moments are taken over the slots of the full window, measured from its
//! first pair, so a window of equal market returns has a variance of
//! exactly zero.

use crate::error::{PanelError, Result};
use crate::market::MarketReturns;
use crate::panel::Panel;
use crate::returns::SecurityReturnRow;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Which monthly return is regressed on the market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMeasure {
    /// Local-currency monthly return
    #[default]
    Local,
    /// USD monthly return
    Usd,
    /// GBP monthly return
    Gbp,
}

impl ReturnMeasure {
    /// The monthly return of `row` for this measure.
    pub const fn monthly(&self, row: &SecurityReturnRow) -> Option<f64> {
        match self {
            Self::Local => row.monthly_local_return,
            Self::Usd => row.monthly_usd_return,
            Self::Gbp => row.monthly_gbp_return,
        }
    }
}

/// Configuration for beta estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaConfig {
    /// Rolling window size in rows (default: 12 months)
    pub window: usize,
    /// Return regressed on the market (default: local)
    pub measure: ReturnMeasure,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            window: 12,
            measure: ReturnMeasure::Local,
        }
    }
}

/// Sliding-window sample covariance of `(x, y)` and sample variance of `y`.
#[derive(Debug, Clone)]
pub struct RollingMoments {
    window: usize,
    pairs: VecDeque<Option<(f64, f64)>>,
    count: usize,
}

impl RollingMoments {
    /// Empty accumulator over `window` slots.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            pairs: VecDeque::with_capacity(window + 1),
            count: 0,
        }
    }

    /// Push the next slot, evicting the oldest one once the window is full.
    ///
    /// `None` (or a non-finite value) occupies a slot without contributing.
    pub fn push(&mut self, pair: Option<(f64, f64)>) {
        let pair = pair.filter(|(x, y)| x.is_finite() && y.is_finite());
        self.pairs.push_back(pair);
        if pair.is_some() {
            self.count += 1;
        }
        if self.pairs.len() > self.window
            && let Some(Some(_)) = self.pairs.pop_front()
        {
            self.count -= 1;
        }
    }

    /// Whether every slot of the window holds a valid pair.
    pub fn is_full(&self) -> bool {
        self.pairs.len() == self.window && self.count == self.window
    }

    /// Sample covariance of the window, if full.
    pub fn covariance(&self) -> Option<f64> {
        self.co_moments()
            .map(|(co_moment, _)| co_moment / (self.count - 1) as f64)
    }

    /// Sample variance of `y` over the window, if full.
    pub fn variance_y(&self) -> Option<f64> {
        self.co_moments()
            .map(|(_, second_moment)| second_moment / (self.count - 1) as f64)
    }

    /// Centered co-moment of `(x, y)` and second moment of `y`.
    fn co_moments(&self) -> Option<(f64, f64)> {
        if !self.is_full() {
            return None;
        }
        let (x0, y0) = self.pairs.front().copied().flatten()?;
        let shifted: Vec<(f64, f64)> = self
            .pairs
            .iter()
            .flatten()
            .map(|(x, y)| (x - x0, y - y0))
            .collect();
        let n = shifted.len() as f64;
        let mean_x = shifted.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = shifted.iter().map(|(_, y)| y).sum::<f64>() / n;
        Some(shifted.iter().fold((0.0, 0.0), |(co, second), (x, y)| {
            let dy = y - mean_y;
            (co + (x - mean_x) * dy, second + dy * dy)
        }))
    }
}

/// Joins market returns onto security rows and estimates rolling beta.
#[derive(Debug, Clone)]
pub struct BetaEstimator<'a> {
    market: &'a MarketReturns,
    config: BetaConfig,
}

impl<'a> BetaEstimator<'a> {
    /// Create an estimator against `market`.
    pub fn new(market: &'a MarketReturns, config: BetaConfig) -> Result<Self> {
        if config.window < 2 {
            return Err(PanelError::InvalidParameter(format!(
                "beta window must be at least 2, got {}",
                config.window
            )));
        }
        Ok(Self { market, config })
    }

    /// Estimator with the default 12-row window on local returns.
    pub fn with_defaults(market: &'a MarketReturns) -> Self {
        Self {
            market,
            config: BetaConfig::default(),
        }
    }

    /// The estimator configuration.
    pub const fn config(&self) -> &BetaConfig {
        &self.config
    }

    /// Estimate beta for every series of the panel.
    pub fn estimate(&self, panel: Panel<SecurityReturnRow>) -> Panel<SecurityReturnRow> {
        let panel = panel.map_series(|_, rows| self.estimate_series(rows));
        debug!(
            rows = panel.len(),
            window = self.config.window,
            "estimated rolling beta"
        );
        panel
    }

    /// Estimate beta for one period-ordered series.
    ///
    /// A zero market variance yields a non-finite beta, which finalization
    /// drops.
    pub fn estimate_series(&self, mut rows: Vec<SecurityReturnRow>) -> Vec<SecurityReturnRow> {
        let mut moments = RollingMoments::new(self.config.window);
        for row in &mut rows {
            row.market_return = self.market.get(row.period);
            moments.push(self.config.measure.monthly(row).zip(row.market_return));
            row.beta = moments
                .covariance()
                .zip(moments.variance_y())
                .map(|(covariance, variance)| covariance / variance);
        }
        rows
    }
}
