#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/meridian/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod beta;
pub mod currency;
pub mod error;
pub mod fundamentals;
pub mod guard;
pub mod linking;
pub mod market;
pub mod outliers;
pub mod panel;
pub mod period;
pub mod returns;
pub mod security;

pub use beta::{BetaConfig, BetaEstimator, ReturnMeasure, RollingMoments};
pub use currency::{BaseCurrency, CurrencyRateIndex, FxRate};
pub use error::{PanelError, Result};
pub use fundamentals::{
    FundamentalsColumn, FundamentalsNormalizer, NormalizedFundamentals, fundamentals_frame,
};
pub use guard::LookAheadGuard;
pub use linking::{AnnualRecord, Linked, link_prior_year};
pub use market::MarketReturns;
pub use outliers::{Bounds, Columnar, OutlierFilter};
pub use panel::{Panel, PanelIndexer, Periodic, PriceObservation, SeriesKey};
pub use period::Period;
pub use returns::{ReturnCalculator, SecurityReturnRow};
pub use security::{SecurityColumn, SecurityPanel, SecurityRecord};
