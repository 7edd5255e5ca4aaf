#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/meridian/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod emissions;
pub mod error;
pub mod ids;
pub mod loader;
pub mod records;

pub use emissions::{EmissionsRecord, EntityMapping, RawEmissionsRecord, prepare_emissions};
pub use error::{DataError, Result};
pub use ids::{ExportOutcome, ExportPolicy, distinct_ids, write_ids};
pub use loader::Dataset;
pub use records::{
    CurrencyCode, EntityId, ExchangeRate, FundamentalRecord, IssueId, MarketIndexRecord,
    RawPriceRecord,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
