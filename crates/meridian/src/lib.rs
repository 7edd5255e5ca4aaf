#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/meridian/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use meridian_data as data;
pub use meridian_output as output;
pub use meridian_panel as panel;

pub use config::{
    FundamentalsSettings, InputPaths, OutlierSettings, OutputSettings, PipelineConfig,
    ReturnSettings,
};
pub use error::{PipelineError, Result};
pub use pipeline::{EmissionsSources, Pipeline, PipelineOutput, Sources, Stage};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
