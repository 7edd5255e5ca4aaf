//! Pipeline error type.

use meridian_data::DataError;
use meridian_output::ExportError;
use meridian_panel::PanelError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading a source table failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// A panel stage rejected its parameters
    #[error(transparent)]
    Panel(#[from] PanelError),

    /// Export or summary failed
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Reading or writing the configuration file failed
    #[error("config file {path}: {source}")]
    ConfigIo {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for [`crate::PipelineConfig`]
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration could not be serialized
    #[error("cannot serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// An optional input is required by the requested operation
    #[error("input `{0}` is not configured")]
    MissingInput(&'static str),

    /// No platform configuration directory is available
    #[error("no configuration directory on this platform; pass a config path")]
    NoConfigDir,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
