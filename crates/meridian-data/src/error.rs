//! Error types for data operations.

use crate::loader::Dataset;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading or exporting source data.
#[derive(Debug, Error)]
pub enum DataError {
    /// A required column is absent from an input source
    #[error("Missing column `{column}` in {dataset} source")]
    MissingColumn {
        /// Dataset being loaded
        dataset: Dataset,
        /// Name of the absent column
        column: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
