//! Distinct identifier export.
//!
//! Writes one identifier per line, no header, in first-seen order. Whether
//! the file may be written at all is decided by an [`ExportPolicy`] passed
//! in by the caller.

use crate::error::Result;
use crate::loader::{Dataset, text_column};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Whether export side effects are permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPolicy {
    /// Files are written
    Enabled,
    /// Export calls are no-ops that report the suppression
    #[default]
    Disabled,
}

impl ExportPolicy {
    /// Policy from a boolean switch.
    pub const fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }

    /// Whether files may be written.
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Result of an export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The file was written
    Written {
        /// Destination path
        path: PathBuf,
        /// Number of lines/records written
        count: usize,
    },
    /// Export was disabled; nothing was written
    Suppressed {
        /// Destination path that would have been written
        path: PathBuf,
    },
}

/// Distinct non-missing values in first-seen order.
pub fn distinct_ids<I, T>(values: I) -> Vec<T>
where
    I: IntoIterator<Item = Option<T>>,
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .flatten()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Write the distinct identifiers of `values` to `path`, one per line.
pub fn write_ids<I, T>(values: I, path: impl AsRef<Path>, policy: ExportPolicy) -> Result<ExportOutcome>
where
    I: IntoIterator<Item = Option<T>>,
    T: Eq + Hash + Clone + Display,
{
    let path = path.as_ref().to_path_buf();
    if !policy.is_enabled() {
        warn!(path = %path.display(), "identifier export disabled, nothing written");
        return Ok(ExportOutcome::Suppressed { path });
    }

    let ids = distinct_ids(values);
    let mut writer = BufWriter::new(File::create(&path)?);
    for id in &ids {
        writeln!(writer, "{id}")?;
    }
    writer.flush()?;

    info!(path = %path.display(), count = ids.len(), "wrote identifiers");
    Ok(ExportOutcome::Written {
        path,
        count: ids.len(),
    })
}

/// Distinct identifiers of a text column of a raw source table.
pub fn column_ids(frame: &DataFrame, dataset: Dataset, column: &str) -> Result<Vec<String>> {
    Ok(distinct_ids(text_column(frame, dataset, column)?))
}
