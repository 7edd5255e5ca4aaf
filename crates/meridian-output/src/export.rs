//! Record export.
//!
//! Any flat `Serialize` record type (finalized security rows, normalized
//! fundamentals, linked emissions) can be rendered as CSV with a header row,
//! compact JSON or pretty JSON. Projected panels are rendered from their
//! frame. Writing to disk is gated by an [`ExportPolicy`].

use meridian_data::{ExportOutcome, ExportPolicy};
use polars::prelude::{CsvWriter, DataFrame, JsonFormat, JsonWriter, SerWriter};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialized CSV was not valid UTF-8.
    #[error("invalid UTF-8 in CSV output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Frame statistics or serialization failed.
    #[error("frame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,

    /// Compact JSON array.
    Json,

    /// Pretty-printed JSON array.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// Render `records` in `format`.
///
/// An empty CSV export has no header row.
pub fn render<T: Serialize>(records: &[T], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            for record in records {
                wtr.serialize(record)?;
            }
            let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
            Ok(String::from_utf8(bytes)?)
        }
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// Render the columns of `frame` in `format`.
///
/// CSV output always carries the header row, JSON is an array of row
/// objects.
pub fn render_frame(frame: &mut DataFrame, format: ExportFormat) -> Result<String> {
    let mut buffer = Vec::new();
    match format {
        ExportFormat::Csv => {
            CsvWriter::new(&mut buffer)
                .include_header(true)
                .finish(frame)?;
        }
        ExportFormat::Json | ExportFormat::PrettyJson => {
            JsonWriter::new(&mut buffer)
                .with_json_format(JsonFormat::Json)
                .finish(frame)?;
        }
    }
    let content = String::from_utf8(buffer)?;
    if format == ExportFormat::PrettyJson {
        let value: serde_json::Value = serde_json::from_str(&content)?;
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    Ok(content)
}

/// Write `records` to `path` if `policy` allows it.
pub fn export_records<T: Serialize>(
    records: &[T],
    path: impl AsRef<Path>,
    format: ExportFormat,
    policy: ExportPolicy,
) -> Result<ExportOutcome> {
    let path = path.as_ref().to_path_buf();
    if !policy.is_enabled() {
        warn!(path = %path.display(), "record export disabled, nothing written");
        return Ok(ExportOutcome::Suppressed { path });
    }
    let content = render(records, format)?;
    write_content(path, &content, records.len(), format)
}

/// Write the rows of `frame` to `path` if `policy` allows it.
pub fn export_frame(
    frame: &mut DataFrame,
    path: impl AsRef<Path>,
    format: ExportFormat,
    policy: ExportPolicy,
) -> Result<ExportOutcome> {
    let path = path.as_ref().to_path_buf();
    if !policy.is_enabled() {
        warn!(path = %path.display(), "frame export disabled, nothing written");
        return Ok(ExportOutcome::Suppressed { path });
    }
    let content = render_frame(frame, format)?;
    write_content(path, &content, frame.height(), format)
}

fn write_content(
    path: PathBuf,
    content: &str,
    count: usize,
    format: ExportFormat,
) -> Result<ExportOutcome> {
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;

    info!(
        path = %path.display(),
        count,
        format = format.extension(),
        "exported records"
    );
    Ok(ExportOutcome::Written { path, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use rstest::rstest;

    #[derive(Debug, Serialize)]
    struct Row {
        entity_id: String,
        period: String,
        beta: f64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                entity_id: "1004".to_string(),
                period: "2021-02".to_string(),
                beta: 0.75,
            },
            Row {
                entity_id: "1010".to_string(),
                period: "2021-02".to_string(),
                beta: 1.5,
            },
        ]
    }

    #[test]
    fn test_render_csv_has_header() {
        let csv = render(&rows(), ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "entity_id,period,beta");
        assert_eq!(lines[1], "1004,2021-02,0.75");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_render_json_is_array() {
        let json = render(&rows(), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["entity_id"], "1010");
    }

    #[test]
    fn test_render_pretty_json_is_indented() {
        let json = render(&rows(), ExportFormat::PrettyJson).unwrap();
        assert!(json.contains("\n  "));
    }

    #[test]
    fn test_render_empty_csv() {
        let empty: Vec<Row> = Vec::new();
        assert_eq!(render(&empty, ExportFormat::Csv).unwrap(), "");
    }

    fn frame() -> DataFrame {
        df! {
            "entity_id" => ["1004", "1010"],
            "period" => ["2021-02", "2021-02"],
            "beta" => [0.75, 1.5],
        }
        .unwrap()
    }

    #[test]
    fn test_render_frame_csv_keeps_frame_columns() {
        let csv = render_frame(&mut frame(), ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "entity_id,period,beta");
        assert_eq!(lines[2], "1010,2021-02,1.5");
        assert_eq!(lines.len(), 3);
    }

    #[rstest]
    #[case(ExportFormat::Json)]
    #[case(ExportFormat::PrettyJson)]
    fn test_render_frame_json_rows(#[case] format: ExportFormat) {
        let json = render_frame(&mut frame(), format).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["entity_id"], "1004");
        assert_eq!(value[1]["beta"], 1.5);
    }

    #[rstest]
    #[case(ExportFormat::Csv, "csv")]
    #[case(ExportFormat::Json, "json")]
    #[case(ExportFormat::PrettyJson, "json")]
    fn test_export_format_extension(#[case] format: ExportFormat, #[case] extension: &str) {
        assert_eq!(format.extension(), extension);
    }
}
