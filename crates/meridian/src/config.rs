//! Pipeline configuration.
//!
//! Every section and field has a default, so a partial TOML file only needs
//! to name what it changes:
//!
//! ```toml
//! [inputs]
//! securities = "data/security_monthly.csv"
//! fundamentals = "data/fundamentals_annual.csv"
//!
//! [returns]
//! beta_window = 24
//! beta_return = "usd"
//!
//! [output]
//! export = "enabled"
//! format = "json"
//! ```

use crate::error::{PipelineError, Result};
use meridian_data::ExportPolicy;
use meridian_output::ExportFormat;
use meridian_panel::{
    BaseCurrency, BetaConfig, OutlierFilter, ReturnMeasure, SecurityColumn,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source table paths
    pub inputs: InputPaths,
    /// Return and beta settings
    pub returns: ReturnSettings,
    /// Outlier trimming
    pub outliers: OutlierSettings,
    /// Retention and export
    pub output: OutputSettings,
    /// Fundamentals normalization
    pub fundamentals: FundamentalsSettings,
}

/// Source table paths. The annual sources are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Monthly security prices
    pub securities: PathBuf,
    /// Daily exchange rates
    pub exchange_rates: PathBuf,
    /// Market index levels
    pub market_index: PathBuf,
    /// Annual fundamentals
    pub fundamentals: Option<PathBuf>,
    /// Emissions disclosures
    pub emissions: Option<PathBuf>,
    /// Company id to entity id mapping, required with `emissions`
    pub entity_mapping: Option<PathBuf>,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            securities: PathBuf::from("data/securities.csv"),
            exchange_rates: PathBuf::from("data/exchange_rates.csv"),
            market_index: PathBuf::from("data/market_index.csv"),
            fundamentals: None,
            emissions: None,
            entity_mapping: None,
        }
    }
}

/// Return and beta settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnSettings {
    /// Rolling beta window in rows
    pub beta_window: usize,
    /// Monthly return regressed on the market
    pub beta_return: ReturnMeasure,
}

impl Default for ReturnSettings {
    fn default() -> Self {
        let beta = BetaConfig::default();
        Self {
            beta_window: beta.window,
            beta_return: beta.measure,
        }
    }
}

impl ReturnSettings {
    /// Beta estimator configuration.
    pub const fn beta_config(&self) -> BetaConfig {
        BetaConfig {
            window: self.beta_window,
            measure: self.beta_return,
        }
    }
}

/// Outlier trimming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierSettings {
    /// Designated columns; empty disables trimming
    pub columns: Vec<SecurityColumn>,
    /// Lower quantile
    pub lower_quantile: f64,
    /// Upper quantile
    pub upper_quantile: f64,
}

impl Default for OutlierSettings {
    fn default() -> Self {
        Self {
            columns: vec![
                SecurityColumn::MonthlyUsdReturn,
                SecurityColumn::Beta,
                SecurityColumn::UsdMarketValue,
            ],
            lower_quantile: OutlierFilter::<SecurityColumn>::DEFAULT_LOWER,
            upper_quantile: OutlierFilter::<SecurityColumn>::DEFAULT_UPPER,
        }
    }
}

impl OutlierSettings {
    /// Outlier filter over the security panel.
    pub fn filter(&self) -> Result<OutlierFilter<SecurityColumn>> {
        Ok(OutlierFilter::with_quantiles(
            self.columns.clone(),
            self.lower_quantile,
            self.upper_quantile,
        )?)
    }
}

/// Retention and export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Security columns kept in the projected frame; all when absent
    pub keep_columns: Option<Vec<SecurityColumn>>,
    /// Whether export may write files
    pub export: ExportPolicy,
    /// Export directory
    pub directory: PathBuf,
    /// Export format
    pub format: ExportFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            keep_columns: None,
            export: ExportPolicy::Disabled,
            directory: PathBuf::from("output"),
            format: ExportFormat::Csv,
        }
    }
}

impl OutputSettings {
    /// Columns of the projected security frame.
    pub fn columns(&self) -> Vec<SecurityColumn> {
        self.keep_columns
            .clone()
            .unwrap_or_else(|| SecurityColumn::ALL.to_vec())
    }
}

/// Fundamentals settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalsSettings {
    /// Currency the fundamentals are converted into
    pub base_currency: BaseCurrency,
}

impl PipelineConfig {
    /// Default configuration file: `<config dir>/meridian/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meridian").join("config.toml"))
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Read `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_path(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(path),
            _ => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the configuration, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_error = |source| PipelineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.returns.beta_window, 12);
        assert_eq!(config.returns.beta_return, ReturnMeasure::Local);
        assert_eq!(config.output.export, ExportPolicy::Disabled);
        assert_eq!(config.fundamentals.base_currency, BaseCurrency::Usd);
        assert_eq!(config.outliers.columns.len(), 3);
        assert_eq!(config.output.columns().len(), SecurityColumn::ALL.len());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [inputs]
            securities = "monthly.csv"
            fundamentals = "annual.csv"

            [returns]
            beta_return = "usd"

            [output]
            export = "enabled"
            format = "pretty_json"
            keep_columns = ["beta", "usd_market_value"]
            "#,
        )
        .unwrap();

        assert_eq!(config.inputs.securities, PathBuf::from("monthly.csv"));
        assert_eq!(config.inputs.fundamentals, Some(PathBuf::from("annual.csv")));
        assert_eq!(config.inputs.market_index, PathBuf::from("data/market_index.csv"));
        assert_eq!(config.returns.beta_window, 12);
        assert_eq!(config.returns.beta_return, ReturnMeasure::Usd);
        assert_eq!(config.output.export, ExportPolicy::Enabled);
        assert_eq!(config.output.format, ExportFormat::PrettyJson);
        assert_eq!(
            config.output.columns(),
            vec![SecurityColumn::Beta, SecurityColumn::UsdMarketValue]
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.inputs.emissions = Some(PathBuf::from("emissions.csv"));
        config.fundamentals.base_currency = BaseCurrency::Gbp;
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[rstest]
    #[case("[returns]\nbeta_return = \"eur\"")]
    #[case("[output]\nexport = \"yes\"")]
    #[case("[outliers]\ncolumns = [\"ticker\"]")]
    fn test_invalid_values_rejected(#[case] document: &str) {
        assert!(matches!(
            PipelineConfig::from_toml(document),
            Err(PipelineError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_invalid_quantiles_rejected_by_filter() {
        let settings = OutlierSettings {
            lower_quantile: 0.9,
            upper_quantile: 0.1,
            ..Default::default()
        };
        assert!(matches!(settings.filter(), Err(PipelineError::Panel(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("meridian_config_does_not_exist.toml");
        assert!(matches!(
            PipelineConfig::load(Some(&path)),
            Err(PipelineError::ConfigIo { .. })
        ));
    }
}
