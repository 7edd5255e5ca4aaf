//! The batch pipeline.
//!
//! Stages run in order, each consuming the complete output of the previous
//! one:
//!
//! 1. load the source tables
//! 2. index prices by `(entity, issue)` and month
//! 3. compute local, FX and base-currency returns and market values
//! 4. join market returns and estimate rolling beta
//! 5. lag market value and beta by one row
//! 6. drop incomplete rows
//! 7. trim outliers panel-wide
//!
//! Fundamentals and emissions, when configured, are prepared independently
//! and linked to the finished security panel on the prior fiscal year.

use crate::config::{InputPaths, OutputSettings, PipelineConfig};
use crate::error::{PipelineError, Result};
use meridian_data::loader::{self, read_csv};
use meridian_data::{
    EmissionsRecord, EntityMapping, ExchangeRate, ExportOutcome, FundamentalRecord,
    MarketIndexRecord, RawEmissionsRecord, RawPriceRecord, prepare_emissions,
};
use meridian_output::{PanelSummary, export_frame, export_records};
use meridian_panel::{
    BetaEstimator, CurrencyRateIndex, FundamentalsNormalizer, Linked, LookAheadGuard,
    MarketReturns, NormalizedFundamentals, PanelIndexer, ReturnCalculator, SecurityColumn,
    SecurityPanel, fundamentals_frame, link_prior_year,
};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{debug, info, warn};

/// Pipeline stages, reported to progress callbacks as they start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Stage {
    /// Reading source tables
    #[display("loading source tables")]
    Loading,
    /// Keying prices into series
    #[display("indexing prices")]
    Indexing,
    /// Return computation
    #[display("computing returns")]
    Returns,
    /// Rolling beta
    #[display("estimating rolling beta")]
    Beta,
    /// Look-ahead guard
    #[display("lagging market value and beta")]
    Guard,
    /// Finalization and outlier trimming
    #[display("finalizing security panel")]
    Finalize,
    /// Fundamentals normalization
    #[display("normalizing fundamentals")]
    Fundamentals,
    /// Emissions preparation
    #[display("preparing emissions")]
    Emissions,
    /// Prior-year linking
    #[display("linking annual data")]
    Linking,
}

/// Raw emissions records with the mapping that filters them.
#[derive(Debug, Clone, Default)]
pub struct EmissionsSources {
    /// Emissions disclosures
    pub records: Vec<RawEmissionsRecord>,
    /// Company id to entity id mapping
    pub mappings: Vec<EntityMapping>,
}

impl EmissionsSources {
    /// Load emissions and mapping tables.
    pub fn load(emissions: impl AsRef<Path>, mapping: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            records: loader::emissions_records(&read_csv(emissions)?)?,
            mappings: loader::entity_mappings(&read_csv(mapping)?)?,
        })
    }

    /// Emissions of entities with a bounded mapping.
    pub fn prepare(&self) -> Vec<EmissionsRecord> {
        prepare_emissions(&self.records, &self.mappings)
    }
}

/// Typed records of every source table.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    /// Monthly security prices
    pub prices: Vec<RawPriceRecord>,
    /// Daily exchange rates
    pub exchange_rates: Vec<ExchangeRate>,
    /// Market index levels
    pub market_index: Vec<MarketIndexRecord>,
    /// Annual fundamentals, if configured
    pub fundamentals: Option<Vec<FundamentalRecord>>,
    /// Emissions, if configured
    pub emissions: Option<EmissionsSources>,
}

impl Sources {
    /// Load every configured table.
    pub fn load(inputs: &InputPaths) -> Result<Self> {
        let prices = loader::price_records(&read_csv(&inputs.securities)?)?;
        let exchange_rates = loader::exchange_rates(&read_csv(&inputs.exchange_rates)?)?;
        let market_index = loader::market_index(&read_csv(&inputs.market_index)?)?;

        let fundamentals = inputs
            .fundamentals
            .as_ref()
            .map(|path| -> Result<_> { Ok(loader::fundamental_records(&read_csv(path)?)?) })
            .transpose()?;

        let emissions = match (&inputs.emissions, &inputs.entity_mapping) {
            (Some(emissions), Some(mapping)) => Some(EmissionsSources::load(emissions, mapping)?),
            (Some(_), None) => return Err(PipelineError::MissingInput("entity_mapping")),
            (None, _) => None,
        };

        info!(
            prices = prices.len(),
            exchange_rates = exchange_rates.len(),
            market_index = market_index.len(),
            fundamentals = fundamentals.as_ref().map_or(0, Vec::len),
            emissions = emissions.as_ref().map_or(0, |e| e.records.len()),
            "loaded sources"
        );
        Ok(Self {
            prices,
            exchange_rates,
            market_index,
            fundamentals,
            emissions,
        })
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Finalized, outlier-trimmed security panel
    pub securities: SecurityPanel,
    /// Market return series used for beta
    pub market: MarketReturns,
    /// Normalized fundamentals
    pub fundamentals: Vec<NormalizedFundamentals>,
    /// Prepared emissions
    pub emissions: Vec<EmissionsRecord>,
    /// Security rows joined with prior-year fundamentals
    pub linked_fundamentals: Vec<Linked<NormalizedFundamentals>>,
    /// Security rows joined with prior-year emissions
    pub linked_emissions: Vec<Linked<EmissionsRecord>>,
}

impl PipelineOutput {
    /// Project the security panel to key columns plus `columns`.
    pub fn security_frame(&self, columns: &[SecurityColumn]) -> Result<DataFrame> {
        Ok(self.securities.select(columns)?)
    }

    /// Summaries of the security panel (retained columns) and fundamentals.
    pub fn summaries(&self, output: &OutputSettings) -> Result<Vec<PanelSummary>> {
        let mut summaries = vec![PanelSummary::from_frame(
            "securities",
            &self.security_frame(&output.columns())?,
            self.securities.series_count(),
        )?];
        if !self.fundamentals.is_empty() {
            let entities = self
                .fundamentals
                .windows(2)
                .filter(|pair| pair[0].entity_id != pair[1].entity_id)
                .count()
                + 1;
            summaries.push(PanelSummary::from_frame(
                "fundamentals",
                &fundamentals_frame(&self.fundamentals)?,
                entities,
            )?);
        }
        Ok(summaries)
    }

    /// Export the security panel and fundamentals if the policy allows it.
    ///
    /// The security panel is exported as its projection on the retained
    /// columns. Files are named `securities.<ext>` and `fundamentals.<ext>`
    /// inside the output directory, which is created on demand.
    pub fn export(&self, output: &OutputSettings) -> Result<Vec<ExportOutcome>> {
        if output.export.is_enabled() {
            std::fs::create_dir_all(&output.directory)?;
        }
        let path = |name: &str| {
            output
                .directory
                .join(format!("{name}.{}", output.format.extension()))
        };

        let mut outcomes = vec![export_frame(
            &mut self.security_frame(&output.columns())?,
            path("securities"),
            output.format,
            output.export,
        )?];
        if !self.fundamentals.is_empty() {
            outcomes.push(export_records(
                &self.fundamentals,
                path("fundamentals"),
                output.format,
                output.export,
            )?);
        }
        Ok(outcomes)
    }
}

/// Runs the configured stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline.
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured sources and run every stage.
    pub fn run(&self) -> Result<PipelineOutput> {
        self.run_with_progress(|_| {})
    }

    /// Like [`Pipeline::run`], reporting each stage as it starts.
    pub fn run_with_progress(&self, mut progress: impl FnMut(Stage)) -> Result<PipelineOutput> {
        progress(Stage::Loading);
        let sources = Sources::load(&self.config.inputs)?;
        self.process(&sources, progress)
    }

    /// Run every stage over already loaded sources.
    pub fn process(
        &self,
        sources: &Sources,
        mut progress: impl FnMut(Stage),
    ) -> Result<PipelineOutput> {
        let outliers = self.config.outliers.filter()?;
        let rates = CurrencyRateIndex::new(&sources.exchange_rates);
        let market = MarketReturns::from_levels(&sources.market_index);
        let estimator = BetaEstimator::new(&market, self.config.returns.beta_config())?;

        if sources.prices.is_empty() {
            warn!("no security prices, the security panel will be empty");
        }
        if market.is_empty() {
            warn!("no market returns, beta cannot be estimated");
        }

        progress(Stage::Indexing);
        let prices = PanelIndexer.index_prices(&sources.prices);

        progress(Stage::Returns);
        let returns = ReturnCalculator::new(&rates).compute(prices);

        progress(Stage::Beta);
        let with_beta = estimator.estimate(returns);

        progress(Stage::Guard);
        let guarded = LookAheadGuard.apply(with_beta);

        progress(Stage::Finalize);
        let finalized = SecurityPanel::finalize(guarded);
        let before = finalized.len();
        let securities = finalized.trim_outliers(&outliers);
        debug!(
            before,
            after = securities.len(),
            "trimmed security outliers"
        );

        let fundamentals = match &sources.fundamentals {
            Some(records) => {
                progress(Stage::Fundamentals);
                FundamentalsNormalizer::new(&rates, self.config.fundamentals.base_currency)
                    .normalize(records)
            }
            None => Vec::new(),
        };

        let emissions = match &sources.emissions {
            Some(emissions) => {
                progress(Stage::Emissions);
                emissions.prepare()
            }
            None => Vec::new(),
        };

        progress(Stage::Linking);
        let linked_fundamentals = link_prior_year(&securities, &fundamentals);
        let linked_emissions = link_prior_year(&securities, &emissions);

        info!(
            securities = securities.len(),
            series = securities.series_count(),
            fundamentals = fundamentals.len(),
            emissions = emissions.len(),
            linked_fundamentals = linked_fundamentals.len(),
            linked_emissions = linked_emissions.len(),
            "pipeline complete"
        );
        Ok(PipelineOutput {
            securities,
            market,
            fundamentals,
            emissions,
            linked_fundamentals,
            linked_emissions,
        })
    }
}
