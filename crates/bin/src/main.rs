//! Meridian CLI binary.
//!
//! Runs the panel pipeline and the identifier exports from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use meridian::data::ids::column_ids;
use meridian::data::loader::read_csv;
use meridian::data::{Dataset, ExportOutcome, ExportPolicy, write_ids};
use meridian::output::ExportFormat;
use meridian::{EmissionsSources, Pipeline, PipelineConfig, PipelineError};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "meridian")]
#[command(about = "Meridian: monthly security return panels", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print a summary of the finalized panels
    Run {
        /// Configuration file (default: <config dir>/meridian/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the finalized panels to the output directory
        #[arg(long)]
        export: bool,

        /// Export format
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Write the distinct identifiers of a column, one per line
    Ids {
        /// Source table
        #[arg(long)]
        input: PathBuf,

        /// Dataset the table belongs to
        #[arg(long, value_enum, default_value = "securities")]
        dataset: DatasetArg,

        /// Identifier column
        #[arg(long, default_value = "gvkey")]
        column: String,

        /// Destination file
        #[arg(long)]
        output: PathBuf,

        /// Actually write the file
        #[arg(long)]
        export: bool,
    },

    /// Prepare emissions and write the ids of the linked entities
    Emissions {
        /// Emissions table
        #[arg(long)]
        emissions: PathBuf,

        /// Company id to entity id mapping
        #[arg(long)]
        mapping: PathBuf,

        /// Destination file
        #[arg(long, default_value = "gvkeys.txt")]
        output: PathBuf,

        /// Actually write the file
        #[arg(long)]
        export: bool,
    },

    /// Write the default configuration
    InitConfig {
        /// Destination (default: <config dir>/meridian/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
    PrettyJson,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
            FormatArg::PrettyJson => Self::PrettyJson,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetArg {
    Securities,
    ExchangeRates,
    MarketIndex,
    Fundamentals,
    Emissions,
    EntityMapping,
}

impl From<DatasetArg> for Dataset {
    fn from(dataset: DatasetArg) -> Self {
        match dataset {
            DatasetArg::Securities => Self::Securities,
            DatasetArg::ExchangeRates => Self::ExchangeRates,
            DatasetArg::MarketIndex => Self::MarketIndex,
            DatasetArg::Fundamentals => Self::Fundamentals,
            DatasetArg::Emissions => Self::Emissions,
            DatasetArg::EntityMapping => Self::EntityMapping,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            export,
            format,
        } => {
            run_pipeline(config.as_deref(), export, format)?;
        }
        Commands::Ids {
            input,
            dataset,
            column,
            output,
            export,
        } => {
            let frame = read_csv(&input)?;
            let ids = column_ids(&frame, dataset.into(), &column)?;
            let outcome = write_ids(ids.into_iter().map(Some), &output, ExportPolicy::from_enabled(export))?;
            report(&outcome);
        }
        Commands::Emissions {
            emissions,
            mapping,
            output,
            export,
        } => {
            let prepared = EmissionsSources::load(&emissions, &mapping)?.prepare();
            println!("Prepared {} emissions records", prepared.len());
            let outcome = write_ids(
                prepared.iter().map(|record| Some(record.entity_id.clone())),
                &output,
                ExportPolicy::from_enabled(export),
            )?;
            report(&outcome);
        }
        Commands::InitConfig { path, force } => {
            let path = match path {
                Some(path) => path,
                None => PipelineConfig::default_path().ok_or(PipelineError::NoConfigDir)?,
            };
            if path.exists() && !force {
                return Err(format!("{} exists, pass --force to overwrite", path.display()).into());
            }
            PipelineConfig::default().write(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_pipeline(
    config_path: Option<&Path>,
    export: bool,
    format: Option<FormatArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::load(config_path)?;
    if export {
        config.output.export = ExportPolicy::Enabled;
    }
    if let Some(format) = format {
        config.output.format = format.into();
    }
    info!(
        securities = %config.inputs.securities.display(),
        export = ?config.output.export,
        "starting pipeline"
    );

    let pipeline = Pipeline::new(config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let output = match pipeline.run_with_progress(|stage| pb.set_message(stage.to_string())) {
        Ok(output) => {
            pb.finish_with_message(format!(
                "Finalized {} security rows",
                output.securities.len()
            ));
            output
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    let settings = &pipeline.config().output;
    for summary in output.summaries(settings)? {
        println!("{}", summary.to_ascii_table());
    }
    if !output.linked_fundamentals.is_empty() || !output.linked_emissions.is_empty() {
        println!(
            "Linked rows: {} with fundamentals, {} with emissions",
            output.linked_fundamentals.len(),
            output.linked_emissions.len()
        );
    }

    for outcome in output.export(settings)? {
        report(&outcome);
    }

    Ok(())
}

fn report(outcome: &ExportOutcome) {
    match outcome {
        ExportOutcome::Written { path, count } => {
            println!("Wrote {} records to {}", count, path.display());
        }
        ExportOutcome::Suppressed { path } => {
            println!(
                "Export disabled, {} not written (pass --export)",
                path.display()
            );
        }
    }
}
