//! Climate toolbox command line
//!
//! Fills holes in gridded data and aggregates it to regions using a weights table.
//!
//! # Usage
//!
//! ```bash
//! ctb fill --grid tas.json --output tas_filled.json
//! ctb aggregate --grid tas.json --weights segment_weights.csv \
//!   --aggwt popwt --agglev hierid --output tas_hierid.json
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

mod document;

use clap::{Args, Parser, Subcommand};
use climate_toolbox_core::fill::fill_holes;
use climate_toolbox_core::parameters::ToolboxConfig;
use climate_toolbox_core::pipeline::{prepare_field, weighted_aggregate_grid_to_regions};
use climate_toolbox_core::weights::PointWeightTable;
use document::{write_json, AggregateDocument, DocumentError, GridDocument};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ctb")]
#[command(about = "Fill and regionally aggregate gridded climate data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill missing cells of a gridded variable
    Fill {
        #[command(flatten)]
        input: GridInput,

        /// Fill broadcast slices in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Weighted average of a gridded variable over the regions of a weights table
    Aggregate {
        #[command(flatten)]
        input: GridInput,

        /// CSV weights table with lon/lat (or pix_cent_x/pix_cent_y) columns
        #[arg(short, long)]
        weights: PathBuf,

        /// Weight column, e.g. popwt or areawt
        #[arg(long)]
        aggwt: Option<String>,

        /// Region-id column, e.g. ISO or hierid
        #[arg(long)]
        agglev: Option<String>,

        /// Weight column used where aggwt is missing or not positive
        #[arg(long)]
        backup_aggwt: Option<String>,

        /// Fill holes and standardize longitude before aggregating
        #[arg(long)]
        prepare: bool,
    },
}

#[derive(Args, Debug)]
struct GridInput {
    /// Grid JSON document
    #[arg(short, long)]
    grid: PathBuf,

    /// TOML file with fill, aggregation and table parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (JSON); written to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "lat")]
    lat_name: String,

    #[arg(long, default_value = "lon")]
    lon_name: String,
}

impl GridInput {
    fn config(&self) -> Result<ToolboxConfig, DocumentError> {
        match &self.config {
            Some(path) => Ok(ToolboxConfig::from_path(path)?),
            None => Ok(ToolboxConfig::default()),
        }
    }
}

fn run(cli: Cli) -> Result<(), DocumentError> {
    match cli.command {
        Command::Fill { input, parallel } => {
            let mut config = input.config()?;
            config.fill.parallel |= parallel;

            let doc = GridDocument::read(&input.grid)?;
            let variable = doc.variable.clone();
            let mut field = doc.into_field(&input.lat_name, &input.lon_name)?;
            fill_holes(&mut field, &config.fill)?;
            write_json(
                &GridDocument::from_field(&variable, &field),
                input.output.as_deref(),
            )
        }
        Command::Aggregate {
            input,
            weights,
            aggwt,
            agglev,
            backup_aggwt,
            prepare,
        } => {
            let mut config = input.config()?;
            if let Some(aggwt) = aggwt {
                config.aggregation.aggwt = aggwt;
            }
            if let Some(agglev) = agglev {
                config.aggregation.agglev = agglev;
            }
            if let Some(backup) = backup_aggwt {
                config.aggregation.backup_aggwt = backup;
            }

            let doc = GridDocument::read(&input.grid)?;
            let variable = doc.variable.clone();
            let mut field = doc.into_field(&input.lat_name, &input.lon_name)?;
            if prepare {
                let lon_names = [input.lon_name.as_str()];
                field = prepare_field(field, &config.fill, &lon_names)?.0;
            }
            let table = PointWeightTable::from_csv_path(&weights, &config.table)?;
            let aggregate =
                weighted_aggregate_grid_to_regions(&field, &table, &config.aggregation)?;
            info!(
                regions = aggregate.len(),
                agglev = %config.aggregation.agglev,
                "Aggregated {}",
                variable
            );
            write_json(
                &AggregateDocument {
                    variable: &variable,
                    aggregate: &aggregate,
                },
                input.output.as_deref(),
            )
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
