//! `settlements` command line entry point.
//!
//! # Responsibility
//! - Map flags onto `PipelineConfig` and run the pipeline or an offline task.
//! - Translate failures into a non-zero exit and a resume hint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use settlement_core::db::open_db;
use settlement_core::service::dataset_service::{analyze_missing_settlements, export_simulation};
use settlement_core::{
    default_log_level, init_cli_logging, GooglePlacesGeocoder, PipelineConfig, PipelineError,
    RunMode, SettlementPipeline, SqliteCheckpointStore,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "settlements",
    version,
    about = "Aggregate, geocode and cluster census settlements into settlements.json"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Add the settlements from the missing-settlements analysis to the existing dataset
    #[arg(long)]
    append: bool,

    /// Census population CSV
    #[arg(long, default_value = "Population.csv")]
    census: PathBuf,

    /// Dataset written by the pipeline and read by the offline tasks
    #[arg(long, default_value = "../mapData/sourceData/settlements.json")]
    output: PathBuf,

    /// Side file listing settlements that could not be located
    #[arg(long, default_value = "unmatched_settlements.json")]
    unmatched: PathBuf,

    /// Missing-settlements analysis file
    #[arg(long, default_value = "missing_settlements_analysis.json")]
    missing_analysis: PathBuf,

    /// Directory holding the checkpoint database
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,

    /// Geocoder requests per checkpointed batch
    #[arg(long, default_value = "50")]
    batch_size: usize,

    /// Clustering radius in kilometres
    #[arg(long, default_value = "30")]
    cluster_distance_km: f64,

    /// Disable the similarity fallback when joining names with coordinates
    #[arg(long)]
    no_fuzzy: bool,

    /// Log file directory
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// trace|debug|info|warn|error (defaults by build mode)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List census areas missing from the dataset's constituents
    AnalyzeMissing,
    /// Write the dataset projected onto the simulation grid
    ExportSim {
        #[arg(long, default_value = "../mapData/sourceData/settlements_sim.json")]
        sim_output: PathBuf,
    },
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig {
            batch_size: self.batch_size,
            cluster_distance_km: self.cluster_distance_km,
            fuzzy_match: !self.no_fuzzy,
            output_path: self.output.clone(),
            unmatched_path: self.unmatched.clone(),
            missing_analysis_path: self.missing_analysis.clone(),
            ..PipelineConfig::default()
        };
        config.census.path = self.census.clone();
        config
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_cli_logging(&level, &args.log_dir) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err:#}");
            eprintln!("Error: {err:#}");
            let resumable = args.command.is_none()
                && err
                    .downcast_ref::<PipelineError>()
                    .is_some_and(PipelineError::is_resumable);
            if resumable {
                eprintln!("Progress saved in checkpoints. Run again to resume.");
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &Args) -> Result<()> {
    let config = args.pipeline_config();
    match &args.command {
        Some(Command::AnalyzeMissing) => {
            let analysis = analyze_missing_settlements(
                &config.census,
                &config.output_path,
                &config.missing_analysis_path,
            )?;
            println!(
                "{} of {} census areas missing ({:.1}%), population {}",
                analysis.metadata.total_missing,
                analysis.metadata.total_settlements_csv,
                analysis.metadata.percentage_missing,
                analysis.metadata.total_missing_population
            );
            println!("Analysis saved to {}", config.missing_analysis_path.display());
        }
        Some(Command::ExportSim { sim_output }) => {
            let export = export_simulation(&config.output_path, sim_output)?;
            println!(
                "Exported {} settlements, population {}, {:.1} MW",
                export.metadata.total_settlements,
                export.metadata.total_population,
                export.metadata.total_power_usage
            );
        }
        None => run_pipeline(args, config)?,
    }
    Ok(())
}

fn run_pipeline(args: &Args, config: PipelineConfig) -> Result<()> {
    let geocoder = GooglePlacesGeocoder::from_env()?;
    let conn = open_db(&args.checkpoint_dir).with_context(|| {
        format!(
            "failed to open checkpoint store in `{}`",
            args.checkpoint_dir.display()
        )
    })?;
    let store = SqliteCheckpointStore::new(&conn);

    let mode = if args.append {
        RunMode::Append
    } else {
        RunMode::Full
    };
    let output_path = config.output_path.clone();
    let pipeline = SettlementPipeline::new(&store, &geocoder, config);
    let report = pipeline.run(mode)?;

    println!("Processed {} settlement groups", report.total_settlements);
    println!(
        "Total population in grouped settlements: {}",
        report.total_population
    );
    println!(
        "Total population in Ireland (census): {}",
        report.total_ireland_population
    );
    println!("Data saved to {}", output_path.display());
    Ok(())
}
