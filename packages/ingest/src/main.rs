#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime pipeline.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_pipeline_cli_utils::{IndicatifProgress, init_logger};
use crime_pipeline_database::document_db::DocumentDb;
use crime_pipeline_database::warehouse_db::WarehouseDb;
use crime_pipeline_ingest::checkpoint::SystemClock;
use crime_pipeline_ingest::config::load_config_with_env;
use crime_pipeline_ingest::fetch::run_ingest;
use crime_pipeline_ingest::runs::{
    run_boundaries, run_checkpoint, run_clean, run_daily, run_join, run_weekly,
};
use crime_pipeline_ingest_models::PipelineConfig;
use crime_pipeline_source::pacing::TokioPacer;
use crime_pipeline_source::socrata::SocrataSource;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "crime_pipeline", about = "Incremental crime incident pipeline")]
struct Cli {
    /// Path to a TOML config file (defaults to `crime_pipeline.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new incidents, then rebuild the clean warehouse table
    Daily,
    /// Reload neighborhood boundaries, then rebuild the joined table and CSV
    Weekly,
    /// Fetch and upsert new incidents only
    Ingest,
    /// Clean the document store into the warehouse only
    Clean,
    /// Load the boundary reference file only
    Boundaries,
    /// Run the spatial join only
    Join,
    /// Print the next fetch window without fetching
    Checkpoint,
}

fn print_report<T: Serialize>(report: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn open_documents(config: &PipelineConfig) -> Result<DocumentDb, Box<dyn std::error::Error>> {
    log::info!(
        "Opening document store {}",
        config.storage.document_db.display()
    );
    Ok(DocumentDb::open(&config.storage.document_db)?)
}

fn open_warehouse(config: &PipelineConfig) -> Result<WarehouseDb, Box<dyn std::error::Error>> {
    log::info!("Opening warehouse {}", config.storage.warehouse_db.display());
    Ok(WarehouseDb::open(&config.storage.warehouse_db)?)
}

fn socrata(config: &PipelineConfig) -> Result<SocrataSource, Box<dyn std::error::Error>> {
    Ok(SocrataSource::new(config.api.socrata())?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();
    let config = load_config_with_env(cli.config.as_deref())?;
    let start = Instant::now();

    match cli.command {
        Commands::Daily => {
            let source = socrata(&config)?;
            let documents = open_documents(&config)?;
            let warehouse = open_warehouse(&config)?;
            let progress = IndicatifProgress::days_bar(&multi, &config.api.label);

            let result = run_daily(
                &config,
                &source,
                &TokioPacer,
                &SystemClock,
                &documents,
                &warehouse,
                &progress,
            )
            .await;

            documents.close()?;
            warehouse.close()?;
            print_report(&result?)?;
        }
        Commands::Weekly => {
            let documents = open_documents(&config)?;
            let warehouse = open_warehouse(&config)?;

            let result = run_weekly(&config, &documents, &warehouse);

            documents.close()?;
            warehouse.close()?;
            print_report(&result?)?;
        }
        Commands::Ingest => {
            let source = socrata(&config)?;
            let documents = open_documents(&config)?;
            let progress = IndicatifProgress::days_bar(&multi, &config.api.label);

            let result = run_ingest(
                &source,
                &TokioPacer,
                &SystemClock,
                &config.ingest,
                &documents,
                &progress,
            )
            .await;

            documents.close()?;
            print_report(&result?)?;
        }
        Commands::Clean => {
            let documents = open_documents(&config)?;
            let warehouse = open_warehouse(&config)?;

            let result = run_clean(&config.output, &documents, &warehouse);

            documents.close()?;
            warehouse.close()?;
            print_report(&result?)?;
        }
        Commands::Boundaries => {
            let documents = open_documents(&config)?;

            let result = run_boundaries(&config.boundaries, &documents);

            documents.close()?;
            print_report(&result?)?;
        }
        Commands::Join => {
            let documents = open_documents(&config)?;
            let warehouse = open_warehouse(&config)?;

            let result = run_join(&config.output, &documents, &warehouse);

            documents.close()?;
            warehouse.close()?;
            print_report(&result?)?;
        }
        Commands::Checkpoint => {
            let documents = open_documents(&config)?;

            let result = run_checkpoint(&config, &documents, &SystemClock);

            documents.close()?;
            print_report(&result?)?;
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}
