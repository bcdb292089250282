//! madlake - staged data lake pipeline

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use madlake_common::logging::{init_logging, LogConfig, LogLevel};
use madlake_pipeline::config::PipelineConfig;
use madlake_pipeline::{stages, warehouse};
use madlake_store::{ObjectStore, S3Store, StoreLineage};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "madlake")]
#[command(author, version, about = "Staged data lake pipeline for Madrid mobility data")]
struct Cli {
    #[command(subcommand)]
    stage: Stage,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Stage {
    /// Copy source extracts into the raw ingestion zone
    Ingest {
        /// Directory holding the source extracts
        #[arg(short, long)]
        source_dir: Option<PathBuf>,
    },

    /// Clean raw extracts into the process zone
    Clean,

    /// Enrich process-zone datasets into the access zone
    Enrich,

    /// Load the access zone into the Postgres star schema
    Load,

    /// Run all stages in order
    Run {
        /// Directory holding the source extracts
        #[arg(short, long)]
        source_dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    match cli.stage {
        Stage::Ingest { source_dir } => {
            let config = PipelineConfig::from_env_without_database();
            let (store, lineage) = connect_store(&config).await?;
            run_ingest(&store, &lineage, source_dir.unwrap_or(config.source_dir)).await?;
        },
        Stage::Clean => {
            let config = PipelineConfig::from_env_without_database();
            let (store, lineage) = connect_store(&config).await?;
            stages::clean::run(store.as_ref(), &lineage).await?;
            lineage.flush("clean").await?;
        },
        Stage::Enrich => {
            let config = PipelineConfig::from_env_without_database();
            let (store, lineage) = connect_store(&config).await?;
            stages::enrich::run(store.as_ref(), &lineage).await?;
            lineage.flush("enrich").await?;
        },
        Stage::Load => {
            let config = PipelineConfig::from_env()?;
            let (store, lineage) = connect_store(&config).await?;
            let pool = connect_warehouse(&config).await?;
            warehouse::load(&pool, store.as_ref(), &lineage).await?;
            lineage.flush("load").await?;
        },
        Stage::Run { source_dir } => {
            let config = PipelineConfig::from_env()?;
            let (store, lineage) = connect_store(&config).await?;
            run_ingest(&store, &lineage, source_dir.unwrap_or_else(|| config.source_dir.clone()))
                .await?;
            stages::clean::run(store.as_ref(), &lineage).await?;
            lineage.flush("clean").await?;
            stages::enrich::run(store.as_ref(), &lineage).await?;
            lineage.flush("enrich").await?;
            let pool = connect_warehouse(&config).await?;
            warehouse::load(&pool, store.as_ref(), &lineage).await?;
            lineage.flush("load").await?;
        },
    }

    info!("Done");
    Ok(())
}

async fn connect_store(config: &PipelineConfig) -> Result<(Arc<S3Store>, StoreLineage)> {
    let store = Arc::new(S3Store::new(config.storage.clone()));
    store
        .ensure_zones()
        .await
        .context("Zone buckets unavailable")?;
    let lineage = StoreLineage::new(store.clone() as Arc<dyn ObjectStore>);
    Ok((store, lineage))
}

async fn connect_warehouse(config: &PipelineConfig) -> Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Postgres connection failed")
}

async fn run_ingest(
    store: &Arc<S3Store>,
    lineage: &StoreLineage,
    source_dir: PathBuf,
) -> Result<()> {
    let report = stages::ingest::run(store.as_ref(), lineage, &source_dir).await?;
    lineage.flush("ingest").await?;
    if !report.failed.is_empty() {
        info!(failed = ?report.failed, "Some extracts were not ingested");
    }
    if !report.missing_after_verify.is_empty() {
        info!(missing = ?report.missing_after_verify, "Raw zone verification found gaps");
    }
    Ok(())
}
