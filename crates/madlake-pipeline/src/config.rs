//! Pipeline configuration
//!
//! Everything comes from environment variables (a `.env` file is honored via
//! `dotenvy` in the binary), matching how the deployment wires MinIO and
//! Postgres endpoints into the scheduler.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use madlake_store::S3Config;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Object-store gateway settings (S3 or MinIO).
    pub storage: S3Config,
    /// Postgres connection string for the warehouse sink.
    pub database_url: String,
    /// Local directory holding the source extracts to ingest.
    pub source_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL not set; the warehouse loader needs a Postgres endpoint")?;
        let source_dir = env::var("MADLAKE_SOURCE_DIR")
            .unwrap_or_else(|_| "./data/raw-ingestion-zone".to_string())
            .into();

        Ok(Self {
            storage: S3Config::from_env(),
            database_url,
            source_dir,
        })
    }

    /// Variant for stages that never touch the warehouse.
    pub fn from_env_without_database() -> Self {
        Self {
            storage: S3Config::from_env(),
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            source_dir: env::var("MADLAKE_SOURCE_DIR")
                .unwrap_or_else(|_| "./data/raw-ingestion-zone".to_string())
                .into(),
        }
    }
}
