//! Warehouse loader: Access zone into the Postgres star schema
//!
//! Three phases: schema creation (`IF NOT EXISTS`), dimension population,
//! fact population. Dimensions and facts each run inside their own
//! transaction, so committed dimensions survive a later fact failure. After
//! loading, every table is exported back to the Access zone as a parquet
//! snapshot.

pub mod dimensions;
pub mod export;
pub mod facts;
pub mod schema;

use anyhow::{Context, Result};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use madlake_common::dataset::{Dataset, Value};
use madlake_common::error::LakeError;
use madlake_store::{get_dataset, LineageRecorder, ObjectStore, StoreError, Zone};

use crate::stages::enrich::{self, EnrichError};

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Unresolvable natural key '{key}' against {dimension}")]
    UnresolvedKey { dimension: String, key: String },

    #[error("Bad value in {table}.{column}: '{value}'")]
    BadValue {
        table: String,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Lake(#[from] LakeError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the loader reads from the lake. Fetched up front so a missing
/// object fails the run before the first SQL statement.
pub struct WarehouseInputs {
    /// `distritos` projection from the municipal dump (process zone).
    pub districts: Dataset,
    /// Facility metadata with district columns attached, one row per facility.
    pub facilities: Dataset,
    /// Enriched parking observations (access zone).
    pub parking: Dataset,
    /// Stations joined to districts (access zone).
    pub municipal: Dataset,
    /// Cleaned bike-share trips (access zone).
    pub bicimad: Dataset,
}

pub async fn fetch_inputs(store: &dyn ObjectStore) -> Result<WarehouseInputs, WarehouseError> {
    let districts = get_dataset(store, Zone::Process, enrich::DISTRICTS_PATH).await?;
    let info = get_dataset(store, Zone::Process, enrich::FACILITY_INFO_PATH).await?;
    let mapping = get_dataset(store, Zone::Process, enrich::FACILITY_DISTRICTS_PATH).await?;
    let facilities = enrich::attach_districts(&info, &mapping)?;
    let parking = get_dataset(store, Zone::Access, enrich::ENRICHED_PARKING_PATH).await?;
    let municipal = get_dataset(store, Zone::Access, enrich::ENRICHED_MUNICIPAL_PATH).await?;
    let bicimad = get_dataset(store, Zone::Access, enrich::BICIMAD_PATH).await?;
    Ok(WarehouseInputs {
        districts,
        facilities,
        parking,
        municipal,
        bicimad,
    })
}

/// Run the full warehouse load.
pub async fn load(
    pool: &PgPool,
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
) -> Result<()> {
    info!("Starting warehouse load");

    schema::create_schema(pool)
        .await
        .context("Star schema creation failed")?;
    let inputs = fetch_inputs(store)
        .await
        .context("Warehouse inputs unavailable")?;

    dimensions::populate(pool, &inputs)
        .await
        .context("Dimension population failed")?;
    facts::populate(pool, &inputs)
        .await
        .context("Fact population failed")?;

    export::export_all(pool, store, lineage)
        .await
        .context("Warehouse export to access zone failed")?;

    info!("Warehouse load complete");
    Ok(())
}

pub(crate) fn value_i32(value: &Value, table: &str, column: &str) -> Result<i32, WarehouseError> {
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| WarehouseError::BadValue {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })
}

pub(crate) fn value_text(value: &Value, table: &str, column: &str) -> Result<String, WarehouseError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => Err(WarehouseError::BadValue {
            table: table.to_string(),
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}
