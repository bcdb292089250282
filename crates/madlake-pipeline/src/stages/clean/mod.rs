//! Cleaning / standardization stage: Raw zone into Process zone
//!
//! Downloads every required raw object first (the stage gate), then applies
//! the per-source recipes and the municipal dump execution, then uploads the
//! cleaned datasets as parquet. A failing recipe skips only its dataset; a
//! missing municipal table aborts the whole run, because a warehouse without
//! district or station data is unusable downstream.

pub mod municipal;
pub mod recipe;

use anyhow::{Context, Result};
use tracing::{error, info};

use madlake_common::dataset::{Dataset, DatasetMeta};
use madlake_common::text::latin1_to_string;
use madlake_store::{put_dataset, LineageRecord, LineageRecorder, ObjectStore, Zone};

use recipe::{CleanRecipe, RECIPES};

const DUMP_SOURCE: &str = "sql/dump-bbdd-municipal.sql";
const DISTRICTS_DEST: &str = "municipal/distritos.parquet";
const STATIONS_DEST: &str = "municipal/estaciones_transporte.parquet";

/// Run the cleaning stage.
pub async fn run(store: &dyn ObjectStore, lineage: &dyn LineageRecorder) -> Result<()> {
    info!("Starting cleaning stage");

    // Stage gate: read everything from the raw zone before writing anything.
    let mut downloads: Vec<(&CleanRecipe, Option<Vec<u8>>)> = Vec::new();
    for recipe in RECIPES {
        match store.get(Zone::Raw, recipe.source).await {
            Ok(bytes) => downloads.push((recipe, Some(bytes))),
            Err(err) => {
                error!(source = recipe.source, error = %err, "Download failed; dataset skipped");
                downloads.push((recipe, None));
            },
        }
    }

    // The dump is a hard dependency: no districts or stations, no warehouse.
    let dump_bytes = store
        .get(Zone::Raw, DUMP_SOURCE)
        .await
        .context("Municipal dump missing from raw zone")?;
    let script = municipal::sanitize_script(&latin1_to_string(&dump_bytes));
    let tables = municipal::execute_dump(&script).context("Municipal dump execution failed")?;

    // Municipal projections go out first; both are required downstream.
    upload_municipal(store, lineage, &tables.districts, DISTRICTS_DEST).await?;
    upload_municipal(store, lineage, &tables.stations, STATIONS_DEST).await?;

    // Per-recipe cleaning with isolated failures.
    for (recipe, bytes) in downloads {
        let Some(bytes) = bytes else { continue };
        if let Err(err) = clean_one(store, lineage, recipe, &bytes).await {
            error!(dataset = recipe.name, error = %err, "Cleaning failed; dataset skipped");
        }
    }

    info!("Cleaning stage complete");
    Ok(())
}

async fn clean_one(
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
    recipe: &CleanRecipe,
    bytes: &[u8],
) -> Result<()> {
    let mut dataset = Dataset::from_csv(recipe.name, bytes)?;
    recipe::apply(recipe, &mut dataset)?;

    let meta = DatasetMeta::new(recipe.description, recipe.transformation);
    put_dataset(store, Zone::Process, recipe.dest, &dataset, &meta).await?;
    lineage
        .record(LineageRecord::new(
            Zone::Raw.bucket(),
            recipe.source,
            Zone::Process.bucket(),
            recipe.dest,
            recipe.transformation,
        ))
        .await;
    info!(dataset = recipe.name, rows = dataset.len(), "Cleaned and uploaded");
    Ok(())
}

async fn upload_municipal(
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
    dataset: &Dataset,
    dest: &str,
) -> Result<()> {
    let meta = DatasetMeta::new(
        format!("Cleaned {} data from the municipal SQL dump", dataset.name),
        "Executed dump in a scratch relational engine, projected required columns",
    );
    put_dataset(store, Zone::Process, dest, dataset, &meta)
        .await
        .with_context(|| format!("Failed to upload {}", dest))?;
    lineage
        .record(LineageRecord::new(
            Zone::Raw.bucket(),
            DUMP_SOURCE,
            Zone::Process.bucket(),
            dest,
            format!("{} extracted from municipal dump", dataset.name),
        ))
        .await;
    Ok(())
}
