//! Fact population, one transaction for all three tables.
//!
//! Natural keys are resolved through dictionaries built from a fresh SELECT
//! of the owning dimension. A key the dictionary does not know fails the
//! load; a fact row never carries a substituted or null foreign key.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use madlake_common::checksum::sha256_hex;

use super::{dimensions::parse_timestamp, value_i32, value_text, WarehouseError, WarehouseInputs};

/// Deterministic key for one bike-share trip. The batch ordinal is part of
/// the hash so identical trips in one extract stay distinct, while re-loading
/// the same extract reproduces the same keys and no-ops on conflict.
pub fn trip_key(ordinal: usize, origin: i32, destination: i32, user_type: &str) -> String {
    sha256_hex(format!("{}|{}|{}|{}", ordinal, origin, destination, user_type).as_bytes())
}

pub async fn populate(pool: &PgPool, inputs: &WarehouseInputs) -> Result<(), WarehouseError> {
    let mut tx = pool.begin().await?;
    match populate_in(&mut tx, inputs).await {
        Ok(()) => {
            tx.commit().await?;
            info!("Facts committed");
            Ok(())
        },
        Err(err) => {
            tx.rollback().await.ok();
            Err(err)
        },
    }
}

async fn populate_in(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    bike_trips(tx, inputs).await?;
    infrastructure(tx, inputs).await?;
    parking_occupancy(tx, inputs).await?;
    Ok(())
}

async fn text_dictionary(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
) -> Result<HashMap<String, i32>, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, String)>(sql)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(|(id, key)| (key, id)).collect())
}

fn count_i32(count: i64) -> Result<i32, WarehouseError> {
    i32::try_from(count).map_err(|_| WarehouseError::BadValue {
        table: "fact_infraestructura".to_string(),
        column: "cantidad".to_string(),
        value: count.to_string(),
    })
}

fn resolve(
    dictionary: &HashMap<String, i32>,
    dimension: &str,
    key: &str,
) -> Result<i32, WarehouseError> {
    dictionary
        .get(key)
        .copied()
        .ok_or_else(|| WarehouseError::UnresolvedKey {
            dimension: dimension.to_string(),
            key: key.to_string(),
        })
}

async fn bike_trips(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let user_types =
        text_dictionary(tx, "SELECT id, tipo_usuario FROM dim_tipos_usuario").await?;

    let d = &inputs.bicimad;
    let origin = d.require_column("estacion_origen")?;
    let destination = d.require_column("estacion_destino")?;
    let user_type = d.require_column("tipo_usuario")?;
    for (ordinal, row) in d.rows.iter().enumerate() {
        let origin = value_i32(&row[origin], "fact_usos_bicimad", "estacion_origen")?;
        let destination = value_i32(&row[destination], "fact_usos_bicimad", "estacion_destino")?;
        let tipo = value_text(&row[user_type], "fact_usos_bicimad", "tipo_usuario")?;
        let tipo_id = resolve(&user_types, "dim_tipos_usuario", &tipo)?;
        sqlx::query(
            "INSERT INTO fact_usos_bicimad
               (trip_key, estacion_origen, estacion_destino, tipo_usuario_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (trip_key) DO NOTHING",
        )
        .bind(trip_key(ordinal, origin, destination, &tipo))
        .bind(origin)
        .bind(destination)
        .bind(tipo_id)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = d.len(), "fact_usos_bicimad populated");
    Ok(())
}

async fn infrastructure(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let station_types =
        text_dictionary(tx, "SELECT id, tipo_estacion FROM dim_tipos_estacion").await?;

    let counts = inputs.municipal.group_count(&["distrito_id", "tipo"])?;
    let groups = counts.len();
    for (key, cantidad) in counts {
        let distrito = value_i32(&key[0], "fact_infraestructura", "distrito_id")?;
        let tipo = value_text(&key[1], "fact_infraestructura", "tipo")?;
        let tipo_id = resolve(&station_types, "dim_tipos_estacion", &tipo)?;
        // A re-run after new stations appeared overwrites the count.
        sqlx::query(
            "INSERT INTO fact_infraestructura (distrito_id, tipo_estacion_id, cantidad)
             VALUES ($1, $2, $3)
             ON CONFLICT (distrito_id, tipo_estacion_id)
             DO UPDATE SET cantidad = EXCLUDED.cantidad",
        )
        .bind(distrito)
        .bind(tipo_id)
        .bind(count_i32(cantidad)?)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = groups, "fact_infraestructura populated");
    Ok(())
}

async fn parking_occupancy(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, NaiveDateTime)>(
        "SELECT id, fecha_hora FROM dim_date_time",
    )
    .fetch_all(&mut **tx)
    .await?;
    let date_times: HashMap<NaiveDateTime, i32> =
        rows.into_iter().map(|(id, ts)| (ts, id)).collect();

    let d = &inputs.parking;
    let facility = d.require_column("aparcamiento_id")?;
    let stamp = d.require_column("fecha_hora")?;
    let occupied = d.require_column("plazas_ocupadas")?;
    let pct = d.require_column("porcentaje_ocupacion")?;
    for row in &d.rows {
        let stamp_text = value_text(&row[stamp], "fact_ocupacion_parkings", "fecha_hora")?;
        let ts = parse_timestamp(&stamp_text)?;
        let date_time_id = date_times
            .get(&ts)
            .copied()
            .ok_or_else(|| WarehouseError::UnresolvedKey {
                dimension: "dim_date_time".to_string(),
                key: stamp_text.clone(),
            })?;
        let porcentaje = row[pct].as_f64().ok_or_else(|| WarehouseError::BadValue {
            table: "fact_ocupacion_parkings".to_string(),
            column: "porcentaje_ocupacion".to_string(),
            value: row[pct].to_string(),
        })?;
        // Point-in-time observation: never overwritten on re-run.
        sqlx::query(
            "INSERT INTO fact_ocupacion_parkings
               (aparcamiento_id, date_time_id, plazas_ocupadas, porcentaje_ocupacion)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (aparcamiento_id, date_time_id) DO NOTHING",
        )
        .bind(value_i32(&row[facility], "fact_ocupacion_parkings", "aparcamiento_id")?)
        .bind(date_time_id)
        .bind(value_i32(&row[occupied], "fact_ocupacion_parkings", "plazas_ocupadas")?)
        .bind(porcentaje)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = d.len(), "fact_ocupacion_parkings populated");
    Ok(())
}
