//! Columnar snapshots of the warehouse back into the Access zone.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;
use tracing::info;

use madlake_common::dataset::{Column, ColumnType, Dataset, DatasetMeta, Value};
use madlake_store::{put_dataset, LineageRecord, LineageRecorder, ObjectStore, Zone};

use super::WarehouseError;

pub async fn export_all(
    pool: &PgPool,
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
) -> Result<(), WarehouseError> {
    let snapshots = [
        dim_distritos(pool).await?,
        dim_tipos_usuario(pool).await?,
        dim_tipos_estacion(pool).await?,
        dim_aparcamientos(pool).await?,
        dim_date_time(pool).await?,
        fact_usos_bicimad(pool).await?,
        fact_infraestructura(pool).await?,
        fact_ocupacion_parkings(pool).await?,
    ];

    for dataset in &snapshots {
        let prefix = if dataset.name.starts_with("dim_") {
            "dimensions"
        } else {
            "facts"
        };
        let dest = format!("{}/{}.parquet", prefix, dataset.name);
        let meta = DatasetMeta::new(
            format!("Warehouse snapshot of {}", dataset.name),
            "Full-table SELECT after load",
        );
        put_dataset(store, Zone::Access, &dest, dataset, &meta).await?;
        lineage
            .record(LineageRecord::new(
                "warehouse",
                &dataset.name,
                Zone::Access.bucket(),
                &dest,
                meta.transformations.clone(),
            ))
            .await;
        info!(table = %dataset.name, rows = dataset.len(), "Exported snapshot");
    }
    Ok(())
}

fn int(v: i32) -> Value {
    Value::Int(v as i64)
}

async fn dim_distritos(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, String, Option<f64>)>(
        "SELECT id, nombre, densidad_poblacion FROM dim_distritos ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "dim_distritos",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("nombre", ColumnType::Text),
            Column::new("densidad_poblacion", ColumnType::Float),
        ],
    );
    for (id, nombre, densidad) in rows {
        d.push_row(vec![
            int(id),
            Value::Text(nombre),
            densidad.map(Value::Float).unwrap_or(Value::Null),
        ])?;
    }
    Ok(d)
}

async fn dim_tipos_usuario(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, String)>(
        "SELECT id, tipo_usuario FROM dim_tipos_usuario ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "dim_tipos_usuario",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("tipo_usuario", ColumnType::Text),
        ],
    );
    for (id, tipo) in rows {
        d.push_row(vec![int(id), Value::Text(tipo)])?;
    }
    Ok(d)
}

async fn dim_tipos_estacion(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, String)>(
        "SELECT id, tipo_estacion FROM dim_tipos_estacion ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "dim_tipos_estacion",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("tipo_estacion", ColumnType::Text),
        ],
    );
    for (id, tipo) in rows {
        d.push_row(vec![int(id), Value::Text(tipo)])?;
    }
    Ok(d)
}

async fn dim_aparcamientos(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, String, i32, i32)>(
        "SELECT id, nombre, capacidad_total, distrito_id FROM dim_aparcamientos ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "dim_aparcamientos",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("nombre", ColumnType::Text),
            Column::new("capacidad_total", ColumnType::Int),
            Column::new("distrito_id", ColumnType::Int),
        ],
    );
    for (id, nombre, capacidad, distrito) in rows {
        d.push_row(vec![int(id), Value::Text(nombre), int(capacidad), int(distrito)])?;
    }
    Ok(d)
}

async fn dim_date_time(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    type Row = (
        i32,
        NaiveDateTime,
        NaiveDate,
        i32,
        String,
        i32,
        bool,
        i32,
        i32,
        i32,
    );
    let rows = sqlx::query_as::<_, Row>(
        "SELECT id, fecha_hora, fecha, hora, dia_semana, numero_dia_semana,
                es_festivo, mes, trimestre, anio
         FROM dim_date_time ORDER BY fecha_hora",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "dim_date_time",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("fecha_hora", ColumnType::Text),
            Column::new("fecha", ColumnType::Text),
            Column::new("hora", ColumnType::Int),
            Column::new("dia_semana", ColumnType::Text),
            Column::new("numero_dia_semana", ColumnType::Int),
            Column::new("es_festivo", ColumnType::Bool),
            Column::new("mes", ColumnType::Int),
            Column::new("trimestre", ColumnType::Int),
            Column::new("anio", ColumnType::Int),
        ],
    );
    for (id, fecha_hora, fecha, hora, dia, num, festivo, mes, trimestre, anio) in rows {
        d.push_row(vec![
            int(id),
            Value::Text(fecha_hora.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Text(fecha.format("%Y-%m-%d").to_string()),
            int(hora),
            Value::Text(dia),
            int(num),
            Value::Bool(festivo),
            int(mes),
            int(trimestre),
            int(anio),
        ])?;
    }
    Ok(d)
}

async fn fact_usos_bicimad(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (String, i32, i32, i32)>(
        "SELECT trip_key, estacion_origen, estacion_destino, tipo_usuario_id
         FROM fact_usos_bicimad ORDER BY trip_key",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "fact_usos_bicimad",
        vec![
            Column::new("trip_key", ColumnType::Text),
            Column::new("estacion_origen", ColumnType::Int),
            Column::new("estacion_destino", ColumnType::Int),
            Column::new("tipo_usuario_id", ColumnType::Int),
        ],
    );
    for (key, origen, destino, tipo) in rows {
        d.push_row(vec![Value::Text(key), int(origen), int(destino), int(tipo)])?;
    }
    Ok(d)
}

async fn fact_infraestructura(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, i32, i32)>(
        "SELECT distrito_id, tipo_estacion_id, cantidad
         FROM fact_infraestructura ORDER BY distrito_id, tipo_estacion_id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "fact_infraestructura",
        vec![
            Column::new("distrito_id", ColumnType::Int),
            Column::new("tipo_estacion_id", ColumnType::Int),
            Column::new("cantidad", ColumnType::Int),
        ],
    );
    for (distrito, tipo, cantidad) in rows {
        d.push_row(vec![int(distrito), int(tipo), int(cantidad)])?;
    }
    Ok(d)
}

async fn fact_ocupacion_parkings(pool: &PgPool) -> Result<Dataset, WarehouseError> {
    let rows = sqlx::query_as::<_, (i32, i32, i32, f64)>(
        "SELECT aparcamiento_id, date_time_id, plazas_ocupadas, porcentaje_ocupacion
         FROM fact_ocupacion_parkings ORDER BY aparcamiento_id, date_time_id",
    )
    .fetch_all(pool)
    .await?;
    let mut d = Dataset::new(
        "fact_ocupacion_parkings",
        vec![
            Column::new("aparcamiento_id", ColumnType::Int),
            Column::new("date_time_id", ColumnType::Int),
            Column::new("plazas_ocupadas", ColumnType::Int),
            Column::new("porcentaje_ocupacion", ColumnType::Float),
        ],
    );
    for (facility, date_time, occupied, pct) in rows {
        d.push_row(vec![int(facility), int(date_time), int(occupied), Value::Float(pct)])?;
    }
    Ok(d)
}
