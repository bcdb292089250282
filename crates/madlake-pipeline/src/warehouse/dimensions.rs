//! Dimension population, one transaction for all five tables.

use chrono::{Datelike, NaiveDateTime, Timelike};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use super::{value_i32, value_text, WarehouseError, WarehouseInputs};

/// Calendar decomposition of one `fecha_hora` for `dim_date_time`.
///
/// `numero_dia_semana` is zero-based with Monday first. `es_festivo` is
/// always false: no holiday calendar is wired in yet, and the column records
/// that honestly instead of guessing.
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeParts {
    pub fecha: chrono::NaiveDate,
    pub hora: i32,
    pub dia_semana: String,
    pub numero_dia_semana: i32,
    pub es_festivo: bool,
    pub mes: i32,
    pub trimestre: i32,
    pub anio: i32,
}

pub fn decompose(ts: NaiveDateTime) -> DateTimeParts {
    let month = ts.month() as i32;
    DateTimeParts {
        fecha: ts.date(),
        hora: ts.hour() as i32,
        dia_semana: ts.format("%A").to_string(),
        numero_dia_semana: ts.weekday().num_days_from_monday() as i32,
        es_festivo: false,
        mes: month,
        trimestre: (month - 1) / 3 + 1,
        anio: ts.year(),
    }
}

pub async fn populate(pool: &PgPool, inputs: &WarehouseInputs) -> Result<(), WarehouseError> {
    let mut tx = pool.begin().await?;
    match populate_in(&mut tx, inputs).await {
        Ok(()) => {
            tx.commit().await?;
            info!("Dimensions committed");
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
    districts(tx, inputs).await?;
    user_types(tx, inputs).await?;
    station_types(tx, inputs).await?;
    facilities(tx, inputs).await?;
    date_times(tx, inputs).await?;
    Ok(())
}

async fn districts(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let d = &inputs.districts;
    let id = d.require_column("id")?;
    let nombre = d.require_column("nombre")?;
    let densidad = d.require_column("densidad_poblacion")?;
    for row in &d.rows {
        sqlx::query(
            "INSERT INTO dim_distritos (id, nombre, densidad_poblacion)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(value_i32(&row[id], "dim_distritos", "id")?)
        .bind(value_text(&row[nombre], "dim_distritos", "nombre")?)
        .bind(row[densidad].as_f64())
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = d.len(), "dim_distritos populated");
    Ok(())
}

async fn user_types(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let types = inputs.bicimad.distinct_text("tipo_usuario")?;
    for tipo in &types {
        sqlx::query(
            "INSERT INTO dim_tipos_usuario (tipo_usuario)
             VALUES ($1)
             ON CONFLICT (tipo_usuario) DO NOTHING",
        )
        .bind(tipo)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = types.len(), "dim_tipos_usuario populated");
    Ok(())
}

async fn station_types(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let types = inputs.municipal.distinct_text("tipo")?;
    for tipo in &types {
        sqlx::query(
            "INSERT INTO dim_tipos_estacion (tipo_estacion)
             VALUES ($1)
             ON CONFLICT (tipo_estacion) DO NOTHING",
        )
        .bind(tipo)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = types.len(), "dim_tipos_estacion populated");
    Ok(())
}

async fn facilities(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let f = &inputs.facilities;
    let id = f.require_column("aparcamiento_id")?;
    let nombre = f.require_column("nombre")?;
    let capacidad = f.require_column("capacidad_total")?;
    let distrito = f.require_column("distrito_id")?;
    for row in &f.rows {
        sqlx::query(
            "INSERT INTO dim_aparcamientos (id, nombre, capacidad_total, distrito_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(value_i32(&row[id], "dim_aparcamientos", "id")?)
        .bind(value_text(&row[nombre], "dim_aparcamientos", "nombre")?)
        .bind(value_i32(&row[capacidad], "dim_aparcamientos", "capacidad_total")?)
        .bind(value_i32(&row[distrito], "dim_aparcamientos", "distrito_id")?)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = f.len(), "dim_aparcamientos populated");
    Ok(())
}

async fn date_times(
    tx: &mut Transaction<'_, Postgres>,
    inputs: &WarehouseInputs,
) -> Result<(), WarehouseError> {
    let stamps = inputs.parking.distinct_text("fecha_hora")?;
    for stamp in &stamps {
        let ts = parse_timestamp(stamp)?;
        let parts = decompose(ts);
        sqlx::query(
            "INSERT INTO dim_date_time
               (fecha_hora, fecha, hora, dia_semana, numero_dia_semana,
                es_festivo, mes, trimestre, anio)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (fecha_hora) DO NOTHING",
        )
        .bind(ts)
        .bind(parts.fecha)
        .bind(parts.hora)
        .bind(&parts.dia_semana)
        .bind(parts.numero_dia_semana)
        .bind(parts.es_festivo)
        .bind(parts.mes)
        .bind(parts.trimestre)
        .bind(parts.anio)
        .execute(&mut **tx)
        .await?;
    }
    info!(rows = stamps.len(), "dim_date_time populated");
    Ok(())
}

pub(crate) fn parse_timestamp(text: &str) -> Result<NaiveDateTime, WarehouseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map_err(|_| {
        WarehouseError::BadValue {
            table: "dim_date_time".to_string(),
            column: "fecha_hora".to_string(),
            value: text.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn decompose_monday_morning() {
        let ts = parse_timestamp("2024-03-04 08:00:00").unwrap();
        let parts = decompose(ts);
        assert_eq!(parts.fecha, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(parts.hora, 8);
        assert_eq!(parts.dia_semana, "Monday");
        assert_eq!(parts.numero_dia_semana, 0);
        assert_eq!(parts.mes, 3);
        assert_eq!(parts.trimestre, 1);
        assert_eq!(parts.anio, 2024);
        assert!(!parts.es_festivo);
    }

    #[test]
    fn quarters_cover_the_year() {
        for (month, quarter) in [(1, 1), (3, 1), (4, 2), (6, 2), (7, 3), (9, 3), (10, 4), (12, 4)] {
            let ts = parse_timestamp(&format!("2024-{:02}-15 12:00:00", month)).unwrap();
            assert_eq!(decompose(ts).trimestre, quarter, "month {}", month);
        }
    }

    #[test]
    fn sunday_is_weekday_six() {
        let ts = parse_timestamp("2024-03-10 23:00:00").unwrap();
        let parts = decompose(ts);
        assert_eq!(parts.dia_semana, "Sunday");
        assert_eq!(parts.numero_dia_semana, 6);
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        assert!(parse_timestamp("2024-03-04").is_err());
        assert!(parse_timestamp("not a date").is_err());
    }
}
