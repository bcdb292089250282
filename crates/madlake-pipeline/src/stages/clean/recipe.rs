//! Declarative cleaning recipes
//!
//! Each known source carries one fixed recipe: which columns to drop, which
//! fields to derive, whether to re-run text normalization. One executor
//! interprets all of them, so recipes stay data and can be tested on their
//! own.

use chrono::{NaiveDate, NaiveDateTime};

use madlake_common::dataset::{ColumnType, Dataset, Value};
use madlake_common::error::{LakeError, Result};

/// A field computed from an existing column before drops are applied.
#[derive(Debug, Clone, Copy)]
pub enum DerivedField {
    /// Extract the time-of-day (`HH:MM:SS`) from a combined
    /// `YYYY-MM-DD HH:MM:SS` column.
    TimeOfDay {
        from: &'static str,
        to: &'static str,
    },
    /// Derive the English weekday name from a `YYYY-MM-DD` column.
    Weekday {
        from: &'static str,
        to: &'static str,
    },
}

/// One source dataset's cleaning contract.
pub struct CleanRecipe {
    pub name: &'static str,
    /// Raw zone object to download.
    pub source: &'static str,
    /// Process zone object to write.
    pub dest: &'static str,
    pub derived: &'static [DerivedField],
    pub drop_columns: &'static [&'static str],
    pub normalize_text: bool,
    pub description: &'static str,
    pub transformation: &'static str,
}

/// The fixed per-source recipes of the cleaning stage.
pub const RECIPES: &[CleanRecipe] = &[
    CleanRecipe {
        name: "cleaned_traffic",
        source: "trafico/trafico-horario.csv",
        dest: "trafico/cleaned_traffic.parquet",
        derived: &[DerivedField::TimeOfDay {
            from: "fecha_hora",
            to: "hora",
        }],
        drop_columns: &["sensor_id", "velocidad_media_kmh", "fecha_hora"],
        normalize_text: true,
        description: "Cleaned and formatted traffic data",
        transformation: "Dropped sensor and speed columns, derived time of day, normalized text",
    },
    CleanRecipe {
        name: "cleaned_bicimad",
        source: "bicimad/bicimad-usos.csv",
        dest: "bicimad/cleaned_bicimad.parquet",
        derived: &[],
        drop_columns: &[
            "usuario_id",
            "fecha_hora_inicio",
            "fecha_hora_fin",
            "duracion_segundos",
            "distancia_km",
            "calorias_estimadas",
            "co2_evitado_gramos",
        ],
        normalize_text: true,
        description: "Cleaned BiciMAD trip data",
        transformation: "Dropped user-identifying and derived-metric columns, normalized text",
    },
    CleanRecipe {
        name: "cleaned_parking_rotation",
        source: "aparcamiento/parkings_rotacion.csv",
        dest: "parkings/cleaned_parking_rotation.parquet",
        derived: &[DerivedField::Weekday {
            from: "fecha",
            to: "dia_semana",
        }],
        // Free-space and occupancy values are recomputed from joined capacity
        // data downstream; stale source values must not survive.
        drop_columns: &["plazas_libres", "porcentaje_ocupacion"],
        normalize_text: true,
        description: "Cleaned parking rotation data",
        transformation: "Derived weekday, dropped stale occupancy columns, normalized text",
    },
    CleanRecipe {
        name: "cleaned_parking_info",
        source: "aparcamiento/ext_aparcamientos_info.csv",
        dest: "parkings/cleaned_parking_info.parquet",
        derived: &[],
        drop_columns: &[
            "direccion",
            "plazas_movilidad_reducida",
            "plazas_vehiculos_electricos",
            "horario",
            "tarifa_hora_euros",
            "latitud",
            "longitud",
        ],
        normalize_text: true,
        description: "Cleaned external parking facility metadata",
        transformation: "Dropped descriptive and location columns, normalized text",
    },
    CleanRecipe {
        name: "facility_districts",
        source: "aparcamiento/distritos_aparcamientos.csv",
        dest: "parkings/facility_districts.parquet",
        derived: &[],
        drop_columns: &[],
        normalize_text: true,
        description: "Facility to district reference mapping",
        transformation: "Passthrough of the keyed facility/district reference dataset",
    },
];

/// Apply one recipe in place: derivations first (they may read columns that
/// are dropped right after), then drops, then text normalization.
pub fn apply(recipe: &CleanRecipe, dataset: &mut Dataset) -> Result<()> {
    for derived in recipe.derived {
        match *derived {
            DerivedField::TimeOfDay { from, to } => {
                let idx = dataset.require_column(from)?;
                dataset.add_column(to, ColumnType::Text, move |_, row| {
                    time_of_day(&row[idx], from)
                })?;
            },
            DerivedField::Weekday { from, to } => {
                let idx = dataset.require_column(from)?;
                dataset.add_column(to, ColumnType::Text, move |_, row| {
                    weekday(&row[idx], from)
                })?;
            },
        }
    }
    dataset.drop_columns(recipe.drop_columns);
    if recipe.normalize_text {
        dataset.normalize_text();
    }
    Ok(())
}

fn time_of_day(value: &Value, column: &'static str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => {
            let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|_| {
                LakeError::TypeMismatch {
                    column: column.to_string(),
                    expected: "YYYY-MM-DD HH:MM:SS".to_string(),
                    value: s.clone(),
                }
            })?;
            Ok(Value::Text(dt.format("%H:%M:%S").to_string()))
        },
        other => Err(LakeError::TypeMismatch {
            column: column.to_string(),
            expected: "datetime text".to_string(),
            value: other.to_string(),
        }),
    }
}

fn weekday(value: &Value, column: &'static str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                LakeError::TypeMismatch {
                    column: column.to_string(),
                    expected: "YYYY-MM-DD".to_string(),
                    value: s.clone(),
                }
            })?;
            Ok(Value::Text(date.format("%A").to_string()))
        },
        other => Err(LakeError::TypeMismatch {
            column: column.to_string(),
            expected: "date text".to_string(),
            value: other.to_string(),
        }),
    }
}
