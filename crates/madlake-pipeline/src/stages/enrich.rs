//! Enrichment stage: Process zone into Access zone
//!
//! Two independent enrichments plus two near-passthroughs. A failure in one
//! enrichment aborts only that dataset's upload; the rest of the run
//! proceeds.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info};

use madlake_common::dataset::{Column, ColumnType, Dataset, DatasetMeta, Value};
use madlake_common::error::LakeError;
use madlake_store::{get_dataset, put_dataset, LineageRecord, LineageRecorder, ObjectStore, Zone};

pub const ROTATION_PATH: &str = "parkings/cleaned_parking_rotation.parquet";
pub const FACILITY_INFO_PATH: &str = "parkings/cleaned_parking_info.parquet";
pub const FACILITY_DISTRICTS_PATH: &str = "parkings/facility_districts.parquet";
pub const DISTRICTS_PATH: &str = "municipal/distritos.parquet";
pub const STATIONS_PATH: &str = "municipal/estaciones_transporte.parquet";
pub const BICIMAD_PATH: &str = "bicimad/cleaned_bicimad.parquet";
pub const TRAFFIC_PATH: &str = "trafico/cleaned_traffic.parquet";

pub const ENRICHED_PARKING_PATH: &str = "parkings/enriched_parking.parquet";
pub const ENRICHED_MUNICIPAL_PATH: &str = "municipal/enriched_estaciones_distritos.parquet";

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("No district mapping for facility id {0}")]
    MissingDistrictMapping(i64),

    #[error("Facility id is not an integer: '{0}'")]
    BadFacilityId(String),

    #[error("District id is not an integer: '{0}'")]
    BadDistrictId(String),

    #[error(transparent)]
    Lake(#[from] LakeError),
}

/// Classify an occupancy percentage into its congestion band.
///
/// Bands are half-open with inclusive upper boundaries: below 50 is low,
/// 50 up to (not including) 80 is medium, 80 and above is high.
pub fn congestion_band(pct: f64) -> &'static str {
    if pct < 50.0 {
        "Bajo"
    } else if pct < 80.0 {
        "Medio"
    } else {
        "Alto"
    }
}

/// Attach `distrito_id` and `nombre_distrito` to facility metadata using the
/// keyed facility/district reference dataset. A facility with no mapping is a
/// hard error, never a silent null.
pub fn attach_districts(info: &Dataset, mapping: &Dataset) -> Result<Dataset, EnrichError> {
    let map_id = mapping.require_column("aparcamiento_id")?;
    let map_district = mapping.require_column("distrito_id")?;
    let map_name = mapping.require_column("nombre_distrito")?;

    let mut by_facility: HashMap<i64, (i64, Value)> = HashMap::new();
    for row in &mapping.rows {
        if let Some(id) = row[map_id].as_i64() {
            let district = row[map_district]
                .as_i64()
                .ok_or_else(|| EnrichError::BadDistrictId(row[map_district].to_string()))?;
            by_facility.insert(id, (district, row[map_name].clone()));
        }
    }

    let info_id = info.require_column("aparcamiento_id")?;
    let mut enriched = info.clone();
    enriched.name = "enriched_parking_info".to_string();
    enriched.columns.push(Column::new("distrito_id", ColumnType::Int));
    enriched.columns.push(Column::new("nombre_distrito", ColumnType::Text));
    for row in &mut enriched.rows {
        let facility = row[info_id]
            .as_i64()
            .ok_or_else(|| EnrichError::BadFacilityId(row[info_id].to_string()))?;
        let (district, name) = by_facility
            .get(&facility)
            .ok_or(EnrichError::MissingDistrictMapping(facility))?;
        row.push(Value::Int(*district));
        row.push(name.clone());
    }
    Ok(enriched)
}

/// Parking enrichment: rotation joined to district-tagged facility metadata,
/// occupancy recomputed from capacity, congestion banded, and the combined
/// date-time derived for dimensional keying.
pub fn enrich_parking(
    rotation: &Dataset,
    info: &Dataset,
    mapping: &Dataset,
) -> Result<Dataset, EnrichError> {
    let facilities = attach_districts(info, mapping)?;
    let mut merged = rotation.inner_join(
        &facilities,
        "aparcamiento_id",
        "aparcamiento_id",
        "enriched_parking",
    )?;

    let occupied = merged.require_column("plazas_ocupadas")?;
    let capacity = merged.require_column("capacidad_total")?;
    merged.add_column("porcentaje_ocupacion", ColumnType::Float, move |_, row| {
        let occupied = row[occupied].as_f64().ok_or_else(|| {
            LakeError::Arithmetic(format!("plazas_ocupadas is not numeric: '{}'", row[occupied]))
        })?;
        let capacity = row[capacity].as_f64().ok_or_else(|| {
            LakeError::Arithmetic(format!("capacidad_total is not numeric: '{}'", row[capacity]))
        })?;
        if capacity <= 0.0 {
            return Err(LakeError::Arithmetic(
                "capacidad_total is zero; occupancy percentage undefined".to_string(),
            ));
        }
        Ok(Value::Float(occupied / capacity * 100.0))
    })?;

    let pct = merged.require_column("porcentaje_ocupacion")?;
    merged.add_column("nivel_congestion", ColumnType::Text, move |_, row| {
        match row[pct].as_f64() {
            Some(p) => Ok(Value::Text(congestion_band(p).to_string())),
            None => Ok(Value::Null),
        }
    })?;

    let fecha = merged.require_column("fecha")?;
    let hora = merged.require_column("hora")?;
    merged.add_column("fecha_hora", ColumnType::Text, move |_, row| {
        combined_datetime(&row[fecha], &row[hora])
    })?;

    Ok(merged)
}

/// Municipal enrichment: stations inner-joined to districts; stations whose
/// district id has no district row are discarded.
pub fn enrich_municipal(
    stations: &Dataset,
    districts: &Dataset,
) -> Result<Dataset, EnrichError> {
    let joined = stations.inner_join(
        districts,
        "distrito_id",
        "id",
        "enriched_estaciones_distritos",
    )?;
    Ok(joined)
}

fn combined_datetime(fecha: &Value, hora: &Value) -> madlake_common::Result<Value> {
    let Some(date_text) = fecha.as_str() else {
        return Ok(Value::Null);
    };
    let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|_| {
        LakeError::TypeMismatch {
            column: "fecha".to_string(),
            expected: "YYYY-MM-DD".to_string(),
            value: date_text.to_string(),
        }
    })?;
    let hour = hora.as_i64().filter(|h| (0..24).contains(h)).ok_or_else(|| {
        LakeError::TypeMismatch {
            column: "hora".to_string(),
            expected: "hour of day 0-23".to_string(),
            value: hora.to_string(),
        }
    })?;
    Ok(Value::Text(format!("{} {:02}:00:00", date.format("%Y-%m-%d"), hour)))
}

/// Run the enrichment stage.
pub async fn run(store: &dyn ObjectStore, lineage: &dyn LineageRecorder) -> Result<()> {
    info!("Starting enrichment stage");

    // Stage gate: all downloads before any write. Each input is fetched once
    // and failures are attributed to the enrichments that need it.
    let rotation = get_dataset(store, Zone::Process, ROTATION_PATH).await;
    let info = get_dataset(store, Zone::Process, FACILITY_INFO_PATH).await;
    let mapping = get_dataset(store, Zone::Process, FACILITY_DISTRICTS_PATH).await;
    let districts = get_dataset(store, Zone::Process, DISTRICTS_PATH).await;
    let stations = get_dataset(store, Zone::Process, STATIONS_PATH).await;
    let bicimad = get_dataset(store, Zone::Process, BICIMAD_PATH).await;
    let traffic = get_dataset(store, Zone::Process, TRAFFIC_PATH).await;

    // Parking enrichment
    match (&rotation, &info, &mapping) {
        (Ok(rotation), Ok(info), Ok(mapping)) => {
            match enrich_parking(rotation, info, mapping) {
                Ok(enriched) => {
                    let meta = DatasetMeta::new(
                        "Enriched parking data",
                        "Joined rotation and facility info, recomputed occupancy, banded congestion, derived fecha_hora",
                    );
                    upload(store, lineage, &enriched, ENRICHED_PARKING_PATH, &meta,
                        &format!("{} + {}", ROTATION_PATH, FACILITY_INFO_PATH)).await;
                },
                Err(err) => error!(error = %err, "Parking enrichment failed; dataset skipped"),
            }
        },
        _ => error!("Parking enrichment inputs unavailable; dataset skipped"),
    }

    // Municipal enrichment
    match (&stations, &districts) {
        (Ok(stations), Ok(districts)) => match enrich_municipal(stations, districts) {
            Ok(joined) => {
                let meta = DatasetMeta::new(
                    "Enriched municipal data: stations joined to districts",
                    "Inner join of estaciones_transporte to distritos on distrito_id",
                );
                upload(store, lineage, &joined, ENRICHED_MUNICIPAL_PATH, &meta,
                    &format!("{} + {}", STATIONS_PATH, DISTRICTS_PATH)).await;
            },
            Err(err) => error!(error = %err, "Municipal enrichment failed; dataset skipped"),
        },
        _ => error!("Municipal enrichment inputs unavailable; dataset skipped"),
    }

    // Passthroughs
    match &bicimad {
        Ok(bicimad) => {
            let meta = DatasetMeta::new("Cleaned BiciMAD trip data", "None");
            upload(store, lineage, bicimad, BICIMAD_PATH, &meta, BICIMAD_PATH).await;
        },
        Err(err) => error!(error = %err, "BiciMAD passthrough unavailable; skipped"),
    }
    match &traffic {
        Ok(traffic) => {
            let meta = DatasetMeta::new("Cleaned traffic data", "None");
            upload(store, lineage, traffic, TRAFFIC_PATH, &meta, TRAFFIC_PATH).await;
        },
        Err(err) => error!(error = %err, "Traffic passthrough unavailable; skipped"),
    }

    info!("Enrichment stage complete");
    Ok(())
}

async fn upload(
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
    dataset: &Dataset,
    dest: &str,
    meta: &DatasetMeta,
    source: &str,
) {
    match put_dataset(store, Zone::Access, dest, dataset, meta).await {
        Ok(()) => {
            lineage
                .record(LineageRecord::new(
                    Zone::Process.bucket(),
                    source,
                    Zone::Access.bucket(),
                    dest,
                    meta.transformations.clone(),
                ))
                .await;
            info!(dataset = %dataset.name, rows = dataset.len(), "Uploaded to access zone");
        },
        Err(err) => error!(dest, error = %err, "Upload to access zone failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation() -> Dataset {
        let mut d = Dataset::new(
            "cleaned_parking_rotation",
            vec![
                Column::new("aparcamiento_id", ColumnType::Int),
                Column::new("fecha", ColumnType::Text),
                Column::new("hora", ColumnType::Int),
                Column::new("plazas_ocupadas", ColumnType::Int),
            ],
        );
        d.push_row(vec![
            Value::Int(1),
            Value::Text("2024-03-04".into()),
            Value::Int(8),
            Value::Int(40),
        ])
        .unwrap();
        d
    }

    fn info() -> Dataset {
        let mut d = Dataset::new(
            "cleaned_parking_info",
            vec![
                Column::new("aparcamiento_id", ColumnType::Int),
                Column::new("nombre", ColumnType::Text),
                Column::new("capacidad_total", ColumnType::Int),
            ],
        );
        d.push_row(vec![
            Value::Int(1),
            Value::Text("Plaza Mayor".into()),
            Value::Int(100),
        ])
        .unwrap();
        d
    }

    fn mapping() -> Dataset {
        let mut d = Dataset::new(
            "facility_districts",
            vec![
                Column::new("aparcamiento_id", ColumnType::Int),
                Column::new("distrito_id", ColumnType::Int),
                Column::new("nombre_distrito", ColumnType::Text),
            ],
        );
        d.push_row(vec![
            Value::Int(1),
            Value::Int(1),
            Value::Text("Centro".into()),
        ])
        .unwrap();
        d
    }

    #[test]
    fn congestion_band_boundaries() {
        assert_eq!(congestion_band(49.9), "Bajo");
        assert_eq!(congestion_band(50.0), "Medio");
        assert_eq!(congestion_band(79.9), "Medio");
        assert_eq!(congestion_band(80.0), "Alto");
    }

    #[test]
    fn occupancy_scenario_forty_of_one_hundred() {
        let enriched = enrich_parking(&rotation(), &info(), &mapping()).unwrap();
        let pct = enriched.require_column("porcentaje_ocupacion").unwrap();
        let band = enriched.require_column("nivel_congestion").unwrap();
        let fh = enriched.require_column("fecha_hora").unwrap();
        assert_eq!(enriched.rows[0][pct], Value::Float(40.0));
        assert_eq!(enriched.rows[0][band], Value::Text("Bajo".into()));
        assert_eq!(enriched.rows[0][fh], Value::Text("2024-03-04 08:00:00".into()));
        // District columns came from the keyed mapping
        let district = enriched.require_column("distrito_id").unwrap();
        assert_eq!(enriched.rows[0][district], Value::Int(1));
    }

    #[test]
    fn zero_capacity_aborts_the_dataset() {
        let mut bad_info = info();
        bad_info.rows[0][2] = Value::Int(0);
        let err = enrich_parking(&rotation(), &bad_info, &mapping()).unwrap_err();
        assert!(matches!(err, EnrichError::Lake(LakeError::Arithmetic(_))));
    }

    #[test]
    fn non_integer_district_in_mapping_is_rejected() {
        let mut mapping = mapping();
        mapping.rows[0][1] = Value::Text("uno".into());
        let err = attach_districts(&info(), &mapping).unwrap_err();
        assert!(matches!(err, EnrichError::BadDistrictId(ref v) if v == "uno"));
    }

    #[test]
    fn unmapped_facility_is_a_defined_error() {
        let mut mapping = mapping();
        mapping.rows.clear();
        mapping
            .push_row(vec![Value::Int(99), Value::Int(1), Value::Text("Centro".into())])
            .unwrap();
        let err = enrich_parking(&rotation(), &info(), &mapping).unwrap_err();
        assert!(matches!(err, EnrichError::MissingDistrictMapping(1)));
    }

    #[test]
    fn municipal_join_discards_unmatched_stations() {
        let mut stations = Dataset::new(
            "estaciones_transporte",
            vec![
                Column::new("distrito_id", ColumnType::Int),
                Column::new("tipo", ColumnType::Text),
            ],
        );
        for (d, t) in [(3, "metro"), (3, "bus"), (42, "metro")] {
            stations.push_row(vec![Value::Int(d), Value::Text(t.into())]).unwrap();
        }
        let mut districts = Dataset::new(
            "distritos",
            vec![
                Column::new("id", ColumnType::Int),
                Column::new("nombre", ColumnType::Text),
                Column::new("densidad_poblacion", ColumnType::Float),
            ],
        );
        districts
            .push_row(vec![Value::Int(3), Value::Text("Retiro".into()), Value::Float(22000.0)])
            .unwrap();

        let joined = enrich_municipal(&stations, &districts).unwrap();
        // Station in district 42 dropped; no null-district rows appear.
        assert_eq!(joined.len(), 2);
        assert!(!joined.has_column("id"));
        let district = joined.require_column("distrito_id").unwrap();
        assert!(joined.rows.iter().all(|r| r[district] == Value::Int(3)));
    }
}
