//! End-to-end flow over the in-memory store: ingest, clean, enrich.
//!
//! Exercises the full zone chain with small but realistic extracts,
//! including a latin-1 municipal dump carrying the known quoting defect.

use std::fs;

use tempfile::TempDir;

use madlake_common::dataset::Value;
use madlake_pipeline::stages::{clean, enrich, ingest};
use madlake_store::{get_dataset, MemoryLineage, MemoryStore, ObjectStore, Zone};

const TRAFFIC_CSV: &str = "\
sensor_id,fecha_hora,total_vehiculos,coches,motos,camiones,buses,velocidad_media_kmh
17,2024-03-04 08:00:00,420,350,40,20,10,38.5
17,2024-03-04 09:00:00,510,420,50,25,15,31.2
";

const BICIMAD_CSV: &str = "\
usuario_id,tipo_usuario,estacion_origen,estacion_destino,fecha_hora_inicio,fecha_hora_fin
u-1001,Anual,12,45,2024-03-04 08:02:11,2024-03-04 08:19:40
u-1002,Ocasional,45,12,2024-03-04 08:05:00,2024-03-04 08:30:12
u-1001,Anual,12,45,2024-03-04 18:00:00,2024-03-04 18:21:05
";

const ROTATION_CSV: &str = "\
aparcamiento_id,fecha,hora,plazas_ocupadas,plazas_libres,porcentaje_ocupacion
1,2024-03-04,8,40,60,39.0
1,2024-03-04,9,85,15,84.0
2,2024-03-04,8,150,50,74.0
";

const FACILITY_INFO_CSV: &str = "\
aparcamiento_id,nombre,capacidad_total,direccion,latitud,longitud
1,Plaza Mayor,100,Calle Mayor 1,40.4154,-3.7074
2,Fuencarral,200,Calle de Fuencarral 77,40.4320,-3.7010
";

const FACILITY_DISTRICTS_CSV: &str = "\
aparcamiento_id,distrito_id,nombre_distrito
1,1,Centro
2,7,Chamberi
";

// ISO-8859-1 on purpose: 0xed is 'í', and the O'Donnell literal carries the
// unescaped quote the sanitizer must repair.
const MUNICIPAL_DUMP: &[u8] = b"CREATE TABLE distritos (
    id INTEGER PRIMARY KEY,
    nombre TEXT NOT NULL,
    densidad_poblacion REAL
);
INSERT INTO distritos VALUES (1, 'Centro', 25000.0);
INSERT INTO distritos VALUES (4, 'Salamanca - O'Donnell', 21000.0);
INSERT INTO distritos VALUES (7, 'Chamber\xed', 23500.0);
CREATE TABLE estaciones_transporte (
    id INTEGER PRIMARY KEY,
    distrito_id INTEGER NOT NULL,
    tipo TEXT NOT NULL
);
INSERT INTO estaciones_transporte VALUES (1, 1, 'metro');
INSERT INTO estaciones_transporte VALUES (2, 1, 'metro');
INSERT INTO estaciones_transporte VALUES (3, 1, 'bus');
INSERT INTO estaciones_transporte VALUES (4, 7, 'metro');
INSERT INTO estaciones_transporte VALUES (5, 99, 'bus');
";

fn write_sources(dir: &TempDir) {
    let root = dir.path();
    fs::write(root.join("trafico-horario.csv"), TRAFFIC_CSV).unwrap();
    fs::write(root.join("bicimad-usos.csv"), BICIMAD_CSV).unwrap();
    fs::write(root.join("parkings_rotacion.csv"), ROTATION_CSV).unwrap();
    fs::write(root.join("ext_aparcamientos_info.csv"), FACILITY_INFO_CSV).unwrap();
    fs::write(root.join("distritos_aparcamientos.csv"), FACILITY_DISTRICTS_CSV).unwrap();
    fs::write(root.join("dump-bbdd-municipal.sql"), MUNICIPAL_DUMP).unwrap();
}

#[tokio::test]
async fn full_flow_through_the_three_zones() {
    let sources = TempDir::new().unwrap();
    write_sources(&sources);
    let store = MemoryStore::new();
    let lineage = MemoryLineage::new();

    let report = ingest::run(&store, &lineage, sources.path()).await.unwrap();
    assert_eq!(report.uploaded.len(), 6);
    assert!(report.failed.is_empty());
    assert!(report.missing_after_verify.is_empty());
    assert!(store.contains(Zone::Raw, "sql/dump-bbdd-municipal.sql"));

    clean::run(&store, &lineage).await.unwrap();

    // Raw-only columns must not survive cleaning.
    let traffic = get_dataset(&store, Zone::Process, "trafico/cleaned_traffic.parquet")
        .await
        .unwrap();
    assert!(!traffic.has_column("sensor_id"));
    assert!(!traffic.has_column("fecha_hora"));
    let hora = traffic.require_column("hora").unwrap();
    assert_eq!(traffic.rows[0][hora], Value::Text("08:00:00".into()));

    let rotation = get_dataset(&store, Zone::Process, "parkings/cleaned_parking_rotation.parquet")
        .await
        .unwrap();
    assert!(!rotation.has_column("plazas_libres"));
    assert!(!rotation.has_column("porcentaje_ocupacion"));
    let dia = rotation.require_column("dia_semana").unwrap();
    assert_eq!(rotation.rows[0][dia], Value::Text("Monday".into()));

    // The dump executed despite encoding and quoting defects.
    let districts = get_dataset(&store, Zone::Process, "municipal/distritos.parquet")
        .await
        .unwrap();
    assert_eq!(districts.len(), 3);
    let nombre = districts.require_column("nombre").unwrap();
    let names: Vec<String> = districts
        .rows
        .iter()
        .map(|r| r[nombre].to_string())
        .collect();
    assert!(names.iter().any(|n| n == "Salamanca - O'Donnell"));
    assert!(names.iter().any(|n| n == "Chamberí"));

    enrich::run(&store, &lineage).await.unwrap();

    let parking = get_dataset(&store, Zone::Access, "parkings/enriched_parking.parquet")
        .await
        .unwrap();
    assert_eq!(parking.len(), 3);
    let pct = parking.require_column("porcentaje_ocupacion").unwrap();
    let band = parking.require_column("nivel_congestion").unwrap();
    let fecha_hora = parking.require_column("fecha_hora").unwrap();
    let facility = parking.require_column("aparcamiento_id").unwrap();
    for row in &parking.rows {
        match (&row[facility], &row[pct]) {
            (Value::Int(1), Value::Float(p)) if *p == 40.0 => {
                assert_eq!(row[band], Value::Text("Bajo".into()));
                assert_eq!(row[fecha_hora], Value::Text("2024-03-04 08:00:00".into()));
            },
            (Value::Int(1), Value::Float(p)) if *p == 85.0 => {
                assert_eq!(row[band], Value::Text("Alto".into()));
            },
            (Value::Int(2), Value::Float(p)) if *p == 75.0 => {
                assert_eq!(row[band], Value::Text("Medio".into()));
            },
            other => panic!("unexpected parking row: {:?}", other),
        }
    }

    // Station in the unknown district 99 was discarded by the inner join.
    let municipal = get_dataset(
        &store,
        Zone::Access,
        "municipal/enriched_estaciones_distritos.parquet",
    )
    .await
    .unwrap();
    assert_eq!(municipal.len(), 4);
    let district = municipal.require_column("distrito_id").unwrap();
    assert!(municipal
        .rows
        .iter()
        .all(|r| r[district] == Value::Int(1) || r[district] == Value::Int(7)));

    // Passthroughs made it to the access zone.
    assert!(store.contains(Zone::Access, "bicimad/cleaned_bicimad.parquet"));
    assert!(store.contains(Zone::Access, "trafico/cleaned_traffic.parquet"));

    // One lineage record per zone-boundary write.
    let records = lineage.records();
    assert!(records.len() >= 6 + 7 + 4);
    assert!(records
        .iter()
        .all(|r| !r.source_path.is_empty() && !r.dest_path.is_empty()));
}

#[tokio::test]
async fn missing_source_file_skips_only_that_extract() {
    let sources = TempDir::new().unwrap();
    write_sources(&sources);
    fs::remove_file(sources.path().join("trafico-horario.csv")).unwrap();
    let store = MemoryStore::new();
    let lineage = MemoryLineage::new();

    let report = ingest::run(&store, &lineage, sources.path()).await.unwrap();
    assert_eq!(report.uploaded.len(), 5);
    assert_eq!(report.failed, vec!["trafico/trafico-horario.csv".to_string()]);
    assert_eq!(
        report.missing_after_verify,
        vec!["trafico/trafico-horario.csv".to_string()]
    );
    assert!(store.contains(Zone::Raw, "bicimad/bicimad-usos.csv"));
}

#[tokio::test]
async fn missing_dump_aborts_the_cleaning_stage() {
    let sources = TempDir::new().unwrap();
    write_sources(&sources);
    fs::remove_file(sources.path().join("dump-bbdd-municipal.sql")).unwrap();
    let store = MemoryStore::new();
    let lineage = MemoryLineage::new();

    ingest::run(&store, &lineage, sources.path()).await.unwrap();
    let err = clean::run(&store, &lineage).await.unwrap_err();
    assert!(err.to_string().contains("dump"));

    // Stage aborted before any process-zone write.
    let written = store.list(Zone::Process).await.unwrap();
    assert!(written.is_empty());
}
