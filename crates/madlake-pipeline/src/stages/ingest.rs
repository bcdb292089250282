//! Ingestion stage: local source extracts into the Raw zone
//!
//! Every known extract is copied byte-for-byte; no parsing, no re-encoding.
//! Each upload attaches a per-column documentation map for downstream
//! consumers. Uploads are independent: a failed local read skips that file
//! only, and there is no rollback of already-written objects.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use madlake_store::{LineageRecord, LineageRecorder, ObjectStore, Zone};

/// One expected source extract and its column documentation.
pub struct SourceExtract {
    pub local_name: &'static str,
    pub raw_path: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

/// The fixed source inventory of the lake.
pub const SOURCES: &[SourceExtract] = &[
    SourceExtract {
        local_name: "trafico-horario.csv",
        raw_path: "trafico/trafico-horario.csv",
        columns: &[
            ("sensor_id", "identificador del sensor"),
            ("fecha_hora", "timestamp del registro tomado por el sensor"),
            ("total_vehiculos", "vehiculos totales detectados en la hora"),
            ("coches", "coches durante la hora"),
            ("motos", "motos durante la hora"),
            ("camiones", "camiones durante la hora"),
            ("buses", "buses durante la hora"),
            ("velocidad_media_kmh", "velocidad media registrada"),
        ],
    },
    SourceExtract {
        local_name: "bicimad-usos.csv",
        raw_path: "bicimad/bicimad-usos.csv",
        columns: &[
            ("usuario_id", "identificador unico del usuario"),
            ("tipo_usuario", "categoria del usuario (anual, ocasional, ...)"),
            ("estacion_origen", "estacion donde comienza el viaje"),
            ("estacion_destino", "estacion donde termina el viaje"),
            ("fecha_hora_inicio", "inicio del viaje"),
            ("fecha_hora_fin", "fin del viaje"),
        ],
    },
    SourceExtract {
        local_name: "parkings_rotacion.csv",
        raw_path: "aparcamiento/parkings_rotacion.csv",
        columns: &[
            ("aparcamiento_id", "identificador del aparcamiento"),
            ("fecha", "fecha de la medicion, formato YYYY-MM-DD"),
            ("hora", "hora del dia (0 a 23)"),
            ("plazas_ocupadas", "plazas ocupadas en ese momento"),
            ("plazas_libres", "plazas libres en ese momento"),
            ("porcentaje_ocupacion", "ocupacion precalculada por el origen"),
        ],
    },
    SourceExtract {
        local_name: "ext_aparcamientos_info.csv",
        raw_path: "aparcamiento/ext_aparcamientos_info.csv",
        columns: &[
            ("aparcamiento_id", "identificador del aparcamiento"),
            ("nombre", "nombre del aparcamiento"),
            ("capacidad_total", "plazas totales"),
            ("direccion", "direccion postal"),
            ("latitud", "latitud"),
            ("longitud", "longitud"),
        ],
    },
    SourceExtract {
        local_name: "distritos_aparcamientos.csv",
        raw_path: "aparcamiento/distritos_aparcamientos.csv",
        columns: &[
            ("aparcamiento_id", "identificador del aparcamiento"),
            ("distrito_id", "distrito al que pertenece"),
            ("nombre_distrito", "nombre del distrito"),
        ],
    },
    SourceExtract {
        local_name: "dump-bbdd-municipal.sql",
        raw_path: "sql/dump-bbdd-municipal.sql",
        columns: &[(
            "script",
            "volcado SQL municipal con distritos y estaciones de transporte",
        )],
    },
];

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
    pub missing_after_verify: Vec<String>,
}

/// Copy all source extracts into the Raw zone and verify the listing.
pub async fn run(
    store: &dyn ObjectStore,
    lineage: &dyn LineageRecorder,
    source_dir: &Path,
) -> Result<IngestReport> {
    info!("Starting ingestion from {}", source_dir.display());
    let mut report = IngestReport::default();

    for source in SOURCES {
        let local_path = source_dir.join(source.local_name);
        let data = match std::fs::read(&local_path) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    path = %local_path.display(),
                    error = %err,
                    "Failed to read source extract; skipping this upload"
                );
                report.failed.push(source.raw_path.to_string());
                continue;
            },
        };

        let metadata: BTreeMap<String, String> = source
            .columns
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        match store.put(Zone::Raw, source.raw_path, data, metadata).await {
            Ok(()) => {
                lineage
                    .record(LineageRecord::new(
                        "local",
                        local_path.display().to_string(),
                        Zone::Raw.bucket(),
                        source.raw_path,
                        "Raw source extract ingested without modification",
                    ))
                    .await;
                report.uploaded.push(source.raw_path.to_string());
            },
            Err(err) => {
                error!(path = source.raw_path, error = %err, "Upload failed; skipping");
                report.failed.push(source.raw_path.to_string());
            },
        }
    }

    // Post-transfer verification: enumerate the zone and report gaps. Raw
    // writes are independent and non-transactional, so this never rolls back.
    match store.list(Zone::Raw).await {
        Ok(listing) => {
            if listing.is_empty() {
                warn!("Raw zone listing is empty after ingestion");
            }
            for source in SOURCES {
                if !listing.iter().any(|p| p == source.raw_path) {
                    warn!(path = source.raw_path, "Expected object missing from raw zone");
                    report.missing_after_verify.push(source.raw_path.to_string());
                }
            }
            info!("Raw zone now holds {} objects", listing.len());
        },
        Err(err) => {
            error!(error = %err, "Could not list raw zone for verification");
        },
    }

    info!(
        "Ingestion complete: {} uploaded, {} failed",
        report.uploaded.len(),
        report.failed.len()
    );
    Ok(report)
}
