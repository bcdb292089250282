//! Warehouse loading against a live Postgres.
//!
//! Gated: needs DATABASE_URL pointing at a disposable database.
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use madlake_common::dataset::{Column, ColumnType, Dataset, DatasetMeta, Value};
use madlake_pipeline::warehouse;
use madlake_store::{put_dataset, MemoryLineage, MemoryStore, ObjectStore, Zone};

fn dataset(name: &str, columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> Dataset {
    let mut d = Dataset::new(
        name,
        columns.iter().map(|(n, t)| Column::new(*n, *t)).collect(),
    );
    for row in rows {
        d.push_row(row).unwrap();
    }
    d
}

fn int(v: i64) -> Value {
    Value::Int(v)
}

fn text(v: &str) -> Value {
    Value::Text(v.to_string())
}

async fn seed(store: &dyn ObjectStore, extra_station: bool) {
    let meta = DatasetMeta::new("test fixture", "none");

    let districts = dataset(
        "distritos",
        &[
            ("id", ColumnType::Int),
            ("nombre", ColumnType::Text),
            ("densidad_poblacion", ColumnType::Float),
        ],
        vec![
            vec![int(3), text("Retiro"), Value::Float(22000.0)],
            vec![int(5), text("Chamartin"), Value::Float(19000.0)],
        ],
    );
    put_dataset(store, Zone::Process, "municipal/distritos.parquet", &districts, &meta)
        .await
        .unwrap();

    let info = dataset(
        "cleaned_parking_info",
        &[
            ("aparcamiento_id", ColumnType::Int),
            ("nombre", ColumnType::Text),
            ("capacidad_total", ColumnType::Int),
        ],
        vec![vec![int(1), text("Plaza Mayor"), int(100)]],
    );
    put_dataset(store, Zone::Process, "parkings/cleaned_parking_info.parquet", &info, &meta)
        .await
        .unwrap();

    let mapping = dataset(
        "facility_districts",
        &[
            ("aparcamiento_id", ColumnType::Int),
            ("distrito_id", ColumnType::Int),
            ("nombre_distrito", ColumnType::Text),
        ],
        vec![vec![int(1), int(3), text("Retiro")]],
    );
    put_dataset(store, Zone::Process, "parkings/facility_districts.parquet", &mapping, &meta)
        .await
        .unwrap();

    let parking = dataset(
        "enriched_parking",
        &[
            ("aparcamiento_id", ColumnType::Int),
            ("fecha_hora", ColumnType::Text),
            ("plazas_ocupadas", ColumnType::Int),
            ("porcentaje_ocupacion", ColumnType::Float),
        ],
        vec![
            vec![int(1), text("2024-03-04 08:00:00"), int(40), Value::Float(40.0)],
            vec![int(1), text("2024-03-04 09:00:00"), int(85), Value::Float(85.0)],
        ],
    );
    put_dataset(store, Zone::Access, "parkings/enriched_parking.parquet", &parking, &meta)
        .await
        .unwrap();

    let mut stations = vec![
        vec![int(3), text("metro")],
        vec![int(3), text("metro")],
        vec![int(5), text("metro")],
    ];
    if extra_station {
        stations.push(vec![int(3), text("metro")]);
    }
    let municipal = dataset(
        "enriched_estaciones_distritos",
        &[
            ("distrito_id", ColumnType::Int),
            ("tipo", ColumnType::Text),
        ],
        stations,
    );
    put_dataset(
        store,
        Zone::Access,
        "municipal/enriched_estaciones_distritos.parquet",
        &municipal,
        &meta,
    )
    .await
    .unwrap();

    let bicimad = dataset(
        "cleaned_bicimad",
        &[
            ("tipo_usuario", ColumnType::Text),
            ("estacion_origen", ColumnType::Int),
            ("estacion_destino", ColumnType::Int),
        ],
        vec![
            vec![text("Anual"), int(12), int(45)],
            vec![text("Ocasional"), int(45), int(12)],
            // Identical trip, distinct by batch ordinal.
            vec![text("Anual"), int(12), int(45)],
        ],
    );
    put_dataset(store, Zone::Access, "bicimad/cleaned_bicimad.parquet", &bicimad, &meta)
        .await
        .unwrap();
}

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Postgres connection failed")
}

async fn reset(pool: &PgPool) {
    for table in [
        "fact_ocupacion_parkings",
        "fact_infraestructura",
        "fact_usos_bicimad",
        "dim_date_time",
        "dim_aparcamientos",
        "dim_tipos_estacion",
        "dim_tipos_usuario",
        "dim_distritos",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
            .execute(pool)
            .await
            .unwrap();
    }
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_as::<_, (i64,)>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
        .0
}

#[tokio::test]
#[ignore]
async fn load_is_idempotent_and_counts_update() {
    let pool = connect().await;
    reset(&pool).await;

    let store = MemoryStore::new();
    let lineage = MemoryLineage::new();
    seed(&store, false).await;

    warehouse::load(&pool, &store, &lineage).await.unwrap();
    let first = (
        count(&pool, "dim_distritos").await,
        count(&pool, "dim_tipos_usuario").await,
        count(&pool, "dim_date_time").await,
        count(&pool, "fact_usos_bicimad").await,
        count(&pool, "fact_infraestructura").await,
        count(&pool, "fact_ocupacion_parkings").await,
    );
    assert_eq!(first, (2, 2, 2, 3, 2, 2));

    // Same inputs again: every row count stays put.
    warehouse::load(&pool, &store, &lineage).await.unwrap();
    let second = (
        count(&pool, "dim_distritos").await,
        count(&pool, "dim_tipos_usuario").await,
        count(&pool, "dim_date_time").await,
        count(&pool, "fact_usos_bicimad").await,
        count(&pool, "fact_infraestructura").await,
        count(&pool, "fact_ocupacion_parkings").await,
    );
    assert_eq!(first, second);

    // A new station in district 3 updates the count in place.
    seed(&store, true).await;
    warehouse::load(&pool, &store, &lineage).await.unwrap();
    assert_eq!(count(&pool, "fact_infraestructura").await, 2);
    let (cantidad,) = sqlx::query_as::<_, (i32,)>(
        "SELECT cantidad FROM fact_infraestructura f
         JOIN dim_tipos_estacion t ON t.id = f.tipo_estacion_id
         WHERE f.distrito_id = 3 AND t.tipo_estacion = 'metro'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(cantidad, 3);

    // Snapshots were exported for every table.
    let access = store.list(Zone::Access).await.unwrap();
    for name in ["dimensions/dim_distritos.parquet", "facts/fact_usos_bicimad.parquet"] {
        assert!(access.iter().any(|p| p == name), "missing {}", name);
    }
}
