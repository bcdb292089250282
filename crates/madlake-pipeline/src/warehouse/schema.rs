//! Star schema DDL. Every statement is `IF NOT EXISTS`, so repeated runs
//! leave an existing schema untouched.

use sqlx::PgPool;

use super::WarehouseError;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dim_distritos (
        id INT PRIMARY KEY,
        nombre VARCHAR NOT NULL,
        densidad_poblacion DOUBLE PRECISION
    )",
    "CREATE TABLE IF NOT EXISTS dim_tipos_usuario (
        id SERIAL PRIMARY KEY,
        tipo_usuario VARCHAR NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS dim_tipos_estacion (
        id SERIAL PRIMARY KEY,
        tipo_estacion VARCHAR NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS dim_aparcamientos (
        id INT PRIMARY KEY,
        nombre VARCHAR NOT NULL,
        capacidad_total INT NOT NULL,
        distrito_id INT NOT NULL REFERENCES dim_distritos(id)
    )",
    "CREATE TABLE IF NOT EXISTS dim_date_time (
        id SERIAL PRIMARY KEY,
        fecha_hora TIMESTAMP NOT NULL UNIQUE,
        fecha DATE NOT NULL,
        hora INT NOT NULL,
        dia_semana VARCHAR NOT NULL,
        numero_dia_semana INT NOT NULL,
        es_festivo BOOLEAN NOT NULL,
        mes INT NOT NULL,
        trimestre INT NOT NULL,
        anio INT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS fact_usos_bicimad (
        trip_key TEXT PRIMARY KEY,
        estacion_origen INT NOT NULL,
        estacion_destino INT NOT NULL,
        tipo_usuario_id INT NOT NULL REFERENCES dim_tipos_usuario(id)
    )",
    "CREATE TABLE IF NOT EXISTS fact_infraestructura (
        distrito_id INT NOT NULL REFERENCES dim_distritos(id),
        tipo_estacion_id INT NOT NULL REFERENCES dim_tipos_estacion(id),
        cantidad INT NOT NULL,
        PRIMARY KEY (distrito_id, tipo_estacion_id)
    )",
    "CREATE TABLE IF NOT EXISTS fact_ocupacion_parkings (
        aparcamiento_id INT NOT NULL REFERENCES dim_aparcamientos(id),
        date_time_id INT NOT NULL REFERENCES dim_date_time(id),
        plazas_ocupadas INT NOT NULL,
        porcentaje_ocupacion DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (aparcamiento_id, date_time_id)
    )",
];

pub async fn create_schema(pool: &PgPool) -> Result<(), WarehouseError> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}
