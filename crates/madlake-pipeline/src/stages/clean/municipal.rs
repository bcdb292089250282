//! Municipal dump execution against a scratch relational engine
//!
//! The municipal source arrives as a SQL dump. It is executed against a
//! fresh, isolated SQLite instance that lives inside a temporary directory
//! owned by this function, so teardown happens on every exit path including
//! script failure. Only the two tables the warehouse depends on are
//! extracted; everything else in the dump is discarded with the scratch file.

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

use madlake_common::dataset::{Column, ColumnType, Dataset, Value};
use madlake_common::error::LakeError;
use madlake_common::text::lossy_utf8;

#[derive(Error, Debug)]
pub enum MunicipalError {
    #[error("Required table '{0}' missing from municipal dump")]
    MissingTable(String),

    #[error("Municipal script execution failed: {message}\nLast lines of script:\n{tail}")]
    ScriptExecution { message: String, tail: String },

    #[error("Scratch database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Scratch directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lake(#[from] LakeError),
}

/// The two projections the downstream stages depend on.
#[derive(Debug)]
pub struct MunicipalTables {
    /// `distritos` projected to (id, nombre, densidad_poblacion).
    pub districts: Dataset,
    /// `estaciones_transporte` projected to (distrito_id, tipo).
    pub stations: Dataset,
}

/// Sanitize the dump's statement text before execution.
///
/// The upstream export has one known escaping defect: the proper noun
/// O'Donnell appears with an unescaped apostrophe. Everything else is left
/// untouched apart from lossy re-encoding.
pub fn sanitize_script(script: &str) -> String {
    let script = script.replace("'Donnell", "''Donnell");
    lossy_utf8(script.as_bytes())
}

/// Execute the (already sanitized) dump and extract the two required tables.
pub fn execute_dump(script: &str) -> Result<MunicipalTables, MunicipalError> {
    let scratch = tempfile::tempdir()?;
    let db_path = scratch.path().join("municipal-scratch.db");
    debug!("Executing municipal dump in scratch database {}", db_path.display());

    let conn = Connection::open(&db_path)?;
    if let Err(err) = conn.execute_batch(script) {
        return Err(MunicipalError::ScriptExecution {
            message: err.to_string(),
            tail: script_tail(script, 10),
        });
    }

    let tables = table_names(&conn)?;
    info!("Municipal dump created tables: {:?}", tables);
    for required in ["distritos", "estaciones_transporte"] {
        if !tables.iter().any(|t| t == required) {
            return Err(MunicipalError::MissingTable(required.to_string()));
        }
    }

    let districts = read_districts(&conn)?;
    let stations = read_stations(&conn)?;

    // conn closes before `scratch` drops and removes the directory
    drop(conn);
    Ok(MunicipalTables { districts, stations })
}

fn script_tail(script: &str, n: usize) -> String {
    let lines: Vec<&str> = script.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

fn table_names(conn: &Connection) -> Result<Vec<String>, MunicipalError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn read_districts(conn: &Connection) -> Result<Dataset, MunicipalError> {
    let mut dataset = Dataset::new(
        "distritos",
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("nombre", ColumnType::Text),
            Column::new("densidad_poblacion", ColumnType::Float),
        ],
    );
    let mut stmt = conn.prepare("SELECT id, nombre, densidad_poblacion FROM distritos")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<f64>>(2)?,
        ))
    })?;
    for row in rows {
        let (id, nombre, densidad) = row?;
        dataset.push_row(vec![
            Value::Int(id),
            nombre.map(Value::Text).unwrap_or(Value::Null),
            densidad.map(Value::Float).unwrap_or(Value::Null),
        ])?;
    }
    Ok(dataset)
}

fn read_stations(conn: &Connection) -> Result<Dataset, MunicipalError> {
    let mut dataset = Dataset::new(
        "estaciones_transporte",
        vec![
            Column::new("distrito_id", ColumnType::Int),
            Column::new("tipo", ColumnType::Text),
        ],
    );
    let mut stmt = conn.prepare("SELECT distrito_id, tipo FROM estaciones_transporte")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    for row in rows {
        let (district, tipo) = row?;
        dataset.push_row(vec![
            Value::Int(district),
            tipo.map(Value::Text).unwrap_or(Value::Null),
        ])?;
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_DUMP: &str = "\
CREATE TABLE distritos (id INTEGER PRIMARY KEY, nombre TEXT, densidad_poblacion REAL);\n\
INSERT INTO distritos VALUES (1, 'Centro', 24000.5);\n\
INSERT INTO distritos VALUES (3, 'Retiro', 22000.0);\n\
CREATE TABLE estaciones_transporte (id INTEGER PRIMARY KEY, nombre TEXT, distrito_id INTEGER, tipo TEXT);\n\
INSERT INTO estaciones_transporte VALUES (1, 'Sol', 1, 'metro');\n\
INSERT INTO estaciones_transporte VALUES (2, 'O''Donnell', 3, 'metro');\n";

    #[test]
    fn executes_dump_and_projects_two_tables() {
        let tables = execute_dump(GOOD_DUMP).unwrap();
        assert_eq!(tables.districts.len(), 2);
        assert_eq!(
            tables.districts.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "nombre", "densidad_poblacion"]
        );
        assert_eq!(tables.stations.len(), 2);
        assert_eq!(tables.stations.rows[1][1], Value::Text("metro".into()));
    }

    #[test]
    fn sanitize_fixes_the_known_apostrophe_defect() {
        let broken = "INSERT INTO estaciones_transporte VALUES (2, 'O'Donnell', 3, 'metro');";
        let fixed = sanitize_script(broken);
        assert!(fixed.contains("O''Donnell"));
    }

    #[test]
    fn unsanitized_defect_fails_with_script_tail() {
        let broken = "CREATE TABLE distritos (id INTEGER, nombre TEXT, densidad_poblacion REAL);\n\
                      INSERT INTO distritos VALUES (1, 'O'Donnell, 1.0);";
        let err = execute_dump(broken).unwrap_err();
        match err {
            MunicipalError::ScriptExecution { tail, .. } => {
                assert!(tail.contains("O'Donnell"));
            },
            other => panic!("expected script execution error, got {other}"),
        }
    }

    #[test]
    fn missing_required_table_is_fatal() {
        let dump = "CREATE TABLE distritos (id INTEGER, nombre TEXT, densidad_poblacion REAL);";
        let err = execute_dump(dump).unwrap_err();
        assert!(matches!(err, MunicipalError::MissingTable(t) if t == "estaciones_transporte"));
    }
}
