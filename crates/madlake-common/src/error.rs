//! Error types for madlake transformations

use thiserror::Error;

/// Result type alias for transformation operations
pub type Result<T> = std::result::Result<T, LakeError>;

/// Transformation-level errors raised while a stage owns a dataset.
///
/// Transfer errors (object store) and load errors (warehouse) have their own
/// types in `madlake-store` and `madlake-pipeline`; this enum covers what can
/// go wrong between download and upload.
#[derive(Error, Debug)]
pub enum LakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column not found: '{column}' in dataset '{dataset}'")]
    MissingColumn { dataset: String, column: String },

    #[error("Type mismatch in column '{column}': expected {expected}, got '{value}'")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Join of '{left}' and '{right}' on '{key}' produced no rows")]
    EmptyJoin {
        left: String,
        right: String,
        key: String,
    },

    #[error("Row arity mismatch in dataset '{dataset}': expected {expected} values, got {actual}")]
    RowArity {
        dataset: String,
        expected: usize,
        actual: usize,
    },
}
