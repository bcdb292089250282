//! Transfer and serialization errors

use thiserror::Error;

use crate::zone::Zone;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors crossing a zone boundary: transfers and columnar (de)serialization.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {zone}/{path}")]
    ObjectNotFound { zone: Zone, path: String },

    #[error("Upload to {zone}/{path} failed: {message}")]
    Upload {
        zone: Zone,
        path: String,
        message: String,
    },

    #[error("Download from {zone}/{path} failed: {message}")]
    Download {
        zone: Zone,
        path: String,
        message: String,
    },

    #[error("Listing zone {zone} failed: {message}")]
    List { zone: Zone, message: String },

    #[error("Columnar encode/decode error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Unsupported columnar type: {0}")]
    UnsupportedType(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn upload(zone: Zone, path: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Upload {
            zone,
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub fn download(zone: Zone, path: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Download {
            zone,
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub fn list(zone: Zone, err: impl std::fmt::Display) -> Self {
        StoreError::List {
            zone,
            message: err.to_string(),
        }
    }
}
