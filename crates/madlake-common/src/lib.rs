//! madlake common library
//!
//! Shared building blocks for the madlake pipeline crates:
//!
//! - **Dataset model**: the in-memory tabular representation every stage
//!   works on ([`dataset::Dataset`])
//! - **Error types**: transformation-level errors ([`error::LakeError`])
//! - **Logging**: tracing initialization shared by all binaries
//! - **Text utilities**: lossy-but-total decoding of messy source bytes

pub mod checksum;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod text;

pub use dataset::{Column, ColumnType, Dataset, DatasetMeta, Value};
pub use error::{LakeError, Result};
