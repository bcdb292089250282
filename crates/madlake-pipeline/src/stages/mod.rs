//! Zone transform stages
//!
//! Three pure zone-to-zone batch transformations, run in a fixed order:
//! ingest (local → Raw), clean (Raw → Process), enrich (Process → Access).
//! Each stage finishes reading its inputs before writing any output and
//! keeps no state across invocations.

pub mod clean;
pub mod enrich;
pub mod ingest;
