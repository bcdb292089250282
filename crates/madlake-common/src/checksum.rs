//! Checksum utilities

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of the input as a lowercase hex string.
///
/// Used for deterministic fact keys (bike-share trips).
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
