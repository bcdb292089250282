//! Lossy-but-total text decoding for messy source extracts.
//!
//! Source files arrive in whatever encoding the upstream system produced.
//! These helpers never fail: every byte sequence decodes to *some* string,
//! with unrepresentable sequences replaced rather than raised on.

/// Decode arbitrary bytes as UTF-8, replacing invalid sequences with U+FFFD.
///
/// Total over any input. Valid UTF-8 round-trips unchanged.
pub fn lossy_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode ISO-8859-1 (Latin-1) bytes.
///
/// Every Latin-1 byte maps directly to the Unicode code point of the same
/// value, so this is total and lossless. The municipal SQL dump is the one
/// known Latin-1 source.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
