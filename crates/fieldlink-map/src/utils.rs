//! Utility functions for mapping operations.

/// Lookup key for labels and field ids: trimmed and lowercased.
pub fn label_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Encode a form id as a file name stem.
///
/// ASCII alphanumerics and `-` pass through; every other byte, `_` included,
/// becomes `_` plus two lowercase hex digits. Distinct ids never share a stem.
pub fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{byte:02x}"));
        }
    }
    encoded
}

/// Round to four decimal places.
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
