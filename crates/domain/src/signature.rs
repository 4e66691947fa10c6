//! Content signatures.
//!
//! Signatures are hex SHA-256 over serialized JSON. They key the proposal
//! cache, the translation cache, blob names, and the PDF idempotency latch.

use sha2::{Digest, Sha256};

use crate::cv::{CvData, Language};

/// Hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}

/// Signature of a serializable value (serialized with serde_json).
pub fn value_signature<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_vec(value) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => String::new(),
    }
}

/// Signature of the canonical résumé object alone.
pub fn cv_signature(cv: &CvData) -> String {
    value_signature(cv)
}

/// Signature that keys rendered PDFs: active CV content, template version,
/// and output language. Unchanged signature + idempotency latch = cache hit.
pub fn render_signature(cv: &CvData, template_version: &str, language: Language) -> String {
    let payload = serde_json::json!({
        "cv": cv,
        "template_version": template_version,
        "language": language,
    });
    value_signature(&payload)
}
