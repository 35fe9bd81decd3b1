//! Shared helpers for the in-crate unit tests.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Builds a structurally valid JWT with the given payload and an empty
/// signature. Good enough for everything that does not verify signatures.
pub fn unsigned_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.")
}
