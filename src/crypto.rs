//! Nonce and PKCE generation.
//!
//! All secrets are drawn character-by-character from a CSPRNG with rejection
//! sampling, so every character of the allowed alphabet is equally likely.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Allowed characters per RFC 7636 §4.1.
pub const SECRET_ALLOWED_CHARS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length; RFC 7636 requires 43-128 characters.
pub const PKCE_LENGTH: usize = 43;

pub const NONCE_LENGTH: usize = 16;

/// A PKCE verifier with its S256 challenge.
///
/// The verifier goes into a short-lived cookie; the challenge is sent to the
/// IdP's authorize endpoint. At code-exchange time the IdP hashes the
/// verifier we send back and compares it against the challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier/challenge pair.
    pub fn generate() -> Result<Self, Error> {
        let verifier = random_string(PKCE_LENGTH, SECRET_ALLOWED_CHARS)?;
        let challenge = code_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// Computes the S256 code challenge for a verifier:
/// `BASE64URL_NOPAD(SHA256(verifier))`.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a single-use nonce for CSRF correlation.
pub fn generate_nonce() -> Result<String, Error> {
    random_string(NONCE_LENGTH, SECRET_ALLOWED_CHARS)
}

/// Draws `length` independent characters from `alphabet`.
///
/// Uses rejection sampling: any byte at or above
/// `floor(256 / |alphabet|) * |alphabet|` is redrawn, so the modulo below
/// that limit is unbiased.
pub fn random_string(length: usize, alphabet: &str) -> Result<String, Error> {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() || chars.len() > 256 {
        return Err(Error::Config(format!(
            "secret alphabet must have 1..=256 characters, got {}",
            chars.len()
        )));
    }
    let limit = (256 / chars.len()) * chars.len();

    let mut rng = rand::rng();
    let mut out = String::with_capacity(length);
    let mut remaining = length;
    while remaining > 0 {
        let byte = rng.random::<u8>() as usize;
        if byte >= limit {
            continue;
        }
        out.push(chars[byte % chars.len()]);
        remaining -= 1;
    }
    Ok(out)
}
