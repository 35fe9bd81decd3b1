//! Unverified JWT decoding and token-endpoint response types.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::Error;

/// Decoded JWT payload.
///
/// Every field is optional at the serde layer so a missing claim is an
/// explicit `None` rather than a deserialization failure; the validator
/// decides which ones are required.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_use: Option<String>,
    /// The IdP's subject-naming claim.
    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The token triple returned by the IdP's token endpoint.
///
/// `refresh_token` is absent on a refresh-grant response; the caller keeps
/// reusing the original one.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Decodes a JWT's payload segment without verifying the signature.
///
/// Cheap claim inspection only; never trust the result for an
/// authorization decision.
pub fn decode_unverified(jwt: &str) -> Result<Claims, Error> {
    let payload = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::validation("malformed JWT: no payload segment"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::validation(format!("JWT payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::validation(format!("JWT payload is not a claim set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::unsigned_jwt;

    #[test]
    fn decodes_expected_claims() {
        let jwt = unsigned_jwt(&serde_json::json!({
            "exp": 1_700_000_000,
            "iss": "https://issuer.example.com",
            "aud": "client-abc",
            "token_use": "id",
            "cognito:username": "alice",
            "sub": "sub-123",
            "email": "alice@example.com",
        }));
        let claims = decode_unverified(&jwt).unwrap();
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.aud.as_deref(), Some("client-abc"));
        assert_eq!(claims.client_id, None);
    }

    #[test]
    fn missing_claims_are_none() {
        let jwt = unsigned_jwt(&serde_json::json!({ "exp": 123 }));
        let claims = decode_unverified(&jwt).unwrap();
        assert_eq!(claims.exp, Some(123));
        assert!(claims.username.is_none());
        assert!(claims.iss.is_none());
    }

    #[test]
    fn garbage_is_a_validation_error() {
        assert!(matches!(
            decode_unverified("not-a-jwt"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            decode_unverified("a.!!!.c"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn token_set_parses_without_refresh_token() {
        let json = r#"{"id_token":"a.b.c","access_token":"d.e.f","token_type":"Bearer"}"#;
        let tokens: TokenSet = serde_json::from_str(json).unwrap();
        assert!(tokens.refresh_token.is_none());
    }
}
