//! JWKS retrieval and JWT validation.
//!
//! The key set is fetched once per JWKS URI and cached for the lifetime of
//! the warm execution context; entries are write-once, so concurrent readers
//! need no coordination beyond the read lock.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::token::Claims;

/// A JSON Web Key, as served by the IdP's JWKS endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus / exponent, base64url.
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    /// EC coordinates, base64url.
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Process-wide read-through cache of fetched key sets, keyed by JWKS URI.
#[derive(Debug, Clone)]
pub struct JwksCache {
    sets: Arc<RwLock<HashMap<String, Arc<JwkSet>>>>,
    http: reqwest::Client,
}

impl JwksCache {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            sets: Arc::new(RwLock::new(HashMap::new())),
            http,
        }
    }

    /// Returns the cached key set for `jwks_uri`, fetching it on first use.
    pub async fn get(&self, jwks_uri: &str) -> Result<Arc<JwkSet>, Error> {
        if let Some(set) = self.sets.read().await.get(jwks_uri).cloned() {
            return Ok(set);
        }

        debug!(jwks_uri, "fetching JWKS");
        let upstream = |detail: String| Error::Upstream {
            operation: "JWKS fetch",
            attempts: 1,
            detail,
        };
        let response = self
            .http
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(upstream(format!("status {}", response.status())));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| upstream(format!("invalid JWKS document: {e}")))?;

        let set = Arc::new(set);
        self.sets
            .write()
            .await
            .insert(jwks_uri.to_string(), Arc::clone(&set));
        Ok(set)
    }
}

/// Verifies a JWT's signature against the key set at `jwks_uri` and checks
/// its `exp`, `iss`, `token_use` and `aud`/`client_id` claims.
///
/// Claim or signature mismatches are [`Error::Validation`]; only a failure
/// to fetch the key set is [`Error::Upstream`], so callers can tell "reject"
/// from "retry later" apart.
pub async fn validate(
    jwt: &str,
    cache: &JwksCache,
    jwks_uri: &str,
    issuer: &str,
    audience: &str,
) -> Result<Claims, Error> {
    let header =
        decode_header(jwt).map_err(|e| Error::validation(format!("undecodable header: {e}")))?;
    let kid = header
        .kid
        .ok_or_else(|| Error::validation("token header carries no kid"))?;

    let set = cache.get(jwks_uri).await?;
    let jwk = set
        .keys
        .iter()
        .find(|k| k.kid.as_deref() == Some(kid.as_str()))
        .ok_or_else(|| Error::validation(format!("no JWKS key matches kid {kid:?}")))?;

    let (key, algorithm) = decoding_key(jwk)?;
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    // aud lives in different claims for id and access tokens; checked below.
    validation.validate_aud = false;

    let data = decode::<Claims>(jwt, &key, &validation)
        .map_err(|e| Error::validation(e.to_string()))?;
    verify_claims(&data.claims, issuer, audience)?;
    Ok(data.claims)
}

/// The non-signature claim checks: issuer, token use, and audience (which
/// id tokens carry in `aud` and access tokens in `client_id`).
pub(crate) fn verify_claims(claims: &Claims, issuer: &str, audience: &str) -> Result<(), Error> {
    if claims.iss.as_deref() != Some(issuer) {
        return Err(Error::validation(format!(
            "issuer mismatch: expected {issuer:?}, got {:?}",
            claims.iss
        )));
    }
    if claims.token_use.as_deref() != Some("id") {
        return Err(Error::validation(format!(
            "token_use is {:?}, not \"id\"",
            claims.token_use
        )));
    }
    let aud = claims.aud.as_deref().or(claims.client_id.as_deref());
    if aud != Some(audience) {
        return Err(Error::validation(format!(
            "audience mismatch: expected {audience:?}, got {aud:?}"
        )));
    }
    Ok(())
}

fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), Error> {
    // Cognito omits `alg` on some pools; RS256 is its only signing algorithm.
    let alg = jwk.alg.as_deref().unwrap_or("RS256");
    let algorithm = Algorithm::from_str(alg)
        .map_err(|_| Error::validation(format!("unsupported JWK algorithm {alg:?}")))?;

    let missing = |field: &str| Error::validation(format!("JWK is missing {field:?}"));
    let key = match algorithm {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| Error::validation(format!("bad RSA components: {e}")))?
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| Error::validation(format!("bad EC components: {e}")))?
        }
        other => {
            return Err(Error::validation(format!(
                "JWK algorithm {other:?} is not accepted for id tokens"
            )));
        }
    };
    Ok((key, algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbC123";
    const AUDIENCE: &str = "client-abc";

    fn id_claims() -> Claims {
        Claims {
            exp: Some(4_102_444_800),
            iss: Some(ISSUER.into()),
            aud: Some(AUDIENCE.into()),
            client_id: None,
            token_use: Some("id".into()),
            username: Some("alice".into()),
            sub: Some("sub-123".into()),
            email: None,
        }
    }

    #[test]
    fn accepts_matching_id_claims() {
        assert!(verify_claims(&id_claims(), ISSUER, AUDIENCE).is_ok());
    }

    #[test]
    fn audience_may_come_from_client_id() {
        let mut claims = id_claims();
        claims.aud = None;
        claims.client_id = Some(AUDIENCE.into());
        assert!(verify_claims(&claims, ISSUER, AUDIENCE).is_ok());
    }

    #[test]
    fn rejects_wrong_issuer() {
        let claims = id_claims();
        assert!(matches!(
            verify_claims(&claims, "https://other", AUDIENCE),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_access_token_use() {
        let mut claims = id_claims();
        claims.token_use = Some("access".into());
        assert!(matches!(
            verify_claims(&claims, ISSUER, AUDIENCE),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_wrong_audience() {
        assert!(matches!(
            verify_claims(&id_claims(), ISSUER, "someone-else"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn parses_a_cognito_style_key_set() {
        let json = r#"{
            "keys": [
                { "kty": "RSA", "kid": "k1", "alg": "RS256", "use": "sig", "n": "abc", "e": "AQAB" },
                { "kty": "RSA", "kid": "k2", "use": "sig", "n": "def", "e": "AQAB" }
            ]
        }"#;
        let set: JwkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[0].kid.as_deref(), Some("k1"));
        // alg may be omitted; the validator defaults it to RS256.
        assert!(set.keys[1].alg.is_none());
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let jwk = Jwk {
            kty: "oct".into(),
            kid: Some("k".into()),
            alg: Some("HS256".into()),
            key_use: None,
            n: None,
            e: None,
            x: None,
            y: None,
        };
        assert!(matches!(decoding_key(&jwk), Err(Error::Validation(_))));
    }
}
