//! The four edge handlers.
//!
//! Every protected request enters through [`Gateway::check_auth`]; the IdP
//! redirects back into [`Gateway::parse_auth`]; expired-but-refreshable
//! sessions bounce through [`Gateway::refresh_auth`]; [`Gateway::sign_out`]
//! is reachable at any time. All four share one configuration, one HTTP
//! client and one JWKS cache.

mod check_auth;
mod parse_auth;
mod refresh_auth;
mod sign_out;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::cookies::{self, encode_cookie_value};
use crate::error::Error;
use crate::event::{Request, Response};
use crate::jwks::JwksCache;

/// What the gate tells the edge platform to do with a request.
#[derive(Debug)]
pub enum Outcome {
    /// Pass the request through to the origin unmodified.
    Forward(Box<Request>),
    /// Answer the browser directly (redirect or error page).
    Respond(Response),
}

/// The `state` parameter round-tripped through the IdP's authorize
/// endpoint: the CSRF nonce plus the URI to land on after sign-in.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StatePayload {
    pub nonce: Option<String>,
    #[serde(rename = "requestedUri")]
    pub requested_uri: Option<String>,
}

/// Shared state for all handlers. Build it once per warm execution context
/// and reuse it across invocations; the JWKS cache lives here.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub(crate) config: Config,
    pub(crate) http: reqwest::Client,
    pub(crate) jwks: JwksCache,
}

impl Gateway {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be constructed.
    pub fn new(config: Config) -> Result<Self, Error> {
        // Following redirects opens the client up to SSRF against the IdP.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let jwks = JwksCache::new(http.clone());
        Ok(Self { config, http, jwks })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// IdP base URL. The configured auth domain is usually a bare host;
    /// an explicit scheme is honored so non-TLS test doubles work too.
    pub(crate) fn idp_base(&self) -> String {
        let domain = &self.config.idp_auth_domain;
        if domain.contains("://") {
            domain.clone()
        } else {
            format!("https://{domain}")
        }
    }

    pub(crate) fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.idp_base())
    }

    pub(crate) fn nonce_cookie(&self, nonce: &str) -> String {
        format!(
            "{}={}; {}",
            cookies::NONCE_COOKIE,
            encode_cookie_value(nonce),
            self.config.cookie_attributes.nonce
        )
    }

    pub(crate) fn pkce_cookie(&self, verifier: &str) -> String {
        format!(
            "{}={}; {}",
            cookies::PKCE_COOKIE,
            encode_cookie_value(verifier),
            self.config.cookie_attributes.nonce
        )
    }
}

pub(crate) fn parse_query(querystring: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(querystring.as_bytes())
        .into_owned()
        .collect()
}
