//! The session gate, run on every protected request.

use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use super::{Gateway, Outcome, StatePayload};
use crate::cookies::{extract_session, parse_cookies};
use crate::crypto::{PkcePair, generate_nonce};
use crate::error::Error;
use crate::event::{Request, Response};
use crate::jwks;
use crate::token::decode_unverified;

/// A token must be more than this many seconds past its `exp` before a
/// refresh round-trip is considered worth it.
const EXPIRY_SKEW_SECS: i64 = 60;

enum Verdict {
    PassThrough,
    Refresh,
}

impl Gateway {
    /// Decides among pass-through, redirect-to-refresh and redirect-to-login.
    ///
    /// Any failure while inspecting cookies or claims (a broken cookie, an
    /// invalid signature, an unreachable JWKS endpoint) degrades to the
    /// login redirect; a bad session must never hard-fail a page load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the request has no `Host` header
    /// and [`Error::Config`] for invalid runtime configuration; both are
    /// unrecoverable for this request.
    pub async fn check_auth(&self, request: Request) -> Result<Outcome, Error> {
        let host = request.host()?.to_string();
        let requested_uri = request.requested_uri();
        let nonce = generate_nonce()?;

        match self.inspect_session(&request).await {
            Ok(Verdict::PassThrough) => Ok(Outcome::Forward(Box::new(request))),
            Ok(Verdict::Refresh) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("requestedUri", &requested_uri)
                    .append_pair("nonce", &nonce)
                    .finish();
                let location = format!(
                    "https://{host}{}?{query}",
                    self.config.redirect_path_refresh
                );
                debug!(%location, "session expired but refreshable");
                let mut response = Response::temporary_redirect(&location);
                response.add_set_cookie(self.nonce_cookie(&nonce));
                Ok(Outcome::Respond(
                    response.with_extra_headers(&self.config.extra_response_headers),
                ))
            }
            Err(err) => {
                debug!(error = %err, "no valid session, redirecting to login");
                Ok(Outcome::Respond(self.login_redirect(
                    &host,
                    &requested_uri,
                    &nonce,
                )?))
            }
        }
    }

    async fn inspect_session(&self, request: &Request) -> Result<Verdict, Error> {
        let cookies = parse_cookies(request.cookie_header_values());
        let session = extract_session(&cookies, &self.config.client_id);
        let (Some(_username), Some(id_token)) = (&session.username, &session.id_token) else {
            return Err(Error::validation("no valid credentials present in cookies"));
        };

        // Soft expiry check only: cheap, unverified, and merely picks the
        // code path. Validity is proven below.
        let claims = decode_unverified(id_token)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // A token without an exp claim is not "expired"; it falls through to
        // validation below and gets rejected there.
        let expired = claims.exp.is_some_and(|exp| now - EXPIRY_SKEW_SECS > exp);
        if expired && session.refresh_token.is_some() {
            return Ok(Verdict::Refresh);
        }

        jwks::validate(
            id_token,
            &self.jwks,
            &self.config.jwks_uri,
            &self.config.token_issuer,
            &self.config.client_id,
        )
        .await?;
        Ok(Verdict::PassThrough)
    }

    /// 307 to the IdP's authorize endpoint, with fresh nonce and
    /// PKCE-verifier cookies riding along.
    fn login_redirect(
        &self,
        host: &str,
        requested_uri: &str,
        nonce: &str,
    ) -> Result<Response, Error> {
        let pkce = PkcePair::generate()?;
        let state = serde_json::to_string(&StatePayload {
            nonce: Some(nonce.to_string()),
            requested_uri: Some(requested_uri.to_string()),
        })
        .map_err(|e| Error::Config(format!("unserializable state parameter: {e}")))?;

        let mut authorize = Url::parse(&format!("{}/oauth2/authorize", self.idp_base()))
            .map_err(|e| Error::Config(format!("invalid IdP auth domain: {e}")))?;
        authorize
            .query_pairs_mut()
            .append_pair(
                "redirect_uri",
                &format!("https://{host}{}", self.config.redirect_path_sign_in),
            )
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("state", &state)
            .append_pair("scope", &self.config.scopes_string())
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &pkce.challenge);

        let mut response = Response::temporary_redirect(authorize.as_str());
        response.add_set_cookie(self.nonce_cookie(nonce));
        response.add_set_cookie(self.pkce_cookie(&pkce.verifier));
        Ok(response.with_extra_headers(&self.config.extra_response_headers))
    }
}
