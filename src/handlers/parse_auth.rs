//! The sign-in callback: completes the Authorization Code + PKCE exchange.

use tracing::warn;

use super::{Gateway, StatePayload, parse_query};
use crate::cookies::{build_session_cookies, extract_session, parse_cookies};
use crate::error::Error;
use crate::event::{Request, Response};
use crate::http::post_with_retry;
use crate::token::TokenSet;

const MISSING_NONCE_COOKIE: &str = "Your browser didn't send the nonce cookie along, \
     but it is required for security (prevent CSRF).";
const MISSING_PKCE_COOKIE: &str = "Your browser didn't send the pkce cookie along, \
     but it is required for security (PKCE).";

impl Gateway {
    /// Handles the IdP's redirect back after sign-in: validates the CSRF
    /// nonce, exchanges the code for tokens, sets the session cookie set and
    /// sends the browser back to the page it originally wanted.
    ///
    /// Never propagates an error: every failure becomes a 400 page with a
    /// retry link.
    pub async fn parse_auth(&self, request: &Request) -> Response {
        let host = match request.host() {
            Ok(host) => host.to_string(),
            Err(err) => {
                return Response::bad_request_page(&err.to_string(), "/")
                    .with_extra_headers(&self.config.extra_response_headers);
            }
        };
        let mut redirected_from = format!("https://{host}");

        match self
            .exchange_code(request, &host, &mut redirected_from)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "code exchange failed");
                Response::bad_request_page(&err.to_string(), &redirected_from)
                    .with_extra_headers(&self.config.extra_response_headers)
            }
        }
    }

    /// `redirected_from` doubles as the error page's retry link; it is
    /// extended with the requested URI as soon as the state parses, so even
    /// late failures link back to the right page.
    async fn exchange_code(
        &self,
        request: &Request,
        host: &str,
        redirected_from: &mut String,
    ) -> Result<Response, Error> {
        let query = parse_query(&request.querystring);
        let code = query
            .get("code")
            .filter(|v| !v.is_empty())
            .ok_or_else(bad_query)?;
        let state = query
            .get("state")
            .filter(|v| !v.is_empty())
            .ok_or_else(bad_query)?;

        let state: StatePayload = serde_json::from_str(state).map_err(|_| {
            Error::bad_request("Invalid state parameter: expected JSON with nonce and requestedUri")
        })?;
        if let Some(uri) = &state.requested_uri {
            redirected_from.push_str(uri);
        }
        let current_nonce = state.nonce.unwrap_or_default();

        let cookies = parse_cookies(request.cookie_header_values());
        let session = extract_session(&cookies, &self.config.client_id);
        let original_nonce = session
            .nonce
            .ok_or_else(|| Error::bad_request(MISSING_NONCE_COOKIE))?;
        if current_nonce.is_empty() || current_nonce != original_nonce {
            return Err(Error::bad_request("Nonce mismatch"));
        }
        let verifier = session
            .pkce_verifier
            .ok_or_else(|| Error::bad_request(MISSING_PKCE_COOKIE))?;

        // Must be byte-identical to the redirect_uri sent at authorize time.
        let redirect_uri = format!("https://{host}{}", self.config.redirect_path_sign_in);
        let response = post_with_retry(
            &self.http,
            "code exchange",
            &self.token_endpoint(),
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &self.config.client_id),
                ("redirect_uri", &redirect_uri),
                ("code", code),
                ("code_verifier", &verifier),
            ],
        )
        .await?;
        let tokens: TokenSet = response.json().await.map_err(|e| Error::Upstream {
            operation: "code exchange",
            attempts: 1,
            detail: format!("unparsable token response: {e}"),
        })?;

        let cookies = build_session_cookies(
            &self.config.client_id,
            &self.config.scopes_string(),
            &tokens,
            host,
            &self.config.cookie_attributes,
            false,
        )?;
        let mut response = Response::temporary_redirect(redirected_from);
        for cookie in cookies {
            response.add_set_cookie(cookie);
        }
        Ok(response.with_extra_headers(&self.config.extra_response_headers))
    }
}

fn bad_query() -> Error {
    Error::bad_request(
        "Invalid query string. Your query string should include parameters \"state\" and \"code\"",
    )
}
