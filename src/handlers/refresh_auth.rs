//! The refresh callback: trades the refresh token for fresh id/access
//! tokens.

use serde::Deserialize;
use tracing::warn;

use super::{Gateway, parse_query};
use crate::cookies::{build_session_cookies, extract_session, parse_cookies};
use crate::error::Error;
use crate::event::{Request, Response};
use crate::http::post_with_retry;
use crate::token::TokenSet;

/// Refresh-grant responses carry no new refresh token; the original one
/// stays in the cookie jar.
#[derive(Debug, Deserialize)]
struct RefreshedTokens {
    id_token: String,
    access_token: String,
}

impl Gateway {
    /// Exchanges the session's refresh token and re-sets the cookie set.
    ///
    /// A failed exchange does not fail the request: the refresh token is
    /// treated as revoked and dropped from the rebuilt cookie set, and the
    /// 307 back to the requested URI still goes out. The next gate check
    /// then finds an expired session without a refresh token and drives the
    /// browser through the full login instead.
    pub async fn refresh_auth(&self, request: &Request) -> Response {
        let host = match request.host() {
            Ok(host) => host.to_string(),
            Err(err) => {
                return Response::bad_request_page(&err.to_string(), "/")
                    .with_extra_headers(&self.config.extra_response_headers);
            }
        };
        let mut redirected_from = format!("https://{host}");

        match self
            .refresh_tokens(request, &host, &mut redirected_from)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "refresh request rejected");
                Response::bad_request_page(&err.to_string(), &redirected_from)
                    .with_extra_headers(&self.config.extra_response_headers)
            }
        }
    }

    async fn refresh_tokens(
        &self,
        request: &Request,
        host: &str,
        redirected_from: &mut String,
    ) -> Result<Response, Error> {
        let query = parse_query(&request.querystring);
        if let Some(uri) = query.get("requestedUri") {
            redirected_from.push_str(uri);
        }
        let current_nonce = query.get("nonce").cloned().unwrap_or_default();

        let cookies = parse_cookies(request.cookie_header_values());
        let session = extract_session(&cookies, &self.config.client_id);
        let original_nonce = session.nonce.ok_or_else(|| {
            Error::bad_request(
                "Your browser didn't send the nonce cookie along, \
                 but it is required for security (prevent CSRF).",
            )
        })?;
        if current_nonce != original_nonce {
            return Err(Error::bad_request("Nonce mismatch"));
        }
        let id_token = session
            .id_token
            .ok_or_else(|| Error::bad_request("Missing idToken"))?;
        let access_token = session
            .access_token
            .ok_or_else(|| Error::bad_request("Missing accessToken"))?;
        let refresh_token = session
            .refresh_token
            .ok_or_else(|| Error::bad_request("Missing refreshToken"))?;

        let mut tokens = TokenSet {
            id_token,
            access_token,
            refresh_token: Some(refresh_token.clone()),
        };
        let exchange = post_with_retry(
            &self.http,
            "token refresh",
            &self.token_endpoint(),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.config.client_id),
                ("refresh_token", &refresh_token),
            ],
        )
        .await;
        match exchange {
            Ok(response) => match response.json::<RefreshedTokens>().await {
                Ok(renewed) => {
                    tokens.id_token = renewed.id_token;
                    tokens.access_token = renewed.access_token;
                }
                Err(err) => {
                    warn!(error = %err, "unparsable refresh response, ending session");
                    tokens.refresh_token = None;
                }
            },
            Err(err) => {
                warn!(error = %err, "refresh exchange failed, ending session");
                tokens.refresh_token = None;
            }
        }

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
