//! Sign-out: revoke the local session and end the hosted-UI session.

use tracing::debug;
use url::Url;

use super::Gateway;
use crate::cookies::{build_session_cookies, extract_session, parse_cookies};
use crate::error::Error;
use crate::event::{Request, Response};
use crate::token::TokenSet;

impl Gateway {
    /// Expires every session cookie and redirects to the IdP's logout
    /// endpoint, which in turn sends the browser back to the sign-out path.
    ///
    /// With no session present there is nothing to sign out of; a plain 400
    /// is returned rather than bouncing the browser to the IdP.
    pub async fn sign_out(&self, request: &Request) -> Response {
        let host = match request.host() {
            Ok(host) => host.to_string(),
            Err(err) => {
                return Response::bad_request_page(&err.to_string(), "/")
                    .with_extra_headers(&self.config.extra_response_headers);
            }
        };

        match self.end_session(request, &host) {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "sign-out without a session");
                Response::bad_request_plain()
                    .with_extra_headers(&self.config.extra_response_headers)
            }
        }
    }

    fn end_session(&self, request: &Request, host: &str) -> Result<Response, Error> {
        let cookies = parse_cookies(request.cookie_header_values());
        let session = extract_session(&cookies, &self.config.client_id);
        let id_token = session
            .id_token
            .ok_or_else(|| Error::validation("no session to sign out of"))?;
        let tokens = TokenSet {
            id_token,
            access_token: session.access_token.unwrap_or_default(),
            refresh_token: session.refresh_token,
        };

        let mut logout = Url::parse(&format!("{}/logout", self.idp_base()))
            .map_err(|e| Error::Config(format!("invalid IdP auth domain: {e}")))?;
        logout
            .query_pairs_mut()
            .append_pair(
                "logout_uri",
                &format!("https://{host}{}", self.config.redirect_path_sign_out),
            )
            .append_pair("client_id", &self.config.client_id);

        let cookies = build_session_cookies(
            &self.config.client_id,
            &self.config.scopes_string(),
            &tokens,
            host,
            &self.config.cookie_attributes,
            true,
        )?;
        let mut response = Response::temporary_redirect(logout.as_str());
        for cookie in cookies {
            response.add_set_cookie(cookie);
        }
        Ok(response.with_extra_headers(&self.config.extra_response_headers))
    }
}
