//! Runtime configuration for the gate.
//!
//! Required fields are constructor parameters; everything else has defaults
//! matching the hosted-UI deployment this gate fronts and can be overridden
//! with `with_*` methods.

use crate::error::Error;

/// Cookie attribute directives appended to each Set-Cookie value, per cookie
/// class. The nonce attributes also cover the PKCE-verifier cookie.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub nonce: String,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            id_token: "Path=/; Secure; SameSite=Lax".into(),
            access_token: "Path=/; Secure; SameSite=Lax".into(),
            refresh_token: "Path=/; Secure; SameSite=Lax".into(),
            nonce: "Path=/; Secure; HttpOnly; Max-Age=1800; SameSite=Lax".into(),
        }
    }
}

/// Gate configuration, resolved once by the embedder and injected into
/// [`Gateway`](crate::Gateway). Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub oauth_scopes: Vec<String>,
    /// IdP hosted-UI domain. A bare host is reached over `https`; an
    /// explicit `scheme://` prefix is honored as-is.
    pub idp_auth_domain: String,
    pub redirect_path_sign_in: String,
    pub redirect_path_refresh: String,
    pub redirect_path_sign_out: String,
    pub token_issuer: String,
    pub jwks_uri: String,
    pub cookie_attributes: CookieAttributes,
    /// Headers added to every response the gate produces, in order.
    pub extra_response_headers: Vec<(String, String)>,
}

impl Config {
    /// Create a configuration, deriving `token_issuer` and `jwks_uri` from a
    /// `<region>_<id>` user-pool id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pool id has no region prefix.
    pub fn new(
        client_id: impl Into<String>,
        user_pool_id: &str,
        idp_auth_domain: impl Into<String>,
    ) -> Result<Self, Error> {
        let region = match user_pool_id.split_once('_') {
            Some((region, id)) if !region.is_empty() && !id.is_empty() => region,
            _ => {
                return Err(Error::Config(format!(
                    "user pool id {user_pool_id:?} is not of the form <region>_<id>"
                )));
            }
        };
        let token_issuer = format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}");
        let jwks_uri = format!("{token_issuer}/.well-known/jwks.json");
        Ok(Self::with_issuer(client_id, idp_auth_domain, token_issuer, jwks_uri))
    }

    /// Create a configuration with an explicitly supplied issuer and JWKS
    /// endpoint, for IdPs whose issuer cannot be derived from a pool id.
    pub fn with_issuer(
        client_id: impl Into<String>,
        idp_auth_domain: impl Into<String>,
        token_issuer: impl Into<String>,
        jwks_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            oauth_scopes: default_scopes(),
            idp_auth_domain: idp_auth_domain.into(),
            redirect_path_sign_in: "/parseauth".into(),
            redirect_path_refresh: "/refreshauth".into(),
            redirect_path_sign_out: "/signout".into(),
            token_issuer: token_issuer.into(),
            jwks_uri: jwks_uri.into(),
            cookie_attributes: CookieAttributes::default(),
            extra_response_headers: default_security_headers(),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.oauth_scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_redirect_paths(
        mut self,
        sign_in: impl Into<String>,
        refresh: impl Into<String>,
        sign_out: impl Into<String>,
    ) -> Self {
        self.redirect_path_sign_in = sign_in.into();
        self.redirect_path_refresh = refresh.into();
        self.redirect_path_sign_out = sign_out.into();
        self
    }

    #[must_use]
    pub fn with_cookie_attributes(mut self, attributes: CookieAttributes) -> Self {
        self.cookie_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_extra_response_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_response_headers = headers;
        self
    }

    /// Space-joined scope string sent to the IdP and stored in the
    /// `tokenScopesString` cookie.
    #[must_use]
    pub fn scopes_string(&self) -> String {
        self.oauth_scopes.join(" ")
    }
}

fn default_scopes() -> Vec<String> {
    [
        "phone",
        "email",
        "profile",
        "openid",
        "aws.cognito.signin.user.admin",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_security_headers() -> Vec<(String, String)> {
    [
        (
            "Content-Security-Policy",
            "default-src 'none'; img-src 'self'; script-src 'self'; style-src 'self'; \
             object-src 'none'; connect-src 'self' https://*.amazonaws.com https://*.amazoncognito.com",
        ),
        (
            "Strict-Transport-Security",
            "max-age=31536000; includeSubdomains; preload",
        ),
        ("Referrer-Policy", "same-origin"),
        ("X-XSS-Protection", "1; mode=block"),
        ("X-Frame-Options", "DENY"),
        ("X-Content-Type-Options", "nosniff"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_issuer_and_jwks_from_pool_id() {
        let config = Config::new("client-abc", "eu-west-1_AbC123", "auth.example.com").unwrap();
        assert_eq!(
            config.token_issuer,
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbC123"
        );
        assert_eq!(
            config.jwks_uri,
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbC123/.well-known/jwks.json"
        );
    }

    #[test]
    fn malformed_pool_id_is_a_config_error() {
        assert!(matches!(
            Config::new("c", "nounderscore", "auth.example.com"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::new("c", "_trailing", "auth.example.com"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::with_issuer("c", "auth.example.com", "https://issuer", "https://jwks")
            .with_scopes(vec!["openid".into()])
            .with_redirect_paths("/in", "/fresh", "/out");
        assert_eq!(config.scopes_string(), "openid");
        assert_eq!(config.redirect_path_sign_in, "/in");
        assert_eq!(config.redirect_path_refresh, "/fresh");
        assert_eq!(config.redirect_path_sign_out, "/out");
    }
}
