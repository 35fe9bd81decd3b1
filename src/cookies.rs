//! Cookie codec.
//!
//! The cookie names and values follow the Amplify client SDK's scheme
//! exactly, so a browser session established by this gate is readable by
//! Amplify-based frontends and vice versa. All token and identity cookies
//! live under `CognitoIdentityServiceProvider.<clientId>`; the nonce and
//! PKCE-verifier cookies carry fixed names owned by this crate.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::config::CookieAttributes;
use crate::error::Error;
use crate::token::{TokenSet, decode_unverified};

pub const KEY_PREFIX: &str = "CognitoIdentityServiceProvider";
pub const NONCE_COOKIE: &str = "spa-auth-edge-nonce";
pub const PKCE_COOKIE: &str = "spa-auth-edge-pkce";
/// Marker the SDK uses to recognize a hosted-UI sign-in.
pub const HOSTED_UI_COOKIE: &str = "amplify-signin-with-hostedUI";

const EPOCH_EXPIRES: &str = "Expires=Thu, 01 Jan 1970 00:00:00 GMT";

/// `encodeURIComponent` escape set: everything but `A-Za-z0-9 - _ . ! ~ * ' ( )`.
const COOKIE_VALUE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(crate) fn encode_cookie_value(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE_ESCAPE).to_string()
}

/// The session as reconstructed from a request's cookies.
///
/// All fields are optional: an empty session is the normal unauthenticated
/// state, not an error. Token fields can only resolve when `username` is
/// present, since their cookie names are keyed by it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub username: Option<String>,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scopes: Option<String>,
    pub nonce: Option<String>,
    pub pkce_verifier: Option<String>,
}

/// Parses `Cookie` header values into a name→value map.
///
/// Each header value is itself a `;`-separated list; later duplicates
/// overwrite earlier ones.
pub fn parse_cookies<'a>(header_values: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in header_values {
        for cookie in cookie::Cookie::split_parse(value).flatten() {
            cookies.insert(cookie.name().to_string(), cookie.value().to_string());
        }
    }
    cookies
}

/// Reads the session out of parsed cookies using the SDK key scheme.
pub fn extract_session(cookies: &HashMap<String, String>, client_id: &str) -> Session {
    let prefix = format!("{KEY_PREFIX}.{client_id}");
    let username = cookies.get(&format!("{prefix}.LastAuthUser")).cloned();

    let token = |kind: &str| {
        username
            .as_deref()
            .and_then(|user| cookies.get(&format!("{prefix}.{user}.{kind}")))
            .cloned()
    };

    Session {
        id_token: token("idToken"),
        access_token: token("accessToken"),
        refresh_token: token("refreshToken"),
        scopes: token("tokenScopesString"),
        username,
        nonce: cookies.get(NONCE_COOKIE).cloned(),
        pkce_verifier: cookies.get(PKCE_COOKIE).cloned(),
    }
}

/// Builds the full Set-Cookie value list for a token triple.
///
/// Decodes the id token (no signature check) for the username the cookie
/// names are keyed by. If the attribute string for a cookie carries no
/// `Domain=` directive, a leading-dot domain for the serving host is
/// appended, matching the SDK's cookie scoping.
///
/// With `expire_all` every cookie is emitted expired; without it, only the
/// refresh-token cookie is expired, and only when `tokens.refresh_token` is
/// absent.
pub fn build_session_cookies(
    client_id: &str,
    scopes_string: &str,
    tokens: &TokenSet,
    domain_name: &str,
    attributes: &CookieAttributes,
    expire_all: bool,
) -> Result<Vec<String>, Error> {
    let claims = decode_unverified(&tokens.id_token)?;
    let username = claims
        .username
        .ok_or_else(|| Error::validation("id token carries no username claim"))?;

    let prefix = format!("{KEY_PREFIX}.{client_id}");
    let user_data = serde_json::json!({
        "UserAttributes": [
            { "Name": "sub", "Value": claims.sub.unwrap_or_default() },
            { "Name": "email", "Value": claims.email.unwrap_or_default() },
        ],
        "Username": username,
    })
    .to_string();

    let refresh_value = tokens.refresh_token.clone().unwrap_or_default();
    let refresh_key = format!("{prefix}.{username}.refreshToken");

    let mut cookies: Vec<(String, String)> = vec![
        (
            format!("{prefix}.{username}.idToken"),
            format!(
                "{}; {}",
                tokens.id_token,
                with_cookie_domain(domain_name, &attributes.id_token)
            ),
        ),
        (
            format!("{prefix}.{username}.accessToken"),
            format!(
                "{}; {}",
                tokens.access_token,
                with_cookie_domain(domain_name, &attributes.access_token)
            ),
        ),
        (
            refresh_key.clone(),
            format!(
                "{}; {}",
                refresh_value,
                with_cookie_domain(domain_name, &attributes.refresh_token)
            ),
        ),
        (
            format!("{prefix}.LastAuthUser"),
            format!(
                "{}; {}",
                username,
                with_cookie_domain(domain_name, &attributes.id_token)
            ),
        ),
        (
            format!("{prefix}.{username}.tokenScopesString"),
            format!(
                "{}; {}",
                scopes_string,
                with_cookie_domain(domain_name, &attributes.access_token)
            ),
        ),
        (
            format!("{prefix}.{username}.userData"),
            format!(
                "{}; {}",
                encode_cookie_value(&user_data),
                with_cookie_domain(domain_name, &attributes.id_token)
            ),
        ),
        (
            HOSTED_UI_COOKIE.to_string(),
            format!(
                "true; {}",
                with_cookie_domain(domain_name, &attributes.access_token)
            ),
        ),
    ];

    if expire_all {
        for (_, value) in &mut cookies {
            *value = expire_cookie(value);
        }
    } else if tokens.refresh_token.is_none() {
        for (name, value) in &mut cookies {
            if *name == refresh_key {
                *value = expire_cookie(value);
            }
        }
    }

    Ok(cookies
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect())
}

/// Rewrites a cookie value-with-attributes so the browser drops it: the
/// value is cleared, any `Max-Age`/`Expires` directive is removed, and an
/// epoch `Expires` is appended.
#[must_use]
pub fn expire_cookie(cookie: &str) -> String {
    let mut parts: Vec<&str> = cookie
        .split(';')
        .map(str::trim)
        .filter(|part| {
            let lower = part.to_ascii_lowercase();
            !lower.starts_with("max-age") && !lower.starts_with("expires")
        })
        .collect();
    if !parts.is_empty() {
        // First part is the value itself; clear it.
        parts.remove(0);
    }
    let mut out = vec![""];
    out.extend(parts);
    out.push(EPOCH_EXPIRES);
    out.join("; ")
}

/// Appends a leading-dot `Domain` for the serving host unless the attribute
/// string already scopes one.
fn with_cookie_domain(domain_name: &str, attributes: &str) -> String {
    if attributes.to_ascii_lowercase().contains("domain") {
        attributes.to_string()
    } else {
        format!("{attributes}; Domain=.{domain_name}")
    }
}
