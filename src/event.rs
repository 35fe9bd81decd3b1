//! Invocation envelope types.
//!
//! The CDN hands every handler a request bundle and expects either the same
//! request back (pass-through to the origin) or a response bundle. The serde
//! shapes mirror the edge platform's JSON, so an embedder can deserialize
//! the event straight into [`Request`] and serialize the handler's output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single header entry. The platform keys the outer map by lowercased
/// header name but preserves the original casing in `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

pub type Headers = HashMap<String, Vec<Header>>;

/// Origin metadata attached to origin-request events. Only the custom-origin
/// fields the gate consumes are modeled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(default)]
    pub custom: Option<CustomOrigin>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOrigin {
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub custom_headers: Headers,
}

/// An inbound request bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub uri: String,
    #[serde(default)]
    pub querystring: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Request {
    /// The serving domain, from the `Host` header.
    ///
    /// Used as the single canonical domain for redirect URIs and cookie
    /// scoping; a request without it cannot be driven through the protocol.
    pub fn host(&self) -> Result<&str, Error> {
        self.headers
            .get("host")
            .and_then(|hs| hs.first())
            .map(|h| h.value.as_str())
            .ok_or_else(|| Error::bad_request("request has no Host header"))
    }

    /// All `Cookie` header values, in order.
    pub fn cookie_header_values(&self) -> Vec<&str> {
        self.headers
            .get("cookie")
            .map(|hs| hs.iter().map(|h| h.value.as_str()).collect())
            .unwrap_or_default()
    }

    /// The originally requested URI including its query string, suitable for
    /// round-tripping through `state` / `requestedUri` parameters.
    #[must_use]
    pub fn requested_uri(&self) -> String {
        if self.querystring.is_empty() {
            self.uri.clone()
        } else {
            format!("{}?{}", self.uri, self.querystring)
        }
    }
}

/// An outbound response bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: String,
    pub status_description: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Response {
    /// A 307 redirect to `location`.
    #[must_use]
    pub fn temporary_redirect(location: &str) -> Self {
        let mut response = Self {
            status: "307".into(),
            status_description: "Temporary Redirect".into(),
            headers: Headers::new(),
            body: None,
        };
        response.add_header("location", location);
        response
    }

    /// A 400 with the standard HTML error page.
    ///
    /// 403 is deliberately avoided: the CDN rewrites 403s to the SPA's
    /// index.html for client-side routing, which would swallow the error.
    #[must_use]
    pub fn bad_request_page(message: &str, try_again_href: &str) -> Self {
        let mut response = Self {
            status: "400".into(),
            status_description: "Bad Request".into(),
            headers: Headers::new(),
            body: Some(error_html("Bad Request", message, try_again_href)),
        };
        response.add_header("content-type", "text/html; charset=UTF-8");
        response
    }

    /// A bare 400 without a page body.
    #[must_use]
    pub fn bad_request_plain() -> Self {
        Self {
            status: "400".into(),
            status_description: "Bad Request".into(),
            headers: Headers::new(),
            body: Some("Bad Request".into()),
        }
    }

    /// Append a header, preserving any existing entries under the same name.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(Header {
                key: name.to_string(),
                value: value.into(),
            });
    }

    /// Append a `Set-Cookie` header.
    pub fn add_set_cookie(&mut self, value: impl Into<String>) {
        self.add_header("set-cookie", value);
    }

    /// Append the configured extra response headers.
    #[must_use]
    pub fn with_extra_headers(mut self, headers: &[(String, String)]) -> Self {
        for (name, value) in headers {
            self.add_header(name, value.clone());
        }
        self
    }

    /// First header value under `name` (lowercased lookup), if any.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|hs| hs.first())
            .map(|h| h.value.as_str())
    }
}

/// Minimal error page with a retry link back to the page the user wanted.
#[must_use]
pub fn error_html(title: &str, message: &str, try_again_href: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
      <meta charset="utf-8">
      <title>{title}</title>
  </head>
  <body>
      <h1>{title}</h1>
      <p><b>ERROR:</b> {message}</p>
      <a href="{try_again_href}">Try again</a>
  </body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn request(uri: &str, querystring: &str) -> Request {
        let mut headers = Headers::new();
        headers.insert(
            "host".into(),
            vec![Header {
                key: "Host".into(),
                value: "d111111abcdef8.cloudfront.net".into(),
            }],
        );
        Request {
            uri: uri.into(),
            querystring: querystring.into(),
            headers,
            origin: None,
        }
    }

    #[test]
    fn requested_uri_includes_query_when_present() {
        assert_eq!(request("/a", "").requested_uri(), "/a");
        assert_eq!(request("/a", "x=1").requested_uri(), "/a?x=1");
    }

    #[test]
    fn missing_host_is_bad_request() {
        let mut req = request("/", "");
        req.headers.remove("host");
        assert!(matches!(req.host(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn redirect_carries_location_and_extra_headers() {
        let extra = vec![("X-Frame-Options".to_string(), "DENY".to_string())];
        let response =
            Response::temporary_redirect("https://example.com/").with_extra_headers(&extra);
        assert_eq!(response.status, "307");
        assert_eq!(response.header("location"), Some("https://example.com/"));
        assert_eq!(response.header("x-frame-options"), Some("DENY"));
    }

    #[test]
    fn set_cookie_headers_accumulate() {
        let mut response = Response::temporary_redirect("https://example.com/");
        response.add_set_cookie("a=1");
        response.add_set_cookie("b=2");
        assert_eq!(response.headers["set-cookie"].len(), 2);
    }

    #[test]
    fn error_page_links_back() {
        let page = error_html("Bad Request", "Nonce mismatch", "https://example.com/app");
        assert!(page.contains("Nonce mismatch"));
        assert!(page.contains(r#"href="https://example.com/app""#));
    }

    #[test]
    fn request_round_trips_through_serde() {
        let json = r#"{
            "uri": "/index.html",
            "querystring": "code=abc&state=%7B%7D",
            "headers": {
                "host": [{ "key": "Host", "value": "example.com" }],
                "cookie": [{ "key": "Cookie", "value": "a=1; b=2" }]
            }
        }"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.host().unwrap(), "example.com");
        assert_eq!(req.cookie_header_values(), vec!["a=1; b=2"]);
    }
}
