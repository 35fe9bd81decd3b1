/*!
OAuth2 authentication gate for single-page apps served from a CDN edge.

The gate runs in front of a static origin and only lets authenticated
requests through. Sessions are carried in Amplify-compatible cookies; sign-in
uses the Authorization Code grant with PKCE against a hosted-UI IdP, and id
tokens are verified locally against the IdP's JWKS.

```no_run
use spa_auth_edge::{Config, Gateway, Outcome, Request};

# async fn handle(event: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
let config = Config::new(
    "26q4rblahblahjh34",
    "eu-west-1_zx1asrpUS",
    "auth.example.com",
)?;
let gateway = Gateway::new(config)?;

let request: Request = serde_json::from_value(event)?;
match gateway.check_auth(request).await? {
    Outcome::Forward(request) => { /* hand back to the origin */ }
    Outcome::Respond(response) => { /* serialize and return */ }
}
# Ok(())
# }
```

The IdP's redirect target, the refresh path and the sign-out path each map to
their own handler: [`Gateway::parse_auth`], [`Gateway::refresh_auth`] and
[`Gateway::sign_out`].
*/

pub mod config;
pub mod cookies;
pub mod crypto;
pub mod error;
pub mod event;
pub mod handlers;
pub mod http;
pub mod jwks;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Config, CookieAttributes};
pub use cookies::Session;
pub use error::Error;
pub use event::{Request, Response};
pub use handlers::{Gateway, Outcome};
pub use token::{Claims, TokenSet};
