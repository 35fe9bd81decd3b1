use thiserror::Error;

/// Errors raised by the gate's handlers and shared primitives.
///
/// The variants map one-to-one onto the visible outcomes: `BadRequest`
/// surfaces as a 400 page, `Validation` routes back into the login redirect,
/// `Upstream` is retried and then either surfaced or downgraded, and `Config`
/// aborts the invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or forged request: missing query parameters, a CSRF nonce
    /// failure, or a required cookie the browser did not send.
    #[error("{0}")]
    BadRequest(String),

    /// The JWT's signature or claims did not check out. Treated as "not
    /// authenticated", never as a user-visible error.
    #[error("token validation failed: {0}")]
    Validation(String),

    /// The IdP (token endpoint or JWKS endpoint) could not be reached or
    /// answered with a non-2xx status, after exhausting the retry budget.
    #[error("{operation} failed after {attempts} attempt(s): {detail}")]
    Upstream {
        operation: &'static str,
        attempts: u32,
        detail: String,
    },

    /// Invalid runtime configuration. Fatal.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
