//! Resilient HTTP client for IdP token-endpoint calls.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Error;

pub(crate) const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: f64 = 25.0;

/// Form-encoded POST with bounded retry.
///
/// Up to [`MAX_ATTEMPTS`] attempts; the first two fire back-to-back, each
/// later attempt sleeps `25 * (2^completed + jitter * completed)` ms first,
/// jitter uniform in [0,1). Exponential growth keeps a flapping IdP from
/// seeing a retry storm. Non-2xx statuses and transport errors both consume
/// an attempt; the returned [`Error::Upstream`] carries the last failure.
pub async fn post_with_retry(
    http: &reqwest::Client,
    operation: &'static str,
    url: &str,
    form: &[(&str, &str)],
) -> Result<reqwest::Response, Error> {
    let mut last_failure = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 2 {
            let completed = attempt - 1;
            let jitter: f64 = rand::rng().random();
            let millis =
                BACKOFF_BASE_MS * (f64::from(2u32.pow(completed)) + jitter * f64::from(completed));
            debug!(operation, attempt, delay_ms = millis as u64, "backing off before retry");
            tokio::time::sleep(Duration::from_millis(millis as u64)).await;
        }

        match http.post(url).form(form).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(operation, %status, attempt, "token endpoint answered non-2xx");
                last_failure = format!("status {status}: {body}");
            }
            Err(err) => {
                warn!(operation, attempt, error = %err, "token endpoint unreachable");
                last_failure = err.to_string();
            }
        }
    }

    Err(Error::Upstream {
        operation,
        attempts: MAX_ATTEMPTS,
        detail: last_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_first_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let response = post_with_retry(
            &client,
            "code exchange",
            &format!("{}/oauth2/token", server.uri()),
            &[("grant_type", "authorization_code"), ("code", "abc")],
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn recovers_after_four_failures_with_growing_delays() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(4)
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let started = Instant::now();
        let response = post_with_retry(
            &client,
            "code exchange",
            &format!("{}/oauth2/token", server.uri()),
            &[("grant_type", "refresh_token")],
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 200);
        // Attempts 3, 4 and 5 wait at least 25*(4 + 8 + 16) ms combined.
        assert!(
            started.elapsed() >= Duration::from_millis(600),
            "expected backoff before the later attempts, finished in {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn gives_up_after_five_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .expect(5)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = post_with_retry(
            &client,
            "refresh",
            &format!("{}/oauth2/token", server.uri()),
            &[("grant_type", "refresh_token")],
        )
        .await;
        match result {
            Err(Error::Upstream {
                attempts, detail, ..
            }) => {
                assert_eq!(attempts, 5);
                assert!(detail.contains("invalid_grant"));
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }
}
