//! Webhook delivery with bounded exponential-backoff retry.
//!
//! [`DeliveryClient`] makes at most three attempts. The delay before
//! attempt *n* (n ≥ 2) is `base_delay * 2^(n-2)`, i.e. 1 s then 2 s with the
//! defaults. Each attempt is bounded by its own timeout; a timeout, a
//! transport error, or a non-2xx status all count as a failed attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

/// Attempts per delivery, first try included.
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry; doubles for each further retry.
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound of a single attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Connection, TLS, or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The attempt did not complete in time.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The webhook answered with a non-success status.
    #[error("webhook answered HTTP {0}")]
    Status(u16),
}

/// All attempts failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("delivery failed after {attempts} attempts: {last}")]
pub struct DeliveryFailed {
    /// Attempts made.
    pub attempts: u32,
    /// Error of the final attempt.
    #[source]
    pub last: DeliveryError,
}

/// Sends one JSON body and reports the HTTP status.
#[async_trait]
pub trait WebhookTransport: Send + Sync + fmt::Debug {
    /// POSTs `body` as `application/json` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Transport`] when no response was received.
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, DeliveryError>;
}

/// [`WebhookTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport whose client enforces [`ATTEMPT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns a [`reqwest::Error`] if the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(ATTEMPT_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, DeliveryError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Retrying webhook sender.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn WebhookTransport>,
    max_attempts: u32,
    base_delay: Duration,
    attempt_timeout: Duration,
}

impl DeliveryClient {
    /// Creates a client with the default attempt count, backoff, and timeout.
    #[must_use]
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_RETRY_DELAY,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }

    /// Overrides attempt count and base backoff delay.
    #[must_use]
    pub fn with_retry_config(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Delivers `body` to `url`, retrying on any failure.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailed`] carrying the last attempt's error once all
    /// attempts are used up.
    pub async fn send(&self, url: &str, body: &[u8]) -> Result<(), DeliveryFailed> {
        let mut attempt = 1;
        loop {
            match self.attempt(url, body).await {
                Ok(status) => {
                    tracing::info!(attempt, status, "payload delivered");
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempts = attempt, error = %e, "delivery failed");
                    return Err(DeliveryFailed {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }

    /// Single-shot connectivity test used during setup.
    ///
    /// Posts `body` once; only 200 and 201 count as success.
    ///
    /// # Errors
    ///
    /// Returns the [`DeliveryError`] of the attempt.
    pub async fn probe(&self, url: &str, body: &[u8]) -> Result<(), DeliveryError> {
        let status = self.post_with_timeout(url, body).await?;
        if matches!(status, 200 | 201) {
            Ok(())
        } else {
            Err(DeliveryError::Status(status))
        }
    }

    async fn attempt(&self, url: &str, body: &[u8]) -> Result<u16, DeliveryError> {
        let status = self.post_with_timeout(url, body).await?;
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(DeliveryError::Status(status))
        }
    }

    async fn post_with_timeout(&self, url: &str, body: &[u8]) -> Result<u16, DeliveryError> {
        tokio::time::timeout(
            self.attempt_timeout,
            self.transport.post_json(url, body.to_vec()),
        )
        .await
        .map_err(|_| DeliveryError::Timeout(self.attempt_timeout))?
    }

    /// Delay after failed attempt `attempt` (1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}


#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::fake::ScriptedTransport;
    use super::*;

    fn client(transport: &Arc<ScriptedTransport>) -> DeliveryClient {
        DeliveryClient::new(Arc::clone(transport) as Arc<dyn WebhookTransport>)
    }

    fn refused() -> Result<u16, DeliveryError> {
        Err(DeliveryError::Transport("connection refused".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_with_backoff() {
        let transport = Arc::new(ScriptedTransport::new(vec![refused(), Ok(503), Ok(200)]));

        let result = client(&transport).send("http://hook", b"{}").await;
        assert!(result.is_ok());

        let calls = transport.calls().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].at - calls[0].at, Duration::from_secs(1));
        assert_eq!(calls[2].at - calls[1].at, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_stops_after_three_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![refused(), refused(), Ok(500), Ok(200)]));

        let Err(failed) = client(&transport).send("http://hook", b"{}").await else {
            panic!("delivery should fail");
        };
        assert_eq!(failed.attempts, 3);
        assert_eq!(failed.last, DeliveryError::Status(500));
        assert_eq!(transport.calls().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempt_times_out() {
        let transport = Arc::new(ScriptedTransport::hanging());
        let started = tokio::time::Instant::now();

        let Err(failed) = client(&transport).send("http://hook", b"{}").await else {
            panic!("delivery should fail");
        };
        assert_eq!(failed.last, DeliveryError::Timeout(ATTEMPT_TIMEOUT));
        // Three 10 s timeouts plus 1 s and 2 s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(33));
    }

    #[tokio::test]
    async fn any_2xx_is_success_for_send() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(204)]));
        assert!(client(&transport).send("http://hook", b"{}").await.is_ok());
        assert_eq!(transport.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn probe_accepts_only_200_and_201() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(200), Ok(201), Ok(204)]));
        let client = client(&transport);
        assert!(client.probe("http://hook", b"{}").await.is_ok());
        assert!(client.probe("http://hook", b"{}").await.is_ok());
        assert_eq!(
            client.probe("http://hook", b"{}").await,
            Err(DeliveryError::Status(204))
        );
    }

    #[tokio::test]
    async fn probe_does_not_retry() {
        let transport = Arc::new(ScriptedTransport::new(vec![refused()]));
        assert!(client(&transport).probe("http://hook", b"{}").await.is_err());
        assert_eq!(transport.calls().await.len(), 1);
    }

    #[test]
    fn backoff_doubles() {
        let transport: Arc<dyn WebhookTransport> = Arc::new(ScriptedTransport::default());
        let client = DeliveryClient::new(transport);
        assert_eq!(client.backoff(1), Duration::from_secs(1));
        assert_eq!(client.backoff(2), Duration::from_secs(2));
        assert_eq!(client.backoff(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn reqwest_transport_posts_exact_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/custom_plugins/abc")
            .match_header("content-type", "application/json")
            .match_body(r#"{"merge_variables":{"last_update":"t"}}"#)
            .with_status(200)
            .create_async()
            .await;

        let Ok(transport) = ReqwestTransport::new() else {
            panic!("transport should build");
        };
        let client = DeliveryClient::new(Arc::new(transport));
        let url = format!("{}/api/custom_plugins/abc", server.url());
        let result = client
            .send(&url, br#"{"merge_variables":{"last_update":"t"}}"#)
            .await;
        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reqwest_transport_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let Ok(transport) = ReqwestTransport::new() else {
            panic!("transport should build");
        };
        let client = DeliveryClient::new(Arc::new(transport))
            .with_retry_config(2, Duration::from_millis(5));
        let url = format!("{}/hook", server.url());
        let Err(failed) = client.send(&url, b"{}").await else {
            panic!("delivery should fail");
        };
        assert_eq!(failed.last, DeliveryError::Status(500));
        mock.assert_async().await;
    }
}
