//! Upstream model provider client.
//!
//! The metered endpoint proxies to an external text-generation provider.
//! Each call gets a hard per-attempt deadline and one retry; a second
//! timeout surfaces to the caller as a gateway timeout rather than holding
//! the request open indefinitely.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from the upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The provider did not answer within the per-attempt deadline.
    #[error("upstream timed out")]
    Timeout,

    /// The request could not be sent or the response not read.
    #[error("upstream request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(u16),
}

/// A text-generation provider.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Deadline-and-retry wrapper around upstream calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            timeout: Duration::from_secs(30),
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op` under the policy, retrying timeouts and transport errors.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once all attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut last_error = UpstreamError::Timeout;

        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "Upstream attempt failed");
                    last_error = e;
                }
                Err(_) => {
                    tracing::warn!(attempt, "Upstream attempt timed out");
                    last_error = UpstreamError::Timeout;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(last_error)
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    output: String,
}

/// HTTP client for a real provider.
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpUpstream {
    /// Create a client for the provider at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        // The reqwest timeout is a backstop; the retry policy enforces the
        // real per-attempt deadline.
        let client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()
            .map_err(|e| UpstreamError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let mut request = self
            .client
            .post(format!("{}/v1/generate", self.url))
            .json(&GenerateBody { prompt });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| UpstreamError::Http(e.to_string()))?;

        Ok(reply.output)
    }
}

/// Local stub used when no provider is configured.
///
/// Keeps the metering path exercisable in development without an upstream.
pub struct EchoUpstream;

#[async_trait]
impl UpstreamClient for EchoUpstream {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        Ok(format!("echo: {prompt}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);

        let result = quick_policy()
            .run(|| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, UpstreamError>("ok".to_string())
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);

        let result = quick_policy()
            .run(|| {
                let calls = Arc::clone(&calls2);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(UpstreamError::Http("connection reset".into()))
                    } else {
                        Ok("recovered".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hung_upstream_times_out_on_every_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);

        let result: Result<String, _> = quick_policy()
            .run(|| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    // Never resolves; the policy deadline must fire.
                    std::future::pending::<Result<String, UpstreamError>>().await
                }
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn echo_upstream_answers_locally() {
        let output = EchoUpstream.generate("hello").await.unwrap();
        assert_eq!(output, "echo: hello");
    }
}
