//! LLM Client (C1)
//!
//! Single operation: `complete(prompt) -> Option<text>`. Retries up to
//! 15 attempts with exponential backoff `base * 2^attempt` (base 3s,
//! capped at ~96s), on 429 / 5xx / timeout. Any other 4xx is terminal.
//! Carries no cross-request state beyond credentials, so it is safe to
//! call concurrently up to the configured fan-out (spec.md §4.1).

use crate::transport::{Transport, TransportError};
use crate::types::CompletionRequest;
use scenepipe_core::PipelineConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct LlmClient {
    transport: Arc<dyn Transport>,
    config: PipelineConfig,
}

impl LlmClient {
    pub fn new(transport: Arc<dyn Transport>, config: PipelineConfig) -> Self {
        Self { transport, config }
    }

    /// Returns `None` iff a non-retryable failure occurred (non-429 4xx)
    /// or the retry budget is exhausted.
    pub async fn complete(&self, prompt: &str) -> Option<String> {
        let request = CompletionRequest::single_user_prompt(self.config.llm_model.clone(), prompt);
        self.complete_request(&request).await
    }

    pub async fn complete_request(&self, request: &CompletionRequest) -> Option<String> {
        for attempt in 0..self.config.llm_retry_max {
            let api_key = self.config.api_key_for_attempt(attempt);

            let result = self
                .transport
                .post_chat(
                    &self.config.llm_endpoint,
                    api_key,
                    self.config.llm_request_timeout_seconds,
                    request,
                )
                .await;

            match result {
                Ok(text) => return Some(text),
                Err(err) if err.is_retryable() => {
                    warn!(attempt, %err, "transient LLM failure, retrying");
                    if attempt + 1 >= self.config.llm_retry_max {
                        warn!("LLM retry budget exhausted");
                        return None;
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Err(TransportError::ClientError { status, body }) => {
                    debug!(status, body, "terminal LLM client error");
                    return None;
                }
                Err(err) => {
                    debug!(%err, "non-retryable LLM transport error");
                    return None;
                }
            }
        }
        None
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.llm_retry_base_seconds;
        let seconds = base.saturating_mul(1u64 << attempt.min(5)).min(96);
        Duration::from_secs(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        responses: Vec<Result<String, TransportError>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_chat(
            &self,
            _endpoint: &str,
            _api_key: Option<&str>,
            _timeout_seconds: u64,
            _request: &CompletionRequest,
        ) -> Result<String, TransportError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(i)
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Other("no more scripted responses".into())))
        }
    }

    fn fast_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.llm_retry_max = 3;
        cfg.llm_retry_base_seconds = 0;
        cfg
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![Ok("hello".to_string())],
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(transport, fast_config());
        assert_eq!(client.complete("hi").await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![Err(TransportError::RateLimited), Ok("ok".to_string())],
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(transport, fast_config());
        assert_eq!(client.complete("hi").await, Some("ok".to_string()));
    }

    #[tokio::test]
    async fn non_429_client_error_is_terminal_immediately() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![Err(TransportError::ClientError {
                status: 401,
                body: "unauthorized".to_string(),
            })],
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(transport, fast_config());
        assert_eq!(client.complete("hi").await, None);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retry_budget_and_returns_none() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
            ],
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(transport, fast_config());
        assert_eq!(client.complete("hi").await, None);
    }
}
