//! Transport abstraction for the chat-completion endpoint.
//!
//! Mirrors the teacher's adapter-for-tests split (a real network
//! transport plus a scripted fake used by unit tests) so retry/backoff
//! logic in [`crate::client`] can be exercised without a network.

use crate::types::{ChatCompletionResponse, CompletionRequest};
use async_trait::async_trait;

/// Outcome of a single transport attempt, classified the way
/// spec.md §4.1 classifies them: retryable (429/5xx/timeout) vs.
/// terminal (any other 4xx).
#[derive(Debug, Clone)]
pub enum TransportError {
    RateLimited,
    ServerError(u16),
    Timeout,
    ClientError { status: u16, body: String },
    Other(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited | TransportError::ServerError(_) | TransportError::Timeout
        )
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::RateLimited => write!(f, "rate limited (429)"),
            TransportError::ServerError(code) => write!(f, "server error ({code})"),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::ClientError { status, body } => {
                write!(f, "client error ({status}): {body}")
            }
            TransportError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_chat(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        timeout_seconds: u64,
        request: &CompletionRequest,
    ) -> Result<String, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_chat(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        timeout_seconds: u64,
        request: &CompletionRequest,
    ) -> Result<String, TransportError> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut builder = self
            .client
            .post(endpoint)
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .header("Content-Type", "application/json");

        if let Some(key) = api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(TransportError::RateLimited);
        }
        if status.is_server_error() {
            return Err(TransportError::ServerError(status.as_u16()));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::ClientError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Other(format!("invalid JSON response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}
