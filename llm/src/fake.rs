//! Scripted fake transport for deterministic stage tests, grounded in
//! the teacher's `transport_fake.rs` adapter-for-tests pattern.

use crate::transport::{Transport, TransportError};
use crate::types::CompletionRequest;
use async_trait::async_trait;
use std::sync::Mutex;

/// Replays a fixed sequence of responses, one per call, in order. Once
/// the script is exhausted, `repeat_last` decides whether further calls
/// keep returning the final scripted response or fail.
pub struct FakeTransport {
    responses: Mutex<std::collections::VecDeque<Result<String, String>>>,
    repeat_last: Option<Result<String, String>>,
}

impl FakeTransport {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat_last: None,
        }
    }

    /// Every call succeeds with the same `text`, indefinitely.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            responses: Mutex::new(std::collections::VecDeque::new()),
            repeat_last: Some(Ok(text)),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_chat(
        &self,
        _endpoint: &str,
        _api_key: Option<&str>,
        _timeout_seconds: u64,
        _request: &CompletionRequest,
    ) -> Result<String, TransportError> {
        let mut guard = self.responses.lock().unwrap();
        let next = guard.pop_front().or_else(|| self.repeat_last.clone());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(TransportError::Other(msg)),
            None => Err(TransportError::Other("fake transport exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_play_in_order() {
        let transport = FakeTransport::new(vec![Ok("one".to_string()), Ok("two".to_string())]);
        let req = CompletionRequest::single_user_prompt("m", "p");
        assert_eq!(
            transport.post_chat("e", None, 1, &req).await.unwrap(),
            "one"
        );
        assert_eq!(
            transport.post_chat("e", None, 1, &req).await.unwrap(),
            "two"
        );
    }

    #[tokio::test]
    async fn always_repeats_forever() {
        let transport = FakeTransport::always("same");
        let req = CompletionRequest::single_user_prompt("m", "p");
        for _ in 0..3 {
            assert_eq!(
                transport.post_chat("e", None, 1, &req).await.unwrap(),
                "same"
            );
        }
    }
}
