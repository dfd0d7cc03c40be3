//! LLM Client (C1): a single request/response primitive with
//! retry/backoff over a chat-completion endpoint.

pub mod client;
pub mod fake;
pub mod transport;
pub mod types;

pub use client::LlmClient;
pub use fake::FakeTransport;
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{ChatMessage, CompletionRequest};
