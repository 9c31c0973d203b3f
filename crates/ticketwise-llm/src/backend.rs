//! LLM Backend trait and mock implementation.
//!
//! This module defines the abstraction layer for language-model providers and
//! a scripted mock used throughout the workspace's tests.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for language-model providers.
///
/// Implementations make exactly one attempt per call. Deadlines are enforced
/// by the caller, so `complete` must be safe to drop mid-flight.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()>;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockBackend, MockResponse};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::LlmBackend;
    use crate::error::{LlmError, Result};
    use crate::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

    /// A scripted reply for [`MockBackend`].
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        /// Reply with this text.
        Text(String),
        /// Fail with a backend error carrying this message.
        Error(String),
        /// Fail with an authentication error.
        AuthError(String),
        /// Sleep before producing the inner reply (for timeout tests).
        Delayed(Duration, Box<MockResponse>),
    }

    impl MockResponse {
        /// Convenience constructor for a text reply.
        pub fn text(text: impl Into<String>) -> Self {
            Self::Text(text.into())
        }

        /// Wrap a reply in a delay.
        pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
            Self::Delayed(delay, Box::new(inner))
        }
    }

    /// A mock backend for testing purposes.
    ///
    /// Returns pre-configured responses in order, useful for deterministic
    /// testing of classification and synthesis. When the script runs out, a
    /// fallback reply (if set) is repeated; otherwise an error is returned.
    #[derive(Debug)]
    pub struct MockBackend {
        name: String,
        responses: Mutex<VecDeque<MockResponse>>,
        fallback: Option<MockResponse>,
        request_log: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        /// Create a new mock backend with the given scripted responses.
        pub fn new(responses: Vec<MockResponse>) -> Self {
            Self {
                name: "mock".to_string(),
                responses: Mutex::new(responses.into()),
                fallback: None,
                request_log: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock backend that always replies with the same text.
        pub fn with_text(text: impl Into<String>) -> Self {
            Self::new(Vec::new()).with_fallback(MockResponse::Text(text.into()))
        }

        /// Create a mock backend whose every call fails.
        pub fn failing(message: impl Into<String>) -> Self {
            Self::new(Vec::new()).with_fallback(MockResponse::Error(message.into()))
        }

        /// Reply used once the script is exhausted.
        pub fn with_fallback(mut self, fallback: MockResponse) -> Self {
            self.fallback = Some(fallback);
            self
        }

        /// Get all requests that were made to this backend.
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.request_log
                .lock()
                .map(|log| log.clone())
                .unwrap_or_default()
        }

        /// Get the number of requests made.
        pub fn request_count(&self) -> usize {
            self.request_log.lock().map(|log| log.len()).unwrap_or(0)
        }

        fn next_response(&self) -> Option<MockResponse> {
            let scripted = self
                .responses
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front());
            scripted.or_else(|| self.fallback.clone())
        }
    }

    async fn resolve(reply: MockResponse, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut reply = reply;
        loop {
            match reply {
                MockResponse::Text(text) => {
                    return Ok(CompletionResponse::new(
                        "mock_msg",
                        request.model.clone(),
                        text,
                        StopReason::EndTurn,
                        Usage::new(10, 20),
                    ));
                }
                MockResponse::Error(message) => return Err(LlmError::Backend(message)),
                MockResponse::AuthError(message) => return Err(LlmError::Auth(message)),
                MockResponse::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            if let Ok(mut log) = self.request_log.lock() {
                log.push(request.clone());
            }

            match self.next_response() {
                Some(reply) => resolve(reply, &request).await,
                None => Err(LlmError::Backend(
                    "MockBackend: no more responses available".to_string(),
                )),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
