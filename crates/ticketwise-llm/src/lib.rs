//! Language-model capability for ticketwise.
//!
//! This crate provides the narrow interface the orchestration core uses to
//! reach a language model: one-shot completions with a bounded request, plus a
//! health check used by the `status` command.
//!
//! # Architecture
//!
//! The core abstraction is the [`LlmBackend`] trait. The orchestrator only
//! ever holds a [`SharedBackend`], so any provider (or the scripted
//! [`MockBackend`] in tests) can be swapped in.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! │  - health_check()                       │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!    ┌──────────┐        ┌──────────┐
//!    │  OpenAI  │        │   Mock   │
//!    └──────────┘        └──────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, SharedBackend};
#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockResponse};
pub use error::{LlmError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
