//! Language model client abstraction for Aria.
//!
//! This crate turns a hosted chat-completion endpoint into a lazy sequence of
//! [`ModelEvent`]s: incremental text tokens followed by exactly one terminal
//! event, either a batch of tool-call requests or a plain "done".
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  LlmBackend trait                           │
//! │  - stream_turn(ModelRequest)                │
//! │      -> Stream<Token* (ToolCalls | Done)>   │
//! └─────────────────────────────────────────────┘
//!                    │
//!        ┌───────────┴────────────┐
//!        ▼                        ▼
//! ┌──────────────────┐     ┌─────────────┐
//! │ OpenAI-compatible│     │ MockBackend │
//! │ (GitHub Models,  │     │  (tests)    │
//! │  OpenAI, Ollama) │     └─────────────┘
//! └──────────────────┘
//! ```
//!
//! The client never retries on its own. Callers that want a retry wrap the
//! call in [`with_retry`], which only retries [`LlmError::is_retryable`] faults.

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{EventStream, LlmBackend, ModelEvent, SharedBackend, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockTurn};
pub use error::{LlmError, RateLimitInfo, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{Message, ModelRequest, ParamSpec, ParamType, Role, ToolCallRequest, ToolSpec};
