//! Chat-model boundary.
//!
//! The pipeline treats the model as a non-deterministic function behind the
//! [`client::ChatClient`] trait: messages and tool specs in, text and tool
//! calls out. Everything above this module is deterministic.

pub mod client;
pub mod types;

pub use client::{ChatClient, MockChatClient, OpenAiChatClient};
pub use types::{ChatMessage, ChatOutcome, Role, ToolCall, ToolSpec};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Cannot reach the model endpoint at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model endpoint returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Model response did not parse: {0}")]
    ResponseParsing(String),

    #[error("Model returned no choices")]
    EmptyResponse,
}
