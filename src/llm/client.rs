use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::{ChatMessage, ChatOutcome, ChatRequest, ChatResponse, ToolSpec, ToolWire};
use super::LlmError;

/// Chat model abstraction (allows mocking). One call, one outcome; the
/// caller owns all retry and correction policy.
pub trait ChatClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatOutcome, LlmError>;
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint,
/// e.g. a local inference server.
pub struct OpenAiChatClient {
    base_url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiChatClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature: 0.0,
            client,
            timeout_secs,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl ChatClient for OpenAiChatClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatOutcome, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let tool_wire: Vec<ToolWire<'_>> = tools
            .iter()
            .map(|t| ToolWire {
                kind: "function",
                function: t,
            })
            .collect();
        let body = ChatRequest {
            model,
            messages,
            temperature: self.temperature,
            tools: if tool_wire.is_empty() {
                None
            } else {
                Some(tool_wire)
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        Ok(ChatOutcome {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls,
        })
    }
}

/// Scripted chat client for tests: pops one outcome per call, in order.
/// An exhausted script reports `EmptyResponse`, which surfaces as a
/// transport failure in the extraction step.
pub struct MockChatClient {
    script: Mutex<VecDeque<Result<ChatOutcome, LlmError>>>,
    calls: AtomicUsize,
}

impl MockChatClient {
    pub fn new(script: Vec<ChatOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn from_results(script: Vec<Result<ChatOutcome, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many chat calls have been made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatClient for MockChatClient {
    fn chat(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<ChatOutcome, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("mock script lock")
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}
