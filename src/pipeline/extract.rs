//! Extraction step: one stage instruction + the transcript in, one typed
//! entity collection out.
//!
//! The model call is non-deterministic and unreliable; this module owns
//! the bounded retry against transport and parse failure only. Semantic
//! correctness is the validator's and the approval gate's business.
//!
//! Two interchangeable strategies produce the same result shape:
//! - `structured`: single call, fenced-JSON reply matching the stage schema;
//! - `tool_driven`: a tool-call loop where the model records entities one
//!   at a time and may question the user mid-extraction.

use std::io;

use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use super::transcript::Transcript;
use crate::console::Prompter;
use crate::llm::types::ToolCall;
use crate::llm::{ChatClient, ChatMessage, LlmError, ToolSpec};

/// Hard cap on attempts against transport/parse failure. Exceeding it is
/// fatal for the run.
pub const MAX_ATTEMPTS: usize = 10;

/// A tool session still calling tools after this many rounds counts as one
/// malformed attempt.
const MAX_TOOL_ROUNDS: usize = 24;

#[derive(Error, Debug)]
pub enum ExtractionFailure {
    /// The retry cap was exhausted. Carries the final attempt's message
    /// history for diagnosis.
    #[error(
        "no usable model output after {attempts} attempts (last error: {last_error})\n\
         turn history of the final attempt:\n{history}"
    )]
    Exhausted {
        attempts: usize,
        last_error: String,
        history: String,
    },

    /// Console I/O died mid-extraction. Not retryable.
    #[error("console I/O failed during extraction: {0}")]
    Io(#[from] io::Error),
}

/// One attempt's failure, decided retryable or not by the caller loop.
enum AttemptError {
    Transport(LlmError),
    Malformed(String),
    Io(io::Error),
}

/// Stage-specific half of the tool-driven strategy: the recording tools a
/// stage offers and the scratch collection they fill.
pub trait ToolHandler {
    /// Stage tool specs, offered alongside the shared `ask_user` /
    /// `tell_user` pair.
    fn tools(&self) -> Vec<ToolSpec>;

    /// Execute one stage tool. `Ok` and `Err` both feed text back to the
    /// model; `Err` marks it as an error the model should correct.
    fn call(&mut self, name: &str, args: &serde_json::Value) -> Result<String, String>;

    /// The collected result once the model stops calling tools, as the
    /// JSON shape of the stage's collection. `Err` means the session
    /// recorded nothing usable and the attempt is malformed.
    fn finish(&mut self) -> Result<serde_json::Value, String>;

    /// Drop scratch state between attempts.
    fn reset(&mut self);
}

/// Extraction entry point for one stage run.
pub struct Extraction<'a> {
    pub llm: &'a dyn ChatClient,
    pub model: &'a str,
}

impl Extraction<'_> {
    /// Single-shot structured strategy: the reply must contain a JSON
    /// payload (fenced or bare) deserializing to `T`. Parse failures are
    /// fed back as call-local corrective messages, not transcript turns.
    pub fn structured<T: DeserializeOwned>(
        &self,
        instruction: &str,
        transcript: &Transcript,
    ) -> Result<T, ExtractionFailure> {
        let mut messages = with_instruction(instruction, transcript);

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.llm.chat(self.model, &messages, &[]) {
                Ok(outcome) => match parse_payload::<T>(&outcome.content) {
                    Ok(parsed) => return Ok(parsed),
                    Err(reason) => {
                        tracing::warn!(attempt, error = %reason, "Model reply did not parse, retrying");
                        messages.push(ChatMessage::user(format!(
                            "Your previous response did not parse correctly for the \
                             following reason: {reason}"
                        )));
                        last_error = reason;
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Model call failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        Err(ExtractionFailure::Exhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
            history: dump_history(&messages),
        })
    }

    /// Tool-call loop strategy. Each attempt replays the instruction and
    /// transcript against a fresh scratch collection; the session ends
    /// when the model stops calling tools.
    pub fn tool_driven<T: DeserializeOwned>(
        &self,
        instruction: &str,
        transcript: &Transcript,
        handler: &mut dyn ToolHandler,
        prompter: &mut dyn Prompter,
    ) -> Result<T, ExtractionFailure> {
        let base = with_instruction(instruction, transcript);
        let mut tools = vec![ask_user_spec(), tell_user_spec()];
        tools.extend(handler.tools());

        let mut last_error = String::new();
        let mut history = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            handler.reset();
            let mut messages = base.clone();
            let failed = match self.run_tool_session(&mut messages, &tools, handler, prompter) {
                Ok(value) => match serde_json::from_value::<T>(value) {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => format!("the recorded entities did not match the expected shape: {e}"),
                },
                Err(AttemptError::Io(e)) => return Err(ExtractionFailure::Io(e)),
                Err(AttemptError::Transport(e)) => e.to_string(),
                Err(AttemptError::Malformed(reason)) => reason,
            };
            tracing::warn!(attempt, error = %failed, "Tool-driven extraction attempt failed");
            last_error = failed;
            history = dump_history(&messages);
        }

        Err(ExtractionFailure::Exhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
            history,
        })
    }

    fn run_tool_session(
        &self,
        messages: &mut Vec<ChatMessage>,
        tools: &[ToolSpec],
        handler: &mut dyn ToolHandler,
        prompter: &mut dyn Prompter,
    ) -> Result<serde_json::Value, AttemptError> {
        for _ in 0..MAX_TOOL_ROUNDS {
            let outcome = self
                .llm
                .chat(self.model, messages, tools)
                .map_err(AttemptError::Transport)?;

            if outcome.tool_calls.is_empty() {
                return handler.finish().map_err(AttemptError::Malformed);
            }

            messages.push(ChatMessage::assistant_tool_calls(outcome.tool_calls.clone()));
            for call in &outcome.tool_calls {
                let result = dispatch_tool_call(call, handler, prompter)?;
                messages.push(ChatMessage::tool_result(call.id.clone(), result));
            }
        }

        Err(AttemptError::Malformed(format!(
            "the tool session did not converge within {MAX_TOOL_ROUNDS} rounds"
        )))
    }
}

/// Execute one tool call. Bad arguments and unknown tools go back to the
/// model as error text; only console failure aborts the attempt.
fn dispatch_tool_call(
    call: &ToolCall,
    handler: &mut dyn ToolHandler,
    prompter: &mut dyn Prompter,
) -> Result<String, AttemptError> {
    let args: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
        Ok(v) => v,
        Err(e) => return Ok(format!("error: tool arguments were not valid JSON: {e}")),
    };

    match call.function.name.as_str() {
        "ask_user" => match args.get("question").and_then(|q| q.as_str()) {
            Some(question) if !question.trim().is_empty() => {
                prompter.ask(question).map_err(AttemptError::Io)
            }
            _ => Ok("error: a non-empty 'question' argument is required".to_string()),
        },
        "tell_user" => match args.get("text").and_then(|t| t.as_str()) {
            Some(text) => {
                prompter.inform(text);
                Ok("acknowledged".to_string())
            }
            None => Ok("error: a 'text' argument is required".to_string()),
        },
        name => Ok(handler
            .call(name, &args)
            .unwrap_or_else(|e| format!("error: {e}"))),
    }
}

fn with_instruction(instruction: &str, transcript: &Transcript) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatMessage::system(instruction));
    messages.extend(transcript.to_messages());
    messages
}

/// Pull the JSON payload out of a model reply: a fenced ```json block if
/// present, the whole reply otherwise.
fn parse_payload<T: DeserializeOwned>(content: &str) -> Result<T, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("the response was empty".to_string());
    }

    let json_str = match trimmed.find("```json") {
        Some(start) => {
            let body = &trimmed[start + 7..];
            let end = body
                .find("```")
                .ok_or_else(|| "unclosed ```json block".to_string())?;
            body[..end].trim()
        }
        None => trimmed,
    };

    serde_json::from_str(json_str)
        .map_err(|e| format!("the JSON did not conform to the expected schema: {e}"))
}

fn dump_history(messages: &[ChatMessage]) -> String {
    serde_json::to_string_pretty(messages).unwrap_or_else(|_| "<unserializable>".to_string())
}

fn ask_user_spec() -> ToolSpec {
    ToolSpec {
        name: "ask_user".to_string(),
        description: "Pose a question to the user and return their response.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to pose to the user"
                }
            },
            "required": ["question"]
        }),
    }
}

fn tell_user_spec() -> ToolSpec {
    ToolSpec {
        name: "tell_user".to_string(),
        description: "Show some text information to the user.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The information to show"
                }
            },
            "required": ["text"]
        }),
    }
}
