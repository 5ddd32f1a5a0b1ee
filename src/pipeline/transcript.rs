//! Append-only conversation transcript.
//!
//! The single memory carried across stages. Turns are never edited,
//! reordered or dropped; every stage reads the whole transcript and may
//! only append. Corrective turns (rejected extractions, validation
//! failures) stay on the record for the life of the run.

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// Who put a turn on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOrigin {
    /// The person driving the run: the initial request and answers to
    /// clarifying questions.
    User,
    /// The pipeline itself: committed-stage summaries.
    System,
    /// Feedback on a rejected extraction attempt, automatic or human.
    Corrective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub origin: TurnOrigin,
    pub text: String,
}

/// Ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript opening with the user's original request.
    pub fn from_request(request: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push_user(request);
        transcript
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(TurnOrigin::User, text.into());
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.push(TurnOrigin::System, text.into());
    }

    pub fn push_corrective(&mut self, text: impl Into<String>) {
        self.push(TurnOrigin::Corrective, text.into());
    }

    fn push(&mut self, origin: TurnOrigin, text: String) {
        self.turns.push(Turn { origin, text });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn corrective_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.origin == TurnOrigin::Corrective)
            .count()
    }

    /// Project the transcript onto the chat wire. Every turn goes out as a
    /// user-role message regardless of origin; models treat the latest
    /// user message as the thing to act on, and corrective turns must be
    /// acted on.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage::user(t.text.clone()))
            .collect()
    }
}
