//! The seven elicitation stages.
//!
//! Each stage declares its instruction, result shape, recording tools (if
//! it questions the user mid-extraction), structural checks and commit
//! target. `elicit` runs the shared loop around one stage: extract, then
//! auto-validate (corrective turn + re-extract on violation), then hold at
//! the approval gate (corrective turn + re-extract on rejection). The
//! validation and approval loops are deliberately unbounded — only the
//! extraction step's own attempt cap can abort a stage.

pub mod observables;
pub mod actions;
pub mod sources;
pub mod solvers;
pub mod propagators;
pub mod contractions;
pub mod gauge;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StrategyChoice;
use crate::console::Prompter;
use crate::llm::ChatClient;
use crate::pipeline::approval::{Approver, Verdict};
use crate::pipeline::extract::{Extraction, ToolHandler};
use crate::pipeline::transcript::Transcript;
use crate::pipeline::{validate, PipelineError};
use crate::state::{JobState, StageId};

/// Borrowed collaborators a stage needs to run once.
pub struct StageContext<'a> {
    pub llm: &'a dyn ChatClient,
    pub model: &'a str,
    pub prompter: &'a mut dyn Prompter,
    pub approver: &'a mut dyn Approver,
    pub strategy: StrategyChoice,
}

/// One stage of the pipeline.
pub trait StageSpec {
    type Collection: Serialize + DeserializeOwned;

    fn id(&self) -> StageId;

    /// System instruction for the extraction call. `tool_driven` switches
    /// the output-contract section between "record via tool calls" and
    /// "reply with this JSON shape".
    fn instruction(&self, state: &JobState, tool_driven: bool) -> String;

    /// Recording tools for the tool-driven strategy. `None` means the
    /// stage always uses structured output.
    fn tool_handler(&self) -> Option<Box<dyn ToolHandler>> {
        None
    }

    /// Structural checks against the already-committed state. Empty means
    /// valid; each entry is one human-readable violation.
    fn validate(&self, collection: &Self::Collection, state: &JobState) -> Vec<String>;

    /// Summary shown at the approval gate.
    fn describe(&self, collection: &Self::Collection) -> String;

    /// Write the accepted collection into its slot.
    fn commit(&self, collection: Self::Collection, state: &mut JobState);
}

/// Run one stage to an accepted collection.
pub fn elicit<S: StageSpec>(
    spec: &S,
    ctx: &mut StageContext<'_>,
    state: &JobState,
    transcript: &mut Transcript,
) -> Result<S::Collection, PipelineError> {
    let stage = spec.id();
    let extraction = Extraction {
        llm: ctx.llm,
        model: ctx.model,
    };
    let tool_driven = match ctx.strategy {
        StrategyChoice::Structured => false,
        StrategyChoice::Auto | StrategyChoice::Tools => spec.tool_handler().is_some(),
    };

    loop {
        let instruction = spec.instruction(state, tool_driven);
        let collection: S::Collection = if tool_driven {
            let mut handler = spec
                .tool_handler()
                .expect("tool_driven implies a handler");
            extraction.tool_driven(&instruction, transcript, handler.as_mut(), ctx.prompter)
        } else {
            extraction.structured(&instruction, transcript)
        }
        .map_err(|failure| PipelineError::Extraction { stage, failure })?;

        let violations = spec.validate(&collection, state);
        if !violations.is_empty() {
            tracing::info!(
                stage = %stage,
                violations = violations.len(),
                "Validation rejected the extraction, re-running"
            );
            transcript.push_corrective(validate::corrective_turn(&violations));
            continue;
        }

        match ctx.approver.review(stage, &spec.describe(&collection))? {
            Verdict::Accepted => return Ok(collection),
            Verdict::Rejected { reason } => {
                tracing::info!(stage = %stage, "Approver rejected the extraction, re-running");
                transcript.push_corrective(format!(
                    "Your previous response was not accepted for the following reason: {reason}"
                ));
            }
        }
    }
}

/// Shared instruction boilerplate for question-asking stages.
pub(crate) const USER_QUERY_RULES: &str = "\
User query rules:
- Use the ask_user tool to question the user.
- If the user responds with an invalid answer, repeat the question until a \
valid answer is given. Never accept an invalid answer.
- The user may answer your question with a question of their own. If so, \
answer it with the tell_user tool, confirm they are satisfied with a \
follow-up ask_user call, then repeat the original question.";

/// Entity count plus pretty-printed entities, for the approval gate.
pub(crate) fn describe_entities<T: Serialize>(count: usize, kind: &str, entities: &T) -> String {
    let rendered = serde_json::to_string_pretty(entities)
        .unwrap_or_else(|_| "<unrenderable>".to_string());
    let plural = if count == 1 { "" } else { "s" };
    format!("Obtained {count} {kind}{plural}:\n{rendered}")
}
