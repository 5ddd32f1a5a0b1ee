//! The staged elicitation pipeline.
//!
//! A fixed sequence of stages turns the user's request into committed
//! entity collections: extract (LLM) → validate (structural) → approve
//! (human or proxy) → commit. Failures at each rung feed corrective turns
//! back into the transcript and re-run the extraction; nothing is ever
//! patched in place.

pub mod approval;
pub mod extract;
pub mod orchestrator;
pub mod transcript;
pub mod validate;

pub use approval::{Approver, PrompterApprover, ScriptedApprover, Verdict};
pub use extract::{Extraction, ExtractionFailure, ToolHandler};
pub use orchestrator::Orchestrator;
pub use transcript::{Transcript, Turn, TurnOrigin};

use thiserror::Error;

use crate::state::{StageId, StateError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed: {failure}")]
    Extraction {
        stage: StageId,
        #[source]
        failure: ExtractionFailure,
    },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),
}
