//! Stage orchestrator.
//!
//! Walks the stages in dependency order over one state and one transcript.
//! A stage whose slot is already committed (checkpoint resume) is skipped
//! outright; every committed stage — fresh or resumed — contributes the
//! same machine-readable summary turn, so a resumed transcript reads
//! exactly like an uninterrupted one. The checkpoint is saved after every
//! fresh commit; an unrecoverable stage failure therefore leaves it at the
//! last fully committed stage.

use crate::config::StrategyChoice;
use crate::console::Prompter;
use crate::llm::ChatClient;
use crate::pipeline::approval::Approver;
use crate::pipeline::transcript::Transcript;
use crate::pipeline::PipelineError;
use crate::stages::{
    actions::ActionsStage, contractions::ContractionsStage, elicit, gauge::GaugeStage,
    observables::ObservablesStage, propagators::PropagatorsStage, solvers::SolversStage,
    sources::SourcesStage, StageContext, StageSpec,
};
use crate::state::checkpoint::CheckpointStore;
use crate::state::{JobState, StageId};

pub struct Orchestrator<'a> {
    llm: &'a dyn ChatClient,
    model: &'a str,
    prompter: &'a mut dyn Prompter,
    approver: &'a mut dyn Approver,
    store: &'a CheckpointStore,
    strategy: StrategyChoice,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        llm: &'a dyn ChatClient,
        model: &'a str,
        prompter: &'a mut dyn Prompter,
        approver: &'a mut dyn Approver,
        store: &'a CheckpointStore,
        strategy: StrategyChoice,
    ) -> Self {
        Self {
            llm,
            model,
            prompter,
            approver,
            store,
            strategy,
        }
    }

    /// Drive every pending stage to a committed slot. On success the state
    /// is complete and checkpointed.
    pub fn run(
        &mut self,
        state: &mut JobState,
        transcript: &mut Transcript,
    ) -> Result<(), PipelineError> {
        for &stage in StageId::all() {
            if state.is_committed(stage) {
                tracing::info!(stage = %stage, "Stage already committed, skipping");
            } else {
                self.prompter.inform(&banner(stage));
                self.run_stage(stage, state, transcript)?;
                self.store.save(state)?;
                tracing::info!(stage = %stage, "Stage committed");
            }

            if let Some(summary) = summary_turn(stage, state) {
                transcript.push_system(summary);
            }
        }
        Ok(())
    }

    fn run_stage(
        &mut self,
        stage: StageId,
        state: &mut JobState,
        transcript: &mut Transcript,
    ) -> Result<(), PipelineError> {
        let mut ctx = StageContext {
            llm: self.llm,
            model: self.model,
            prompter: &mut *self.prompter,
            approver: &mut *self.approver,
            strategy: self.strategy,
        };

        match stage {
            StageId::Observables => {
                let spec = ObservablesStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Actions => {
                let spec = ActionsStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Sources => {
                let spec = SourcesStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Solvers => {
                let spec = SolversStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Propagators => {
                let spec = PropagatorsStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Contractions => {
                let spec = ContractionsStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
            StageId::Gauge => {
                let spec = GaugeStage;
                let collection = elicit(&spec, &mut ctx, state, transcript)?;
                spec.commit(collection, state);
            }
        }
        Ok(())
    }
}

fn banner(stage: StageId) -> String {
    format!(
        "\n======================\n{}\n======================",
        stage.as_str().to_uppercase()
    )
}

/// The committed-stage summary later stages read entity names from.
/// `None` until the stage's slot is committed.
fn summary_turn(stage: StageId, state: &JobState) -> Option<String> {
    fn dump<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unrenderable>".to_string())
    }

    match stage {
        StageId::Observables => state.observables.as_ref().map(|o| {
            format!(
                "The following information has been derived regarding the \
                 observables we need to compute based on user input:\n{}",
                dump(o)
            )
        }),
        StageId::Actions => state.actions.as_ref().map(|a| {
            format!(
                "The following action instances have been identified based on \
                 user input:\n{}",
                dump(a)
            )
        }),
        StageId::Sources => state.sources.as_ref().map(|s| {
            format!(
                "The following source instances have been identified based on \
                 user input:\n{}",
                dump(s)
            )
        }),
        StageId::Solvers => state.solvers.as_ref().map(|s| {
            format!(
                "The following solver instances have been identified based on \
                 user input:\n{}",
                dump(s)
            )
        }),
        StageId::Propagators => state.propagators.as_ref().map(|p| {
            format!(
                "The following propagator instances have been identified based \
                 on user input:\n{}",
                dump(p)
            )
        }),
        StageId::Contractions => state.contractions.as_ref().map(|c| {
            format!(
                "The following observable configurations have been identified \
                 based on user input:\n{}",
                dump(c)
            )
        }),
        StageId::Gauge => state.gauge.as_ref().map(|g| {
            format!(
                "The following gauge field configuration has been identified \
                 based on user input:\n{}",
                dump(g)
            )
        }),
    }
}
