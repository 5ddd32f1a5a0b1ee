//! Stage 1: identify the observables the user wants computed.

use serde::{Deserialize, Serialize};

use super::{describe_entities, StageSpec};
use crate::pipeline::validate::check_unique_names;
use crate::schema::{Observable, ObservableKind};
use crate::state::{JobState, StageId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableSet {
    pub observables: Vec<Observable>,
}

pub struct ObservablesStage;

impl StageSpec for ObservablesStage {
    type Collection = ObservableSet;

    fn id(&self) -> StageId {
        StageId::Observables
    }

    fn instruction(&self, _state: &JobState, _tool_driven: bool) -> String {
        let mut kinds = String::new();
        for kind in ObservableKind::all() {
            kinds.push_str(&format!("- {}: {}\n", kind.as_str(), kind.briefing()));
        }

        format!(
            "You are an assistant responsible for identifying all lattice QCD \
observables the user wants to compute, and extracting only the information \
explicitly provided by the user that is relevant to computing each one.

You will receive the user's original request and the conversation so far. \
Read only this content and produce a structured list of observables. Do not \
invent, infer, or assume anything the user did not explicitly state.

Known observable types:
{kinds}
For each observable mentioned by the user:
- Create a separate entry per instance, even if the same observable appears \
multiple times with different parameters or conditions.
- Assign a unique name/tag to each instance.
- In user_info, summarize only what the user clearly provided about that \
specific instance: required propagators, operator insertions, quantum numbers \
or kinematic parameters, anything else explicitly tied to the computation. \
Leave it empty rather than guessing or filling in defaults.

Your list must include every observable explicitly mentioned, and only those. \
Do not combine instances unless the user explicitly describes them as the same.

Your output must be a JSON object with this shape:
{{
  \"observables\": [
    {{\"name\": \"<unique tag>\", \"type\": \"pion2pt\" | \"vector2pt\", \
\"user_info\": \"<details given by the user, empty if none>\"}}
  ]
}}"
        )
    }

    fn validate(&self, collection: &Self::Collection, _state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        for obs in &collection.observables {
            if obs.name.trim().is_empty() {
                reasons.push("An observable instance has an empty name".to_string());
            }
        }
        check_unique_names(
            collection.observables.iter().map(|o| o.name.as_str()),
            "Observable",
            &mut reasons,
        );
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(
            collection.observables.len(),
            "observable",
            &collection.observables,
        )
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.observables = Some(collection.observables);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ObservableSet {
        ObservableSet {
            observables: names
                .iter()
                .map(|n| Observable {
                    name: n.to_string(),
                    kind: ObservableKind::Pion2pt,
                    user_info: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn distinct_names_pass() {
        let stage = ObservablesStage;
        assert!(stage
            .validate(&set(&["pion_a", "pion_b"]), &JobState::default())
            .is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let stage = ObservablesStage;
        let reasons = stage.validate(&set(&["pion_a", "pion_a"]), &JobState::default());
        assert_eq!(reasons, vec!["Observable name 'pion_a' is not unique"]);
    }

    #[test]
    fn empty_name_is_rejected() {
        let stage = ObservablesStage;
        let reasons = stage.validate(&set(&[""]), &JobState::default());
        assert_eq!(reasons, vec!["An observable instance has an empty name"]);
    }

    #[test]
    fn instruction_lists_every_known_kind() {
        let stage = ObservablesStage;
        let instruction = stage.instruction(&JobState::default(), false);
        for kind in ObservableKind::all() {
            assert!(instruction.contains(kind.as_str()));
        }
    }

    #[test]
    fn commit_fills_the_observables_slot() {
        let stage = ObservablesStage;
        let mut state = JobState::default();
        stage.commit(set(&["pion_a"]), &mut state);
        assert_eq!(state.observable_names(), vec!["pion_a"]);
    }
}
