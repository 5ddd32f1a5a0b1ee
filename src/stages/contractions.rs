//! Stage 6: configure each observable as a contraction of propagators.

use serde::{Deserialize, Serialize};

use super::{describe_entities, StageSpec};
use crate::pipeline::validate::check_unique_names;
use crate::schema::Contraction;
use crate::state::{JobState, StageId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractionSet {
    pub contractions: Vec<Contraction>,
}

pub struct ContractionsStage;

impl StageSpec for ContractionsStage {
    type Collection = ContractionSet;

    fn id(&self) -> StageId {
        StageId::Contractions
    }

    fn instruction(&self, _state: &JobState, _tool_driven: bool) -> String {
        "You are an assistant responsible for building the list of lattice QCD \
observable instances and their parameters from the conversation history.

Earlier stages identified the observables to compute and the available \
propagators. For each and every observable instance in that list you must \
determine the propagators used to compute it.

For every observable instance in the conversation history:
1. Read the user information and background knowledge recorded for it.
2. Identify the propagators required to compute it and note their \
names/tags. The entries of 'propagators' must be propagator instance tags — \
never source or solver tags.
3. Add one entry with the matching 'type' and the observable instance's \
name/tag.

Your list must include every identified observable instance and only those. \
Do not invent observables, do not combine observables, and do not add \
details the user did not provide. Do not invent or infer information not \
explicitly present in the conversation history.

Your output must be a JSON object with this shape:
{
  \"contractions\": [
    {\"name\": \"<observable instance tag>\", \"type\": \"pion2pt\" | \"vector2pt\", \
\"propagators\": [\"<propagator tag>\", \"<propagator tag>\"]}
  ]
}"
        .to_string()
    }

    fn validate(&self, collection: &Self::Collection, state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        let propagators = state.propagator_names();
        let sources = state.source_names();
        let solvers = state.solver_names();

        for contraction in &collection.contractions {
            if contraction.name.trim().is_empty() {
                reasons.push("An observable configuration has an empty name".to_string());
            }
            for reference in &contraction.propagators {
                let reference = reference.as_str();
                if propagators.contains(&reference) {
                    continue;
                }
                // The usual failure mode: the model grabs a source or
                // solver tag instead of the propagator built on it.
                if sources.contains(&reference) {
                    reasons.push(format!(
                        "'{reference}' is a source instance, not a propagator instance"
                    ));
                } else if solvers.contains(&reference) {
                    reasons.push(format!(
                        "'{reference}' is a solver instance, not a propagator instance"
                    ));
                } else {
                    reasons.push(format!("Propagator instance '{reference}' does not exist"));
                }
            }
        }
        check_unique_names(
            collection.contractions.iter().map(|c| c.name.as_str()),
            "Observable configuration",
            &mut reasons,
        );

        let expected = state.observables.as_deref().map(<[_]>::len).unwrap_or(0);
        if collection.contractions.len() != expected {
            reasons.push(format!(
                "Expected one configuration per identified observable ({} expected, {} given)",
                expected,
                collection.contractions.len()
            ));
        }
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(
            collection.contractions.len(),
            "observable configuration",
            &collection.contractions,
        )
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.contractions = Some(collection.contractions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Observable, ObservableKind, Propagator, Solver, SolverParams, Source, SourceParams,
    };

    fn populated_state() -> JobState {
        JobState {
            observables: Some(vec![
                Observable {
                    name: "pion_a".into(),
                    kind: ObservableKind::Pion2pt,
                    user_info: String::new(),
                },
                Observable {
                    name: "vector_a".into(),
                    kind: ObservableKind::Vector2pt,
                    user_info: String::new(),
                },
            ]),
            sources: Some(vec![Source {
                name: "wall_t0".into(),
                params: SourceParams::Wall {
                    timeslice: 0,
                    momentum: None,
                },
                observables: vec![],
            }]),
            solvers: Some(vec![Solver {
                name: "cg_m0.01".into(),
                params: SolverParams::RbPrecCg {
                    residual: 1e-8,
                    max_iteration: 10_000,
                },
                action: "dwf_m0.01".into(),
            }]),
            propagators: Some(vec![
                Propagator {
                    name: "prop_1".into(),
                    source: "wall_t0".into(),
                    solver: "cg_m0.01".into(),
                    user_info: String::new(),
                },
                Propagator {
                    name: "prop_2".into(),
                    source: "wall_t0".into(),
                    solver: "cg_m0.01".into(),
                    user_info: String::new(),
                },
            ]),
            ..JobState::default()
        }
    }

    fn contraction(name: &str, kind: ObservableKind, legs: [&str; 2]) -> Contraction {
        Contraction {
            name: name.to_string(),
            kind,
            propagators: [legs[0].to_string(), legs[1].to_string()],
        }
    }

    #[test]
    fn propagator_references_pass() {
        let stage = ContractionsStage;
        let set = ContractionSet {
            contractions: vec![
                contraction("pion_a", ObservableKind::Pion2pt, ["prop_1", "prop_2"]),
                contraction("vector_a", ObservableKind::Vector2pt, ["prop_1", "prop_1"]),
            ],
        };
        assert!(stage.validate(&set, &populated_state()).is_empty());
    }

    #[test]
    fn source_tag_in_place_of_propagator_is_called_out() {
        let stage = ContractionsStage;
        let set = ContractionSet {
            contractions: vec![
                contraction("pion_a", ObservableKind::Pion2pt, ["wall_t0", "prop_2"]),
                contraction("vector_a", ObservableKind::Vector2pt, ["prop_1", "prop_1"]),
            ],
        };
        let reasons = stage.validate(&set, &populated_state());
        assert_eq!(
            reasons,
            vec!["'wall_t0' is a source instance, not a propagator instance"]
        );
    }

    #[test]
    fn solver_tag_in_place_of_propagator_is_called_out() {
        let stage = ContractionsStage;
        let set = ContractionSet {
            contractions: vec![
                contraction("pion_a", ObservableKind::Pion2pt, ["cg_m0.01", "prop_2"]),
                contraction("vector_a", ObservableKind::Vector2pt, ["prop_1", "prop_1"]),
            ],
        };
        let reasons = stage.validate(&set, &populated_state());
        assert_eq!(
            reasons,
            vec!["'cg_m0.01' is a solver instance, not a propagator instance"]
        );
    }

    #[test]
    fn unknown_propagator_is_reported_plainly() {
        let stage = ContractionsStage;
        let set = ContractionSet {
            contractions: vec![
                contraction("pion_a", ObservableKind::Pion2pt, ["prop_9", "prop_2"]),
                contraction("vector_a", ObservableKind::Vector2pt, ["prop_1", "prop_1"]),
            ],
        };
        let reasons = stage.validate(&set, &populated_state());
        assert_eq!(reasons, vec!["Propagator instance 'prop_9' does not exist"]);
    }

    #[test]
    fn missing_observable_configuration_is_rejected() {
        let stage = ContractionsStage;
        let set = ContractionSet {
            contractions: vec![contraction(
                "pion_a",
                ObservableKind::Pion2pt,
                ["prop_1", "prop_2"],
            )],
        };
        let reasons = stage.validate(&set, &populated_state());
        assert_eq!(
            reasons,
            vec!["Expected one configuration per identified observable (2 expected, 1 given)"]
        );
    }
}
