//! Stage 5: derive the propagators from the committed sources and solvers.
//!
//! Pure cross-referencing over the transcript summaries, so the structured
//! strategy is the only one offered: there is nothing left to ask the user.

use serde::{Deserialize, Serialize};

use super::{describe_entities, StageSpec};
use crate::pipeline::validate::{check_reference, check_unique_names};
use crate::schema::Propagator;
use crate::state::{JobState, StageId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagatorSet {
    pub propagators: Vec<Propagator>,
}

pub struct PropagatorsStage;

impl StageSpec for PropagatorsStage {
    type Collection = PropagatorSet;

    fn id(&self) -> StageId {
        StageId::Propagators
    }

    fn instruction(&self, _state: &JobState, _tool_driven: bool) -> String {
        "You are responsible for identifying the lattice QCD propagators for \
the calculation, each with its associated source and solver.

A propagator instance has 'source' and 'solver' fields that must name one of \
the source and solver instances identified previously.

First identify the set of required propagators: iterate over each previously \
identified observable instance, noting how many propagators it requires and \
any other relevant information. Then use the conversation history to find \
the source and solver combination that uniquely specifies each propagator \
those observables need. Do not specify more propagators than the observables \
require.

If more than one observable requires a propagator with the same \
source/solver combination, reuse the propagator; never create more \
propagators than needed.

For each required propagator:
1. Fill 'source' with the name of the associated source instance.
2. Fill 'solver' with the name of the associated solver instance. To \
identify it, combine the solver instance's parameters with those of its \
associated action instance (named in its 'action' field).
3. Assign a unique tag/name to the instance, containing the source and \
solver names.
4. In user_info, summarize anything the user said about where this \
propagator is used, including positional information — for example that it \
is the first or second leg of a two-point function, or a spectator quark in \
a baryon. Use an empty string if nothing was said.

Propagator instance rules:
- Include every propagator the observables require, and only those. Do not \
invent instances.

Your output must be a JSON object with this shape:
{
  \"propagators\": [
    {\"name\": \"<unique tag>\", \"source\": \"<source tag>\", \
\"solver\": \"<solver tag>\", \"user_info\": \"<usage notes, empty if none>\"}
  ]
}"
        .to_string()
    }

    fn validate(&self, collection: &Self::Collection, state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        let sources = state.source_names();
        let solvers = state.solver_names();
        for prop in &collection.propagators {
            if prop.name.trim().is_empty() {
                reasons.push("A propagator instance has an empty name".to_string());
            }
            check_reference(&prop.source, &sources, "Source", &mut reasons);
            check_reference(&prop.solver, &solvers, "Solver", &mut reasons);
        }
        check_unique_names(
            collection.propagators.iter().map(|p| p.name.as_str()),
            "Propagator",
            &mut reasons,
        );
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(
            collection.propagators.len(),
            "propagator",
            &collection.propagators,
        )
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.propagators = Some(collection.propagators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Solver, SolverParams, Source, SourceParams};

    fn state_with(sources: &[&str], solvers: &[&str]) -> JobState {
        JobState {
            sources: Some(
                sources
                    .iter()
                    .map(|n| Source {
                        name: n.to_string(),
                        params: SourceParams::Wall {
                            timeslice: 0,
                            momentum: None,
                        },
                        observables: vec![],
                    })
                    .collect(),
            ),
            solvers: Some(
                solvers
                    .iter()
                    .map(|n| Solver {
                        name: n.to_string(),
                        params: SolverParams::RbPrecCg {
                            residual: 1e-8,
                            max_iteration: 10_000,
                        },
                        action: "act".to_string(),
                    })
                    .collect(),
            ),
            ..JobState::default()
        }
    }

    fn prop(name: &str, source: &str, solver: &str) -> Propagator {
        Propagator {
            name: name.to_string(),
            source: source.to_string(),
            solver: solver.to_string(),
            user_info: String::new(),
        }
    }

    #[test]
    fn resolvable_references_pass() {
        let stage = PropagatorsStage;
        let set = PropagatorSet {
            propagators: vec![
                prop("p1", "wall_t0", "cg_a"),
                prop("p2", "wall_t32", "cg_b"),
            ],
        };
        let state = state_with(&["wall_t0", "wall_t32"], &["cg_a", "cg_b"]);
        assert!(stage.validate(&set, &state).is_empty());
    }

    #[test]
    fn absent_source_is_named_in_the_reason() {
        let stage = PropagatorsStage;
        let set = PropagatorSet {
            propagators: vec![prop("p1", "wall_t48", "cg_a")],
        };
        let state = state_with(&["wall_t0"], &["cg_a"]);
        let reasons = stage.validate(&set, &state);
        assert_eq!(reasons, vec!["Source instance 'wall_t48' does not exist"]);
    }

    #[test]
    fn absent_solver_and_duplicate_name_both_reported() {
        let stage = PropagatorsStage;
        let set = PropagatorSet {
            propagators: vec![prop("p1", "wall_t0", "cg_ghost"), prop("p1", "wall_t0", "cg_a")],
        };
        let state = state_with(&["wall_t0"], &["cg_a"]);
        let reasons = stage.validate(&set, &state);
        assert_eq!(
            reasons,
            vec![
                "Solver instance 'cg_ghost' does not exist",
                "Propagator name 'p1' is not unique"
            ]
        );
    }
}
