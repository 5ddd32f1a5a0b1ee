//! Stage 4: identify the solver instances, one or more per action.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{describe_entities, StageSpec, USER_QUERY_RULES};
use crate::llm::ToolSpec;
use crate::pipeline::extract::ToolHandler;
use crate::pipeline::validate::{check_reference, check_unique_names};
use crate::schema::{Solver, SolverParams};
use crate::state::{JobState, StageId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSet {
    pub solvers: Vec<Solver>,
}

pub struct SolversStage;

const GOAL: &str = "\
You are an assistant responsible for identifying the solvers required for \
computing the lattice QCD propagators for the calculation.

A solver instance has algorithm parameters (stopping condition, iteration \
cap) and an 'action' field naming one of the previously identified action \
instances. Every action instance must have at least one solver instance \
bound to it. Create a separate instance per unique parameter set: one solver \
type over action instances 'action_1' and 'action_2' means two solver \
instances differing in their 'action' field.

The only available solver type is rb_prec_cg (red-black preconditioned \
conjugate gradient), with parameters:
- residual: the stopping condition; typical values are 1e-6 to 1e-9.
- max_iteration: iteration cap, DEFAULTABLE to 10000.

For each required solver:
1. Fill 'action' with the name of the associated action instance.
2. If the user does not specify a solver type and more than one is \
available, you must ask the user; with a single option take it. Never guess \
between multiple solver types.
3. Use exactly the parameters the user specified. If a parameter value is \
unknown, you must ask the user; never guess parameters unless they are \
marked DEFAULTABLE, in which case the default may be used.
4. Assign a unique tag/name to the instance, containing the action name and \
enough parameter values to distinguish it from the other instances, \
preferring shorter tags.

Solver instance rules:
- Create a separate entry per instance, even when the same solver appears \
multiple times with different parameters.
- Include every solver instance required, and only those. Do not invent \
instances; do not combine instances unless the user explicitly describes \
them as the same.";

impl StageSpec for SolversStage {
    type Collection = SolverSet;

    fn id(&self) -> StageId {
        StageId::Solvers
    }

    fn instruction(&self, _state: &JobState, tool_driven: bool) -> String {
        if tool_driven {
            format!(
                "{GOAL}\n\nRecord each solver instance with a \
record_rb_prec_cg_solver tool call.\n\n{USER_QUERY_RULES}"
            )
        } else {
            format!(
                "{GOAL}\n\nYour output must be a JSON object with this shape:
{{
  \"solvers\": [
    {{\"name\": \"<unique tag>\", \"params\": {{\"type\": \"rb_prec_cg\", \
\"residual\": <float>, \"max_iteration\": <int>}}, \"action\": \"<action tag>\"}}
  ]
}}"
            )
        }
    }

    fn tool_handler(&self) -> Option<Box<dyn ToolHandler>> {
        Some(Box::new(SolverRecorder::default()))
    }

    fn validate(&self, collection: &Self::Collection, state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        let actions = state.action_names();
        for solver in &collection.solvers {
            if solver.name.trim().is_empty() {
                reasons.push("A solver instance has an empty name".to_string());
            }
            check_reference(&solver.action, &actions, "Action", &mut reasons);
        }
        check_unique_names(
            collection.solvers.iter().map(|s| s.name.as_str()),
            "Solver",
            &mut reasons,
        );
        for action in &actions {
            if !collection.solvers.iter().any(|s| s.action == *action) {
                reasons.push(format!(
                    "Action instance '{action}' has no solver instance associated with it"
                ));
            }
        }
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(collection.solvers.len(), "solver", &collection.solvers)
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.solvers = Some(collection.solvers);
    }
}

/// Scratch collection for the tool-driven strategy.
#[derive(Default)]
struct SolverRecorder {
    solvers: Vec<Solver>,
}

#[derive(Deserialize)]
struct RbPrecCgArgs {
    name: String,
    residual: f64,
    #[serde(default)]
    max_iteration: Option<u32>,
    action: String,
}

impl ToolHandler for SolverRecorder {
    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "record_rb_prec_cg_solver".to_string(),
            description: "Add a red-black preconditioned CG solver instance \
bound to an action instance."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Unique tag for the instance"},
                    "residual": {"type": "number", "description": "Stopping condition, typically 1e-6 to 1e-9"},
                    "max_iteration": {"type": "integer", "description": "Iteration cap; omit for the default of 10000"},
                    "action": {"type": "string", "description": "Name of the action instance to invert"}
                },
                "required": ["name", "residual", "action"]
            }),
        }]
    }

    fn call(&mut self, name: &str, args: &serde_json::Value) -> Result<String, String> {
        match name {
            "record_rb_prec_cg_solver" => {
                let args: RbPrecCgArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid record_rb_prec_cg_solver arguments: {e}"))?;
                self.solvers.push(Solver {
                    name: args.name.clone(),
                    params: SolverParams::RbPrecCg {
                        residual: args.residual,
                        max_iteration: args.max_iteration.unwrap_or(10_000),
                    },
                    action: args.action,
                });
                Ok(format!("recorded solver instance '{}'", args.name))
            }
            other => Err(format!("unknown tool '{other}'")),
        }
    }

    fn finish(&mut self) -> Result<serde_json::Value, String> {
        Ok(json!({ "solvers": self.solvers }))
    }

    fn reset(&mut self) {
        self.solvers.clear();
    }
}
