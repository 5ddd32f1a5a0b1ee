//! Stage 2: identify the fermion action instances behind the propagators.
//!
//! Defaults to the tool-driven strategy: the model records one action per
//! tool call and may question the user about unspecified types or
//! parameters instead of guessing them.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{describe_entities, StageSpec, USER_QUERY_RULES};
use crate::pipeline::extract::ToolHandler;
use crate::pipeline::validate::check_unique_names;
use crate::schema::{Action, ActionParams};
use crate::state::{JobState, StageId};
use crate::llm::ToolSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSet {
    pub actions: Vec<Action>,
}

pub struct ActionsStage;

const GOAL: &str = "\
You are an assistant responsible for identifying all lattice QCD action \
instances required to compute the propagators for the calculation, based \
solely on user input.

An action instance has an action type (dwf or wilson_clover) and a set of \
parameters including the quark mass. Create a separate instance per unique \
parameter set: DWF propagators with Ls=12, M5=1.8 and masses 0.03 and 0.05 \
mean two instances differing in mass.

For each required action:
1. Identify the action type. If the user does not specify one, you must ask \
the user. Never guess an action type.
2. Use exactly the parameters the user specified. If a parameter value is \
unknown, you must ask the user; never guess parameters.
3. Assign a unique tag/name to the instance, containing the action type and \
enough parameter values to distinguish it from the other instances, \
preferring shorter tags.

Action instance rules:
- Create a separate entry per instance, even when the same action appears \
multiple times with different parameters.
- Include every action instance explicitly mentioned, and only those. Do not \
invent instances; do not combine instances unless the user explicitly \
describes them as the same.";

impl StageSpec for ActionsStage {
    type Collection = ActionSet;

    fn id(&self) -> StageId {
        StageId::Actions
    }

    fn instruction(&self, _state: &JobState, tool_driven: bool) -> String {
        if tool_driven {
            format!(
                "{GOAL}\n\nRecord each action instance with the matching \
record_* tool call.\n\n{USER_QUERY_RULES}"
            )
        } else {
            format!(
                "{GOAL}\n\nYour output must be a JSON object with this shape:
{{
  \"actions\": [
    {{\"name\": \"<unique tag>\", \"params\": {{\"type\": \"dwf\", \
\"Ls\": <int>, \"mass\": <float>, \"M5\": <float>}}}},
    {{\"name\": \"<unique tag>\", \"params\": {{\"type\": \"wilson_clover\", \
\"mass\": <float>, \"csw_r\": <float>, \"csw_t\": <float>}}}}
  ]
}}"
            )
        }
    }

    fn tool_handler(&self) -> Option<Box<dyn ToolHandler>> {
        Some(Box::new(ActionRecorder::default()))
    }

    fn validate(&self, collection: &Self::Collection, _state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        for action in &collection.actions {
            if action.name.trim().is_empty() {
                reasons.push("An action instance has an empty name".to_string());
            }
        }
        check_unique_names(
            collection.actions.iter().map(|a| a.name.as_str()),
            "Action",
            &mut reasons,
        );
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(
            collection.actions.len(),
            "action instance",
            &collection.actions,
        )
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.actions = Some(collection.actions);
    }
}

/// Scratch collection for the tool-driven strategy.
#[derive(Default)]
struct ActionRecorder {
    actions: Vec<Action>,
}

#[derive(Deserialize)]
struct DwfArgs {
    name: String,
    #[serde(rename = "Ls")]
    ls: u32,
    mass: f64,
    #[serde(rename = "M5")]
    m5: f64,
}

#[derive(Deserialize)]
struct WilsonCloverArgs {
    name: String,
    mass: f64,
    csw_r: f64,
    csw_t: f64,
}

impl ToolHandler for ActionRecorder {
    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "record_dwf_action".to_string(),
                description: "Add a Domain Wall Fermion (DWF) action instance."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Unique tag for the instance"},
                        "Ls": {"type": "integer", "description": "Extent of the fifth dimension"},
                        "mass": {"type": "number", "description": "Quark mass of the action and its propagators"},
                        "M5": {"type": "number", "description": "The M5 parameter of the action"}
                    },
                    "required": ["name", "Ls", "mass", "M5"]
                }),
            },
            ToolSpec {
                name: "record_wilson_clover_action".to_string(),
                description: "Add a Wilson-Clover action instance.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Unique tag for the instance"},
                        "mass": {"type": "number", "description": "Quark mass of the action and its propagators"},
                        "csw_r": {"type": "number", "description": "Clover-term coefficient c_SW^r"},
                        "csw_t": {"type": "number", "description": "Clover-term coefficient c_SW^t"}
                    },
                    "required": ["name", "mass", "csw_r", "csw_t"]
                }),
            },
        ]
    }

    fn call(&mut self, name: &str, args: &serde_json::Value) -> Result<String, String> {
        match name {
            "record_dwf_action" => {
                let args: DwfArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid record_dwf_action arguments: {e}"))?;
                self.actions.push(Action {
                    name: args.name.clone(),
                    params: ActionParams::Dwf {
                        ls: args.ls,
                        mass: args.mass,
                        m5: args.m5,
                    },
                });
                Ok(format!("recorded action instance '{}'", args.name))
            }
            "record_wilson_clover_action" => {
                let args: WilsonCloverArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid record_wilson_clover_action arguments: {e}"))?;
                self.actions.push(Action {
                    name: args.name.clone(),
                    params: ActionParams::WilsonClover {
                        mass: args.mass,
                        csw_r: args.csw_r,
                        csw_t: args.csw_t,
                    },
                });
                Ok(format!("recorded action instance '{}'", args.name))
            }
            other => Err(format!("unknown tool '{other}'")),
        }
    }

    fn finish(&mut self) -> Result<serde_json::Value, String> {
        Ok(json!({ "actions": self.actions }))
    }

    fn reset(&mut self) {
        self.actions.clear();
    }
}
