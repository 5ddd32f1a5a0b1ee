//! Stage 7: the gauge field the job runs on.

use serde::Deserialize;
use serde_json::json;

use super::{StageSpec, USER_QUERY_RULES};
use crate::llm::ToolSpec;
use crate::pipeline::extract::ToolHandler;
use crate::schema::GaugeField;
use crate::state::{JobState, StageId};

pub struct GaugeStage;

const GOAL: &str = "\
You are an assistant responsible for identifying the lattice QCD gauge \
configuration(s) to compute on, based solely on user input.

The options are:
- load: load NERSC-format configurations from disk. Needs the path stub \
(a period and the configuration index are appended during the run; if the \
user gives a complete path including an index, strip the period and index) \
and the first index, the increment, and the last index. If the user gives a \
range, infer start, step and end from it.
- unit: use a unit gauge configuration.
- random: use a random gauge configuration.

Your workflow:
1. Identify the configuration choice from user input. If the user has not \
specified what configuration(s) to use, you must ask the user. Never guess \
a gauge type.
2. Determine its parameters. If a parameter value is unknown, you must ask \
the user; never guess parameters.";

impl StageSpec for GaugeStage {
    type Collection = GaugeField;

    fn id(&self) -> StageId {
        StageId::Gauge
    }

    fn instruction(&self, _state: &JobState, tool_driven: bool) -> String {
        if tool_driven {
            format!(
                "{GOAL}\n\nRecord the choice with the matching set_* tool \
call.\n\n{USER_QUERY_RULES}"
            )
        } else {
            format!(
                "{GOAL}\n\nYour output must be a JSON object with one of these shapes:
{{\"type\": \"load\", \"stub\": \"<path stub>\", \"start\": <int>, \"step\": <int>, \"end\": <int>}}
{{\"type\": \"unit\"}}
{{\"type\": \"random\"}}"
            )
        }
    }

    fn tool_handler(&self) -> Option<Box<dyn ToolHandler>> {
        Some(Box::new(GaugeRecorder::default()))
    }

    fn validate(&self, collection: &Self::Collection, _state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        if let GaugeField::Load {
            stub, start, step, end,
        } = collection
        {
            if stub.trim().is_empty() {
                reasons.push("The gauge configuration path stub is empty".to_string());
            }
            if *step == 0 {
                reasons.push("The gauge configuration step must be positive".to_string());
            }
            if end < start {
                reasons.push(format!(
                    "The gauge configuration range is inverted ({start}..{end})"
                ));
            }
        }
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        let rendered = serde_json::to_string_pretty(collection)
            .unwrap_or_else(|_| "<unrenderable>".to_string());
        format!("Obtained gauge field parameters:\n{rendered}")
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.gauge = Some(collection);
    }
}

/// Scratch slot for the tool-driven strategy. The last set_* call wins,
/// matching how the model corrects itself mid-session.
#[derive(Default)]
struct GaugeRecorder {
    gauge: Option<GaugeField>,
}

#[derive(Deserialize)]
struct LoadArgs {
    stub: String,
    start: u32,
    step: u32,
    end: u32,
}

impl ToolHandler for GaugeRecorder {
    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "set_load_gauge".to_string(),
                description: "Load NERSC-format gauge configurations from disk."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "stub": {"type": "string", "description": "Path stub; '.<index>' is appended during the run"},
                        "start": {"type": "integer", "description": "Index of the first configuration"},
                        "step": {"type": "integer", "description": "Increment between successive configurations"},
                        "end": {"type": "integer", "description": "Index of the last configuration"}
                    },
                    "required": ["stub", "start", "step", "end"]
                }),
            },
            ToolSpec {
                name: "set_unit_gauge".to_string(),
                description: "Use a unit gauge configuration.".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolSpec {
                name: "set_random_gauge".to_string(),
                description: "Use a random gauge configuration.".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ]
    }

    fn call(&mut self, name: &str, args: &serde_json::Value) -> Result<String, String> {
        match name {
            "set_load_gauge" => {
                let args: LoadArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid set_load_gauge arguments: {e}"))?;
                self.gauge = Some(GaugeField::Load {
                    stub: args.stub,
                    start: args.start,
                    step: args.step,
                    end: args.end,
                });
                Ok("gauge configuration set to load".to_string())
            }
            "set_unit_gauge" => {
                self.gauge = Some(GaugeField::Unit);
                Ok("gauge configuration set to unit".to_string())
            }
            "set_random_gauge" => {
                self.gauge = Some(GaugeField::Random);
                Ok("gauge configuration set to random".to_string())
            }
            other => Err(format!("unknown tool '{other}'")),
        }
    }

    fn finish(&mut self) -> Result<serde_json::Value, String> {
        match &self.gauge {
            Some(gauge) => Ok(serde_json::to_value(gauge).expect("gauge serializes")),
            None => Err("no gauge configuration was recorded".to_string()),
        }
    }

    fn reset(&mut self) {
        self.gauge = None;
    }
}
