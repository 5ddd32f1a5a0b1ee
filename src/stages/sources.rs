//! Stage 3: identify the propagator sources.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{describe_entities, StageSpec, USER_QUERY_RULES};
use crate::llm::ToolSpec;
use crate::pipeline::extract::ToolHandler;
use crate::pipeline::validate::{check_reference, check_unique_names};
use crate::schema::{Source, SourceParams};
use crate::state::{JobState, StageId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSet {
    pub sources: Vec<Source>,
}

pub struct SourcesStage;

const GOAL: &str = "\
You are an assistant responsible for identifying all lattice QCD propagator \
sources required for the calculation, based solely on user input.

A source instance has a source type (point or wall) and parameters that \
depend on the type. A wall source needs just a timeslice; a wall-momentum \
(aka \"momentum\") source needs a momentum as well. Every propagator needs a \
source, but propagators can share one source instance. Create a separate \
instance per unique parameter set: point sources at [0,0,0,0] and \
[12,24,12,24] are two instances.

For each required source:
1. Identify the source type. If the user does not specify one, you must ask \
the user. Never guess a source type.
2. Use exactly the parameters the user specified. If a parameter value is \
unknown, you must ask the user; never guess parameters.
3. Assign a unique tag/name to the instance, containing the source type and \
enough parameter values to distinguish it from the other instances, \
preferring shorter tags.
4. Record the names of the observable instances this source will be used for.

Source instance rules:
- Create a separate entry per instance, even when the same source type \
appears multiple times with different parameters.
- Include every source instance explicitly mentioned, and only those. Do not \
invent instances; do not combine instances unless the user explicitly \
describes them as the same.";

impl StageSpec for SourcesStage {
    type Collection = SourceSet;

    fn id(&self) -> StageId {
        StageId::Sources
    }

    fn instruction(&self, _state: &JobState, tool_driven: bool) -> String {
        if tool_driven {
            format!(
                "{GOAL}\n\nRecord each source instance with the matching \
record_* tool call.\n\n{USER_QUERY_RULES}"
            )
        } else {
            format!(
                "{GOAL}\n\nYour output must be a JSON object with this shape:
{{
  \"sources\": [
    {{\"name\": \"<unique tag>\", \"params\": {{\"type\": \"point\", \
\"location\": [<int>, <int>, <int>, <int>]}}, \"observables\": [\"<observable tag>\"]}},
    {{\"name\": \"<unique tag>\", \"params\": {{\"type\": \"wall\", \
\"timeslice\": <int>, \"momentum\": [<float>, <float>, <float>, <float>]}}, \
\"observables\": [\"<observable tag>\"]}}
  ]
}}
Omit \"momentum\" for a plain wall source."
            )
        }
    }

    fn tool_handler(&self) -> Option<Box<dyn ToolHandler>> {
        Some(Box::new(SourceRecorder::default()))
    }

    fn validate(&self, collection: &Self::Collection, state: &JobState) -> Vec<String> {
        let mut reasons = Vec::new();
        let observables = state.observable_names();
        for source in &collection.sources {
            if source.name.trim().is_empty() {
                reasons.push("A source instance has an empty name".to_string());
            }
            for obs in &source.observables {
                check_reference(obs, &observables, "Observable", &mut reasons);
            }
        }
        check_unique_names(
            collection.sources.iter().map(|s| s.name.as_str()),
            "Source",
            &mut reasons,
        );
        reasons
    }

    fn describe(&self, collection: &Self::Collection) -> String {
        describe_entities(collection.sources.len(), "source", &collection.sources)
    }

    fn commit(&self, collection: Self::Collection, state: &mut JobState) {
        state.sources = Some(collection.sources);
    }
}

/// Scratch collection for the tool-driven strategy.
#[derive(Default)]
struct SourceRecorder {
    sources: Vec<Source>,
}

#[derive(Deserialize)]
struct PointArgs {
    name: String,
    location: [u32; 4],
    #[serde(default)]
    observables: Vec<String>,
}

#[derive(Deserialize)]
struct WallArgs {
    name: String,
    timeslice: u32,
    #[serde(default)]
    momentum: Option<[f64; 4]>,
    #[serde(default)]
    observables: Vec<String>,
}

impl ToolHandler for SourceRecorder {
    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "record_point_source".to_string(),
                description: "Add a point (single-location) source instance.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Unique tag for the instance"},
                        "location": {
                            "type": "array",
                            "items": {"type": "integer"},
                            "minItems": 4,
                            "maxItems": 4,
                            "description": "4D lattice site of the source"
                        },
                        "observables": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Observable instance tags this source feeds"
                        }
                    },
                    "required": ["name", "location", "observables"]
                }),
            },
            ToolSpec {
                name: "record_wall_source".to_string(),
                description: "Add a wall or wall-momentum source instance.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Unique tag for the instance"},
                        "timeslice": {"type": "integer", "description": "Timeslice of the wall"},
                        "momentum": {
                            "type": "array",
                            "items": {"type": "number"},
                            "minItems": 4,
                            "maxItems": 4,
                            "description": "Optional four-momentum; omit for a plain wall"
                        },
                        "observables": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Observable instance tags this source feeds"
                        }
                    },
                    "required": ["name", "timeslice", "observables"]
                }),
            },
        ]
    }

    fn call(&mut self, name: &str, args: &serde_json::Value) -> Result<String, String> {
        match name {
            "record_point_source" => {
                let args: PointArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid record_point_source arguments: {e}"))?;
                self.sources.push(Source {
                    name: args.name.clone(),
                    params: SourceParams::Point {
                        location: args.location,
                    },
                    observables: args.observables,
                });
                Ok(format!("recorded source instance '{}'", args.name))
            }
            "record_wall_source" => {
                let args: WallArgs = serde_json::from_value(args.clone())
                    .map_err(|e| format!("invalid record_wall_source arguments: {e}"))?;
                self.sources.push(Source {
                    name: args.name.clone(),
                    params: SourceParams::Wall {
                        timeslice: args.timeslice,
                        momentum: args.momentum,
                    },
                    observables: args.observables,
                });
                Ok(format!("recorded source instance '{}'", args.name))
            }
            other => Err(format!("unknown tool '{other}'")),
        }
    }

    fn finish(&mut self) -> Result<serde_json::Value, String> {
        Ok(json!({ "sources": self.sources }))
    }

    fn reset(&mut self) {
        self.sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Observable, ObservableKind};

    fn state_with_observables(names: &[&str]) -> JobState {
        JobState {
            observables: Some(
                names
                    .iter()
                    .map(|n| Observable {
                        name: n.to_string(),
                        kind: ObservableKind::Pion2pt,
                        user_info: String::new(),
                    })
                    .collect(),
            ),
            ..JobState::default()
        }
    }

    fn wall(name: &str, timeslice: u32, observables: &[&str]) -> Source {
        Source {
            name: name.to_string(),
            params: SourceParams::Wall {
                timeslice,
                momentum: None,
            },
            observables: observables.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn valid_sources_pass() {
        let stage = SourcesStage;
        let set = SourceSet {
            sources: vec![wall("wall_t0", 0, &["pion_a"]), wall("wall_t32", 32, &["pion_a"])],
        };
        assert!(stage
            .validate(&set, &state_with_observables(&["pion_a"]))
            .is_empty());
    }

    #[test]
    fn unknown_observable_association_is_rejected() {
        let stage = SourcesStage;
        let set = SourceSet {
            sources: vec![wall("wall_t0", 0, &["rho_a"])],
        };
        let reasons = stage.validate(&set, &state_with_observables(&["pion_a"]));
        assert_eq!(reasons, vec!["Observable instance 'rho_a' does not exist"]);
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let stage = SourcesStage;
        let set = SourceSet {
            sources: vec![wall("wall", 0, &[]), wall("wall", 32, &[])],
        };
        let reasons = stage.validate(&set, &state_with_observables(&[]));
        assert_eq!(reasons, vec!["Source name 'wall' is not unique"]);
    }

    #[test]
    fn recorder_handles_momentum_and_plain_walls() {
        let mut recorder = SourceRecorder::default();
        recorder
            .call(
                "record_wall_source",
                &json!({"name": "wall_t0", "timeslice": 0, "observables": ["pion_a"]}),
            )
            .unwrap();
        recorder
            .call(
                "record_wall_source",
                &json!({
                    "name": "wallp_t32",
                    "timeslice": 32,
                    "momentum": [1.0, 2.0, 3.0, 4.0],
                    "observables": ["pion_b"]
                }),
            )
            .unwrap();

        let set: SourceSet = serde_json::from_value(recorder.finish().unwrap()).unwrap();
        assert!(matches!(
            set.sources[0].params,
            SourceParams::Wall { momentum: None, .. }
        ));
        assert!(matches!(
            set.sources[1].params,
            SourceParams::Wall {
                momentum: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn recorder_rejects_short_location() {
        let mut recorder = SourceRecorder::default();
        let err = recorder
            .call(
                "record_point_source",
                &json!({"name": "pt", "location": [0, 0, 0], "observables": []}),
            )
            .unwrap_err();
        assert!(err.contains("record_point_source"));
    }
}
