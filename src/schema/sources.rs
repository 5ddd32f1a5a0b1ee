use serde::{Deserialize, Serialize};

/// Propagator source parameters, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceParams {
    /// Point (single-location) source.
    Point {
        /// 4D lattice site of the source.
        location: [u32; 4],
    },
    /// Wall source on one timeslice; a wall-momentum source carries a
    /// four-momentum as well.
    Wall {
        timeslice: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        momentum: Option<[f64; 4]>,
    },
}

impl SourceParams {
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceParams::Point { .. } => "point",
            SourceParams::Wall { .. } => "wall",
        }
    }
}

/// A named source instance. Propagators may share one instance; a new
/// instance exists per unique parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique tag for this instance within the run.
    pub name: String,
    pub params: SourceParams,
    /// Names of the observable instances this source feeds.
    #[serde(default)]
    pub observables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_momentum_is_optional() {
        let plain: SourceParams =
            serde_json::from_str(r#"{"type": "wall", "timeslice": 32}"#).unwrap();
        assert_eq!(
            plain,
            SourceParams::Wall {
                timeslice: 32,
                momentum: None
            }
        );

        let with_mom: SourceParams = serde_json::from_str(
            r#"{"type": "wall", "timeslice": 32, "momentum": [1.0, 2.0, 3.0, 4.0]}"#,
        )
        .unwrap();
        assert!(matches!(
            with_mom,
            SourceParams::Wall {
                momentum: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn absent_momentum_is_not_serialized() {
        let json = serde_json::to_string(&SourceParams::Wall {
            timeslice: 0,
            momentum: None,
        })
        .unwrap();
        assert!(!json.contains("momentum"));
    }

    #[test]
    fn point_location_is_a_lattice_site() {
        let src: Source = serde_json::from_str(
            r#"{"name": "pt_0000", "params": {"type": "point", "location": [0, 0, 0, 0]}, "observables": ["vector_2pt"]}"#,
        )
        .unwrap();
        assert_eq!(
            src.params,
            SourceParams::Point {
                location: [0, 0, 0, 0]
            }
        );
        assert_eq!(src.observables, vec!["vector_2pt"]);
    }
}
