use serde::{Deserialize, Serialize};

/// Observable kinds the planner knows how to configure. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableKind {
    /// Pion two-point function.
    Pion2pt,
    /// Vector two-point function.
    Vector2pt,
}

impl ObservableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservableKind::Pion2pt => "pion2pt",
            ObservableKind::Vector2pt => "vector2pt",
        }
    }

    /// Number of propagators a single instance of this observable contracts.
    pub fn required_propagators(&self) -> usize {
        match self {
            ObservableKind::Pion2pt | ObservableKind::Vector2pt => 2,
        }
    }

    /// Background knowledge injected into extraction instructions.
    pub fn briefing(&self) -> &'static str {
        match self {
            ObservableKind::Pion2pt => {
                "The pion two-point function. Involves a contraction of two \
                 propagators, which may be the same."
            }
            ObservableKind::Vector2pt => {
                "The vector two-point function. Involves a contraction of two \
                 propagators, which may be the same."
            }
        }
    }

    pub fn all() -> &'static [ObservableKind] {
        &[ObservableKind::Pion2pt, ObservableKind::Vector2pt]
    }
}

/// One observable instance the user asked for.
///
/// `user_info` carries only what the user explicitly said about this
/// instance (propagator masses, momenta, smearing, …); later stages read
/// it from the transcript summary rather than guessing defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    /// Unique tag for this instance within the run.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObservableKind,
    /// Verbatim user-provided details, empty if none were given.
    #[serde(default)]
    pub user_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_is_snake_case() {
        let json = serde_json::to_string(&ObservableKind::Pion2pt).unwrap();
        assert_eq!(json, "\"pion2pt\"");
        let json = serde_json::to_string(&ObservableKind::Vector2pt).unwrap();
        assert_eq!(json, "\"vector2pt\"");
    }

    #[test]
    fn two_point_functions_need_two_propagators() {
        for kind in ObservableKind::all() {
            assert_eq!(kind.required_propagators(), 2);
        }
    }

    #[test]
    fn user_info_defaults_to_empty() {
        let obs: Observable =
            serde_json::from_str(r#"{"name": "pion_a", "type": "pion2pt"}"#).unwrap();
        assert_eq!(obs.kind, ObservableKind::Pion2pt);
        assert!(obs.user_info.is_empty());
    }
}
