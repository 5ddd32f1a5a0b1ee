use serde::{Deserialize, Serialize};

/// A propagator: one inversion, identified by its (source, solver) pair.
///
/// Observables sharing a (source, solver) pair share the propagator; the
/// propagator stage must not mint a second instance for the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propagator {
    /// Unique tag for this instance within the run.
    pub name: String,
    /// Name of the source instance feeding the inversion.
    pub source: String,
    /// Name of the solver instance performing the inversion.
    pub solver: String,
    /// What the user said about where this propagator is used, e.g. which
    /// leg of which two-point function. Empty if nothing was said.
    #[serde(default)]
    pub user_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_plain_names() {
        let prop: Propagator = serde_json::from_str(
            r#"{"name": "prop_wall_t0_m0.01", "source": "wall_t0", "solver": "cg_m0.01"}"#,
        )
        .unwrap();
        assert_eq!(prop.source, "wall_t0");
        assert_eq!(prop.solver, "cg_m0.01");
        assert!(prop.user_info.is_empty());
    }
}
