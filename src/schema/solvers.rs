use serde::{Deserialize, Serialize};

fn default_max_iteration() -> u32 {
    10_000
}

/// Solver algorithm parameters, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverParams {
    /// Red-black preconditioned conjugate gradient.
    RbPrecCg {
        /// Stopping condition; typical values 1e-6 to 1e-9.
        residual: f64,
        /// Iteration cap, defaultable to 10000.
        #[serde(default = "default_max_iteration")]
        max_iteration: u32,
    },
}

impl SolverParams {
    pub fn type_name(&self) -> &'static str {
        match self {
            SolverParams::RbPrecCg { .. } => "rb_prec_cg",
        }
    }
}

/// A named solver instance bound to one action instance by name.
/// Every action instance needs at least one solver bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solver {
    /// Unique tag for this instance within the run.
    pub name: String,
    pub params: SolverParams,
    /// Name of the action instance this solver inverts.
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_iteration_defaults_when_omitted() {
        let solver: Solver = serde_json::from_str(
            r#"{"name": "cg_m0.01", "params": {"type": "rb_prec_cg", "residual": 1e-8}, "action": "dwf_m0.01"}"#,
        )
        .unwrap();
        assert_eq!(
            solver.params,
            SolverParams::RbPrecCg {
                residual: 1e-8,
                max_iteration: 10_000
            }
        );
        assert_eq!(solver.action, "dwf_m0.01");
    }

    #[test]
    fn explicit_max_iteration_is_kept() {
        let params: SolverParams = serde_json::from_str(
            r#"{"type": "rb_prec_cg", "residual": 1e-9, "max_iteration": 40000}"#,
        )
        .unwrap();
        assert!(matches!(
            params,
            SolverParams::RbPrecCg {
                max_iteration: 40_000,
                ..
            }
        ));
    }
}
