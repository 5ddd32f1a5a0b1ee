//! Accumulated job configuration state.
//!
//! One optional slot per stage, filled exactly once per run in stage order.
//! A slot is pending while `None`, committed once `Some`; committed slots
//! are never mutated. The whole struct is what the checkpoint store
//! persists and what the renderer consumes.

pub mod checkpoint;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{
    Action, Contraction, GaugeField, Observable, Propagator, Solver, Source,
};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("No checkpoint file at {0}")]
    NotFound(std::path::PathBuf),

    #[error("Checkpoint version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline stages in topological order. The discriminant order *is* the
/// dependency order the orchestrator walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Observables,
    Actions,
    Sources,
    Solvers,
    Propagators,
    Contractions,
    Gauge,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Observables => "observables",
            StageId::Actions => "actions",
            StageId::Sources => "sources",
            StageId::Solvers => "solvers",
            StageId::Propagators => "propagators",
            StageId::Contractions => "observable configurations",
            StageId::Gauge => "gauge field",
        }
    }

    /// All stages, in execution order.
    pub fn all() -> &'static [StageId] {
        &[
            StageId::Observables,
            StageId::Actions,
            StageId::Sources,
            StageId::Solvers,
            StageId::Propagators,
            StageId::Contractions,
            StageId::Gauge,
        ]
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full job configuration, slot per stage. Serialized as the
/// checkpoint payload, so field names are part of the on-disk format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub observables: Option<Vec<Observable>>,
    pub actions: Option<Vec<Action>>,
    pub sources: Option<Vec<Source>>,
    pub solvers: Option<Vec<Solver>>,
    pub propagators: Option<Vec<Propagator>>,
    pub contractions: Option<Vec<Contraction>>,
    pub gauge: Option<GaugeField>,
}

impl JobState {
    pub fn is_committed(&self, stage: StageId) -> bool {
        match stage {
            StageId::Observables => self.observables.is_some(),
            StageId::Actions => self.actions.is_some(),
            StageId::Sources => self.sources.is_some(),
            StageId::Solvers => self.solvers.is_some(),
            StageId::Propagators => self.propagators.is_some(),
            StageId::Contractions => self.contractions.is_some(),
            StageId::Gauge => self.gauge.is_some(),
        }
    }

    /// True once every slot is committed and the state is renderable.
    pub fn is_complete(&self) -> bool {
        StageId::all().iter().all(|s| self.is_committed(*s))
    }

    /// Stages still pending, in execution order.
    pub fn pending_stages(&self) -> Vec<StageId> {
        StageId::all()
            .iter()
            .copied()
            .filter(|s| !self.is_committed(*s))
            .collect()
    }

    // Committed-name namespaces, used for reference validation. An empty
    // namespace for an uncommitted slot is fine: stages only validate
    // references against stages that committed before them.

    pub fn observable_names(&self) -> Vec<&str> {
        names(&self.observables, |o: &Observable| &o.name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        names(&self.actions, |a: &Action| &a.name)
    }

    pub fn source_names(&self) -> Vec<&str> {
        names(&self.sources, |s: &Source| &s.name)
    }

    pub fn solver_names(&self) -> Vec<&str> {
        names(&self.solvers, |s: &Solver| &s.name)
    }

    pub fn propagator_names(&self) -> Vec<&str> {
        names(&self.propagators, |p: &Propagator| &p.name)
    }
}

fn names<'a, T>(slot: &'a Option<Vec<T>>, name: impl Fn(&'a T) -> &'a str) -> Vec<&'a str> {
    slot.as_deref()
        .map(|items| items.iter().map(name).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActionParams, ObservableKind};

    #[test]
    fn fresh_state_has_all_stages_pending() {
        let state = JobState::default();
        assert!(!state.is_complete());
        assert_eq!(state.pending_stages(), StageId::all().to_vec());
    }

    #[test]
    fn committing_a_slot_marks_the_stage() {
        let mut state = JobState::default();
        state.observables = Some(vec![Observable {
            name: "pion_a".into(),
            kind: ObservableKind::Pion2pt,
            user_info: String::new(),
        }]);

        assert!(state.is_committed(StageId::Observables));
        assert!(!state.is_committed(StageId::Actions));
        assert_eq!(state.observable_names(), vec!["pion_a"]);
    }

    #[test]
    fn uncommitted_namespace_is_empty() {
        let state = JobState::default();
        assert!(state.action_names().is_empty());
        assert!(state.propagator_names().is_empty());
    }

    #[test]
    fn stage_order_is_the_dependency_order() {
        let order = StageId::all();
        assert_eq!(order.first(), Some(&StageId::Observables));
        assert_eq!(order.last(), Some(&StageId::Gauge));
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn complete_state_detects_missing_gauge() {
        let mut state = JobState::default();
        state.observables = Some(vec![]);
        state.actions = Some(vec![Action {
            name: "dwf".into(),
            params: ActionParams::Dwf {
                ls: 12,
                mass: 0.01,
                m5: 1.8,
            },
        }]);
        state.sources = Some(vec![]);
        state.solvers = Some(vec![]);
        state.propagators = Some(vec![]);
        state.contractions = Some(vec![]);
        assert!(!state.is_complete());
        assert_eq!(state.pending_stages(), vec![StageId::Gauge]);
    }
}
