//! Durable snapshots of the job state.
//!
//! One JSON file per run, overwritten after every stage commit so a crash
//! loses at most the in-flight stage. The write goes through a staging
//! file and an atomic rename; a torn write can never shadow a good
//! snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobState, StateError};

/// Bump when the snapshot layout changes incompatibly.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    state: JobState,
}

/// File-backed checkpoint store for one run.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the full state, committed and pending slots alike,
    /// overwriting any prior snapshot for the run.
    pub fn save(&self, state: &JobState) -> Result<(), StateError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, &json)?;
        fs::rename(&staging, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Reload a snapshot. Accepts files from earlier partial runs: any
    /// prefix of the stage order may be committed, the rest pending.
    pub fn load(&self) -> Result<JobState, StateError> {
        if !self.path.exists() {
            return Err(StateError::NotFound(self.path.clone()));
        }
        let json = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        tracing::info!(
            path = %self.path.display(),
            pending = snapshot.state.pending_stages().len(),
            "Checkpoint reloaded"
        );
        Ok(snapshot.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Action, ActionParams, Contraction, GaugeField, Observable, ObservableKind,
        Propagator, Solver, SolverParams, Source, SourceParams,
    };

    fn store_in(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("state.json"))
    }

    fn partial_state() -> JobState {
        JobState {
            observables: Some(vec![Observable {
                name: "pion_a".into(),
                kind: ObservableKind::Pion2pt,
                user_info: "mass 0.01 for both propagators".into(),
            }]),
            actions: Some(vec![Action {
                name: "dwf_m0.01".into(),
                params: ActionParams::Dwf {
                    ls: 12,
                    mass: 0.01,
                    m5: 1.8,
                },
            }]),
            ..JobState::default()
        }
    }

    fn full_state() -> JobState {
        let mut state = partial_state();
        state.sources = Some(vec![Source {
            name: "wall_t0".into(),
            params: SourceParams::Wall {
                timeslice: 0,
                momentum: None,
            },
            observables: vec!["pion_a".into()],
        }]);
        state.solvers = Some(vec![Solver {
            name: "cg_m0.01".into(),
            params: SolverParams::RbPrecCg {
                residual: 1e-8,
                max_iteration: 10_000,
            },
            action: "dwf_m0.01".into(),
        }]);
        state.propagators = Some(vec![Propagator {
            name: "prop_wall_t0_m0.01".into(),
            source: "wall_t0".into(),
            solver: "cg_m0.01".into(),
            user_info: "both legs of the pion".into(),
        }]);
        state.contractions = Some(vec![Contraction {
            name: "pion_a".into(),
            kind: ObservableKind::Pion2pt,
            propagators: ["prop_wall_t0_m0.01".into(), "prop_wall_t0_m0.01".into()],
        }]);
        state.gauge = Some(GaugeField::Unit);
        state
    }

    #[test]
    fn round_trips_a_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let state = partial_state();
        store.save(&state).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.pending_stages().first(),
            Some(&crate::state::StageId::Sources)
        );
    }

    #[test]
    fn round_trips_a_full_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let state = full_state();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn save_overwrites_prior_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&partial_state()).unwrap();
        let full = full_state();
        store.save(&full).unwrap();
        assert_eq!(store.load().unwrap(), full);
    }

    #[test]
    fn no_staging_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&partial_state()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("state.json")]);
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(StateError::NotFound(_))));
    }

    #[test]
    fn future_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"version": 99, "saved_at": "2026-01-01T00:00:00Z", "state": {}}"#,
        )
        .unwrap();

        let store = CheckpointStore::new(path);
        assert!(matches!(
            store.load(),
            Err(StateError::UnsupportedVersion {
                found: 99,
                expected: 1
            })
        ));
    }

    #[test]
    fn empty_slots_load_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&JobState::default()).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.is_complete());
        assert_eq!(loaded.pending_stages().len(), 7);
    }
}
