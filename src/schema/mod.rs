//! Domain entity schemas — the closed vocabulary of job configuration.
//!
//! Every entity kind is a serde type with a unique `name` tag; polymorphic
//! kinds (actions, sources, solvers, gauge) are closed tagged-variant enums
//! discriminated by a `type` field. Cross-references between kinds hold the
//! referenced entity's name, never an inline structure.

pub mod observables;
pub mod actions;
pub mod sources;
pub mod solvers;
pub mod propagators;
pub mod contractions;
pub mod gauge;

pub use observables::{Observable, ObservableKind};
pub use actions::{Action, ActionParams};
pub use sources::{Source, SourceParams};
pub use solvers::{Solver, SolverParams};
pub use propagators::Propagator;
pub use contractions::Contraction;
pub use gauge::GaugeField;
