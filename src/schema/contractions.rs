use serde::{Deserialize, Serialize};

use super::observables::ObservableKind;

/// A configured observable: the contraction of a fixed pair of propagators.
///
/// `propagators` must name committed propagator instances — not sources or
/// solvers. The pair is ordered (quark and antiquark leg) and both entries
/// may name the same propagator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraction {
    /// Unique tag for this instance within the run.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObservableKind,
    /// Names of the two propagators to contract.
    pub propagators: [String; 2],
}
