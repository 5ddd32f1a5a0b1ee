use serde::{Deserialize, Serialize};

/// Fermion action parameters, discriminated by `type`. Closed set; adding a
/// new action is a closed-set extension here plus a render arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionParams {
    /// Domain Wall Fermion action.
    Dwf {
        /// Extent of the fifth dimension.
        #[serde(rename = "Ls")]
        ls: u32,
        /// Quark mass of the action and its propagators.
        mass: f64,
        #[serde(rename = "M5")]
        m5: f64,
    },
    /// Wilson-Clover (aka Clover) action.
    WilsonClover {
        mass: f64,
        /// Clover-term coefficient c_SW^r.
        csw_r: f64,
        /// Clover-term coefficient c_SW^t.
        csw_t: f64,
    },
}

impl ActionParams {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionParams::Dwf { .. } => "dwf",
            ActionParams::WilsonClover { .. } => "wilson_clover",
        }
    }
}

/// A named fermion action instance. One instance per unique parameter set;
/// two masses mean two instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique tag for this instance within the run.
    pub name: String,
    pub params: ActionParams,
}
