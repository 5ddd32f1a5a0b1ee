use serde::{Deserialize, Serialize};

/// Gauge field configuration — the execution environment of the run.
/// Exactly one per job; it also fixes the trajectory range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GaugeField {
    /// Load NERSC-format configurations from disk. The engine appends
    /// `.<index>` to the stub while looping over trajectories.
    Load {
        stub: String,
        /// Index of the first configuration.
        start: u32,
        /// Increment between successive configurations.
        step: u32,
        /// Index of the last configuration.
        end: u32,
    },
    /// Unit gauge field.
    Unit,
    /// Random gauge field.
    Random,
}

impl GaugeField {
    pub fn type_name(&self) -> &'static str {
        match self {
            GaugeField::Load { .. } => "load",
            GaugeField::Unit => "unit",
            GaugeField::Random => "random",
        }
    }

    /// (start, end, step) for the engine's trajectory counter. Synthetic
    /// fields run a single pseudo-trajectory.
    pub fn trajectory_range(&self) -> (u32, u32, u32) {
        match self {
            GaugeField::Load { start, step, end, .. } => (*start, *end, *step),
            GaugeField::Unit | GaugeField::Random => (0, 1, 1),
        }
    }
}
