//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Advisory warning flags derived from the process state."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::model::{ProcessState, SimulationParams};
use crate::stage::ProcessStage;

/// Display-only warnings, recomputed from the current state and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessWarnings {
    pub supply_level: bool,
    pub reactor_level: bool,
    pub temperature: bool,
    pub rpm: bool,
    pub conductivity: bool,
}

impl ProcessWarnings {
    pub fn evaluate(state: &ProcessState, params: &SimulationParams) -> Self {
        let m = &state.measurements;
        let plant = &params.plant;
        let process = &params.process;
        Self {
            supply_level: m.supply_tank_liters < plant.supply_min_l - m.reactor_liters,
            reactor_level: state.stage == ProcessStage::ReactorMixing
                && m.reactor_liters < plant.reactor_min_l,
            temperature: state.running
                && (m.temperature_c - state.inputs.target_temperature_c).abs()
                    > process.temperature_warning_band_c,
            rpm: m.rpm > plant.rpm_rated,
            conductivity: m.conductivity_ms_cm > process.conductivity_warning_ms_cm,
        }
    }

    pub fn any(&self) -> bool {
        self.supply_level || self.reactor_level || self.temperature || self.rpm || self.conductivity
    }

    /// Names of the raised warnings, in a stable order.
    pub fn active(&self) -> Vec<&'static str> {
        [
            ("supply_level", self.supply_level),
            ("reactor_level", self.reactor_level),
            ("temperature", self.temperature),
            ("rpm", self.rpm),
            ("conductivity", self.conductivity),
        ]
        .into_iter()
        .filter_map(|(name, raised)| raised.then_some(name))
        .collect()
    }
}
