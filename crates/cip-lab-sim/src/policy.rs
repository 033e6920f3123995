//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Conductivity decay policy table."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Conductivity decrement per tick (mS/cm) for each combination of active
/// reactor actuators. More actuators clean faster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    pub idle: f64,
    pub agitation: f64,
    pub heating: f64,
    pub recirculation: f64,
    pub agitation_heating: f64,
    pub agitation_recirculation: f64,
    pub heating_recirculation: f64,
    pub all: f64,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            idle: 0.005,
            agitation: 0.010,
            heating: 0.010,
            recirculation: 0.015,
            agitation_heating: 0.020,
            agitation_recirculation: 0.025,
            heating_recirculation: 0.025,
            all: 0.040,
        }
    }
}

impl DecayPolicy {
    pub fn rate(&self, agitating: bool, heating: bool, recirculating: bool) -> f64 {
        match (agitating, heating, recirculating) {
            (false, false, false) => self.idle,
            (true, false, false) => self.agitation,
            (false, true, false) => self.heating,
            (false, false, true) => self.recirculation,
            (true, true, false) => self.agitation_heating,
            (true, false, true) => self.agitation_recirculation,
            (false, true, true) => self.heating_recirculation,
            (true, true, true) => self.all,
        }
    }
}
