//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Published snapshot of a session after each tick or command."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use cip_lab_common::time::format_clock;
use serde::{Deserialize, Serialize};

use crate::model::{ControlInputs, ProcessMeasurements, ProcessState, SimulationParams};
use crate::stage::ProcessStage;
use crate::warnings::ProcessWarnings;

/// Everything a dashboard needs to render one moment of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFrame {
    pub lab_id: String,
    pub captured_at: DateTime<Utc>,
    pub tick: u64,
    /// Session clock rendered `MM:SS`, one tick per second.
    pub clock: String,
    pub cycle: u32,
    pub stage: ProcessStage,
    pub description: String,
    pub running: bool,
    pub stopped: bool,
    pub inputs: ControlInputs,
    pub measurements: ProcessMeasurements,
    pub warnings: ProcessWarnings,
}

impl SessionFrame {
    pub fn capture(lab_id: &str, state: &ProcessState, params: &SimulationParams) -> Self {
        Self {
            lab_id: lab_id.to_owned(),
            captured_at: Utc::now(),
            tick: state.tick,
            clock: format_clock(state.tick),
            cycle: state.cycle,
            stage: state.stage,
            description: state.description(),
            running: state.running,
            stopped: state.stopped,
            inputs: state.inputs.clone(),
            measurements: state.measurements.clone(),
            warnings: ProcessWarnings::evaluate(state, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reflects_state() {
        let params = SimulationParams::default();
        let mut state = ProcessState::initial(&params);
        state.tick = 75;
        state.stage = ProcessStage::TankMixing;
        let frame = SessionFrame::capture("cip-001", &state, &params);
        assert_eq!(frame.lab_id, "cip-001");
        assert_eq!(frame.clock, "01:15");
        assert_eq!(frame.stage, ProcessStage::TankMixing);
        assert!(frame.description.contains("Stage 1"));
        assert!(!frame.warnings.any());
    }
}
