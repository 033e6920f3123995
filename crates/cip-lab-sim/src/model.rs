//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Process state, control inputs, and measurements."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use cip_lab_common::config::{AppConfig, PlantConfig, ProcessConfig};
use serde::{Deserialize, Serialize};

use crate::policy::DecayPolicy;
use crate::stage::ProcessStage;

/// Operator-controlled switches and set-points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlInputs {
    pub tank_recirculating: bool,
    pub transfer_active: bool,
    pub reactor_heating: bool,
    pub reactor_agitating: bool,
    pub reactor_recirculating: bool,
    pub target_temperature_c: f64,
    pub target_rpm: f64,
}

impl ControlInputs {
    pub fn new(target_temperature_c: f64, target_rpm: f64) -> Self {
        Self {
            tank_recirculating: false,
            transfer_active: false,
            reactor_heating: false,
            reactor_agitating: false,
            reactor_recirculating: false,
            target_temperature_c,
            target_rpm,
        }
    }

    /// Force every actuator switch off; set-points are kept.
    pub fn switch_off_all(&mut self) {
        self.tank_recirculating = false;
        self.transfer_active = false;
        self.switch_off_reactor();
    }

    pub fn switch_off_reactor(&mut self) {
        self.reactor_heating = false;
        self.reactor_agitating = false;
        self.reactor_recirculating = false;
    }

    pub fn any_switch_on(&self) -> bool {
        self.tank_recirculating
            || self.transfer_active
            || self.reactor_heating
            || self.reactor_agitating
            || self.reactor_recirculating
    }
}

/// Continuous process variables, derived each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMeasurements {
    pub supply_tank_liters: f64,
    pub reactor_liters: f64,
    pub temperature_c: f64,
    pub rpm: f64,
    pub conductivity_ms_cm: f64,
    /// Reference level of the current cycle for the automatic drain.
    pub conductivity_peak: f64,
}

impl ProcessMeasurements {
    pub fn initial(plant: &PlantConfig, process: &ProcessConfig) -> Self {
        Self {
            supply_tank_liters: process.initial_supply_l.clamp(0.0, plant.supply_capacity_l),
            reactor_liters: process.initial_reactor_l.clamp(0.0, plant.reactor_capacity_l),
            temperature_c: plant.ambient_c,
            rpm: 0.0,
            conductivity_ms_cm: process.initial_conductivity_ms_cm.max(0.0),
            conductivity_peak: process.initial_conductivity_ms_cm.max(0.0),
        }
    }

    pub fn total_liters(&self) -> f64 {
        self.supply_tank_liters + self.reactor_liters
    }
}

/// Complete state of one simulation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub stage: ProcessStage,
    pub inputs: ControlInputs,
    pub measurements: ProcessMeasurements,
    /// Elapsed ticks while running.
    pub tick: u64,
    /// 1-based cycle number, incremented when a drain empties the reactor.
    pub cycle: u32,
    pub running: bool,
    /// Latched by a manual stop; only a reset clears it.
    pub stopped: bool,
}

impl ProcessState {
    pub fn initial(params: &SimulationParams) -> Self {
        Self {
            stage: ProcessStage::Idle,
            inputs: ControlInputs::new(
                params
                    .process
                    .target_temperature_c
                    .clamp(params.plant.ambient_c, params.plant.temperature_max_c),
                params
                    .process
                    .target_rpm
                    .clamp(0.0, params.plant.rpm_setpoint_max),
            ),
            measurements: ProcessMeasurements::initial(&params.plant, &params.process),
            tick: 0,
            cycle: 1,
            running: false,
            stopped: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn description(&self) -> String {
        self.stage.description(self.cycle)
    }
}

/// Everything the simulator needs besides the state and the random source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationParams {
    pub plant: PlantConfig,
    pub process: ProcessConfig,
    pub decay: DecayPolicy,
}

impl SimulationParams {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            plant: config.plant.clone(),
            process: config.process.clone(),
            decay: DecayPolicy::default(),
        }
    }
}

/// One charted observation, appended once per running tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub tick: u64,
    pub temperature_c: f64,
    pub conductivity_ms_cm: f64,
    pub rpm: f64,
}

impl MetricSample {
    pub fn from_state(state: &ProcessState) -> Self {
        Self {
            tick: state.tick,
            temperature_c: state.measurements.temperature_c,
            conductivity_ms_cm: state.measurements.conductivity_ms_cm,
            rpm: state.measurements.rpm,
        }
    }
}
