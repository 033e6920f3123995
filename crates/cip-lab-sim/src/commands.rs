//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Operator commands and their stage guards."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::model::{ProcessState, SimulationParams};
use crate::stage::ProcessStage;

/// Operator action issued from the dashboard, the CLI, or a script.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlCommand {
    StartTankRecirculation,
    StopTankRecirculation,
    StartTransfer,
    StopTransfer,
    SetHeating(bool),
    SetAgitation(bool),
    SetReactorRecirculation(bool),
    StartDrain,
    SetTargetTemperature(f64),
    SetTargetRpm(f64),
    Pause,
    Resume,
    Stop,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandOutcome {
    Applied,
    Ignored,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Build a command from its snake_case name and an optional textual argument.
    pub fn from_parts(name: &str, value: Option<&str>) -> Result<Self> {
        let flag = || -> Result<bool> {
            let raw = value.with_context(|| format!("command `{name}` requires a value"))?;
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(true),
                "false" | "off" | "0" => Ok(false),
                other => bail!("command `{name}` expects on/off, got `{other}`"),
            }
        };
        let number = || -> Result<f64> {
            let raw = value.with_context(|| format!("command `{name}` requires a value"))?;
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("command `{name}` expects a number, got `{raw}`"))
        };
        let command = match name.trim() {
            "start_tank_recirculation" => Self::StartTankRecirculation,
            "stop_tank_recirculation" => Self::StopTankRecirculation,
            "start_transfer" => Self::StartTransfer,
            "stop_transfer" => Self::StopTransfer,
            "set_heating" => Self::SetHeating(flag()?),
            "set_agitation" => Self::SetAgitation(flag()?),
            "set_reactor_recirculation" => Self::SetReactorRecirculation(flag()?),
            "start_drain" => Self::StartDrain,
            "set_target_temperature" => Self::SetTargetTemperature(number()?),
            "set_target_rpm" => Self::SetTargetRpm(number()?),
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "stop" => Self::Stop,
            "reset" => Self::Reset,
            other => bail!("unknown command `{other}`"),
        };
        Ok(command)
    }

    /// Commands still honoured after a manual stop.
    fn allowed_when_stopped(&self) -> bool {
        matches!(
            self,
            Self::SetTargetTemperature(_) | Self::SetTargetRpm(_) | Self::Reset
        )
    }
}

/// Apply `command` to `state`, returning the next state and whether anything changed.
///
/// Commands whose guard fails leave the state untouched and report
/// [`CommandOutcome::Ignored`].
pub fn apply_command(
    state: &ProcessState,
    command: &ControlCommand,
    params: &SimulationParams,
) -> (ProcessState, CommandOutcome) {
    if state.stopped && !command.allowed_when_stopped() {
        return (state.clone(), CommandOutcome::Ignored);
    }

    let plant = &params.plant;
    let mut next = state.clone();
    let m = &state.measurements;

    match *command {
        ControlCommand::StartTankRecirculation => {
            let stage_ok = state.stage == ProcessStage::Idle
                || (state.stage == ProcessStage::TankMixing && !state.inputs.tank_recirculating);
            if stage_ok && m.supply_tank_liters >= plant.supply_min_l {
                next.inputs.tank_recirculating = true;
                next.stage = ProcessStage::TankMixing;
                next.running = true;
            }
        }
        ControlCommand::StopTankRecirculation => {
            if state.stage == ProcessStage::TankMixing && state.inputs.tank_recirculating {
                next.inputs.tank_recirculating = false;
                next.stage = ProcessStage::TankMixed;
            }
        }
        ControlCommand::StartTransfer => {
            if state.stage == ProcessStage::TankMixed
                && m.supply_tank_liters >= plant.supply_min_l
                && m.reactor_liters < plant.reactor_capacity_l
            {
                next.inputs.transfer_active = true;
                next.stage = ProcessStage::Transferring;
            }
        }
        ControlCommand::StopTransfer => {
            if state.stage == ProcessStage::Transferring {
                next.inputs.transfer_active = false;
                next.stage = ProcessStage::TransferCompleted;
            }
        }
        ControlCommand::SetHeating(on) => {
            if reactor_switch_allowed(state, on, params) {
                next.inputs.reactor_heating = on;
            }
        }
        ControlCommand::SetAgitation(on) => {
            if reactor_switch_allowed(state, on, params) {
                next.inputs.reactor_agitating = on;
                promote_to_mixing(&mut next, on);
            }
        }
        ControlCommand::SetReactorRecirculation(on) => {
            if reactor_switch_allowed(state, on, params) {
                next.inputs.reactor_recirculating = on;
                promote_to_mixing(&mut next, on);
            }
        }
        ControlCommand::StartDrain => {
            if state.stage == ProcessStage::ReactorMixing {
                next.stage = ProcessStage::ReactorDraining;
                next.inputs.switch_off_reactor();
            }
        }
        ControlCommand::SetTargetTemperature(target) => {
            if !target.is_nan() {
                next.inputs.target_temperature_c =
                    target.clamp(plant.ambient_c, plant.temperature_max_c);
            }
        }
        ControlCommand::SetTargetRpm(target) => {
            if !target.is_nan() {
                next.inputs.target_rpm = target.clamp(0.0, plant.rpm_setpoint_max);
            }
        }
        ControlCommand::Pause => {
            next.running = false;
        }
        ControlCommand::Resume => {
            if !state.running && !matches!(state.stage, ProcessStage::Idle | ProcessStage::Completed)
            {
                next.running = true;
            }
        }
        ControlCommand::Stop => {
            if !matches!(state.stage, ProcessStage::Idle | ProcessStage::Completed) {
                next.running = false;
                next.stopped = true;
                next.inputs.switch_off_all();
            }
        }
        ControlCommand::Reset => {
            next = ProcessState::initial(params);
        }
    }

    // Reset reports Applied even on a pristine state.
    let outcome = if next != *state || matches!(command, ControlCommand::Reset) {
        CommandOutcome::Applied
    } else {
        CommandOutcome::Ignored
    };
    (next, outcome)
}

fn reactor_switch_allowed(state: &ProcessState, on: bool, params: &SimulationParams) -> bool {
    state.stage.accepts_reactor_controls()
        && (!on || state.measurements.reactor_liters >= params.plant.reactor_min_l)
}

fn promote_to_mixing(next: &mut ProcessState, enabled: bool) {
    if enabled && next.stage == ProcessStage::TransferCompleted {
        next.stage = ProcessStage::ReactorMixing;
    }
}
