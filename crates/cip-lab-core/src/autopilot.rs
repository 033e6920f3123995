//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Reactive operator policy for headless sessions."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use cip_lab_sim::{ControlCommand, ProcessStage, ProcessState, SimulationParams};

/// Ticks the supply tank is recirculated before the transfer starts.
pub const DEFAULT_MIX_TICKS: u64 = 10;

/// Scripted operator that walks the process through every stage.
///
/// Each call to [`Autopilot::next_command`] looks at the current state and
/// proposes at most one command; callers apply it and ask again until the
/// policy has nothing left to do for this tick.
#[derive(Debug, Clone)]
pub struct Autopilot {
    mix_ticks: u64,
    mixing_since: Option<(u32, u64)>,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new(DEFAULT_MIX_TICKS)
    }
}

impl Autopilot {
    pub fn new(mix_ticks: u64) -> Self {
        Self {
            mix_ticks,
            mixing_since: None,
        }
    }

    pub fn next_command(
        &mut self,
        state: &ProcessState,
        params: &SimulationParams,
    ) -> Option<ControlCommand> {
        if state.stopped || state.is_completed() {
            return None;
        }
        let plant = &params.plant;
        let m = &state.measurements;
        let inputs = &state.inputs;

        if !state.running && state.stage != ProcessStage::Idle {
            return Some(ControlCommand::Resume);
        }

        match state.stage {
            ProcessStage::Idle => (m.supply_tank_liters >= plant.supply_min_l)
                .then_some(ControlCommand::StartTankRecirculation),
            ProcessStage::TankMixing => {
                if !inputs.tank_recirculating {
                    return Some(ControlCommand::StartTankRecirculation);
                }
                let (cycle, since) = *self
                    .mixing_since
                    .get_or_insert((state.cycle, state.tick));
                let since = if cycle == state.cycle {
                    since
                } else {
                    self.mixing_since = Some((state.cycle, state.tick));
                    state.tick
                };
                (state.tick.saturating_sub(since) >= self.mix_ticks)
                    .then_some(ControlCommand::StopTankRecirculation)
            }
            ProcessStage::TankMixed => {
                if m.supply_tank_liters >= plant.supply_min_l
                    && m.reactor_liters < plant.reactor_capacity_l
                {
                    Some(ControlCommand::StartTransfer)
                } else {
                    Some(ControlCommand::Stop)
                }
            }
            ProcessStage::Transferring => (m.reactor_liters >= plant.reactor_min_l
                && !inputs.reactor_heating)
                .then_some(ControlCommand::SetHeating(true)),
            ProcessStage::TransferCompleted => (m.reactor_liters >= plant.reactor_min_l)
                .then_some(ControlCommand::SetReactorRecirculation(true)),
            ProcessStage::ReactorMixing => {
                if m.reactor_liters < plant.reactor_min_l {
                    None
                } else if !inputs.reactor_heating {
                    Some(ControlCommand::SetHeating(true))
                } else if !inputs.reactor_agitating {
                    Some(ControlCommand::SetAgitation(true))
                } else if !inputs.reactor_recirculating {
                    Some(ControlCommand::SetReactorRecirculation(true))
                } else {
                    None
                }
            }
            ProcessStage::ReactorDraining | ProcessStage::Completed => None,
        }
    }
}
