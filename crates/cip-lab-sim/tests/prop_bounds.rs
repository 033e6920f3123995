//! ---
//! cip_section: "15-testing-qa-runbook"
//! cip_subsection: "property-tests"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Property-based bound checks for the CIP simulator."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Random command/tick interleavings must never push the process outside its
//! physical envelope.

use cip_lab_sim::{
    advance, apply_command, ControlCommand, ProcessStage, ProcessState, SeededSampler,
    SimulationParams,
};
use proptest::prelude::*;

fn command_strategy() -> impl Strategy<Value = ControlCommand> {
    prop_oneof![
        Just(ControlCommand::StartTankRecirculation),
        Just(ControlCommand::StopTankRecirculation),
        Just(ControlCommand::StartTransfer),
        Just(ControlCommand::StopTransfer),
        any::<bool>().prop_map(ControlCommand::SetHeating),
        any::<bool>().prop_map(ControlCommand::SetAgitation),
        any::<bool>().prop_map(ControlCommand::SetReactorRecirculation),
        Just(ControlCommand::StartDrain),
        (-50.0f64..300.0).prop_map(ControlCommand::SetTargetTemperature),
        (-100.0f64..3_000.0).prop_map(ControlCommand::SetTargetRpm),
        Just(ControlCommand::Pause),
        Just(ControlCommand::Resume),
    ]
}

/// `None` is a tick, `Some` an operator command.
fn step_strategy() -> impl Strategy<Value = Option<ControlCommand>> {
    prop_oneof![
        3 => Just(None),
        1 => command_strategy().prop_map(Some),
    ]
}

proptest! {
    #[test]
    fn volumes_and_temperature_stay_in_range(
        seed in any::<u64>(),
        supply in 0.0f64..20.0,
        steps in prop::collection::vec(step_strategy(), 1..400),
    ) {
        let mut params = SimulationParams::default();
        params.process.initial_supply_l = supply;
        let mut sampler = SeededSampler::new(seed, &params.process);
        let mut state = ProcessState::initial(&params);
        let initial_total = state.measurements.total_liters();

        for step in steps {
            state = match step {
                None => advance(&state, &params, &mut sampler),
                Some(command) => apply_command(&state, &command, &params).0,
            };
            let m = &state.measurements;
            prop_assert!((0.0..=20.0).contains(&m.supply_tank_liters));
            prop_assert!((0.0..=6.0).contains(&m.reactor_liters));
            prop_assert!(m.total_liters() <= initial_total + 1e-6);
            prop_assert!(m.temperature_c >= 25.0 && m.temperature_c <= 125.0);
            prop_assert!(m.rpm >= 0.0);
            prop_assert!(m.conductivity_ms_cm >= 0.0);
            prop_assert!(state.cycle >= 1);
        }
    }

    #[test]
    fn ramps_never_overshoot_their_setpoints(
        seed in any::<u64>(),
        target_temp in 25.0f64..125.0,
        target_rpm in 0.0f64..1_500.0,
        ticks in 1usize..600,
    ) {
        let params = SimulationParams::default();
        let mut sampler = SeededSampler::new(seed, &params.process);
        let mut state = ProcessState::initial(&params);
        state.stage = ProcessStage::ReactorMixing;
        state.running = true;
        state.measurements.reactor_liters = 6.0;
        state.inputs.reactor_heating = true;
        state.inputs.reactor_agitating = true;
        state.inputs.target_temperature_c = target_temp;
        state.inputs.target_rpm = target_rpm;

        for _ in 0..ticks {
            state = advance(&state, &params, &mut sampler);
            if state.stage != ProcessStage::ReactorMixing {
                break;
            }
            prop_assert!(state.measurements.temperature_c <= target_temp);
            prop_assert!(state.measurements.rpm <= target_rpm);
        }
    }

    #[test]
    fn conductivity_never_rises_while_mixing(
        seed in any::<u64>(),
        agitating in any::<bool>(),
        heating in any::<bool>(),
        recirculating in any::<bool>(),
        ticks in 1usize..300,
    ) {
        let params = SimulationParams::default();
        let mut sampler = SeededSampler::new(seed, &params.process);
        let mut state = ProcessState::initial(&params);
        state.stage = ProcessStage::ReactorMixing;
        state.running = true;
        state.cycle = 2;
        state.measurements.reactor_liters = 6.0;
        state.inputs.reactor_agitating = agitating;
        state.inputs.reactor_heating = heating;
        state.inputs.reactor_recirculating = recirculating;

        let mut previous = state.measurements.conductivity_ms_cm;
        for _ in 0..ticks {
            state = advance(&state, &params, &mut sampler);
            prop_assert!(state.measurements.conductivity_ms_cm <= previous);
            previous = state.measurements.conductivity_ms_cm;
            if !state.running {
                prop_assert_eq!(state.stage, ProcessStage::Completed);
                break;
            }
        }
    }
}
