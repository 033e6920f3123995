//! ---
//! cip_section: "15-testing-qa-runbook"
//! cip_subsection: "integration-tests"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "End-to-end process scenarios for the CIP simulator."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use cip_lab_sim::{
    advance, apply_command, CommandOutcome, ControlCommand, FixedSampler, ProcessStage,
    ProcessState, SimulationParams, Simulator,
};

fn params_with_supply(supply: f64) -> SimulationParams {
    let mut params = SimulationParams::default();
    params.process.initial_supply_l = supply;
    params
}

#[test]
fn transfer_fills_reactor_and_starts_mixing() {
    let params = params_with_supply(18.0);
    let mut sim = Simulator::new(params, Box::new(FixedSampler::new(0.25, 0.25)), 30);

    assert_eq!(
        sim.apply(ControlCommand::StartTankRecirculation),
        CommandOutcome::Applied
    );
    assert_eq!(sim.state().stage, ProcessStage::TankMixing);
    sim.tick();
    sim.apply(ControlCommand::StopTankRecirculation);
    assert_eq!(
        sim.apply(ControlCommand::StartTransfer),
        CommandOutcome::Applied
    );
    assert!(sim.state().inputs.transfer_active);

    let mut ticks = 0;
    while sim.state().stage == ProcessStage::Transferring {
        sim.tick();
        ticks += 1;
        assert!(ticks < 100, "transfer never finished");
    }

    let state = sim.state();
    assert_eq!(ticks, 24);
    assert_eq!(state.stage, ProcessStage::ReactorMixing);
    assert_eq!(state.measurements.reactor_liters, 6.0);
    assert_eq!(state.measurements.supply_tank_liters, 12.0);
    assert!(!state.inputs.transfer_active);
    assert!(state.inputs.reactor_recirculating);
}

#[test]
fn idle_decay_runs_to_completion() {
    let params = SimulationParams::default();
    let mut state = ProcessState::initial(&params);
    state.stage = ProcessStage::ReactorMixing;
    state.running = true;
    state.measurements.reactor_liters = 6.0;
    state.measurements.conductivity_ms_cm = 0.15;
    let mut sampler = FixedSampler::new(0.0, 0.0);

    let next = advance(&state, &params, &mut sampler);
    assert!((next.measurements.conductivity_ms_cm - 0.145).abs() < 1e-12);
    assert_eq!(next.stage, ProcessStage::ReactorMixing);

    let mut state = next;
    let mut ticks = 1;
    while state.running {
        let next = advance(&state, &params, &mut sampler);
        if next.measurements.conductivity_ms_cm > params.process.completion_threshold_ms_cm {
            assert_eq!(next.stage, ProcessStage::ReactorMixing);
        }
        state = next;
        ticks += 1;
        assert!(ticks < 50, "decay never completed");
    }

    assert_eq!(state.stage, ProcessStage::Completed);
    assert!(state.measurements.conductivity_ms_cm <= 0.1);
    assert!(!state.inputs.reactor_recirculating);
    assert!(!state.inputs.reactor_heating);
    assert!(!state.inputs.reactor_agitating);
}

#[test]
fn manual_stop_during_transfer_freezes_stage() {
    let params = params_with_supply(18.0);
    let mut sim = Simulator::new(params, Box::new(FixedSampler::new(0.2, 0.2)), 30);
    sim.apply(ControlCommand::StartTankRecirculation);
    sim.apply(ControlCommand::StopTankRecirculation);
    sim.apply(ControlCommand::StartTransfer);
    for _ in 0..5 {
        sim.tick();
    }
    sim.apply(ControlCommand::SetTargetRpm(300.0));

    assert_eq!(sim.apply(ControlCommand::Stop), CommandOutcome::Applied);
    let state = sim.state().clone();
    assert_eq!(state.stage, ProcessStage::Transferring);
    assert!(!state.running);
    assert!(!state.inputs.any_switch_on());
    assert_eq!(state.inputs.target_rpm, 300.0);

    assert!(!sim.tick().advanced);
    assert_eq!(*sim.state(), state);
}

#[test]
fn transfer_with_low_supply_is_ignored() {
    let params = SimulationParams::default();
    let mut state = ProcessState::initial(&params);
    state.stage = ProcessStage::TankMixed;
    state.running = true;
    state.measurements.supply_tank_liters = 7.0;

    let (next, outcome) = apply_command(&state, &ControlCommand::StartTransfer, &params);
    assert_eq!(outcome, CommandOutcome::Ignored);
    assert_eq!(next, state);
}

fn run_until(sim: &mut Simulator, stage: ProcessStage) {
    for _ in 0..2_000 {
        if sim.state().stage != stage {
            return;
        }
        sim.tick();
    }
    panic!("stuck in {stage}");
}

#[test]
fn full_manual_session_runs_two_cycles() {
    let params = SimulationParams::default();
    let mut sim = Simulator::new(params, Box::new(FixedSampler::new(0.3, 0.3)), 30);

    sim.apply(ControlCommand::StartTankRecirculation);
    sim.tick();
    sim.apply(ControlCommand::StopTankRecirculation);
    sim.apply(ControlCommand::StartTransfer);
    run_until(&mut sim, ProcessStage::Transferring);
    assert_eq!(sim.state().stage, ProcessStage::ReactorMixing);

    sim.apply(ControlCommand::SetHeating(true));
    sim.apply(ControlCommand::SetAgitation(true));
    run_until(&mut sim, ProcessStage::ReactorMixing);
    assert_eq!(sim.state().stage, ProcessStage::ReactorDraining);
    run_until(&mut sim, ProcessStage::ReactorDraining);

    let state = sim.state();
    assert_eq!(state.stage, ProcessStage::TankMixing);
    assert_eq!(state.cycle, 2);
    assert_eq!(state.measurements.reactor_liters, 0.0);
    assert!(state.measurements.conductivity_peak < 2.5);

    sim.tick();
    sim.apply(ControlCommand::StopTankRecirculation);
    assert_eq!(
        sim.apply(ControlCommand::StartTransfer),
        CommandOutcome::Applied
    );
    run_until(&mut sim, ProcessStage::Transferring);
    sim.apply(ControlCommand::SetHeating(true));
    sim.apply(ControlCommand::SetAgitation(true));
    run_until(&mut sim, ProcessStage::ReactorMixing);

    let state = sim.state();
    assert_eq!(state.stage, ProcessStage::Completed);
    assert_eq!(state.cycle, 2);
    assert!(!state.running);
    let summary = sim.stats().summary();
    assert!((summary.liters_transferred - 12.0).abs() < 1e-6);
    assert!((summary.liters_drained - 6.0).abs() < 1e-6);
}
