//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Session task: tick loop, command channel, and frame publishing."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::time::Instant as StdInstant;

use anyhow::{Context, Result};
use chrono::Utc;
use cip_lab_common::config::AppConfig;
use cip_lab_common::metrics::LoopTimingReporter;
use cip_lab_common::time::jitter_us;
use cip_lab_metrics::{SessionMetrics, SharedRegistry};
use cip_lab_rt::Ticker;
use cip_lab_sim::{
    CommandOutcome, CommandScript, ControlCommand, ProcessState, SeededSampler, SessionFrame,
    SessionSeries, SimulationParams, Simulator, StepSampler, TickOutcome,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::autopilot::Autopilot;
use crate::report::SessionReport;

const COMMAND_QUEUE_DEPTH: usize = 64;
/// Upper bound on autopilot commands applied between two ticks.
const AUTOPILOT_BURST: usize = 8;

/// Knobs that shape one session run.
#[derive(Debug, Default)]
pub struct SessionOptions {
    pub lab_id: String,
    /// Stop after this many ticker ticks, running or not.
    pub max_ticks: Option<u64>,
    /// End the session once the process completes or is stopped.
    pub exit_when_finished: bool,
    pub script: Option<CommandScript>,
    pub autopilot: Option<Autopilot>,
    pub metrics: Option<SharedRegistry>,
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lab_id: config.session.lab_id.clone(),
            max_ticks: config.session.max_ticks,
            ..Self::default()
        }
    }
}

/// One lab session, ready to be spawned onto the runtime.
#[derive(Debug)]
pub struct LabSession {
    session_id: Uuid,
    simulator: Simulator,
    options: SessionOptions,
}

impl LabSession {
    pub fn new(simulator: Simulator, options: SessionOptions) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            simulator,
            options,
        }
    }

    /// Build a seeded session from the application configuration.
    pub fn from_config(config: &AppConfig, options: SessionOptions) -> Self {
        let params = SimulationParams::from_config(config);
        let sampler: Box<dyn StepSampler> = Box::new(SeededSampler::new(
            config.session.random_seed,
            &params.process,
        ));
        let simulator = Simulator::new(params, sampler, config.session.series_capacity);
        Self::new(simulator, options)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Start the session task. Ticks come from `ticker`; commands and shutdown
    /// arrive through the returned handle.
    pub fn spawn<T>(self, ticker: T) -> Result<SessionHandle>
    where
        T: Ticker + 'static,
    {
        let metrics = match &self.options.metrics {
            Some(registry) => Some(
                SessionMetrics::new(registry.clone())
                    .context("failed to register session metrics")?,
            ),
            None => None,
        };
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let initial = SessionFrame::capture(
            &self.options.lab_id,
            self.simulator.state(),
            self.simulator.params(),
        );
        let (frame_tx, frame_rx) = watch::channel(initial);
        let (series_tx, series_rx) = watch::channel(self.simulator.series().clone());
        let session_id = self.session_id;

        info!(%session_id, lab = %self.options.lab_id, "lab session starting");
        let runner = SessionRunner {
            session_id,
            simulator: self.simulator,
            options: self.options,
            metrics,
            frames: frame_tx,
            series: series_tx,
            started_at: Utc::now(),
        };
        let task = tokio::spawn(runner.run(ticker, command_rx, shutdown_rx));

        Ok(SessionHandle {
            session_id,
            commands: command_tx,
            frames: frame_rx,
            series: series_rx,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Control surface for a running session.
#[derive(Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::Sender<ControlCommand>,
    frames: watch::Receiver<SessionFrame>,
    series: watch::Receiver<SessionSeries>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<SessionReport>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Queue an operator command; it is applied before the next tick.
    pub async fn send(&self, command: ControlCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .context("session is no longer accepting commands")
    }

    /// Non-blocking variant of [`SessionHandle::send`] for synchronous callers.
    pub fn try_send(&self, command: ControlCommand) -> Result<()> {
        self.commands
            .try_send(command)
            .context("session command queue unavailable")
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionFrame> {
        self.frames.clone()
    }

    pub fn latest(&self) -> SessionFrame {
        self.frames.borrow().clone()
    }

    /// The simulator's bounded chart series as of the latest frame.
    pub fn series(&self) -> SessionSeries {
        self.series.borrow().clone()
    }

    /// Wait for the session to end on its own.
    pub async fn wait(self) -> Result<SessionReport> {
        self.task.await.context("session task panicked")?
    }

    /// Signal the session to stop and collect its report. Commands already
    /// queued are applied first.
    pub async fn shutdown(self) -> Result<SessionReport> {
        let _ = self.shutdown.send(());
        self.wait().await
    }
}

struct SessionRunner {
    session_id: Uuid,
    simulator: Simulator,
    options: SessionOptions,
    metrics: Option<SessionMetrics>,
    frames: watch::Sender<SessionFrame>,
    series: watch::Sender<SessionSeries>,
    started_at: chrono::DateTime<Utc>,
}

impl SessionRunner {
    async fn run<T: Ticker>(
        mut self,
        mut ticker: T,
        mut commands: mpsc::Receiver<ControlCommand>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SessionReport> {
        let period = ticker.period();
        let reporter = period.map(LoopTimingReporter::new);
        let mut last_tick: Option<StdInstant> = None;
        let mut elapsed: u64 = 0;
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!(session_id = %self.session_id, "session shutdown signal received");
                    // commands accepted before the signal still apply
                    while let Ok(command) = commands.try_recv() {
                        self.apply(command);
                    }
                    self.publish();
                    break;
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => {
                            self.apply(command);
                            self.publish();
                        }
                        None => commands_open = false,
                    }
                }
                instant = ticker.tick() => {
                    let Some(instant) = instant else {
                        debug!(session_id = %self.session_id, "ticker exhausted");
                        break;
                    };
                    let now = instant.into_std();
                    if let Some(reporter) = &reporter {
                        reporter.record_tick_at(now);
                    }
                    if let (Some(previous), Some(period), Some(metrics)) =
                        (last_tick, period, &self.metrics)
                    {
                        metrics.observe_jitter_us(jitter_us(now.duration_since(previous), period));
                    }
                    last_tick = Some(now);
                    elapsed += 1;

                    self.drive_operators();
                    let outcome = self.simulator.tick();
                    self.record_tick(&outcome);
                    self.publish();

                    if self.options.max_ticks.is_some_and(|max| elapsed >= max) {
                        info!(session_id = %self.session_id, elapsed, "tick budget reached");
                        break;
                    }
                    if self.options.exit_when_finished && self.finished() {
                        break;
                    }
                }
            }
        }

        let jitter = reporter.and_then(|reporter| reporter.histogram().summary());
        let report = SessionReport::new(
            self.session_id,
            &self.options.lab_id,
            self.started_at,
            &self.simulator,
            jitter,
        );
        info!(
            session_id = %self.session_id,
            stage = %report.final_state.stage,
            cycle = report.final_state.cycle,
            ticks = report.final_state.tick,
            completed = report.completed,
            "lab session finished"
        );
        Ok(report)
    }

    fn finished(&self) -> bool {
        let state = self.simulator.state();
        state.is_completed() || state.stopped
    }

    /// Apply scripted commands due at the current tick, then let the autopilot act.
    fn drive_operators(&mut self) {
        let tick = self.simulator.state().tick;
        let due = self
            .options
            .script
            .as_mut()
            .map(|script| script.due(tick))
            .unwrap_or_default();
        for command in due {
            self.apply(command);
        }

        let Some(mut pilot) = self.options.autopilot.take() else {
            return;
        };
        for _ in 0..AUTOPILOT_BURST {
            let Some(command) = pilot.next_command(self.simulator.state(), self.simulator.params())
            else {
                break;
            };
            if self.apply(command) == CommandOutcome::Ignored {
                warn!(command = command.name(), "autopilot command ignored");
                break;
            }
        }
        self.options.autopilot = Some(pilot);
    }

    fn apply(&mut self, command: ControlCommand) -> CommandOutcome {
        let before = self.simulator.state().stage;
        let outcome = self.simulator.apply(command);
        let after = self.simulator.state().stage;
        if let Some(metrics) = &self.metrics {
            metrics.record_command(command.name(), outcome.into());
            if before != after {
                metrics.record_transition(before.into(), after.into());
            }
        }
        if before != after {
            info!(
                session_id = %self.session_id,
                command = command.name(),
                from = %before,
                to = %after,
                "stage changed by operator"
            );
        }
        outcome
    }

    fn record_tick(&self, outcome: &TickOutcome) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if outcome.advanced {
            metrics.record_tick();
        }
        if let Some((from, to)) = outcome.transition {
            metrics.record_transition(from.into(), to.into());
        }
    }

    fn publish(&self) {
        let state = self.simulator.state();
        let frame = SessionFrame::capture(&self.options.lab_id, state, self.simulator.params());
        if let Some(metrics) = &self.metrics {
            export_frame(metrics, state, &frame);
        }
        self.series.send_if_modified(|series| {
            let current = self.simulator.series();
            let changed = series != current;
            if changed {
                series.clone_from(current);
            }
            changed
        });
        self.frames.send_replace(frame);
    }
}

fn export_frame(metrics: &SessionMetrics, state: &ProcessState, frame: &SessionFrame) {
    let m = &state.measurements;
    metrics.set_stage(state.stage.ordinal(), state.cycle);
    metrics.set_measurement("supply_tank_liters", m.supply_tank_liters);
    metrics.set_measurement("reactor_liters", m.reactor_liters);
    metrics.set_measurement("temperature_c", m.temperature_c);
    metrics.set_measurement("rpm", m.rpm);
    metrics.set_measurement("conductivity_ms_cm", m.conductivity_ms_cm);
    let w = &frame.warnings;
    metrics.set_warnings([
        ("supply_level", w.supply_level),
        ("reactor_level", w.reactor_level),
        ("temperature", w.temperature),
        ("rpm", w.rpm),
        ("conductivity", w.conductivity),
    ]);
}
