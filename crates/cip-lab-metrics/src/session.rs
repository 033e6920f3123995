//! ---
//! cip_section: "03-persistence-logging"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Prometheus collectors for sessions and the daemon."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
};

use crate::SharedRegistry;

/// Collectors updated by the session loop.
#[derive(Clone, Debug)]
pub struct SessionMetrics {
    registry: SharedRegistry,
    ticks_total: IntCounter,
    commands_total: IntCounterVec,
    stage_transitions: IntCounterVec,
    stage: IntGauge,
    cycle: IntGauge,
    warnings_active: IntGaugeVec,
    measurements: GaugeVec,
    tick_jitter_seconds: Histogram,
}

impl SessionMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let ticks_total = IntCounter::with_opts(Opts::new(
            "cip_lab_ticks_total",
            "Simulation ticks that advanced the process",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new(
                "cip_lab_commands_total",
                "Operator commands by name and outcome",
            ),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let stage_transitions = IntCounterVec::new(
            Opts::new(
                "cip_lab_stage_transitions_total",
                "Process stage changes by origin and destination",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(stage_transitions.clone()))?;

        let stage = IntGauge::with_opts(Opts::new(
            "cip_lab_stage",
            "Ordinal of the current process stage",
        ))?;
        registry.register(Box::new(stage.clone()))?;

        let cycle = IntGauge::with_opts(Opts::new(
            "cip_lab_cycle",
            "Current cleaning cycle number",
        ))?;
        registry.register(Box::new(cycle.clone()))?;

        let warnings_active = IntGaugeVec::new(
            Opts::new(
                "cip_lab_warning_active",
                "Indicator (0/1) whether a process warning is raised",
            ),
            &["warning"],
        )?;
        registry.register(Box::new(warnings_active.clone()))?;

        let measurements = GaugeVec::new(
            Opts::new(
                "cip_lab_measurement",
                "Latest process measurements by name",
            ),
            &["measurement"],
        )?;
        registry.register(Box::new(measurements.clone()))?;

        let buckets = prometheus::exponential_buckets(0.0001, 2.0, 14)
            .context("failed to construct jitter buckets")?;
        let tick_jitter_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cip_lab_tick_jitter_seconds",
                "Absolute deviation of tick arrival from the nominal interval",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(tick_jitter_seconds.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            commands_total,
            stage_transitions,
            stage,
            cycle,
            warnings_active,
            measurements,
            tick_jitter_seconds,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_tick(&self) {
        self.ticks_total.inc();
    }

    pub fn record_command(&self, command: &str, outcome: &str) {
        self.commands_total
            .with_label_values(&[command, outcome])
            .inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.stage_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn set_stage(&self, ordinal: u8, cycle: u32) {
        self.stage.set(i64::from(ordinal));
        self.cycle.set(i64::from(cycle));
    }

    pub fn set_warnings<'a>(&self, flags: impl IntoIterator<Item = (&'a str, bool)>) {
        for (name, raised) in flags {
            self.warnings_active
                .with_label_values(&[name])
                .set(i64::from(raised));
        }
    }

    pub fn set_measurement(&self, name: &str, value: f64) {
        self.measurements.with_label_values(&[name]).set(value);
    }

    pub fn observe_jitter_us(&self, jitter_us: i64) {
        self.tick_jitter_seconds
            .observe(jitter_us.unsigned_abs() as f64 / 1_000_000.0);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks_total.get()
    }

    pub fn commands(&self, command: &str, outcome: &str) -> u64 {
        self.commands_total
            .with_label_values(&[command, outcome])
            .get()
    }
}

/// Collectors for the daemon process itself.
#[derive(Clone, Debug)]
pub struct DaemonMetrics {
    sessions_started: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: &SharedRegistry) -> Result<Self> {
        let sessions_started = IntCounter::with_opts(Opts::new(
            "cip_labd_sessions_started_total",
            "Lab sessions started by this daemon",
        ))?;
        registry.register(Box::new(sessions_started.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 12)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cip_labd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new("cip_labd_build_info", "Build metadata for the running binary"),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            sessions_started,
            config_load_seconds,
            build_info,
        })
    }

    pub fn inc_session(&self) {
        self.sessions_started.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_registry;

    #[test]
    fn session_metrics_track_commands_and_warnings() -> Result<()> {
        let registry = new_registry();
        let metrics = SessionMetrics::new(registry.clone())?;
        metrics.record_command("start_transfer", "applied");
        metrics.record_command("start_transfer", "applied");
        metrics.record_command("start_drain", "ignored");
        metrics.set_warnings([("rpm", true), ("conductivity", false)]);
        metrics.set_stage(5, 2);

        assert_eq!(metrics.commands("start_transfer", "applied"), 2);
        assert_eq!(metrics.commands("start_drain", "ignored"), 1);
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "cip_lab_warning_active"));
        Ok(())
    }

    #[test]
    fn duplicate_registration_is_rejected() -> Result<()> {
        let registry = new_registry();
        SessionMetrics::new(registry.clone())?;
        assert!(SessionMetrics::new(registry).is_err());
        Ok(())
    }

    #[test]
    fn daemon_metrics_register() -> Result<()> {
        let registry = new_registry();
        let metrics = DaemonMetrics::new(&registry)?;
        metrics.inc_session();
        metrics.observe_config_load(0.002);
        metrics.set_build_info("0.1.0", "debug");
        assert_eq!(registry.gather().len(), 3);
        Ok(())
    }
}
