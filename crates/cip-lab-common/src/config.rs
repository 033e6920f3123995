//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Shared primitives and utilities for the lab runtime."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9899))
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_series_capacity() -> usize {
    30
}

fn default_random_seed() -> u64 {
    0xC1Bu64
}

fn default_lab_id() -> String {
    "cip-001".to_owned()
}

fn default_step_table() -> Vec<f64> {
    vec![0.0, 0.1, 0.15, 0.2, 0.25, 0.3]
}

/// Primary configuration object for the lab runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub plant: PlantConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "CIP_LAB_CONFIG";

    /// Load configuration from the first existing candidate, respecting the
    /// `CIP_LAB_CONFIG` override. Falls back to defaults when nothing exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        let inspected = candidates
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        debug!(%inspected, "no configuration file found; using defaults");
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.plant.validate()?;
        self.process.validate(&self.plant)?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

/// Runtime parameters of one lab session.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_lab_id")]
    pub lab_id: String,
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lab_id: default_lab_id(),
            tick_interval: default_tick_interval(),
            series_capacity: default_series_capacity(),
            random_seed: default_random_seed(),
            max_ticks: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.tick_interval.is_zero(),
            "session.tick_interval must be greater than zero"
        );
        ensure!(
            self.series_capacity > 0,
            "session.series_capacity must be greater than zero"
        );
        Ok(())
    }
}

/// Physical bounds of the simulated plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub supply_capacity_l: f64,
    pub reactor_capacity_l: f64,
    /// Supply volume required to start mixing or a transfer.
    pub supply_min_l: f64,
    /// Reactor volume required before heating, agitation, or recirculation.
    pub reactor_min_l: f64,
    pub ambient_c: f64,
    pub temperature_max_c: f64,
    pub rpm_rated: f64,
    pub rpm_setpoint_max: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            supply_capacity_l: 20.0,
            reactor_capacity_l: 6.0,
            supply_min_l: 8.0,
            reactor_min_l: 4.0,
            ambient_c: 25.0,
            temperature_max_c: 125.0,
            rpm_rated: 1200.0,
            rpm_setpoint_max: 1500.0,
        }
    }
}

impl PlantConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.supply_capacity_l > 0.0 && self.reactor_capacity_l > 0.0,
            "plant capacities must be positive"
        );
        ensure!(
            (0.0..=self.supply_capacity_l).contains(&self.supply_min_l),
            "plant.supply_min_l must lie within the supply capacity"
        );
        ensure!(
            (0.0..=self.reactor_capacity_l).contains(&self.reactor_min_l),
            "plant.reactor_min_l must lie within the reactor capacity"
        );
        ensure!(
            self.ambient_c < self.temperature_max_c,
            "plant.ambient_c must be below plant.temperature_max_c"
        );
        ensure!(
            self.rpm_rated > 0.0 && self.rpm_setpoint_max >= self.rpm_rated,
            "plant.rpm_setpoint_max must be at least the rated rpm"
        );
        Ok(())
    }
}

/// Initial conditions, ramp rates, and thresholds of the CIP process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub initial_supply_l: f64,
    pub initial_reactor_l: f64,
    pub initial_conductivity_ms_cm: f64,
    pub target_temperature_c: f64,
    pub target_rpm: f64,
    pub heating_rate_c: f64,
    pub cooling_rate_c: f64,
    pub rpm_ramp_up: f64,
    pub rpm_ramp_down: f64,
    pub completion_threshold_ms_cm: f64,
    /// Fraction of the cycle peak at which the reactor drains on its own.
    pub auto_drain_ratio: f64,
    /// Cycles (1-based) during which the automatic drain is armed.
    pub auto_drain_cycles: u32,
    /// Upper bound of the random extra fraction applied to conductivity decay.
    pub conductivity_jitter: f64,
    pub temperature_warning_band_c: f64,
    pub conductivity_warning_ms_cm: f64,
    pub transfer_steps_l: Vec<f64>,
    pub drain_steps_l: Vec<f64>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            initial_supply_l: 15.0,
            initial_reactor_l: 0.0,
            initial_conductivity_ms_cm: 2.5,
            target_temperature_c: 85.0,
            target_rpm: 150.0,
            heating_rate_c: 0.5,
            cooling_rate_c: 0.3,
            rpm_ramp_up: 5.0,
            rpm_ramp_down: 10.0,
            completion_threshold_ms_cm: 0.1,
            auto_drain_ratio: 0.7,
            auto_drain_cycles: 1,
            conductivity_jitter: 0.1,
            temperature_warning_band_c: 10.0,
            conductivity_warning_ms_cm: 3.0,
            transfer_steps_l: default_step_table(),
            drain_steps_l: default_step_table(),
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self, plant: &PlantConfig) -> Result<()> {
        ensure!(
            (0.0..=plant.supply_capacity_l).contains(&self.initial_supply_l),
            "process.initial_supply_l exceeds the supply capacity"
        );
        ensure!(
            (0.0..=plant.reactor_capacity_l).contains(&self.initial_reactor_l),
            "process.initial_reactor_l exceeds the reactor capacity"
        );
        ensure!(
            self.initial_conductivity_ms_cm >= 0.0,
            "process.initial_conductivity_ms_cm must not be negative"
        );
        for (name, rate) in [
            ("heating_rate_c", self.heating_rate_c),
            ("cooling_rate_c", self.cooling_rate_c),
            ("rpm_ramp_up", self.rpm_ramp_up),
            ("rpm_ramp_down", self.rpm_ramp_down),
        ] {
            ensure!(rate > 0.0, "process.{} must be positive", name);
        }
        ensure!(
            (0.0..1.0).contains(&self.auto_drain_ratio),
            "process.auto_drain_ratio must lie in [0, 1)"
        );
        ensure!(
            self.conductivity_jitter >= 0.0,
            "process.conductivity_jitter must not be negative"
        );
        for (name, steps) in [
            ("transfer_steps_l", &self.transfer_steps_l),
            ("drain_steps_l", &self.drain_steps_l),
        ] {
            if steps.is_empty() {
                return Err(anyhow!("process.{} must not be empty", name));
            }
            ensure!(
                steps.iter().all(|step| step.is_finite() && *step >= 0.0),
                "process.{} entries must be finite and non-negative",
                name
            );
            ensure!(
                steps.iter().any(|step| *step > 0.0),
                "process.{} needs at least one positive entry",
                name
            );
        }
        Ok(())
    }
}
