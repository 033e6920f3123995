//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Shared primitives and utilities for the lab runtime."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Shared primitives for the CIP remote lab workspace: configuration loading,
//! tracing setup, loop timing, and time formatting.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, PlantConfig, ProcessConfig,
    SessionConfig,
};
pub use logging::{init_tracing, LogFormat, LogSinks};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
