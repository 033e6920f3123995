//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "01-bootstrap"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Simulation module exports and shared types."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Clean-In-Place process simulator for the remote lab.
//!
//! The process is one explicit [`ProcessState`] advanced by the pure
//! [`advance`] function once per tick. Operator intent enters through
//! [`apply_command`], which enforces the stage guards. Randomness is injected
//! through [`StepSampler`] so whole sessions are reproducible.

pub mod commands;
pub mod engine;
pub mod frames;
pub mod model;
pub mod policy;
pub mod sampler;
pub mod script;
pub mod series;
pub mod stage;
pub mod warnings;

pub use commands::{apply_command, CommandOutcome, ControlCommand};
pub use engine::{advance, SessionStats, SessionSummary, Simulator, TickOutcome};
pub use frames::SessionFrame;
pub use model::{ControlInputs, MetricSample, ProcessMeasurements, ProcessState, SimulationParams};
pub use policy::DecayPolicy;
pub use sampler::{FixedSampler, SeededSampler, StepSampler};
pub use script::{CommandScript, ScriptedCommand};
pub use series::{MetricSeries, SeriesPoint, SessionSeries};
pub use stage::ProcessStage;
pub use warnings::ProcessWarnings;
