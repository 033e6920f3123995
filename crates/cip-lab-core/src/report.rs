//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "End-of-session report and its history record."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use cip_lab_catalog::{ExperimentRecord, RecordContext};
use cip_lab_common::metrics::JitterSummary;
use cip_lab_common::time::format_duration;
use cip_lab_sim::{ProcessState, SessionSeries, SessionSummary, Simulator};
use serde::Serialize;
use uuid::Uuid;

/// Everything known about a session once its task has ended.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub lab_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Simulated time rendered `Hh Mm Ss`.
    pub duration: String,
    pub completed: bool,
    pub final_state: ProcessState,
    pub summary: SessionSummary,
    pub series: SessionSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<JitterSummary>,
}

impl SessionReport {
    pub fn new(
        session_id: Uuid,
        lab_id: &str,
        started_at: DateTime<Utc>,
        simulator: &Simulator,
        jitter: Option<JitterSummary>,
    ) -> Self {
        let final_state = simulator.state().clone();
        Self {
            session_id,
            lab_id: lab_id.to_owned(),
            started_at,
            finished_at: Utc::now(),
            duration: format_duration(final_state.tick),
            completed: final_state.is_completed(),
            final_state,
            summary: simulator.stats().summary(),
            series: simulator.series().clone(),
            jitter,
        }
    }

    /// History entry for this session.
    pub fn to_record(&self, context: RecordContext) -> ExperimentRecord {
        ExperimentRecord::from_session(context, &self.summary, self.completed, &self.series)
    }
}
