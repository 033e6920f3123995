//! ---
//! cip_section: "05-catalog"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Experiment history records, filters, and summary statistics."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use chrono::NaiveDate;
use cip_lab_sim::{SessionSeries, SessionSummary};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{CatalogError, Result};

const EXPERIMENTS_JSON: &str = include_str!("../data/experiments.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExperimentStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    pub avg_temperature_c: f64,
    pub max_temperature_c: f64,
    pub avg_conductivity_ms_cm: f64,
    pub avg_rpm: f64,
    pub total_volume_l: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time_secs: u64,
    pub temperature_c: f64,
    pub conductivity_ms_cm: f64,
    pub rpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub institution: String,
    pub instructor: String,
    pub student: String,
    pub duration_secs: u64,
    pub date: NaiveDate,
    pub laboratory: String,
    pub status: ExperimentStatus,
    pub metrics: ExperimentMetrics,
    #[serde(default)]
    pub time_series: Vec<TimeSeriesPoint>,
}

/// Who ran a session and where; the measured part comes from the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContext {
    pub id: String,
    pub institution: String,
    pub instructor: String,
    pub student: String,
    pub laboratory: String,
    pub date: NaiveDate,
}

impl ExperimentRecord {
    /// Build a history entry from a finished session.
    ///
    /// Sessions that never reached completion are `Error`; completed sessions
    /// that raised an alarm along the way are `Warning`. The temperature
    /// warm-up ramp does not count.
    pub fn from_session(
        context: RecordContext,
        summary: &SessionSummary,
        completed: bool,
        series: &SessionSeries,
    ) -> Self {
        let status = match (completed, summary.alarm_ticks) {
            (false, _) => ExperimentStatus::Error,
            (true, 0) => ExperimentStatus::Success,
            (true, _) => ExperimentStatus::Warning,
        };
        let time_series = series
            .temperature
            .iter()
            .zip(series.conductivity.iter())
            .zip(series.rpm.iter())
            .map(|((temperature, conductivity), rpm)| TimeSeriesPoint {
                time_secs: temperature.tick,
                temperature_c: temperature.value,
                conductivity_ms_cm: conductivity.value,
                rpm: rpm.value,
            })
            .collect();
        Self {
            id: context.id,
            institution: context.institution,
            instructor: context.instructor,
            student: context.student,
            duration_secs: summary.ticks,
            date: context.date,
            laboratory: context.laboratory,
            status,
            metrics: ExperimentMetrics {
                avg_temperature_c: summary.avg_temperature_c,
                max_temperature_c: summary.max_temperature_c,
                avg_conductivity_ms_cm: summary.avg_conductivity_ms_cm,
                avg_rpm: summary.avg_rpm,
                total_volume_l: summary.liters_transferred,
            },
            time_series,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average: f64,
    pub max: f64,
}

/// Aggregates over a set of experiments, as charted on the history page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub experiments: usize,
    pub temperature: MetricSummary,
    pub conductivity: MetricSummary,
    pub rpm: MetricSummary,
}

#[derive(Debug, Clone)]
pub struct ExperimentHistory {
    records: Vec<ExperimentRecord>,
}

impl ExperimentHistory {
    pub fn embedded() -> Result<Self> {
        Self::from_json_str("experiments.json", EXPERIMENTS_JSON)
    }

    pub fn from_json_str(asset: &'static str, raw: &str) -> Result<Self> {
        let records = serde_json::from_str(raw)
            .map_err(|source| CatalogError::InvalidAsset { asset, source })?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[ExperimentRecord] {
        &self.records
    }

    /// Records of one institution (exact match); `None` keeps everything.
    pub fn filter(&self, institution: Option<&str>) -> Vec<&ExperimentRecord> {
        self.records
            .iter()
            .filter(|record| institution.map_or(true, |name| record.institution == name))
            .collect()
    }

    /// Distinct institutions in first-seen order.
    pub fn institutions(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|record| record.institution.as_str())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn by_status(&self) -> IndexMap<ExperimentStatus, usize> {
        let mut counts = IndexMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Summary over the filtered records; `None` when nothing matches.
    ///
    /// Temperature max uses each record's peak; conductivity and rpm maxima are
    /// taken over per-record averages.
    pub fn summary(&self, institution: Option<&str>) -> Option<HistorySummary> {
        let records = self.filter(institution);
        if records.is_empty() {
            return None;
        }
        let count = records.len() as f64;
        let average = |pick: fn(&ExperimentRecord) -> f64| {
            records.iter().map(|record| pick(record)).sum::<f64>() / count
        };
        let max = |pick: fn(&ExperimentRecord) -> f64| {
            records
                .iter()
                .map(|record| pick(record))
                .fold(f64::NEG_INFINITY, f64::max)
        };
        Some(HistorySummary {
            experiments: records.len(),
            temperature: MetricSummary {
                average: average(|r| r.metrics.avg_temperature_c),
                max: max(|r| r.metrics.max_temperature_c),
            },
            conductivity: MetricSummary {
                average: average(|r| r.metrics.avg_conductivity_ms_cm),
                max: max(|r| r.metrics.avg_conductivity_ms_cm),
            },
            rpm: MetricSummary {
                average: average(|r| r.metrics.avg_rpm),
                max: max(|r| r.metrics.avg_rpm),
            },
        })
    }

    /// Next sequential `EXP-NNN` identifier.
    pub fn next_id(&self) -> String {
        let highest = self
            .records
            .iter()
            .filter_map(|record| record.id.strip_prefix("EXP-")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("EXP-{:03}", highest + 1)
    }

    pub fn push(&mut self, record: ExperimentRecord) {
        self.records.push(record);
    }
}
