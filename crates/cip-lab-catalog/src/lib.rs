//! ---
//! cip_section: "05-catalog"
//! cip_subsection: "01-bootstrap"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Catalog module exports."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Everything around a session that is not the process itself: which
//! laboratories exist, who is signed in, and what past experiments recorded.

pub mod auth;
pub mod error;
pub mod history;
pub mod lab;

pub use auth::{Credentials, Operator};
pub use error::{AuthError, CatalogError};
pub use history::{
    ExperimentHistory, ExperimentMetrics, ExperimentRecord, ExperimentStatus, HistorySummary,
    MetricSummary, RecordContext, TimeSeriesPoint,
};
pub use lab::{LabCatalog, LabFilter, Laboratory};
