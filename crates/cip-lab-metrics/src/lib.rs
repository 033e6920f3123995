//! ---
//! cip_section: "03-persistence-logging"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Metrics collection and export utilities."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Prometheus collectors for lab sessions and the daemon, plus a minimal
//! axum exporter serving them at `/metrics`.

pub mod exporter;
pub mod session;

use std::sync::Arc;

use prometheus::Registry;

pub use exporter::{spawn_http_server, MetricsServer};
pub use session::{DaemonMetrics, SessionMetrics};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

pub use prometheus;
