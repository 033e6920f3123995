//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Session runtime exports."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Session runtime for the CIP remote lab: one tokio task per session owning
//! the simulator, fed by a ticker and an operator command channel.

pub mod autopilot;
pub mod report;
pub mod session;

pub use autopilot::{Autopilot, DEFAULT_MIX_TICKS};
pub use report::SessionReport;
pub use session::{LabSession, SessionHandle, SessionOptions};
