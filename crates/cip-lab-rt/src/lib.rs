//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Tick sources driving lab sessions."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
//! Tick scheduling for the CIP lab runtime. Sessions advance on whatever
//! [`Ticker`] they are handed: a fixed-rate [`IntervalTicker`] in production or
//! a [`ManualTicker`] stepped by tests.

pub mod ticker;

pub use ticker::{IntervalTicker, ManualClock, ManualTicker, Ticker};
