//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Shared primitives and utilities for the lab runtime."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "CIP_LAB_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available log formats for stdout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Where log events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSinks {
    /// Stdout plus the rolling file.
    StdoutAndFile,
    /// Rolling file only, for full-screen terminal front-ends.
    FileOnly,
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// `CIP_LAB_LOG` overrides the filter (e.g. `debug,cip_lab_sim=trace`). When unset the
/// standard `RUST_LOG` variable is honoured, finally defaulting to `info`.
pub fn init_tracing(service_name: &str, config: &LoggingConfig, sinks: LogSinks) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config
        .file_prefix
        .clone()
        .unwrap_or_else(|| "cip-lab".to_owned());

    let file_appender = daily(
        &config.directory,
        format!("{}-{}.log", prefix, service_name),
    );
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    let stdout_layer = match sinks {
        LogSinks::FileOnly => None,
        LogSinks::StdoutAndFile => {
            let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
            let _ = STDOUT_GUARD.set(stdout_guard);
            let layer = match config.format {
                LogFormat::StructuredJson => fmt::layer()
                    .with_target(false)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(stdout_writer)
                    .boxed(),
                LogFormat::Pretty => fmt::layer()
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_writer(stdout_writer)
                    .boxed(),
            };
            Some(layer)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .ok();

    info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, sinks = ?sinks, "tracing initialised");
    Ok(())
}

fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to {}",
                LOG_ENV, err, DEFAULT_DIRECTIVE
            );
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_uses_kebab_case() {
        let parsed: LogFormat = serde_json::from_str("\"structured-json\"").unwrap();
        assert_eq!(parsed, LogFormat::StructuredJson);
        let pretty: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(pretty, LogFormat::Pretty);
    }
}
