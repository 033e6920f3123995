//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "binary"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Binary entrypoint for the CIP lab daemon and CLI."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use cip_lab_catalog::{
    Credentials, ExperimentHistory, LabCatalog, LabFilter, Operator, RecordContext,
};
use cip_lab_common::config::AppConfig;
use cip_lab_common::logging::{init_tracing, LogSinks};
use cip_lab_core::{Autopilot, LabSession, SessionOptions, DEFAULT_MIX_TICKS};
use cip_lab_metrics::{new_registry, spawn_http_server, DaemonMetrics};
use cip_lab_rt::IntervalTicker;
use cip_lab_sim::CommandScript;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};

const SERVICE: &str = "cip-labd";

#[derive(Debug, Parser)]
#[command(author, version, about = "CIP remote lab daemon", long_about = None)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run one headless lab session and print its report")]
    Run(RunArgs),
    #[command(about = "List the laboratory catalog")]
    Labs(LabsArgs),
    #[command(about = "Show past experiments and their summary")]
    History(HistoryArgs),
    #[command(about = "Check operator credentials")]
    Login(LoginArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, help = "Laboratory id to open (defaults to session.lab_id)")]
    lab: Option<String>,
    #[arg(long, requires = "password", help = "Operator username")]
    user: Option<String>,
    #[arg(long, env = "CIP_LAB_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, default_value = "Lab Instructor")]
    instructor: String,
    #[arg(long, value_name = "FILE", help = "JSON or CSV command script")]
    script: Option<PathBuf>,
    #[arg(long, help = "Drive the process with the built-in operator policy")]
    autopilot: bool,
    #[arg(long, default_value_t = DEFAULT_MIX_TICKS, help = "Autopilot supply mixing ticks")]
    mix_ticks: u64,
    #[arg(long)]
    max_ticks: Option<u64>,
    #[arg(long, help = "Random seed for the step sampler")]
    seed: Option<u64>,
    #[arg(long, value_name = "MS", help = "Tick interval in milliseconds")]
    tick_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct LabsArgs {
    #[arg(long)]
    program: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    institution: Option<String>,
    #[arg(long, help = "List the distinct programs instead of laboratories")]
    programs: bool,
    #[arg(long, help = "Print JSON instead of a table")]
    json: bool,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    institution: Option<String>,
    #[arg(long, help = "List the institutions that have records")]
    institutions: bool,
    #[arg(long, help = "Print JSON instead of a table")]
    json: bool,
}

#[derive(Debug, Args)]
struct LoginArgs {
    #[arg(long)]
    user: String,
    #[arg(long, env = "CIP_LAB_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/cip-lab.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let load_duration = load_started.elapsed();
    let config = loaded.config;

    let sinks = match cli.command {
        Commands::Run(_) => LogSinks::StdoutAndFile,
        _ => LogSinks::FileOnly,
    };
    init_tracing(SERVICE, &config.logging, sinks)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    match cli.command {
        Commands::Run(args) => run_session(config, args, load_duration).await,
        Commands::Labs(args) => list_labs(args),
        Commands::History(args) => show_history(args),
        Commands::Login(args) => login(args),
    }
}

async fn run_session(mut config: AppConfig, args: RunArgs, load_duration: Duration) -> Result<()> {
    if let Some(lab) = &args.lab {
        config.session.lab_id = lab.clone();
    }
    if let Some(seed) = args.seed {
        config.session.random_seed = seed;
    }
    if let Some(ms) = args.tick_ms {
        config.session.tick_interval = Duration::from_millis(ms);
    }
    if args.max_ticks.is_some() {
        config.session.max_ticks = args.max_ticks;
    }
    config.validate().context("invalid command line overrides")?;

    let catalog = LabCatalog::embedded()?;
    let lab = catalog.open(&config.session.lab_id)?.clone();
    let operator = match &args.user {
        Some(user) => Some(
            Credentials::new(user.clone(), args.password.clone().unwrap_or_default())
                .authenticate()?,
        ),
        None => None,
    };

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(&registry)?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), build_profile());

    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry.clone(), config.metrics.listen).await?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let script = match &args.script {
        Some(path) => Some(
            CommandScript::from_path(path)
                .with_context(|| format!("failed to load script {}", path.display()))?,
        ),
        None => None,
    };
    if script.is_none() && !args.autopilot {
        warn!("no script and no autopilot; the session will idle until stopped");
    }

    let options = SessionOptions {
        exit_when_finished: true,
        script,
        autopilot: args.autopilot.then(|| Autopilot::new(args.mix_ticks)),
        metrics: config.metrics.enabled.then(|| registry.clone()),
        ..SessionOptions::from_config(&config)
    };
    let session = LabSession::from_config(&config, options);
    let handle = session.spawn(IntervalTicker::new(config.session.tick_interval))?;
    daemon_metrics.inc_session();
    info!(
        session_id = %handle.session_id(),
        lab = %lab.name,
        tick_ms = config.session.tick_interval.as_millis() as u64,
        "session running; waiting for completion or termination signal"
    );

    let mut frames = handle.subscribe();
    let finished = async { while frames.changed().await.is_ok() {} };
    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("ctrl-c received; shutting down session");
        }
        () = finished => {}
    }
    let report = handle.shutdown().await?;

    let (record, institution_summary) = match &operator {
        Some(operator) => {
            let mut history = ExperimentHistory::embedded()?;
            let record = report.to_record(record_context(
                &history,
                &lab.institution,
                &lab.name,
                &args.instructor,
                operator,
            ));
            info!(id = %record.id, status = %record.status, "experiment recorded");
            history.push(record.clone());
            (Some(record), history.summary(Some(&lab.institution)))
        }
        None => (None, None),
    };
    let output = json!({
        "report": report,
        "record": record,
        "institution_summary": institution_summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

fn record_context(
    history: &ExperimentHistory,
    institution: &str,
    laboratory: &str,
    instructor: &str,
    operator: &Operator,
) -> RecordContext {
    RecordContext {
        id: history.next_id(),
        institution: institution.to_owned(),
        instructor: instructor.to_owned(),
        student: operator.username.clone(),
        laboratory: laboratory.to_owned(),
        date: Utc::now().date_naive(),
    }
}

fn list_labs(args: LabsArgs) -> Result<()> {
    let catalog = LabCatalog::embedded()?;
    if args.programs {
        let programs = catalog.programs();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&programs)?);
        } else {
            programs.iter().for_each(|program| println!("{program}"));
        }
        return Ok(());
    }

    let filter = LabFilter {
        program: args.program,
        search: args.search,
        institution: args.institution,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog.filter(&filter))?);
        return Ok(());
    }
    for (institution, labs) in catalog.by_institution() {
        let labs: Vec<_> = labs.into_iter().filter(|lab| filter.matches(lab)).collect();
        if labs.is_empty() {
            continue;
        }
        println!("{institution}");
        for lab in labs {
            println!(
                "  {:<8} {:<11} {:<28} {}",
                lab.id,
                if lab.available { "available" } else { "unavailable" },
                lab.name,
                lab.program
            );
        }
    }
    Ok(())
}

fn show_history(args: HistoryArgs) -> Result<()> {
    let history = ExperimentHistory::embedded()?;
    if args.institutions {
        let institutions = history.institutions();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&institutions)?);
        } else {
            institutions.iter().for_each(|name| println!("{name}"));
        }
        return Ok(());
    }
    let institution = args.institution.as_deref();
    let records = history.filter(institution);
    let summary = history.summary(institution);
    if args.json {
        let output = json!({
            "records": records,
            "summary": summary,
            "by_status": history.by_status(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    for record in &records {
        println!(
            "{:<8} {} {:<8} {:<24} {:<20} {:>6}s",
            record.id,
            record.date,
            record.status,
            record.institution,
            record.student,
            record.duration_secs
        );
    }
    if let Some(summary) = summary {
        println!(
            "\n{} experiments | temperature avg {:.1} max {:.1} C | conductivity avg {:.2} max {:.2} mS/cm | rpm avg {:.0} max {:.0}",
            summary.experiments,
            summary.temperature.average,
            summary.temperature.max,
            summary.conductivity.average,
            summary.conductivity.max,
            summary.rpm.average,
            summary.rpm.max
        );
    }
    Ok(())
}

fn login(args: LoginArgs) -> Result<()> {
    let operator = Credentials::new(args.user, args.password).authenticate()?;
    println!("{}", serde_json::to_string_pretty(&operator)?);
    Ok(())
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> Operator {
        Operator {
            username: "estudiante".to_owned(),
            signed_in_at: Utc::now(),
        }
    }

    #[test]
    fn record_ids_follow_the_history() {
        let mut history = ExperimentHistory::embedded().unwrap();
        let context = record_context(
            &history,
            "Main Institution",
            "CIP Tank",
            "Dr. Rivera",
            &operator(),
        );
        assert_eq!(context.id, "EXP-007");
        assert_eq!(context.student, "estudiante");

        let mut record = history.records()[0].clone();
        record.id = context.id;
        history.push(record);
        let next = record_context(
            &history,
            "Main Institution",
            "CIP Tank",
            "Dr. Rivera",
            &operator(),
        );
        assert_eq!(next.id, "EXP-008");
        assert_eq!(history.summary(Some("Main Institution")).unwrap().experiments, 4);
    }

    #[test]
    fn history_institutions_are_listed_once() {
        let history = ExperimentHistory::embedded().unwrap();
        assert_eq!(
            history.institutions(),
            vec!["Main Institution", "Partner University A", "Partner University B"]
        );
    }
}
