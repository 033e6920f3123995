//! ---
//! cip_section: "12-operator-dashboard"
//! cip_subsection: "binary"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Terminal dashboard driving one lab session."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cip_lab_catalog::LabCatalog;
use cip_lab_common::config::{AppConfig, PlantConfig};
use cip_lab_common::logging::{init_tracing, LogSinks};
use cip_lab_core::{LabSession, SessionHandle, SessionOptions};
use cip_lab_rt::IntervalTicker;
use cip_lab_sim::{
    ControlCommand, MetricSeries, SessionFrame, SessionSeries, SimulationParams,
};
use clap::Parser;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::{info, warn};

const TEMPERATURE_STEP_C: f64 = 5.0;
const RPM_STEP: f64 = 50.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operate a simulated CIP lab in the terminal")]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Laboratory id to open")]
    lab: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_name = "MS", help = "Simulation tick interval in milliseconds")]
    tick_ms: Option<u64>,
    /// Redraw interval in milliseconds
    #[arg(long, default_value_t = 100)]
    refresh: u64,
}

/// What a key press asks the dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyAction {
    Quit,
    Send(ControlCommand),
}

struct App {
    handle: SessionHandle,
    lab_name: String,
    plant: PlantConfig,
    frame: SessionFrame,
    series: SessionSeries,
    status: String,
}

impl App {
    fn new(handle: SessionHandle, lab_name: String, params: &SimulationParams) -> Self {
        Self {
            frame: handle.latest(),
            series: handle.series(),
            handle,
            lab_name,
            plant: params.plant.clone(),
            status: "press s to start supply tank recirculation".to_owned(),
        }
    }

    fn refresh(&mut self) {
        self.frame = self.handle.latest();
        self.series = self.handle.series();
    }

    fn send(&mut self, command: ControlCommand) {
        match self.handle.try_send(command) {
            Ok(()) => self.status = format!("sent {}", command.name()),
            Err(err) => {
                warn!(error = %err, command = command.name(), "failed to queue command");
                self.status = format!("could not send {}: {err}", command.name());
            }
        }
    }
}

fn key_action(key: KeyCode, frame: &SessionFrame) -> Option<KeyAction> {
    let inputs = &frame.inputs;
    let command = match key {
        KeyCode::Char('q') | KeyCode::Esc => return Some(KeyAction::Quit),
        KeyCode::Char('s') => ControlCommand::StartTankRecirculation,
        KeyCode::Char('x') => ControlCommand::StopTankRecirculation,
        KeyCode::Char('t') => ControlCommand::StartTransfer,
        KeyCode::Char('T') => ControlCommand::StopTransfer,
        KeyCode::Char('h') => ControlCommand::SetHeating(!inputs.reactor_heating),
        KeyCode::Char('a') => ControlCommand::SetAgitation(!inputs.reactor_agitating),
        KeyCode::Char('r') => ControlCommand::SetReactorRecirculation(!inputs.reactor_recirculating),
        KeyCode::Char('d') => ControlCommand::StartDrain,
        KeyCode::Char('p') if frame.running => ControlCommand::Pause,
        KeyCode::Char('p') => ControlCommand::Resume,
        KeyCode::Char('S') => ControlCommand::Stop,
        KeyCode::Char('n') => ControlCommand::Reset,
        KeyCode::Char('+') | KeyCode::Char('=') => {
            ControlCommand::SetTargetTemperature(inputs.target_temperature_c + TEMPERATURE_STEP_C)
        }
        KeyCode::Char('-') => {
            ControlCommand::SetTargetTemperature(inputs.target_temperature_c - TEMPERATURE_STEP_C)
        }
        KeyCode::Char(']') => ControlCommand::SetTargetRpm(inputs.target_rpm + RPM_STEP),
        KeyCode::Char('[') => ControlCommand::SetTargetRpm(inputs.target_rpm - RPM_STEP),
        _ => return None,
    };
    Some(KeyAction::Send(command))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/cip-lab.toml"));
    let mut config = AppConfig::load_with_source(&candidates)?.config;
    if let Some(lab) = cli.lab {
        config.session.lab_id = lab;
    }
    if let Some(seed) = cli.seed {
        config.session.random_seed = seed;
    }
    if let Some(ms) = cli.tick_ms {
        config.session.tick_interval = Duration::from_millis(ms);
    }
    config.validate().context("invalid command line overrides")?;
    init_tracing("cip-lab-ui", &config.logging, LogSinks::FileOnly)?;

    let lab = LabCatalog::embedded()?.open(&config.session.lab_id)?.clone();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let session = LabSession::from_config(&config, SessionOptions::from_config(&config));
    let handle = {
        let _guard = runtime.enter();
        session.spawn(IntervalTicker::delayed(config.session.tick_interval))?
    };
    let params = SimulationParams::from_config(&config);
    let mut app = App::new(handle, lab.name, &params);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(cli.refresh.max(20)));
    cleanup_terminal(&mut terminal)?;

    let report = runtime.block_on(app.handle.shutdown())?;
    info!(
        stage = %report.final_state.stage,
        cycle = report.final_state.cycle,
        duration = %report.duration,
        completed = report.completed,
        "dashboard closed"
    );
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
    Ok(())
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh: Duration,
) -> Result<()> {
    loop {
        app.refresh();
        terminal.draw(|frame| draw_ui(frame, app))?;
        if !event::poll(refresh)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if handle_input(app, key) {
                return Ok(());
            }
        }
    }
}

fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key_action(key.code, &app.frame) {
        Some(KeyAction::Quit) => true,
        Some(KeyAction::Send(command)) => {
            app.send(command);
            false
        }
        None => false,
    }
}

fn draw_ui(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.size());
    draw_banner(frame, app, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[1]);
    draw_plant(frame, app, body[0]);
    draw_charts(frame, app, body[1]);
    draw_warnings(frame, app, rows[2]);

    let help = Paragraph::new(vec![
        Line::from("s/x tank mix  t/T transfer  h heat  a agitate  r recirc  d drain  +/- temp  [/] rpm"),
        Line::from(format!("p pause/resume  S stop  n reset  q quit  | {}", app.status)),
    ])
    .style(Style::default().fg(Color::Gray));
    frame.render_widget(help, rows[3]);
}

fn draw_banner(frame: &mut Frame, app: &App, area: Rect) {
    let f = &app.frame;
    let (state, color) = if f.stopped {
        ("STOPPED", Color::Red)
    } else if f.running {
        ("RUNNING", Color::Green)
    } else {
        ("PAUSED", Color::Yellow)
    };
    let line = Line::from(vec![
        Span::styled(
            f.stage
                .step_number()
                .map(|step| format!("Step {step}: "))
                .unwrap_or_default(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(f.description.clone()),
        Span::raw(format!("   {}   cycle {}   ", f.clock, f.cycle)),
        Span::styled(state, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ]);
    let banner = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", app.lab_name, f.lab_id)),
    );
    frame.render_widget(banner, area);
}

fn draw_plant(frame: &mut Frame, app: &App, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
        ])
        .split(area);
    let m = &app.frame.measurements;
    frame.render_widget(
        level_gauge("Supply tank", m.supply_tank_liters, app.plant.supply_capacity_l, Color::Cyan),
        parts[0],
    );
    frame.render_widget(
        level_gauge("Reactor", m.reactor_liters, app.plant.reactor_capacity_l, Color::Blue),
        parts[1],
    );

    let i = &app.frame.inputs;
    let lines = vec![
        Line::from(format!("Temperature   {:>7.1} C  (set {:.0})", m.temperature_c, i.target_temperature_c)),
        Line::from(format!("Agitation     {:>7.0} rpm (set {:.0})", m.rpm, i.target_rpm)),
        Line::from(format!("Conductivity  {:>7.3} mS/cm", m.conductivity_ms_cm)),
        Line::from(""),
        switch_line("Tank recirculation", i.tank_recirculating),
        switch_line("Transfer", i.transfer_active),
        switch_line("Heating", i.reactor_heating),
        switch_line("Agitation", i.reactor_agitating),
        switch_line("Reactor recirculation", i.reactor_recirculating),
    ];
    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Process"));
    frame.render_widget(panel, parts[2]);
}

fn level_gauge(title: &str, liters: f64, capacity: f64, color: Color) -> Gauge<'static> {
    let ratio = if capacity > 0.0 {
        (liters / capacity).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("{liters:.2} / {capacity:.0} L"))
}

fn switch_line(name: &str, on: bool) -> Line<'static> {
    let (text, color) = if on { ("ON ", Color::Green) } else { ("off", Color::DarkGray) };
    Line::from(vec![
        Span::raw(format!("{name:<22}")),
        Span::styled(text, Style::default().fg(color)),
    ])
}

fn draw_charts(frame: &mut Frame, app: &App, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);
    let series = &app.series;
    draw_chart(frame, parts[0], "Temperature (C)", &series.temperature, Color::Red);
    draw_chart(frame, parts[1], "Conductivity (mS/cm)", &series.conductivity, Color::Yellow);
    draw_chart(frame, parts[2], "Agitation (rpm)", &series.rpm, Color::Magenta);
}

fn draw_chart(frame: &mut Frame, area: Rect, title: &str, series: &MetricSeries, color: Color) {
    let points = series.xy();
    let (x_min, x_max) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        (Some(first), _) => (first.0, first.0 + 1.0),
        _ => (0.0, 1.0),
    };
    let (y_min, y_max) = series
        .value_bounds()
        .map(|(lo, hi)| if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) })
        .unwrap_or((0.0, 1.0));
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points);
    let chart = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .x_axis(
            Axis::default()
                .bounds([x_min, x_max])
                .labels(vec![Span::raw(format!("{x_min:.0}s")), Span::raw(format!("{x_max:.0}s"))]),
        )
        .y_axis(
            Axis::default()
                .bounds([y_min, y_max])
                .labels(vec![Span::raw(format!("{y_min:.1}")), Span::raw(format!("{y_max:.1}"))]),
        );
    frame.render_widget(chart, area);
}

fn draw_warnings(frame: &mut Frame, app: &App, area: Rect) {
    let active = app.frame.warnings.active();
    let line = if active.is_empty() {
        Line::from(Span::styled("no active warnings", Style::default().fg(Color::Green)))
    } else {
        Line::from(Span::styled(
            active.join("  |  "),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    };
    let panel = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Warnings"));
    frame.render_widget(panel, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cip_lab_sim::ProcessState;

    fn frame() -> SessionFrame {
        let params = SimulationParams::default();
        SessionFrame::capture("cip-001", &ProcessState::initial(&params), &params)
    }

    #[test]
    fn toggles_follow_current_inputs() {
        let mut frame = frame();
        assert_eq!(
            key_action(KeyCode::Char('h'), &frame),
            Some(KeyAction::Send(ControlCommand::SetHeating(true)))
        );
        frame.inputs.reactor_heating = true;
        assert_eq!(
            key_action(KeyCode::Char('h'), &frame),
            Some(KeyAction::Send(ControlCommand::SetHeating(false)))
        );
    }

    #[test]
    fn pause_key_flips_with_running_flag() {
        let mut frame = frame();
        assert_eq!(
            key_action(KeyCode::Char('p'), &frame),
            Some(KeyAction::Send(ControlCommand::Resume))
        );
        frame.running = true;
        assert_eq!(
            key_action(KeyCode::Char('p'), &frame),
            Some(KeyAction::Send(ControlCommand::Pause))
        );
    }

    #[test]
    fn setpoint_keys_step_from_current_target() {
        let frame = frame();
        let target = frame.inputs.target_temperature_c;
        assert_eq!(
            key_action(KeyCode::Char('+'), &frame),
            Some(KeyAction::Send(ControlCommand::SetTargetTemperature(
                target + TEMPERATURE_STEP_C
            )))
        );
        assert_eq!(key_action(KeyCode::Char('z'), &frame), None);
        assert_eq!(key_action(KeyCode::Esc, &frame), Some(KeyAction::Quit));
    }
}
