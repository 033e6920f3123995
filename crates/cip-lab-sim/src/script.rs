//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Timed operator command scripts loaded from JSON or CSV."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use serde_json::Value;

use crate::commands::ControlCommand;

/// Raw JSON row: `{"tick": 3, "command": "set_heating", "value": true}`.
#[derive(Debug, Deserialize)]
struct JsonStep {
    tick: u64,
    command: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Raw CSV row with `tick,command,value` headers.
#[derive(Debug, Deserialize)]
struct CsvStep {
    tick: u64,
    command: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedCommand {
    pub tick: u64,
    pub command: ControlCommand,
}

/// Ordered list of commands keyed by the session tick at which they fire.
#[derive(Debug, Default, Clone)]
pub struct CommandScript {
    steps: Vec<ScriptedCommand>,
    cursor: usize,
}

impl CommandScript {
    pub fn new(mut steps: Vec<ScriptedCommand>) -> Self {
        steps.sort_by_key(|step| step.tick);
        Self { steps, cursor: 0 }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(path),
            Some("csv") => Self::from_csv(path),
            _ => anyhow::bail!("unsupported script format: {}", path.display()),
        }
    }

    /// Commands scheduled at or before `tick` that have not been handed out yet.
    pub fn due(&mut self, tick: u64) -> Vec<ControlCommand> {
        let start = self.cursor;
        while self.cursor < self.steps.len() && self.steps[self.cursor].tick <= tick {
            self.cursor += 1;
        }
        self.steps[start..self.cursor]
            .iter()
            .map(|step| step.command)
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn from_json(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read script file {}", path.display()))?;
        let raw_steps: Vec<JsonStep> = serde_json::from_str(&contents)
            .with_context(|| format!("invalid script JSON {}", path.display()))?;
        let mut steps = Vec::with_capacity(raw_steps.len());
        for (index, raw) in raw_steps.into_iter().enumerate() {
            let value = raw.value.as_ref().map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
            let command = ControlCommand::from_parts(&raw.command, value.as_deref())
                .with_context(|| format!("step {index} in {}", path.display()))?;
            steps.push(ScriptedCommand {
                tick: raw.tick,
                command,
            });
        }
        Ok(Self::new(steps))
    }

    fn from_csv(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .with_context(|| format!("unable to open script csv {}", path.display()))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut steps = Vec::new();
        for row in reader.deserialize::<CsvStep>() {
            let raw = row.with_context(|| format!("invalid script row in {}", path.display()))?;
            let value = raw.value.as_deref().filter(|value| !value.is_empty());
            let command = ControlCommand::from_parts(&raw.command, value)
                .with_context(|| format!("tick {} in {}", raw.tick, path.display()))?;
            steps.push(ScriptedCommand {
                tick: raw.tick,
                command,
            });
        }
        Ok(Self::new(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn loads_json_scripts() -> Result<()> {
        let mut file = Builder::new().suffix(".json").tempfile()?;
        writeln!(
            file,
            "{}",
            r#"[{"tick":5,"command":"set_heating","value":true},{"tick":0,"command":"start_tank_recirculation"},{"tick":5,"command":"set_target_rpm","value":300}]"#
        )?;
        file.flush()?;
        let mut script = CommandScript::from_path(file.path())?;
        assert_eq!(script.len(), 3);
        assert_eq!(script.due(0), vec![ControlCommand::StartTankRecirculation]);
        assert!(script.due(4).is_empty());
        assert_eq!(
            script.due(7),
            vec![
                ControlCommand::SetHeating(true),
                ControlCommand::SetTargetRpm(300.0)
            ]
        );
        assert!(script.is_finished());
        Ok(())
    }

    #[test]
    fn loads_csv_scripts() -> Result<()> {
        let mut file = Builder::new().suffix(".csv").tempfile()?;
        writeln!(file, "tick,command,value")?;
        writeln!(file, "0,start_tank_recirculation,")?;
        writeln!(file, "12, set_agitation , on")?;
        file.flush()?;
        let mut script = CommandScript::from_path(file.path())?;
        assert_eq!(script.due(20).len(), 2);
        Ok(())
    }

    #[test]
    fn rejects_unknown_commands_and_formats() -> Result<()> {
        let mut file = Builder::new().suffix(".json").tempfile()?;
        writeln!(file, r#"[{{"tick":1,"command":"open_valve"}}]"#)?;
        file.flush()?;
        let err = CommandScript::from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("open_valve"));

        let other = Builder::new().suffix(".yaml").tempfile()?;
        assert!(CommandScript::from_path(other.path()).is_err());
        Ok(())
    }
}
