// src/config/validate.rs

use std::time::Duration;

use crate::command::Invocation;
use crate::config::model::{ConfigFile, ConfigSection, RawConfigFile, Timing};
use crate::errors::{CozyError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::CozyError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let timing = parse_timing(&raw.config)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            timing,
            raw.command,
            raw.workflow,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_commands(cfg)?;
    validate_commands(cfg)?;
    validate_workflows(cfg)?;
    Ok(())
}

fn ensure_has_commands(cfg: &RawConfigFile) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(CozyError::ConfigError(
            "config must contain at least one [command.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_commands(cfg: &RawConfigFile) -> Result<()> {
    for (name, command) in cfg.command.iter() {
        Invocation::from_config(name, command)?;
    }
    Ok(())
}

fn validate_workflows(cfg: &RawConfigFile) -> Result<()> {
    for (name, workflow) in cfg.workflow.iter() {
        if workflow.commands.is_empty() {
            return Err(CozyError::ConfigError(format!(
                "workflow '{}' must list at least one command",
                name
            )));
        }
        for command in workflow.commands.iter() {
            if !cfg.command.contains_key(command) {
                return Err(CozyError::UnknownCommand(command.clone()));
            }
        }
    }
    Ok(())
}

fn parse_timing(section: &ConfigSection) -> Result<Timing> {
    Ok(Timing {
        probe_interval: parse_positive_duration("probe_interval", &section.probe_interval)?,
        shutdown_grace: parse_duration(&section.shutdown_grace).map_err(|e| {
            CozyError::ConfigError(format!("[config].shutdown_grace: {e}"))
        })?,
    })
}

fn parse_positive_duration(field: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| CozyError::ConfigError(format!("[config].{field}: {e}")))?;
    if dur.is_zero() {
        return Err(CozyError::ConfigError(format!(
            "[config].{field} must be greater than zero"
        )));
    }
    Ok(dur)
}
