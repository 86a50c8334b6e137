// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::ExecutionMode;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// probe_interval = "3s"
///
/// [command.api]
/// dir = "services/api"
/// exec = "cargo"
/// args = ["run"]
///
/// [workflow.dev]
/// commands = ["api"]
/// parallel = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Session timing from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All commands from `[command.<name>]`.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,

    /// All workflows from `[workflow.<name>]`.
    #[serde(default)]
    pub workflow: BTreeMap<String, WorkflowConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How often a parallel session probes each command's liveness.
    #[serde(default = "default_probe_interval")]
    pub probe_interval: String,

    /// How long a parallel session waits after stopping every command before
    /// it returns.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,
}

fn default_probe_interval() -> String {
    "3s".to_string()
}

fn default_shutdown_grace() -> String {
    "2s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            probe_interval: default_probe_interval(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// `[command.<name>]` section.
///
/// Exactly one of `exec`, `npm` or `script` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    /// Working directory, relative to the config file's directory.
    #[serde(default)]
    pub dir: Option<String>,

    /// Package script run through `yarn <npm> <args...>`.
    #[serde(default)]
    pub npm: Option<String>,

    /// Executable to spawn with `args`.
    #[serde(default)]
    pub exec: Option<String>,

    /// Shell script for one-shot invocations.
    #[serde(default)]
    pub script: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Human readable label.
    #[serde(default)]
    pub name: Option<String>,
}

/// `[workflow.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowConfig {
    /// Command names, in execution order.
    pub commands: Vec<String>,

    #[serde(default)]
    pub parallel: bool,
}

impl WorkflowConfig {
    pub fn mode(&self) -> ExecutionMode {
        ExecutionMode::from_parallel_flag(self.parallel)
    }
}

/// Parsed session timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub probe_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(3),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so every workflow is
/// known to reference existing commands and every command is known to name
/// exactly one thing to run.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub timing: Timing,
    pub command: BTreeMap<String, CommandConfig>,
    pub workflow: BTreeMap<String, WorkflowConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        timing: Timing,
        command: BTreeMap<String, CommandConfig>,
        workflow: BTreeMap<String, WorkflowConfig>,
    ) -> Self {
        Self {
            config,
            timing,
            command,
            workflow,
        }
    }
}
