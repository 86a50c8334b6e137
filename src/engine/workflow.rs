// src/engine/workflow.rs

use crate::config::ConfigFile;
use crate::errors::{CozyError, Result};
use crate::types::ExecutionMode;

/// A named, ordered list of commands and how to drive them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    name: String,
    commands: Vec<String>,
    mode: ExecutionMode,
}

impl Workflow {
    pub fn new(
        name: impl Into<String>,
        commands: impl IntoIterator<Item = impl Into<String>>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            name: name.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            mode,
        }
    }

    /// Look up `[workflow.<name>]`.
    pub fn from_config(cfg: &ConfigFile, name: &str) -> Result<Self> {
        let wf = cfg
            .workflow
            .get(name)
            .ok_or_else(|| CozyError::UnknownWorkflow(name.to_string()))?;
        Ok(Self::new(name, wf.commands.iter().cloned(), wf.mode()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_parallel(&self) -> bool {
        self.mode == ExecutionMode::Parallel
    }
}
