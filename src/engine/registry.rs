// src/engine/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::command::CommandDefinition;
use crate::config::ConfigFile;
use crate::errors::{CozyError, Result};
use crate::exec::{ProcessSupervisor, Supervised};

/// Name → supervisor map, built once per launcher process.
///
/// Generic over the supervisor so the engine can be driven by a fake in
/// tests; production code uses [`ProcessSupervisor`].
pub struct CommandRegistry<S = ProcessSupervisor> {
    supervisors: BTreeMap<String, Arc<S>>,
}

impl<S> Clone for CommandRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            supervisors: self.supervisors.clone(),
        }
    }
}

impl<S> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self {
            supervisors: BTreeMap::new(),
        }
    }
}

impl<S> fmt::Debug for CommandRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.supervisors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry<ProcessSupervisor> {
    /// One supervisor per `[command.*]` section, with working directories
    /// resolved against `root`.
    pub fn from_config(cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let mut registry = Self::default();
        for (name, command_cfg) in &cfg.command {
            let definition = CommandDefinition::from_config(name, command_cfg, root)?;
            debug!(
                command = %name,
                dir = %definition.working_dir().display(),
                "registered command"
            );
            registry.insert(ProcessSupervisor::new(name.clone(), definition));
        }
        Ok(registry)
    }
}

impl<S: Supervised> CommandRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `supervisor` under its own name, returning any supervisor it
    /// replaced.
    pub fn insert(&mut self, supervisor: S) -> Option<Arc<S>> {
        let name = supervisor.name().to_string();
        self.supervisors.insert(name, Arc::new(supervisor))
    }

    pub fn get(&self, name: &str) -> Option<Arc<S>> {
        self.supervisors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.supervisors.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.supervisors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    /// Resolve `names` to supervisors, in the given order.
    ///
    /// Fails on the first unknown name, before anything could be started.
    pub fn resolve<I, N>(&self, names: I) -> Result<Vec<Arc<S>>>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .ok_or_else(|| CozyError::UnknownCommand(name.to_string()))
            })
            .collect()
    }
}
