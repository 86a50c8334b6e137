#![allow(dead_code)]

use std::collections::BTreeMap;

use cozy::config::{CommandConfig, ConfigFile, ConfigSection, RawConfigFile, WorkflowConfig};
use cozy::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                command: BTreeMap::new(),
                workflow: BTreeMap::new(),
            },
        }
    }

    pub fn with_command(mut self, name: &str, command: CommandConfig) -> Self {
        self.config.command.insert(name.to_string(), command);
        self
    }

    pub fn with_workflow(mut self, name: &str, commands: &[&str], parallel: bool) -> Self {
        self.config.workflow.insert(
            name.to_string(),
            WorkflowConfig {
                commands: commands.iter().map(|c| c.to_string()).collect(),
                parallel,
            },
        );
        self
    }

    pub fn probe_interval(mut self, value: &str) -> Self {
        self.config.config.probe_interval = value.to_string();
        self
    }

    pub fn shutdown_grace(mut self, value: &str) -> Self {
        self.config.config.shutdown_grace = value.to_string();
        self
    }

    /// The unvalidated config, for exercising validation itself.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `CommandConfig`.
pub struct CommandConfigBuilder {
    command: CommandConfig,
}

impl CommandConfigBuilder {
    /// Command spawning `program` directly.
    pub fn exec(program: &str) -> Self {
        Self {
            command: CommandConfig {
                exec: Some(program.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    /// Command running a package script through the package runner.
    pub fn npm(script: &str) -> Self {
        Self {
            command: CommandConfig {
                npm: Some(script.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    /// Command running `body` through the shell.
    pub fn script(body: &str) -> Self {
        Self {
            command: CommandConfig {
                script: Some(body.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    /// Command with nothing to run (invalid on purpose).
    pub fn empty() -> Self {
        Self {
            command: CommandConfig::default(),
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.command.dir = Some(dir.to_string());
        self
    }

    pub fn name(mut self, label: &str) -> Self {
        self.command.name = Some(label.to_string());
        self
    }

    pub fn also_exec(mut self, program: &str) -> Self {
        self.command.exec = Some(program.to_string());
        self
    }

    pub fn also_npm(mut self, script: &str) -> Self {
        self.command.npm = Some(script.to_string());
        self
    }

    pub fn also_script(mut self, body: &str) -> Self {
        self.command.script = Some(body.to_string());
        self
    }

    pub fn build(self) -> CommandConfig {
        self.command
    }
}
