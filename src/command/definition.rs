// src/command/definition.rs

//! Static description of one runnable command.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::model::CommandConfig;
use crate::errors::{CozyError, Result};

/// Program used to run `npm = "<script>"` commands.
pub const PACKAGE_RUNNER: &str = "yarn";

/// What a command actually executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Spawn `program` directly with `args`.
    Program { program: String, args: Vec<String> },
    /// Run a shell script through the platform shell.
    Script(String),
}

impl Invocation {
    /// Resolve the mutually exclusive `exec` / `npm` / `script` fields of a
    /// command section.
    pub fn from_config(name: &str, cfg: &CommandConfig) -> Result<Self> {
        let invalid = |reason: String| CozyError::InvalidCommand {
            name: name.to_string(),
            reason,
        };

        match (&cfg.exec, &cfg.npm, &cfg.script) {
            (Some(program), None, None) => {
                if program.trim().is_empty() {
                    return Err(invalid("`exec` is empty".to_string()));
                }
                Ok(Invocation::Program {
                    program: program.clone(),
                    args: cfg.args.clone(),
                })
            }
            (None, Some(script_name), None) => {
                if script_name.trim().is_empty() {
                    return Err(invalid("`npm` is empty".to_string()));
                }
                let mut args = Vec::with_capacity(cfg.args.len() + 1);
                args.push(script_name.clone());
                args.extend(cfg.args.iter().cloned());
                Ok(Invocation::Program {
                    program: PACKAGE_RUNNER.to_string(),
                    args,
                })
            }
            (None, None, Some(body)) => {
                if body.trim().is_empty() {
                    return Err(invalid("`script` is empty".to_string()));
                }
                if !cfg.args.is_empty() {
                    return Err(invalid("`args` cannot be combined with `script`".to_string()));
                }
                Ok(Invocation::Script(body.clone()))
            }
            (None, None, None) => Err(invalid(
                "doesn't have an executable defined (set one of `exec`, `npm` or `script`)"
                    .to_string(),
            )),
            (exec, npm, script) => {
                let set: Vec<&str> = [
                    exec.as_ref().map(|_| "exec"),
                    npm.as_ref().map(|_| "npm"),
                    script.as_ref().map(|_| "script"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(invalid(format!(
                    "`{}` are mutually exclusive; set exactly one",
                    set.join("`, `")
                )))
            }
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Invocation::Script(_))
    }
}

/// Immutable definition of a command: where it runs, what it runs, and how it
/// is labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    working_dir: PathBuf,
    invocation: Invocation,
    display_name: Option<String>,
    /// Directory as written in the config, kept for display.
    dir_label: String,
}

impl CommandDefinition {
    /// Build a definition from its config section, resolving `dir` against
    /// `root`.
    pub fn from_config(name: &str, cfg: &CommandConfig, root: &Path) -> Result<Self> {
        let invocation = Invocation::from_config(name, cfg)?;
        let dir_label = cfg.dir.clone().unwrap_or_else(|| "./".to_string());
        let working_dir = match &cfg.dir {
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        };

        Ok(Self {
            working_dir,
            invocation,
            display_name: cfg.name.clone(),
            dir_label,
        })
    }

    /// Definition spawning `program` with `args` in `working_dir`.
    pub fn program<I, S>(working_dir: impl Into<PathBuf>, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let working_dir = working_dir.into();
        Self {
            dir_label: working_dir.display().to_string(),
            working_dir,
            invocation: Invocation::Program {
                program: program.to_string(),
                args: args.into_iter().map(Into::into).collect(),
            },
            display_name: None,
        }
    }

    /// Definition running `body` through the platform shell.
    pub fn script(working_dir: impl Into<PathBuf>, body: &str) -> Self {
        let working_dir = working_dir.into();
        Self {
            dir_label: working_dir.display().to_string(),
            working_dir,
            invocation: Invocation::Script(body.to_string()),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, label: impl Into<String>) -> Self {
        self.display_name = Some(label.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Label used in logs and dashboards.
    pub fn display_name(&self) -> String {
        if let Some(label) = &self.display_name {
            return label.clone();
        }
        match &self.invocation {
            Invocation::Script(body) => body.clone(),
            Invocation::Program { program, args } if args.is_empty() => {
                format!("{program} (\"{}\")", self.dir_label)
            }
            Invocation::Program { program, args } => {
                format!("{program} {} (\"{}\")", args.join(" "), self.dir_label)
            }
        }
    }
}

impl fmt::Display for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
