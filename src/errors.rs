// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CozyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Command \"{name}\" is invalid: {reason}")]
    InvalidCommand { name: String, reason: String },

    #[error("Unable to find command named \"{0}\"")]
    UnknownCommand(String),

    #[error("Workflow \"{0}\" does not exist")]
    UnknownWorkflow(String),

    #[error("Missing workflow name")]
    MissingWorkflow,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to launch command \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command \"{command}\" failed with exit code {code}{}", output_suffix(.output))]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Workflow step \"{command}\" failed: {source}")]
    StepFailed {
        command: String,
        #[source]
        source: Box<CozyError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CozyError {
    /// True for errors that stem from the configuration rather than from a
    /// running process.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CozyError::ConfigError(_)
                | CozyError::InvalidCommand { .. }
                | CozyError::UnknownCommand(_)
                | CozyError::UnknownWorkflow(_)
                | CozyError::MissingWorkflow
                | CozyError::TomlError(_)
        )
    }
}

fn output_suffix(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CozyError>;
