// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cozy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cozy",
    version,
    about = "Run named commands as sequential or parallel workflows.",
    long_about = None
)]
pub struct CliArgs {
    /// Name of the workflow to run.
    #[arg(value_name = "WORKFLOW")]
    pub workflow: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Cozy.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Cozy.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `COZY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the workflow plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List the configured workflows and commands, then exit.
    #[arg(long)]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
