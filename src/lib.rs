// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dashboard::{ConsoleDashboard, spawn_stdin_controls};
use crate::engine::{
    CommandRegistry, ParallelSession, SessionOptions, Workflow, run_sequence,
    spawn_signal_listener,
};
use crate::errors::CozyError;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - workflow lookup and command registry
/// - sequential runner or parallel session + console dashboard
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if args.list {
        print_listing(&cfg);
        return Ok(());
    }

    let workflow_name = args.workflow.as_deref().ok_or(CozyError::MissingWorkflow)?;
    let workflow = Workflow::from_config(&cfg, workflow_name)?;

    let root_dir = config_root_dir(&config_path);
    let registry = CommandRegistry::from_config(&cfg, &root_dir)?;
    // Fail on unknown names before anything starts.
    registry.resolve(workflow.commands())?;

    if args.dry_run {
        print_dry_run(&cfg, &workflow, &registry);
        return Ok(());
    }

    info!(
        workflow = %workflow.name(),
        mode = %workflow.mode(),
        commands = ?workflow.commands(),
        root = %root_dir.display(),
        "running workflow"
    );

    if workflow.is_parallel() {
        run_parallel(&cfg, &workflow, &registry).await
    } else {
        let reports = run_sequence(&registry, workflow.commands()).await?;
        for report in &reports {
            print!("{}", report.output);
        }
        info!(workflow = %workflow.name(), steps = reports.len(), "workflow finished");
        Ok(())
    }
}

async fn run_parallel(
    cfg: &ConfigFile,
    workflow: &Workflow,
    registry: &CommandRegistry,
) -> Result<()> {
    let dashboard = Arc::new(ConsoleDashboard::new(
        workflow.commands().iter().map(String::as_str),
    ));
    let session = ParallelSession::new(
        registry,
        workflow,
        dashboard,
        SessionOptions::from(cfg.timing),
    )?;

    let _signals = spawn_signal_listener(session.handle());
    // Detached: a pending stdin read must not keep the launcher alive.
    let _controls = spawn_stdin_controls(session.handle());

    let report = session.run().await?;

    if !report.stop_failures.is_empty() {
        warn!(failed = ?report.stop_failures, "some commands could not be stopped cleanly");
    }
    info!(reason = %report.reason, "session ended");
    Ok(())
}

/// Figure out the directory command `dir`s are relative to.
///
/// - If the config path has a non-empty parent (e.g. "configs/Cozy.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Cozy.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// `--list`: workflows then commands.
fn print_listing(cfg: &ConfigFile) {
    println!("workflows ({}):", cfg.workflow.len());
    for (name, wf) in &cfg.workflow {
        println!("  - {name} ({}): {}", wf.mode(), wf.commands.join(", "));
    }
    println!();

    println!("commands ({}):", cfg.command.len());
    for (name, command) in &cfg.command {
        match &command.name {
            Some(label) => println!("  - {name} ({label})"),
            None => println!("  - {name}"),
        }
    }
}

/// `--dry-run`: the resolved plan, without running anything.
fn print_dry_run(cfg: &ConfigFile, workflow: &Workflow, registry: &CommandRegistry) {
    println!("cozy dry-run");
    println!("  workflow = {}", workflow.name());
    println!("  mode = {}", workflow.mode());
    if workflow.is_parallel() {
        println!("  config.probe_interval = {:?}", cfg.timing.probe_interval);
        println!("  config.shutdown_grace = {:?}", cfg.timing.shutdown_grace);
    }
    println!();

    println!("steps ({}):", workflow.commands().len());
    for (idx, name) in workflow.commands().iter().enumerate() {
        let Some(supervisor) = registry.get(name) else {
            continue;
        };
        let definition = supervisor.definition();
        println!("  {}. {name}", idx + 1);
        println!("      runs: {}", definition.display_name());
        println!("      dir: {}", definition.working_dir().display());
    }

    debug!("dry-run complete (no execution)");
}
