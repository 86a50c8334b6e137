// src/exec/one_shot.rs

//! One-shot command execution, outside of supervision.
//!
//! Used by sequential workflows (success means "ran to completion with exit
//! code 0") and by dashboards that want to inspect a command's output once.

use std::process::Output;

use tokio::process::Child;
use tracing::{debug, info};

use crate::command::{CommandDefinition, Invocation};
use crate::errors::{CozyError, Result};
use crate::exec::log::{LogEvent, LogHandler, Notice};
use crate::exec::process::{attach_output, build_command, exit_code, kill_tree};

/// Result of a one-shot run that completed with exit code 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub command: String,
    pub code: i32,
    /// Captured stdout followed by captured stderr.
    pub output: String,
}

/// What `run` hands back.
#[derive(Debug)]
pub enum RunOutput {
    /// Script commands run to completion immediately; this is their output.
    Captured(RunReport),
    /// Program commands are spawned; await the handle for completion.
    Spawned(OneShot),
}

impl RunOutput {
    /// Await completion regardless of variant.
    pub async fn finish(self) -> Result<RunReport> {
        match self {
            RunOutput::Captured(report) => Ok(report),
            RunOutput::Spawned(handle) => handle.wait().await,
        }
    }
}

/// An in-flight one-shot process.
#[derive(Debug)]
pub struct OneShot {
    command: String,
    child: Child,
}

impl OneShot {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit and collect its output.
    pub async fn wait(self) -> Result<RunReport> {
        let output = self.child.wait_with_output().await?;
        into_report(self.command, output)
    }
}

fn into_report(command: String, output: Output) -> Result<RunReport> {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let code = exit_code(output.status);

    if !output.status.success() {
        return Err(CozyError::CommandFailed {
            command,
            code,
            output: text,
        });
    }

    Ok(RunReport {
        command,
        code,
        output: text,
    })
}

fn spawn_error(name: &str, source: std::io::Error) -> CozyError {
    CozyError::Spawn {
        command: name.to_string(),
        source,
    }
}

/// Run `definition` once.
///
/// Scripts are executed to completion and their output returned; programs
/// are spawned and returned as a [`OneShot`] for the caller to await. A
/// non-zero exit is a [`CozyError::CommandFailed`].
pub async fn run(name: &str, definition: &CommandDefinition) -> Result<RunOutput> {
    let mut cmd = build_command(definition);

    match definition.invocation() {
        Invocation::Script(_) => {
            debug!(command = %name, "running script");
            let output = cmd.output().await.map_err(|e| spawn_error(name, e))?;
            into_report(name.to_string(), output).map(RunOutput::Captured)
        }
        Invocation::Program { .. } => {
            let child = cmd.spawn().map_err(|e| spawn_error(name, e))?;
            debug!(command = %name, pid = ?child.id(), "spawned one-shot process");
            Ok(RunOutput::Spawned(OneShot {
                command: name.to_string(),
                child,
            }))
        }
    }
}

/// Run `definition` once, streaming every output line into `handler`,
/// followed by a [`Notice::Finished`] marker. Returns the exit code.
///
/// The process tree is killed as soon as its output closes, so nothing it
/// forked outlives the inspection.
pub async fn run_with_logs(
    name: &str,
    definition: &CommandDefinition,
    handler: LogHandler,
) -> Result<i32> {
    let mut child = build_command(definition)
        .spawn()
        .map_err(|e| spawn_error(name, e))?;

    let sink = {
        let handler = handler.clone();
        std::sync::Arc::new(move |line: String| handler(LogEvent::Output(line)))
    };
    let readers = attach_output(&mut child, sink);

    // Output closing marks the end of the inspection.
    for reader in readers {
        if let Err(e) = reader.await {
            debug!(command = %name, error = %e, "output reader ended abnormally");
        }
    }

    let status = kill_tree(&mut child).await?;
    let code = exit_code(status);
    info!(command = %name, exit_code = code, "one-shot inspection finished");

    handler(LogEvent::Notice(Notice::Finished { code: Some(code) }));
    Ok(code)
}
