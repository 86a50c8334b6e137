// src/exec/process.rs

//! Spawning and killing OS processes for a command definition.
//!
//! Every process is placed in its own process group (unix), so that killing
//! the group takes any children it forked down with it.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{CommandDefinition, Invocation};

/// How long to wait for output readers to drain after a process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Exit code reported when a process could not be spawned or was killed by a
/// signal.
pub const ABNORMAL_EXIT: i32 = -1;

/// Build a shell command appropriate for the platform.
pub fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}

/// Build the OS command for `definition` with piped output.
pub fn build_command(definition: &CommandDefinition) -> Command {
    let mut cmd = match definition.invocation() {
        Invocation::Program { program, args } => {
            let mut c = Command::new(program);
            c.args(args);
            c
        }
        Invocation::Script(body) => shell_command(body),
    };

    cmd.current_dir(definition.working_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Collapse an exit status into a single code; signal deaths map to
/// [`ABNORMAL_EXIT`].
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(ABNORMAL_EXIT)
}

/// Spawn readers for the child's stdout and stderr, handing each line to
/// `sink`. Both streams feed the same sink.
pub fn attach_output(
    child: &mut Child,
    sink: Arc<dyn Fn(String) + Send + Sync>,
) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, Arc::clone(&sink)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, sink));
    }
    readers
}

fn forward_lines<R>(reader: R, sink: Arc<dyn Fn(String) + Send + Sync>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    sink(line.trim_end_matches(['\r', '\n']).to_string());
                }
                Err(e) => {
                    debug!(error = %e, "output stream closed with error");
                    break;
                }
            }
        }
    })
}

/// Wait for output readers to finish, giving up after a short timeout (a
/// detached grandchild may keep a pipe open).
pub async fn drain_output(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await.is_err() {
            debug!("output reader still busy after exit; detaching");
            abort.abort();
        }
    }
}

/// Sever output streams without waiting for them.
pub fn sever_output(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        reader.abort();
    }
}

/// Kill `child` and every process in its group with SIGKILL, then wait for
/// the child to be reaped.
pub async fn kill_tree(child: &mut Child) -> io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "direct kill failed; process already exited");
    }
    child.wait().await
}

/// Best-effort SIGKILL of the process group led by `pid`.
///
/// A group that is already gone is not an error.
#[cfg(unix)]
pub fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        warn!(pid, "pid out of range for a process group");
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid targets the group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
pub fn kill_group(_pid: u32) {}
