// src/exec/runner.rs

//! Script runner: spawn one pipeline step, capture its output, register it
//! with the process registry and apply the step's wait policy.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScriptSpec;
use crate::errors::HookdeployError;
use crate::exec::command::CommandLine;
use crate::exec::outcome::{ScriptOutcome, merge_output};
use crate::registry::{KillReply, ProcessId, ProcessRegistry, TrackedProcess};

/// Boxed future returned by [`StepRunner::run`].
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = ScriptOutcome> + Send + 'a>>;

/// Trait abstracting how a single pipeline step is executed.
///
/// Production code uses [`ProcessRunner`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait StepRunner: Send + Sync {
    /// Run `spec` with `workdir` as the current directory.
    ///
    /// Never fails: launch and exit errors are reported in the outcome.
    fn run<'a>(&'a self, spec: &'a ScriptSpec, workdir: &'a Path) -> StepFuture<'a>;
}

/// How a supervised process ended.
#[derive(Debug)]
enum ExitReport {
    Exited(ExitStatus),
    /// Killed before the direct child exited.
    Killed,
    /// The direct child exited, but something it left behind still held its
    /// output open when a kill request arrived.
    Abandoned(ExitStatus),
    WaitFailed(std::io::Error),
}

/// Real runner: spawns OS processes and tracks them in a [`ProcessRegistry`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    registry: Arc<ProcessRegistry>,
}

impl ProcessRunner {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    async fn run_script(&self, spec: &ScriptSpec, workdir: &Path) -> ScriptOutcome {
        let line = match CommandLine::parse_script(&spec.cmd, workdir) {
            Ok(line) => line,
            Err(err) => {
                warn!(cmd = %spec.cmd, error = %err, "invalid script command line");
                return ScriptOutcome::launch_failed(spec, err);
            }
        };

        info!(
            cmd = %spec.cmd,
            program = %line.program.display(),
            wait = spec.wait,
            workdir = %workdir.display(),
            "starting script process"
        );

        let mut child = match line.to_command(workdir).spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = HookdeployError::Launch {
                    command: spec.cmd.clone(),
                    source,
                };
                warn!(cmd = %spec.cmd, error = %err, "script launch failed");
                return ScriptOutcome::launch_failed(spec, err);
            }
        };

        let pid = child.id().unwrap_or_default();
        let drain = spawn_drain(child.stdout.take(), child.stderr.take(), spec.cmd.clone(), pid);

        // Register before anything awaits, so a concurrent clear can't miss it.
        let (kill_tx, kill_rx) = oneshot::channel::<KillReply>();
        let id = self.registry.register(TrackedProcess::new(
            pid,
            spec.cmd.clone(),
            kill_tx,
            Some(drain.abort_handle()),
        ));

        let supervisor = tokio::spawn(supervise(
            child,
            drain,
            kill_rx,
            id,
            Arc::clone(&self.registry),
            spec.cmd.clone(),
            pid,
        ));

        if !spec.wait {
            debug!(cmd = %spec.cmd, pid, "not waiting for script; continuing");
            return ScriptOutcome::launched(spec);
        }

        match supervisor.await {
            Ok((ExitReport::Exited(status), output)) => ScriptOutcome::exited(spec, status, output),
            Ok((ExitReport::Killed, output)) => ScriptOutcome::interrupted(
                spec,
                format!("{} was killed before it finished", spec.cmd),
                output,
            ),
            Ok((ExitReport::Abandoned(status), output)) => ScriptOutcome::interrupted(
                spec,
                format!(
                    "{} exited ({status}) but was killed while its output was still open",
                    spec.cmd
                ),
                output,
            ),
            Ok((ExitReport::WaitFailed(err), output)) => ScriptOutcome::interrupted(
                spec,
                format!("waiting for {} failed: {err}", spec.cmd),
                output,
            ),
            Err(join_err) => ScriptOutcome::interrupted(
                spec,
                format!("supervisor for {} stopped: {join_err}", spec.cmd),
                String::new(),
            ),
        }
    }
}

impl StepRunner for ProcessRunner {
    fn run<'a>(&'a self, spec: &'a ScriptSpec, workdir: &'a Path) -> StepFuture<'a> {
        Box::pin(self.run_script(spec, workdir))
    }
}

/// Own the child and its output drain until both are done, or until the
/// registry asks for the process to be killed.
///
/// The registry entry is removed only once the child has exited and its
/// pipes have closed; descendants that inherited the pipes keep it tracked.
async fn supervise(
    mut child: Child,
    mut drain: JoinHandle<String>,
    mut kill_rx: oneshot::Receiver<KillReply>,
    id: ProcessId,
    registry: Arc<ProcessRegistry>,
    cmd: String,
    pid: u32,
) -> (ExitReport, String) {
    let status = tokio::select! {
        status = child.wait() => status,

        request = &mut kill_rx => {
            let report = match request {
                Ok(reply) => {
                    info!(cmd = %cmd, pid, "kill requested; terminating script process");
                    drain.abort();
                    let result = child.kill().await;
                    if reply.send(result).is_err() {
                        debug!(cmd = %cmd, pid, "kill requester went away before reply");
                    }
                    ExitReport::Killed
                }
                // Tracking entry dropped without a kill; keep waiting.
                Err(_) => exit_report(child.wait().await, &cmd, pid),
            };
            let output = drain.await.unwrap_or_default();
            registry.deregister(id);
            return (report, output);
        }
    };

    let report = exit_report(status, &cmd, pid);

    let output = tokio::select! {
        output = &mut drain => output.unwrap_or_default(),

        Ok(reply) = &mut kill_rx => {
            info!(cmd = %cmd, pid, "kill requested after exit; dropping output capture");
            drain.abort();
            if reply.send(Ok(())).is_err() {
                debug!(cmd = %cmd, pid, "kill requester went away before reply");
            }
            let output = drain.await.unwrap_or_default();
            return match report {
                ExitReport::Exited(status) => (ExitReport::Abandoned(status), output),
                other => (other, output),
            };
        }
    };

    registry.deregister(id);
    (report, output)
}

fn exit_report(status: std::io::Result<ExitStatus>, cmd: &str, pid: u32) -> ExitReport {
    match status {
        Ok(status) => {
            info!(
                cmd = %cmd,
                pid,
                exit_code = status.code().unwrap_or(-1),
                success = status.success(),
                "script process exited"
            );
            ExitReport::Exited(status)
        }
        Err(err) => {
            warn!(cmd = %cmd, pid, error = %err, "waiting for script process failed");
            ExitReport::WaitFailed(err)
        }
    }
}

/// Drain both pipes concurrently to EOF and merge them.
///
/// This is the only task reading the child's output; it runs whether or
/// not the step is waited on.
fn spawn_drain(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    cmd: String,
    pid: u32,
) -> JoinHandle<String> {
    tokio::spawn(async move {
        let (out, err) = tokio::join!(read_stream(stdout, &cmd), read_stream(stderr, &cmd));
        let merged = merge_output(&out, &err);
        debug!(cmd = %cmd, pid, bytes = merged.len(), "script output captured");
        if !merged.is_empty() {
            debug!(cmd = %cmd, pid, "output:\n{}", merged);
        }
        merged
    })
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>, cmd: &str) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };

    let mut buf = Vec::new();
    if let Err(err) = stream.read_to_end(&mut buf).await {
        warn!(cmd = %cmd, error = %err, "reading script output failed");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
