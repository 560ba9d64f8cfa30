//! Remote shell handoff to the session broker.
//!
//! The broker (`session-manager-plugin`) owns the terminal for the whole session: it inherits
//! our stdio, and the first HUP/INT/QUIT/TERM we receive is relayed to it once. After that
//! the child decides what signals mean. Its exit status becomes ours.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{exit_code_for_io_error, IecsError};
use crate::gateway::{ExecuteCommand, Gateway};
use crate::model::ExecSession;
use crate::selector::ExecTarget;

pub const SESSION_BROKER: &str = "session-manager-plugin";

/// A located session-broker executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBroker {
    path: PathBuf,
}

impl SessionBroker {
    /// Use `explicit` when given, otherwise search PATH.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, IecsError> {
        if let Some(p) = explicit {
            if p.is_file() {
                return Ok(SessionBroker {
                    path: p.to_path_buf(),
                });
            }
            return Err(IecsError::missing_binary(format!(
                "{SESSION_BROKER} not found at {}",
                p.display()
            )));
        }
        which::which(SESSION_BROKER)
            .map(|path| SessionBroker { path })
            .map_err(|_| Self::missing())
    }

    /// Search only the given PATH-style list of directories.
    #[cfg(test)]
    fn discover_in(paths: impl AsRef<std::ffi::OsStr>) -> Result<Self, IecsError> {
        let cwd = std::env::current_dir()?;
        which::which_in(SESSION_BROKER, Some(paths), cwd)
            .map(|path| SessionBroker { path })
            .map_err(|_| Self::missing())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        SessionBroker { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn missing() -> IecsError {
        IecsError::missing_binary(format!(
            "{SESSION_BROKER} not found in PATH; install the AWS Session Manager plugin"
        ))
    }
}

/// `ecs:<cluster-name>_<task-tail>_<runtime-id>`, where task-tail is everything after the
/// first '/' of the task reference.
pub fn session_target(
    cluster_name: &str,
    task_ref: &str,
    runtime_id: &str,
) -> Result<String, IecsError> {
    match task_ref.split_once('/') {
        Some((_, tail)) if !tail.is_empty() => {
            Ok(format!("ecs:{cluster_name}_{tail}_{runtime_id}"))
        }
        _ => Err(IecsError::invalid(format!(
            "unable to extract task name from '{task_ref}'"
        ))),
    }
}

pub fn regional_endpoint(region: &str) -> Result<String, IecsError> {
    let url = Url::parse(&format!("https://ssm.{region}.amazonaws.com"))
        .map_err(|e| IecsError::invalid(format!("invalid region \"{region}\": {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| IecsError::invalid(format!("invalid region \"{region}\"")))?;
    Ok(format!("{}://{host}", url.scheme()))
}

/// Positional arguments of the broker, in order.
pub fn broker_args(
    session: &ExecSession,
    region: &str,
    target: &str,
) -> Result<Vec<String>, IecsError> {
    let session_json = serde_json::to_string(session)?;
    let target_json = serde_json::json!({ "Target": target }).to_string();
    Ok(vec![
        session_json,
        region.to_string(),
        "StartSession".to_string(),
        String::new(),
        target_json,
        regional_endpoint(region)?,
    ])
}

/// `iecs exec` flags that repeat a selection without a single prompt: names become
/// anchored patterns and the task and container are pinned exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHint {
    pub cluster: String,
    pub service: String,
    pub task: String,
    pub container: String,
    pub interactive: bool,
    pub command: String,
}

impl CommandHint {
    pub fn new(target: &ExecTarget, command: &str, interactive: bool) -> Self {
        CommandHint {
            cluster: anchored(&target.cluster.name),
            service: anchored(&target.service.name),
            task: target.task.id().to_string(),
            container: target.container.name.clone(),
            interactive,
            command: command.to_string(),
        }
    }
}

fn anchored(name: &str) -> String {
    format!("^{}$", regex_lite::escape(name))
}

impl fmt::Display for CommandHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iecs exec --cluster '{}' --service '{}' --task {} --container {} \
             --interactive {} --command \"{}\"",
            self.cluster,
            self.service,
            self.task,
            self.container,
            self.interactive,
            self.command.replace('"', "\\\"")
        )
    }
}

/// Exit code a shell would report for `status`.
pub fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(c), _) => c,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}

struct ForwardedSignals {
    hup: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    term: tokio::signal::unix::Signal,
}

impl ForwardedSignals {
    fn install() -> std::io::Result<Self> {
        Ok(ForwardedSignals {
            hup: signal(SignalKind::hangup())?,
            int: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            term: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.hup.recv() => Signal::SIGHUP,
            _ = self.int.recv() => Signal::SIGINT,
            _ = self.quit.recv() => Signal::SIGQUIT,
            _ = self.term.recv() => Signal::SIGTERM,
        }
    }
}

fn forward(pid: Option<u32>, sig: Signal) {
    let Some(pid) = pid else {
        return;
    };
    match kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) => tracing::debug!(pid, signal = %sig, "signal forwarded to session broker"),
        Err(e) => tracing::debug!(pid, signal = %sig, error = %e, "signal forwarding failed"),
    }
}

/// Spawn `program` on our stdio and wait for it, relaying the first signal we receive.
/// Cancellation counts as a SIGTERM when no signal was relayed yet.
pub async fn supervise(
    program: &Path,
    args: &[String],
    cancel: &CancellationToken,
) -> Result<ExitStatus, IecsError> {
    let mut signals = ForwardedSignals::install()?;
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| IecsError::Child {
            message: format!("failed to start {}: {e}", program.display()),
            code: Some(i32::from(exit_code_for_io_error(&e))),
        })?;
    let pid = child.id();
    tracing::debug!(pid = ?pid, program = %program.display(), "session broker started");

    let mut forwarded = false;
    loop {
        tokio::select! {
            biased;
            sig = signals.recv(), if !forwarded => {
                forward(pid, sig);
                forwarded = true;
            }
            _ = cancel.cancelled(), if !forwarded => {
                forward(pid, Signal::SIGTERM);
                forwarded = true;
            }
            status = child.wait() => {
                let status = status.map_err(|e| IecsError::Child {
                    message: format!("waiting for {}: {e}", program.display()),
                    code: None,
                })?;
                tracing::debug!(status = %status, "session broker exited");
                return Ok(status);
            }
        }
    }
}

/// Request a session for `target`, then hand the terminal to the broker.
/// Returns the broker's exit code.
pub async fn run_exec(
    gateway: &dyn Gateway,
    broker: &SessionBroker,
    target: &ExecTarget,
    command: &str,
    interactive: bool,
    cancel: &CancellationToken,
) -> Result<i32, IecsError> {
    let region = gateway.region().ok_or_else(|| {
        IecsError::invalid("no AWS region configured; pass --region or set AWS_REGION")
    })?;
    let runtime_id = target.container.runtime_id.as_deref().ok_or_else(|| {
        IecsError::not_found(format!(
            "container {} in task {} has no runtime id",
            target.container.name, target.task.arn
        ))
    })?;
    let session_target = session_target(&target.cluster.name, &target.task.arn, runtime_id)?;

    let session = gateway
        .execute_command(
            &ExecuteCommand {
                cluster: target.cluster.arn.clone(),
                task: target.task.arn.clone(),
                container: target.container.name.clone(),
                command: command.to_string(),
                interactive,
            },
            cancel,
        )
        .await?;

    let args = broker_args(&session, &region, &session_target)?;
    let status = supervise(broker.path(), &args, cancel).await?;
    Ok(status_code(status))
}
