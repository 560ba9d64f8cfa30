use std::ffi::OsString;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A short-lived helper invocation with captured output and a hard deadline.
#[derive(Debug, Default)]
pub struct Probe {
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct ProbeOutput {
    pub status: ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    /// First non-empty line of stdout, else of stderr.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
    }
}

impl Probe {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn run(self) -> Result<ProbeOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {:?}", self.program))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT);
        let started = Instant::now();
        let status = match child
            .wait_timeout(timeout)
            .context("failed to wait with timeout")?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "{:?} timed out after {}",
                    self.program,
                    humantime::format_duration(timeout)
                ));
            }
        };
        let duration = started.elapsed();
        let stdout = read_stream(child.stdout.as_mut())?;
        let stderr = read_stream(child.stderr.as_mut())?;
        Ok(ProbeOutput {
            status,
            duration,
            stdout,
            stderr,
        })
    }
}

fn read_stream(stream: Option<&mut impl Read>) -> Result<String> {
    let mut buf = String::new();
    if let Some(reader) = stream {
        reader
            .read_to_string(&mut buf)
            .context("failed to read process output")?;
    }
    Ok(buf)
}

/// `<program> --version`, first line of output.
pub fn probe_version(program: impl Into<OsString>) -> Result<String> {
    let out = Probe::new(program).arg("--version").run()?;
    if !out.status.success() {
        return Err(anyhow!("--version exited with {}", out.status));
    }
    out.first_line()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no version output"))
}
