//! External executable invocation with bounded runtime.

use serde::{Deserialize, Serialize};

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{ReportError, ReportResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A configured executable plus the leading arguments every invocation gets
/// (`go` + `tool pprof`, for instance).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Stderr then stdout: progress notices precede the tables they announce.
    pub fn combined(&self) -> String {
        let mut out = String::from_utf8_lossy(&self.stderr).into_owned();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&String::from_utf8_lossy(&self.stdout));
        out
    }

    pub fn stderr_tail(&self) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let lines = text.lines().rev().take(3).collect::<Vec<_>>();
        lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
    }
}

/// Per-call timeout capped by a deadline shared across a sequence of calls.
#[derive(Debug, Clone, Copy)]
pub struct CallBudget {
    per_call: Duration,
    deadline: Instant,
}

impl CallBudget {
    pub fn new(per_call: Duration, overall: Duration) -> Self {
        Self::until(per_call, Instant::now() + overall)
    }

    pub fn until(per_call: Duration, deadline: Instant) -> Self {
        Self { per_call, deadline }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Zero once the deadline has passed; a call run with it times out
    /// immediately.
    pub fn call_timeout(&self) -> Duration {
        self.per_call.min(self.remaining())
    }
}

impl ToolSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn display_name(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    pub fn ensure_available(&self) -> ReportResult<PathBuf> {
        self.locate()
            .ok_or_else(|| ReportError::ToolMissing(self.program.clone()))
    }

    /// Runs the tool with `extra` appended to the configured arguments.
    /// `input`, when given, is written to stdin which is then closed.
    pub fn run(
        &self,
        extra: &[&str],
        input: Option<&str>,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> ReportResult<ToolOutput> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(extra);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a timeout also reaches helpers the tool forks.
            command.process_group(0);
        }
        tracing::debug!("running {} {}", self.display_name(), extra.join(" "));
        run_with_timeout(command, &self.program, input, timeout)
    }
}

fn run_with_timeout(
    mut command: Command,
    label: &str,
    input: Option<&str>,
    timeout: Duration,
) -> ReportResult<ToolOutput> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ReportError::ToolMissing(label.to_string())
        } else {
            ReportError::Io(err)
        }
    })?;

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        // The tool may exit before reading its directive.
        if let Err(err) = stdin.write_all(text.as_bytes()) {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                tracing::warn!("failed to write to {label} stdin: {err}");
            }
        }
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_tree(&mut child);
            let _ = child.wait();
            return Err(ReportError::Timeout {
                what: label.to_string(),
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ToolOutput {
        success: status.success(),
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map(Pid::from_raw);
    match group {
        Ok(pgid) if killpg(pgid, Signal::SIGKILL).is_ok() => {}
        _ => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}
