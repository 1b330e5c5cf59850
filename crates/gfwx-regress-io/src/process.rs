//! Blocking invocation of external tools.
//!
//! Only the exit status of a tool is observed. Its stdout and stderr
//! are either discarded or forwarded to our stderr, and never parsed. A
//! non-zero exit is an ordinary [`ProcessStatus::Failure`], not an error.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::HarnessError;

/// Longest sleep between two polls of a running tool.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a tool did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitInfo {
    /// Exited with a non-zero code.
    Code(i32),
    /// Terminated without an exit code (killed by a signal).
    Terminated,
    /// Ran longer than the configured limit and was killed.
    TimedOut(Duration),
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        status.code().map_or(Self::Terminated, Self::Code)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Terminated => f.write_str("terminated by signal"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Success,
    Failure(ExitInfo),
}

impl ProcessStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// What happens to a tool's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Send both streams to the null device.
    #[default]
    Discard,
    /// Forward both streams to the harness's stderr, keeping stdout free
    /// for the report.
    Forward,
}

/// Runs tools and waits for them, optionally with a time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    output: OutputMode,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            timeout: Some(Self::DEFAULT_TIMEOUT),
            output: OutputMode::default(),
        }
    }
}

impl ProcessInvoker {
    /// Default per-invocation time limit.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-invocation time limit; `None` waits forever.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `program` with `args` and wait for it to finish.
    ///
    /// A tool that outlives the time limit is killed and reported as
    /// [`ExitInfo::TimedOut`].
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Spawn`] if the program cannot be started
    /// (missing, not executable) and [`HarnessError::Wait`] if waiting on
    /// it fails.
    pub fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessStatus, HarnessError> {
        log::debug!("running {}", CommandLine { program, args });

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        match self.output {
            OutputMode::Discard => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
            OutputMode::Forward => {
                command.stdout(io::stderr()).stderr(io::stderr());
            }
        }

        let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;
        let wait_error = |source| HarnessError::Wait {
            program: program.to_path_buf(),
            source,
        };

        let status = match self.timeout {
            None => child.wait().map_err(wait_error)?,
            Some(limit) => match wait_with_deadline(&mut child, limit).map_err(wait_error)? {
                Some(status) => status,
                None => {
                    log::warn!(
                        "killed {} after {}s",
                        CommandLine { program, args },
                        limit.as_secs_f64()
                    );
                    return Ok(ProcessStatus::Failure(ExitInfo::TimedOut(limit)));
                }
            },
        };

        if status.success() {
            Ok(ProcessStatus::Success)
        } else {
            Ok(ProcessStatus::Failure(status.into()))
        }
    }
}

/// Poll `child` until it exits or `limit` elapses. On timeout the child
/// is killed and reaped, and `None` is returned.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    let mut interval = Duration::from_millis(1);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            match child.kill() {
                Ok(()) => {}
                // Exited between the last poll and the kill.
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
                Err(e) => return Err(e),
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(interval.min(deadline - now));
        interval = (interval * 2).min(MAX_POLL_INTERVAL);
    }
}

/// Shell-like rendering of a command for log messages.
struct CommandLine<'a> {
    program: &'a Path,
    args: &'a [OsString],
}

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
