//! Process runner
//!
//! Spawns exactly one child process, streams its stdout and stderr line by
//! line into per-stream buffers and waits for it under a timeout.
//!
//! Each stream is read by its own task which forwards lines over a bounded
//! channel. Order is kept within a stream; the interleaving between the two
//! streams follows pipe scheduling and is not guaranteed.
//!
//! On every exit path the child handle is owned by [`ProcessRunner::spawn`]
//! and dropped with `kill_on_drop`, so no process outlives its run by
//! accident.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::errors::{EXIT_TIMEOUT_OR_SPAWN_FAILURE, ExecError};
use super::result::ExecutionResult;
use super::tokenizer::Invocation;

/// Capacity of the line channel shared by both output readers
const LINE_CHANNEL_CAPACITY: usize = 256;

/// How long to wait for a killed process to be reaped
const KILL_GRACE: Duration = Duration::from_secs(1);

/// How long to keep reading output after the process has exited
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Immutable description of a single spawn
///
/// Environment inheritance and stream redirection are fixed policy and are
/// not configurable here.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Working directory for the process (inherited when `None`)
    pub working_dir: Option<PathBuf>,

    /// Program and arguments to run
    pub invocation: Invocation,

    /// Maximum time to wait for the process to exit
    pub timeout: Duration,
}

impl SpawnSpec {
    /// Creates a spec that runs in the caller's working directory
    #[must_use]
    pub fn new(invocation: Invocation, timeout: Duration) -> Self {
        Self {
            working_dir: None,
            invocation,
            timeout,
        }
    }

    /// Sets the working directory
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// How a single process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own with this code
    Completed(i32),

    /// The timeout elapsed first and the process was terminated
    TimedOut,

    /// The process could not be started
    SpawnFailed(String),
}

impl ProcessOutcome {
    /// Exit code reported for this outcome
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(code) => *code,
            Self::TimedOut | Self::SpawnFailed(_) => EXIT_TIMEOUT_OR_SPAWN_FAILURE,
        }
    }

    /// Returns true if the process completed with exit code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(0))
    }
}

/// Output stream of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Line-oriented output captured from one or more processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Standard output, one `\n`-terminated entry per line
    pub stdout: String,

    /// Standard error, one `\n`-terminated entry per line
    pub stderr: String,
}

impl CapturedOutput {
    fn push_line(&mut self, stream: Stream, line: &str) {
        let buffer = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        buffer.push_str(line);
        buffer.push('\n');
    }

    /// Appends another capture after this one
    pub fn append(&mut self, other: CapturedOutput) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
    }

    /// Converts the capture into a result with the given exit code
    #[must_use]
    pub fn into_result(self, exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Outcome and output of one spawned process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRun {
    /// How the process ended
    pub outcome: ProcessOutcome,

    /// Everything captured from it, plus any diagnostic line
    pub output: CapturedOutput,
}

impl ProcessRun {
    /// Converts this run into a caller-facing result
    #[must_use]
    pub fn into_result(self) -> ExecutionResult {
        let exit_code = self.outcome.exit_code();
        self.output.into_result(exit_code)
    }

    fn failed_to_start(error: &ExecError, reason: String) -> Self {
        let mut output = CapturedOutput::default();
        output.push_line(Stream::Stderr, &error.to_string());
        Self {
            outcome: ProcessOutcome::SpawnFailed(reason),
            output,
        }
    }
}

/// Spawns processes and supervises them until exit or timeout
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs one process to completion or timeout
    ///
    /// Never fails: spawn errors and timeouts are reported through
    /// [`ProcessOutcome`] with a diagnostic line on stderr.
    pub async fn spawn(&self, spec: &SpawnSpec) -> ProcessRun {
        let invocation = &spec.invocation;

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let error = ExecError::SpawnFailed {
                    command: invocation.source().to_string(),
                    reason: e.to_string(),
                };
                warn!(%error, "Process could not be started");
                return ProcessRun::failed_to_start(&error, e.to_string());
            }
        };

        debug!(pid = ?child.id(), command = %invocation, "Process started");

        let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut output = CapturedOutput::default();
        let deadline = tokio::time::sleep(spec.timeout);
        tokio::pin!(deadline);

        let waited = loop {
            tokio::select! {
                Some((stream, line)) = rx.recv() => output.push_line(stream, &line),
                status = child.wait() => break Some(status),
                () = &mut deadline => break None,
            }
        };

        match waited {
            Some(Ok(status)) => {
                // Readers finish once the pipes close; a background grandchild
                // holding a pipe open only delays us by the drain grace.
                let drained = tokio::time::sleep(DRAIN_GRACE);
                tokio::pin!(drained);
                loop {
                    tokio::select! {
                        line = rx.recv() => match line {
                            Some((stream, line)) => output.push_line(stream, &line),
                            None => break,
                        },
                        () = &mut drained => {
                            debug!(command = %invocation, "Output still open after exit, not waiting");
                            break;
                        }
                        () = &mut deadline => {
                            debug!(command = %invocation, "Output still open at deadline");
                            break;
                        }
                    }
                }

                let code = exit_code_of(status);
                debug!(command = %invocation, exit_code = code, "Process exited");
                ProcessRun {
                    outcome: ProcessOutcome::Completed(code),
                    output,
                }
            }
            Some(Err(e)) => {
                let error = ExecError::SpawnFailed {
                    command: invocation.source().to_string(),
                    reason: format!("failed to wait for process: {e}"),
                };
                warn!(%error, "Lost track of process");
                output.push_line(Stream::Stderr, &error.to_string());
                ProcessRun {
                    outcome: ProcessOutcome::SpawnFailed(e.to_string()),
                    output,
                }
            }
            None => {
                terminate(&mut child, invocation).await;
                while let Ok((stream, line)) = rx.try_recv() {
                    output.push_line(stream, &line);
                }

                let error = ExecError::Timeout {
                    command: invocation.source().to_string(),
                    timeout: spec.timeout,
                };
                warn!(%error, "Process timed out");
                output.push_line(Stream::Stderr, &error.to_string());
                ProcessRun {
                    outcome: ProcessOutcome::TimedOut,
                    output,
                }
            }
        }
    }
}

/// Kills a timed-out process, best effort
///
/// A failed kill is traced and otherwise ignored: the process may already be
/// gone, and the handle is still killed on drop.
async fn terminate(child: &mut Child, invocation: &Invocation) {
    if let Err(e) = child.start_kill() {
        debug!(command = %invocation, error = %e, "Kill failed, ignoring");
        return;
    }
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        debug!(command = %invocation, "Killed process not reaped within grace period");
    }
}

/// Reads `reader` line by line and forwards each line until EOF or until the
/// receiving side goes away
async fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::Sender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send((stream, line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(?stream, error = %e, "Stopped reading output");
                break;
            }
        }
    }
}

/// Maps an exit status to a code that never collides with the sentinels
///
/// On Unix a process killed by a signal has no exit code and is reported as
/// `128 + signal`, as shells do.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
