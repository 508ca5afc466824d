//! Error taxonomy for command execution
//!
//! None of these are returned to callers as `Err`. Each one is folded into an
//! [`ExecutionResult`](super::ExecutionResult): its sentinel or exit code goes
//! into `exit_code` and its message becomes the stderr diagnostic.

use std::time::Duration;
use thiserror::Error;

/// Exit code reported when a command timed out or could not be started
pub const EXIT_TIMEOUT_OR_SPAWN_FAILURE: i32 = -1;

/// Exit code reported when the container runtime is unavailable
pub const EXIT_RUNTIME_UNAVAILABLE: i32 = -2;

/// Expected failures of a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The process could not be started
    #[error("Failed to start '{command}': {reason}")]
    SpawnFailed {
        /// Command that failed to start.
        command: String,
        /// Operating system error message.
        reason: String,
    },

    /// The process outlived its timeout and was terminated
    #[error("Command timed out after {timeout:?}: {command}")]
    Timeout {
        /// Command that timed out.
        command: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The process ran and exited with a non-zero code
    #[error("Command exited with code {code}: {command}")]
    NonZeroExit {
        /// Command that failed.
        command: String,
        /// Exit code of the process.
        code: i32,
    },

    /// The container runtime did not answer its availability probe
    #[error("Container runtime '{runtime}' is not available: {reason}")]
    RuntimeUnavailable {
        /// Runtime program that was probed.
        runtime: String,
        /// Why the probe failed.
        reason: String,
    },
}

impl ExecError {
    /// Exit code reported for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SpawnFailed { .. } | Self::Timeout { .. } => EXIT_TIMEOUT_OR_SPAWN_FAILURE,
            Self::NonZeroExit { code, .. } => *code,
            Self::RuntimeUnavailable { .. } => EXIT_RUNTIME_UNAVAILABLE,
        }
    }
}
