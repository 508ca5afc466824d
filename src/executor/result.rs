//! Execution results returned to callers

use serde::{Deserialize, Serialize};

use super::errors::ExecError;

/// Aggregated result of a host or container run
///
/// `exit_code` is 0 only when every command completed with exit code 0.
/// When a run stops early, `stdout` and `stderr` hold the output of the
/// commands that actually ran, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Exit code: 0, the failing process's own code, or a sentinel
    pub exit_code: i32,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl ExecutionResult {
    /// An empty successful result
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Folds an expected failure into a result with a stderr diagnostic
    #[must_use]
    pub fn from_error(error: &ExecError) -> Self {
        Self {
            exit_code: error.exit_code(),
            stdout: String::new(),
            stderr: format!("{error}\n"),
        }
    }

    /// Returns true if the run succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if the run failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }
}
