//! Executor traits
//!
//! Host and container execution share one seam so callers can treat both
//! paths uniformly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::result::ExecutionResult;

/// Default per-command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Trait for running an ordered list of commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs the request and folds every expected failure into the result
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult;

    /// Checks whether this executor can run anything at all
    async fn health_check(&self) -> HealthStatus;
}

/// A run as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Directory the commands run in
    pub working_dir: PathBuf,

    /// Commands in declaration order
    pub commands: Vec<String>,

    /// Timeout applied to each process separately
    pub timeout: Duration,
}

impl ExecutionRequest {
    /// Creates a request with the default timeout
    #[must_use]
    pub fn new<I, S>(working_dir: impl Into<PathBuf>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            working_dir: working_dir.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Health status of an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Executor is ready
    Healthy {
        /// What was found, e.g. a runtime version
        detail: String,
    },

    /// Executor cannot run commands
    Unhealthy {
        /// Reason for being unhealthy
        reason: String,
    },
}

impl HealthStatus {
    /// Returns true if the executor can run commands
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy { detail } => write!(f, "healthy ({detail})"),
            Self::Unhealthy { reason } => write!(f, "unhealthy: {reason}"),
        }
    }
}
