//! Prelude module for common imports

pub use crate::executor::{
    CommandExecutor, ExecError, ExecutionRequest, ExecutionResult, HealthStatus, Invocation,
    LocalExecutor, ProcessOutcome, ProcessRunner, SpawnSpec,
};
pub use crate::infrastructure::{Config, ContainerExecutor, ContainerRuntime, ContainerSpec};
pub use crate::pipeline::{ExecutionTarget, ProjectLanguage, RepoAnalysis};
