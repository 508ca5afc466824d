//! Command execution layer
//!
//! This module contains the pieces that run commands on the host: the
//! tokenizer, the process runner, the sequential executor and the trait
//! shared with the container executor.

mod errors;
mod local;
mod process;
mod result;
mod tokenizer;
mod traits;

pub use errors::{EXIT_RUNTIME_UNAVAILABLE, EXIT_TIMEOUT_OR_SPAWN_FAILURE, ExecError};
pub use local::LocalExecutor;
pub use process::{CapturedOutput, ProcessOutcome, ProcessRun, ProcessRunner, SpawnSpec};
pub use result::ExecutionResult;
pub use tokenizer::{Invocation, tokenize};
pub use traits::{CommandExecutor, DEFAULT_TIMEOUT, ExecutionRequest, HealthStatus};
