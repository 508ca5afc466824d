//! # ciexec - supervised execution of CI build commands
//!
//! ciexec takes an ordered list of build commands and runs them either
//! directly on the host or inside an ephemeral container. Every process runs
//! under a timeout, its output is captured line by line, and the run stops at
//! the first failing command.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use ciexec::LocalExecutor;
//!
//! # async fn example() {
//! let result = LocalExecutor::new()
//!     .run_all(Path::new("."), &["cargo build", "cargo test"], Duration::from_secs(600))
//!     .await;
//! if result.is_failure() {
//!     eprintln!("{}", result.stderr);
//! }
//! # }
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0` | every command succeeded |
//! | other | exit code of the failing process, verbatim |
//! | `-1` | a command timed out or could not be started |
//! | `-2` | the container runtime is unavailable |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod pipeline;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use executor::{
    CommandExecutor, EXIT_RUNTIME_UNAVAILABLE, EXIT_TIMEOUT_OR_SPAWN_FAILURE, ExecError,
    ExecutionRequest, ExecutionResult, HealthStatus, Invocation, LocalExecutor, ProcessOutcome,
    ProcessRunner, SpawnSpec, tokenize,
};
pub use infrastructure::{Config, ConfigError, ContainerExecutor, ContainerRuntime, ContainerSpec};
pub use pipeline::{ExecutionTarget, ProjectLanguage, RepoAnalysis};

/// Version of the ciexec crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
