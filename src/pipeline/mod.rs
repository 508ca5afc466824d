//! Build plans
//!
//! A build plan is the analyzer's record of a repository: its stack, whether
//! it ships a Dockerfile, and the commands to build it. This module loads
//! such records and decides whether they run on the host or in a container.

mod analysis;
mod target;

pub use analysis::{ProjectLanguage, RepoAnalysis};
pub use target::ExecutionTarget;
