//! Choosing where a build plan runs

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use super::analysis::RepoAnalysis;
use crate::executor::{ExecutionResult, LocalExecutor};
use crate::infrastructure::ContainerExecutor;

/// Where a command list runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Directly on the host
    Host,
    /// Inside an ephemeral container
    Container {
        /// Image to run
        image: String,
    },
}

impl ExecutionTarget {
    /// Picks the target for an analysis record
    ///
    /// Repositories with a Dockerfile run in a container. The image is the
    /// explicit override if given, then the stack's conventional image, then
    /// `fallback_image`.
    #[must_use]
    pub fn for_analysis(
        analysis: &RepoAnalysis,
        image_override: Option<&str>,
        fallback_image: &str,
    ) -> Self {
        if !analysis.has_dockerfile {
            return Self::Host;
        }
        let image = image_override
            .or_else(|| analysis.language.default_image())
            .unwrap_or(fallback_image);
        Self::Container {
            image: image.to_string(),
        }
    }

    /// Runs `commands` on this target
    pub async fn run<S>(
        &self,
        local: &LocalExecutor,
        container: &ContainerExecutor,
        working_dir: &Path,
        commands: &[S],
        timeout: Duration,
    ) -> ExecutionResult
    where
        S: AsRef<str>,
    {
        info!(execution_target = %self, "Dispatching run");
        match self {
            Self::Host => local.run_all(working_dir, commands, timeout).await,
            Self::Container { image } => {
                container
                    .run_in_container(working_dir, commands, image, timeout)
                    .await
            }
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Container { image } => write!(f, "container ({image})"),
        }
    }
}
