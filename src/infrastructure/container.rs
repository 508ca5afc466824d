//! Container executor (Docker/Podman)
//!
//! Runs a whole command list inside an ephemeral container as one process.
//! The commands are chained with `&&` so the container's own shell stops at
//! the first failure; only the runtime client process is supervised here.
//!
//! The runtime's argument vector is built directly, so the script reaches
//! the container shell byte for byte.
//!
//! Before every run the runtime answers a version query under a short fixed
//! timeout. If it does not, the run is never attempted and the result
//! carries [`EXIT_RUNTIME_UNAVAILABLE`](crate::executor::EXIT_RUNTIME_UNAVAILABLE).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::config::{Config, ConfigError};
use crate::executor::{
    CommandExecutor, ExecError, ExecutionRequest, ExecutionResult, HealthStatus, Invocation,
    ProcessOutcome, ProcessRunner, SpawnSpec,
};

/// Mount point of the host working directory inside the container
pub const CONTAINER_WORKDIR: &str = "/work";

/// Timeout for the runtime availability probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for removing a container left behind by a timed-out run
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Container runtime type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Docker runtime
    #[default]
    Docker,
    /// Podman runtime
    Podman,
}

impl ContainerRuntime {
    /// Default client binary for this runtime
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for ContainerRuntime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(ConfigError::UnknownRuntime(s.to_string())),
        }
    }
}

/// Joins commands into the `&&` chain run by the container shell
///
/// Blank commands are dropped. The text is passed to the shell unchanged.
#[must_use]
pub fn chain_commands<S: AsRef<str>>(commands: &[S]) -> String {
    commands
        .iter()
        .map(AsRef::as_ref)
        .filter(|command| !command.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Builds the script as it appears inside the double-quoted `-c` argument
/// of a rendered runtime command line
///
/// Same chain as [`chain_commands`], with every `"` escaped.
#[must_use]
pub fn build_script<S: AsRef<str>>(commands: &[S]) -> String {
    chain_commands(commands).replace('"', "\\\"")
}

/// Everything needed to run one command list in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image to run
    pub image: String,
    /// Container name, so a timed-out run can be removed
    pub name: Option<String>,
    /// Host directory mounted into the container
    pub host_working_dir: PathBuf,
    /// Mount point and working directory inside the container
    pub container_working_dir: &'static str,
    /// `&&`-chained commands, verbatim
    pub script: String,
}

impl ContainerSpec {
    /// Builds the spec for `commands`
    ///
    /// A relative `host_working_dir` is made absolute, since bind mounts
    /// need absolute host paths.
    #[must_use]
    pub fn new<S: AsRef<str>>(
        image: impl Into<String>,
        host_working_dir: &Path,
        commands: &[S],
    ) -> Self {
        let host_working_dir =
            std::path::absolute(host_working_dir).unwrap_or_else(|_| host_working_dir.to_path_buf());
        Self {
            image: image.into(),
            name: None,
            host_working_dir,
            container_working_dir: CONTAINER_WORKDIR,
            script: chain_commands(commands),
        }
    }

    /// Names the container
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn mount(&self) -> String {
        format!(
            "{}:{}",
            self.host_working_dir.display(),
            self.container_working_dir
        )
    }

    /// Runtime arguments, one element per argv entry
    ///
    /// The script is a single argument, so quotes, backslashes and `$`
    /// reach the container shell exactly as written.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        if let Some(name) = &self.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }
        args.extend([
            "-v".to_string(),
            self.mount(),
            "-w".to_string(),
            self.container_working_dir.to_string(),
            self.image.clone(),
            "/bin/sh".to_string(),
            "-c".to_string(),
            self.script.clone(),
        ]);
        args
    }

    /// Renders the runtime arguments as a single command line for display
    #[must_use]
    pub fn render_args(&self) -> String {
        let name = self
            .name
            .as_ref()
            .map(|name| format!(" --name {name}"))
            .unwrap_or_default();
        format!(
            "run --rm{name} -v \"{mount}\" -w {work} {image} /bin/sh -c \"{script}\"",
            mount = self.mount(),
            work = self.container_working_dir,
            image = self.image,
            script = self.script.replace('"', "\\\""),
        )
    }

    /// Builds the runtime invocation
    #[must_use]
    pub fn invocation(&self, program: &str) -> Invocation {
        Invocation::new(program, self.args())
    }
}

/// Executor that runs command lists inside containers (Docker or Podman)
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    /// Image used by [`CommandExecutor::execute`]
    default_image: String,
    /// Container runtime to use
    runtime: ContainerRuntime,
    /// Program overriding the runtime's default binary
    runtime_binary: Option<String>,
    runner: ProcessRunner,
}

impl ContainerExecutor {
    /// Creates a new executor using Docker
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_image: "ubuntu:latest".to_string(),
            runtime: ContainerRuntime::Docker,
            runtime_binary: None,
            runner: ProcessRunner::new(),
        }
    }

    /// Creates a new executor using Podman
    #[must_use]
    pub fn with_podman() -> Self {
        Self::new().with_runtime(ContainerRuntime::Podman)
    }

    /// Creates an executor from the application configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let executor = Self::new()
            .with_runtime(config.runtime)
            .with_default_image(&config.default_image);
        match &config.runtime_binary {
            Some(binary) => executor.with_runtime_binary(binary),
            None => executor,
        }
    }

    /// Sets the default image
    #[must_use]
    pub fn with_default_image(mut self, image: impl Into<String>) -> Self {
        self.default_image = image.into();
        self
    }

    /// Sets the container runtime
    #[must_use]
    pub fn with_runtime(mut self, runtime: ContainerRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Invokes `binary` instead of the runtime's default client
    #[must_use]
    pub fn with_runtime_binary(mut self, binary: impl Into<String>) -> Self {
        self.runtime_binary = Some(binary.into());
        self
    }

    /// The configured runtime
    #[must_use]
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    /// The image used when none is given
    #[must_use]
    pub fn default_image(&self) -> &str {
        &self.default_image
    }

    /// Gets the runtime executable name
    fn runtime_command(&self) -> &str {
        self.runtime_binary
            .as_deref()
            .unwrap_or_else(|| self.runtime.command())
    }

    /// Queries the runtime version
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::RuntimeUnavailable`] if the query cannot be
    /// started, times out, or exits non-zero.
    pub async fn probe(&self) -> Result<String, ExecError> {
        let program = self.runtime_command();
        let invocation = Invocation::new(program, ["version", "--format", "{{.Client.Version}}"]);
        let run = self
            .runner
            .spawn(&SpawnSpec::new(invocation, PROBE_TIMEOUT))
            .await;

        let reason = match run.outcome {
            ProcessOutcome::Completed(0) => return Ok(run.output.stdout.trim().to_string()),
            ProcessOutcome::Completed(code) => {
                let stderr = run.output.stderr.trim();
                if stderr.is_empty() {
                    format!("version query exited with code {code}")
                } else {
                    stderr.to_string()
                }
            }
            ProcessOutcome::TimedOut => {
                format!("version query timed out after {PROBE_TIMEOUT:?}")
            }
            ProcessOutcome::SpawnFailed(reason) => reason,
        };

        Err(ExecError::RuntimeUnavailable {
            runtime: program.to_string(),
            reason,
        })
    }

    /// Runs `commands` inside `image` with `working_dir` mounted at `/work`
    ///
    /// `timeout` bounds the whole container run; the probe has its own
    /// fixed timeout. A container whose run timed out is force-removed,
    /// best effort.
    pub async fn run_in_container<S>(
        &self,
        working_dir: &Path,
        commands: &[S],
        image: &str,
        timeout: Duration,
    ) -> ExecutionResult
    where
        S: AsRef<str>,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "container_run",
            %run_id,
            runtime = %self.runtime_command(),
            image = %image
        );
        let spec = ContainerSpec::new(image, working_dir, commands)
            .with_name(format!("ciexec-{run_id}"));
        self.run_container(&spec, timeout).instrument(span).await
    }

    async fn run_container(&self, spec: &ContainerSpec, timeout: Duration) -> ExecutionResult {
        match self.probe().await {
            Ok(version) => info!(%version, "Container runtime available"),
            Err(error) => {
                warn!(%error, "Container runtime unavailable, run not attempted");
                return ExecutionResult::from_error(&error);
            }
        }

        info!(
            command = %spec.render_args(),
            timeout_ms = timeout.as_millis(),
            "Starting container run"
        );
        let run = self
            .runner
            .spawn(&SpawnSpec::new(spec.invocation(self.runtime_command()), timeout))
            .await;

        if run.outcome == ProcessOutcome::TimedOut
            && let Some(name) = &spec.name
        {
            self.remove_container(name).await;
        }

        let result = run.into_result();
        if result.is_success() {
            info!("Container run succeeded");
        } else {
            warn!(exit_code = result.exit_code, "Container run failed");
        }
        result
    }

    /// Force-removes a container; failure is logged and ignored
    async fn remove_container(&self, name: &str) {
        let invocation = Invocation::new(self.runtime_command(), ["rm", "-f", name]);
        let run = self
            .runner
            .spawn(&SpawnSpec::new(invocation, REMOVE_TIMEOUT))
            .await;
        if run.outcome.is_success() {
            debug!(container = name, "Removed timed-out container");
        } else {
            debug!(container = name, outcome = ?run.outcome, "Could not remove container, ignoring");
        }
    }
}

impl Default for ContainerExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ContainerExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.run_in_container(
            &request.working_dir,
            request.commands.as_slice(),
            &self.default_image,
            request.timeout,
        )
        .await
    }

    async fn health_check(&self) -> HealthStatus {
        match self.probe().await {
            Ok(version) => HealthStatus::Healthy {
                detail: format!("{} {version}", self.runtime_command()),
            },
            Err(error) => HealthStatus::Unhealthy {
                reason: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_container_runtime_display() {
        assert_eq!(ContainerRuntime::Docker.to_string(), "docker");
        assert_eq!(ContainerRuntime::Podman.to_string(), "podman");
    }

    #[test]
    fn test_container_runtime_from_str() {
        assert_eq!("docker".parse::<ContainerRuntime>().unwrap(), ContainerRuntime::Docker);
        assert_eq!(" Podman ".parse::<ContainerRuntime>().unwrap(), ContainerRuntime::Podman);
        assert!("rkt".parse::<ContainerRuntime>().is_err());
    }

    #[test]
    fn test_build_script_chains_commands() {
        assert_eq!(
            build_script(&["npm install", "npm test"]),
            "npm install && npm test"
        );
    }

    #[test]
    fn test_build_script_escapes_quotes() {
        assert_eq!(
            build_script(&[r#"echo "hi there""#]),
            r#"echo \"hi there\""#
        );
    }

    #[test]
    fn test_build_script_drops_blank_commands() {
        assert_eq!(build_script(&["go build", "  ", "go test ./..."]), "go build && go test ./...");
        let empty: [&str; 0] = [];
        assert_eq!(build_script(&empty), "");
    }

    #[test]
    fn test_chain_commands_is_verbatim() {
        assert_eq!(
            chain_commands(&[r#"echo "a\b" \$HOME"#, "ls"]),
            r#"echo "a\b" \$HOME && ls"#
        );
    }

    #[test]
    fn test_render_args() {
        let spec = ContainerSpec::new("node:18-alpine", Path::new("/repo"), &[r#"echo "hi""#]);
        assert_eq!(
            spec.render_args(),
            r#"run --rm -v "/repo:/work" -w /work node:18-alpine /bin/sh -c "echo \"hi\"""#
        );

        let named = spec.with_name("ciexec-1");
        assert!(named.render_args().starts_with("run --rm --name ciexec-1 -v "));
    }

    #[test]
    fn test_invocation_args() {
        let spec = ContainerSpec::new(
            "alpine",
            Path::new("/repo"),
            &[r#"echo "hello world""#, "ls"],
        )
        .with_name("ciexec-test");
        let invocation = spec.invocation("docker");

        assert_eq!(invocation.program(), "docker");
        assert_eq!(
            invocation.args(),
            [
                "run",
                "--rm",
                "--name",
                "ciexec-test",
                "-v",
                "/repo:/work",
                "-w",
                "/work",
                "alpine",
                "/bin/sh",
                "-c",
                r#"echo "hello world" && ls"#,
            ]
        );
    }

    #[test]
    fn test_invocation_keeps_backslashes_and_dollars() {
        for command in ["echo $HOME", r"echo \$HOME", r"printf a\\nb", r"echo `date` \`", "echo \\"] {
            let spec = ContainerSpec::new("alpine", Path::new("/repo"), &[command]);
            let invocation = spec.invocation("docker");
            assert_eq!(invocation.args().last().map(String::as_str), Some(command));
        }
    }

    #[test]
    fn test_relative_working_dir_is_made_absolute() {
        let spec = ContainerSpec::new("alpine", Path::new("repo"), &["ls"]);
        assert!(spec.host_working_dir.is_absolute());
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            runtime: ContainerRuntime::Podman,
            runtime_binary: Some("/usr/local/bin/podman".to_string()),
            default_image: "fedora:40".to_string(),
            ..Config::default()
        };
        let executor = ContainerExecutor::from_config(&config);
        assert_eq!(executor.runtime(), ContainerRuntime::Podman);
        assert_eq!(executor.default_image(), "fedora:40");
        assert_eq!(executor.runtime_command(), "/usr/local/bin/podman");
    }

    #[test]
    fn test_with_podman() {
        let executor = ContainerExecutor::with_podman();
        assert_eq!(executor.runtime_command(), "podman");
        assert_eq!(executor.default_image(), "ubuntu:latest");
    }

    #[cfg(unix)]
    mod runtime {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        const TIMEOUT: Duration = Duration::from_secs(10);

        /// Stand-in runtime: answers `version`, records `rm` next to itself,
        /// and for `run` executes the script in the mounted host directory.
        const FAKE_RUNTIME: &str = r#"#!/bin/sh
case "$1" in
  version) echo "24.0.0-fake"; exit 0 ;;
  rm) echo "$@" > "$(dirname "$0")/removed"; exit 0 ;;
esac
mount="$6"
cd "${mount%:/work}" || exit 125
shift 11
exec /bin/sh -c "$1"
"#;

        /// Runtime whose daemon is down: the probe fails and `run` would
        /// leave a marker behind.
        const BROKEN_RUNTIME: &str = r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo "Cannot connect to the container daemon" >&2
  exit 1
fi
mount="$6"
touch "${mount%:/work}/runtime-was-invoked"
exit 0
"#;

        fn install(dir: &TempDir, name: &str, script: &str) -> String {
            let path = dir.path().join(name);
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn test_missing_runtime_is_unavailable() {
            let workdir = tempfile::tempdir().unwrap();
            let executor =
                ContainerExecutor::new().with_runtime_binary("ciexec-no-such-container-runtime");

            let result = executor
                .run_in_container(workdir.path(), &["touch marker"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, -2);
            assert!(result.stderr.contains("not available"));
            assert!(!workdir.path().join("marker").exists());
        }

        #[tokio::test]
        async fn test_failing_probe_skips_run() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", BROKEN_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &["echo hi"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, -2);
            assert!(result.stderr.contains("Cannot connect"));
            assert!(!workdir.path().join("runtime-was-invoked").exists());
        }

        #[tokio::test]
        async fn test_quoted_argument_survives() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(
                    workdir.path(),
                    &[r#"echo "hello   world""#, "touch done"],
                    "alpine",
                    TIMEOUT,
                )
                .await;

            assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
            assert_eq!(result.stdout, "hello   world\n");
            assert!(workdir.path().join("done").exists());
        }

        #[tokio::test]
        async fn test_container_shell_stops_at_first_failure() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &["exit 3", "touch marker"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, 3);
            assert!(!workdir.path().join("marker").exists());
        }

        #[tokio::test]
        async fn test_container_run_timeout() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &["sleep 10"], "alpine", Duration::from_millis(300))
                .await;

            assert_eq!(result.exit_code, -1);
            assert!(result.stderr.contains("timed out"));

            let removed = std::fs::read_to_string(bin.path().join("removed")).unwrap();
            assert!(removed.starts_with("rm -f ciexec-"), "removed: {removed}");
        }

        #[tokio::test]
        async fn test_successful_run_leaves_no_removal() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &["true"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, 0);
            assert!(!bin.path().join("removed").exists());
        }

        #[tokio::test]
        async fn test_escaped_dollar_reaches_shell() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &[r"echo \$HOME"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
            assert_eq!(result.stdout, "$HOME\n");
        }

        #[tokio::test]
        async fn test_double_backslash_reaches_shell() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let result = executor
                .run_in_container(workdir.path(), &[r"printf a\\nb"], "alpine", TIMEOUT)
                .await;

            assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
            assert_eq!(result.stdout, "a\nb\n");
        }

        #[tokio::test]
        async fn test_health_check_reports_version() {
            let bin = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new().with_runtime_binary(runtime);

            let status = executor.health_check().await;
            assert!(status.is_operational());
            assert!(status.to_string().contains("24.0.0-fake"));
        }

        #[tokio::test]
        async fn test_execute_uses_default_image() {
            let bin = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let runtime = install(&bin, "docker", FAKE_RUNTIME);
            let executor = ContainerExecutor::new()
                .with_runtime_binary(runtime)
                .with_default_image("golang:1.21");

            let request = ExecutionRequest::new(workdir.path(), ["echo from container"])
                .with_timeout(TIMEOUT);
            let result = executor.execute(&request).await;

            assert_eq!(result.exit_code, 0);
            assert_eq!(result.stdout, "from container\n");
        }
    }
}
