//! CLI for ciexec
//!
//! - `run`: run commands on the host, or in a container with `--image`
//! - `plan`: run the build commands of an analysis record
//! - `probe`: check whether the container runtime answers
//! - `completions`: generate shell completions

pub mod completions;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use ciexec::{
    CommandExecutor, Config, ContainerExecutor, ContainerRuntime, ExecutionResult, ExecutionTarget,
    LocalExecutor, RepoAnalysis, infrastructure::init_logging,
};

/// CLI arguments for ciexec
#[derive(Parser, Debug)]
#[command(name = "ciexec")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run commands in order, stopping at the first failure
    Run {
        #[command(flatten)]
        options: RunOptions,
        /// Commands to run, one per argument
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Run the build commands from an analysis record (JSON or YAML)
    Plan {
        /// Analysis record file
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },

    /// Check whether the container runtime is available
    Probe {
        /// Container runtime
        #[arg(long, value_enum)]
        runtime: Option<RuntimeArg>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunOptions {
    /// Working directory
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,
    /// Per-command timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Container image (runs in a container when given)
    #[arg(short, long)]
    image: Option<String>,
    /// Container runtime
    #[arg(long, value_enum)]
    runtime: Option<RuntimeArg>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RuntimeArg {
    Docker,
    Podman,
}

impl From<RuntimeArg> for ContainerRuntime {
    fn from(arg: RuntimeArg) -> Self {
        match arg {
            RuntimeArg::Docker => ContainerRuntime::Docker,
            RuntimeArg::Podman => ContainerRuntime::Podman,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Parse and execute CLI arguments
pub async fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let level = if std::env::var("CIEXEC_DEBUG").is_ok() {
        "debug"
    } else {
        config.log_level.as_str()
    };
    init_logging(level);

    match args.command {
        Command::Run { options, commands } => {
            let (local, container, timeout) = executors(&config, &options);
            let target = match &options.image {
                Some(image) => ExecutionTarget::Container {
                    image: image.clone(),
                },
                None => ExecutionTarget::Host,
            };
            let result = target
                .run(&local, &container, &options.dir, &commands, timeout)
                .await;
            emit(&result, options.json)
        }
        Command::Plan { file, options } => {
            let analysis = RepoAnalysis::load(&file)
                .with_context(|| format!("Failed to load analysis: {}", file.display()))?;
            let (local, container, timeout) = executors(&config, &options);
            let target = ExecutionTarget::for_analysis(
                &analysis,
                options.image.as_deref(),
                &config.default_image,
            );
            let result = target
                .run(
                    &local,
                    &container,
                    &options.dir,
                    &analysis.suggested_build_commands,
                    timeout,
                )
                .await;
            emit(&result, options.json)
        }
        Command::Probe { runtime } => {
            let mut container = ContainerExecutor::from_config(&config);
            if let Some(runtime) = runtime {
                container = container.with_runtime(runtime.into());
            }
            let status = container.health_check().await;
            println!("{}: {status}", container.runtime());
            Ok(if status.is_operational() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Completions { shell, output } => {
            completions::emit(shell.into(), output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::default(),
    };
    config
        .apply_env()
        .context("Invalid CIEXEC_* environment override")
}

fn executors(config: &Config, options: &RunOptions) -> (LocalExecutor, ContainerExecutor, Duration) {
    let mut container = ContainerExecutor::from_config(config);
    if let Some(runtime) = options.runtime {
        container = container.with_runtime(runtime.into());
    }
    let timeout = options
        .timeout
        .map_or_else(|| config.timeout(), Duration::from_secs);
    (LocalExecutor::new(), container, timeout)
}

fn emit(result: &ExecutionResult, json: bool) -> Result<ExitCode> {
    if json {
        let rendered = serde_json::to_string_pretty(result).context("Failed to render result")?;
        println!("{rendered}");
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
    }
    Ok(ExitCode::from(process_exit_status(result.exit_code)))
}

/// Maps a result code onto a process exit status
///
/// Codes that do not fit in 1..=255, including the negative sentinels,
/// become 1.
fn process_exit_status(code: i32) -> u8 {
    match code {
        0 => 0,
        code => u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1),
    }
}
