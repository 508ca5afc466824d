//! `ciexec completions <SHELL>`

use anyhow::{Context, Result};
use clap_complete::Shell;
use std::path::Path;

use super::ShellArg;

impl From<ShellArg> for Shell {
    fn from(arg: ShellArg) -> Self {
        match arg {
            ShellArg::Bash => Shell::Bash,
            ShellArg::Zsh => Shell::Zsh,
            ShellArg::Fish => Shell::Fish,
            ShellArg::PowerShell => Shell::PowerShell,
        }
    }
}

/// Renders the completion script for `shell`
pub fn render(shell: Shell) -> Result<String> {
    let mut cmd = super::build_cli();
    let bin_name = cmd.get_name().to_string();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, bin_name, &mut buf);

    String::from_utf8(buf).context("Completion script is not valid UTF-8")
}

/// Prints the script, or writes it to `output` when given
pub fn emit(shell: Shell, output: Option<&Path>) -> Result<()> {
    let script = render(shell)?;
    match output {
        Some(path) => std::fs::write(path, script)
            .with_context(|| format!("Failed to write completions to: {}", path.display())),
        None => {
            print!("{script}");
            Ok(())
        }
    }
}
