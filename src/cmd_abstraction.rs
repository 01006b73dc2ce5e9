//! Command execution seam for the external CLIs jailsmith drives.
//!
//! Firewall front-ends, the package manager and `fail2ban-client` are all
//! reached through [`CommandExecutor`], so tests can script their replies.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Captured result of one external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code 0
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    /// Failed output with the given stderr and exit code.
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: false,
            code: Some(code),
        }
    }
}

/// Runs external programs.
///
/// `Err` means the program could not be spawned at all (usually: not
/// installed). A program that ran and exited non-zero is `Ok` with
/// `success == false`.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Convert `&[&str]` into the owned form the trait takes.
///
/// mockall cannot express the nested lifetimes of `&[&str]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Run a command and return its stdout, failing on a non-zero exit.
pub fn exec_checked<E: CommandExecutor + ?Sized>(
    executor: &E,
    cmd: &str,
    args: &[&str],
) -> Result<String> {
    let output = executor.execute(cmd, &args_to_strings(args))?;
    if output.success {
        Ok(output.stdout)
    } else {
        anyhow::bail!(
            "{} {} failed ({}): {}",
            cmd,
            args.join(" "),
            output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            output.stderr.trim()
        )
    }
}

/// True when the command could be spawned and exited 0.
pub fn probe<E: CommandExecutor + ?Sized>(executor: &E, cmd: &str, args: &[&str]) -> bool {
    executor
        .execute(cmd, &args_to_strings(args))
        .map(|o| o.success)
        .unwrap_or(false)
}
