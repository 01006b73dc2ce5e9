//! ufw front-end.

use anyhow::Result;

use super::{FirewallFrontend, FirewallState};
use crate::cmd_abstraction::{exec_checked, probe, CommandExecutor};

const UFW: &str = "ufw";

pub struct Ufw<'a, E: CommandExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: CommandExecutor + ?Sized> Ufw<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor + ?Sized> FirewallFrontend for Ufw<'_, E> {
    fn state(&self) -> FirewallState {
        FirewallState::Ufw
    }

    fn is_installed(&self) -> bool {
        probe(self.executor, UFW, &["version"])
    }

    fn is_active(&self) -> bool {
        exec_checked(self.executor, UFW, &["status"])
            .map(|out| is_active_status(&out))
            .unwrap_or(false)
    }

    fn allow_port(&self, port: u16) -> Result<()> {
        // ufw accepts rules while disabled; they apply on enable
        exec_checked(self.executor, UFW, &["allow", &format!("{}/tcp", port)])?;
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        exec_checked(self.executor, UFW, &["--force", "enable"])?;
        Ok(())
    }

    fn list_rules(&self) -> Result<String> {
        exec_checked(self.executor, UFW, &["status", "verbose"])
    }
}

/// `ufw status` prints `Status: active` or `Status: inactive`.
fn is_active_status(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("status: active"))
}
