//! firewalld front-end.

use anyhow::Result;

use super::{FirewallFrontend, FirewallState};
use crate::cmd_abstraction::{exec_checked, probe, CommandExecutor};

const FIREWALL_CMD: &str = "firewall-cmd";
const FIREWALL_OFFLINE_CMD: &str = "firewall-offline-cmd";

pub struct Firewalld<'a, E: CommandExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: CommandExecutor + ?Sized> Firewalld<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor + ?Sized> FirewallFrontend for Firewalld<'_, E> {
    fn state(&self) -> FirewallState {
        FirewallState::Firewalld
    }

    fn is_installed(&self) -> bool {
        probe(self.executor, FIREWALL_CMD, &["--version"])
    }

    fn is_active(&self) -> bool {
        // exits 0 and prints "running" only when the daemon is up
        exec_checked(self.executor, FIREWALL_CMD, &["--state"])
            .map(|out| out.trim() == "running")
            .unwrap_or(false)
    }

    fn allow_port(&self, port: u16) -> Result<()> {
        let rule = format!("--add-port={}/tcp", port);
        if self.is_active() {
            exec_checked(self.executor, FIREWALL_CMD, &["--permanent", &rule])?;
            exec_checked(self.executor, FIREWALL_CMD, &["--reload"])?;
        } else {
            // firewall-cmd needs the daemon; the offline tool edits the
            // permanent config directly
            exec_checked(self.executor, FIREWALL_OFFLINE_CMD, &[&rule])?;
        }
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        exec_checked(self.executor, "systemctl", &["enable", "--now", "firewalld"])?;
        Ok(())
    }

    fn list_rules(&self) -> Result<String> {
        exec_checked(self.executor, FIREWALL_CMD, &["--list-all"])
    }
}
