//! fail2ban control surface.
//!
//! Only `status <jail>` output is parsed; everything else is treated as
//! an opaque success/failure.

use std::net::IpAddr;
use tracing::{debug, info};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor};
use crate::error::ProvisionError;

#[cfg(test)]
use mockall::automock;

const CLIENT: &str = "fail2ban-client";
const SERVICE: &str = "fail2ban";

/// Parsed `fail2ban-client status <jail>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JailStatus {
    pub currently_failed: u32,
    pub total_failed: u32,
    pub currently_banned: u32,
    pub banned: Vec<IpAddr>,
}

impl JailStatus {
    pub fn is_banned(&self, address: IpAddr) -> bool {
        self.banned.contains(&address)
    }

    pub fn parse(output: &str) -> Self {
        let mut status = JailStatus::default();
        for line in output.lines() {
            let line = line.trim_start_matches(|c: char| matches!(c, '|' | '`' | '-' | ' '));
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Currently failed" => status.currently_failed = value.parse().unwrap_or(0),
                "Total failed" => status.total_failed = value.parse().unwrap_or(0),
                "Currently banned" => status.currently_banned = value.parse().unwrap_or(0),
                "Banned IP list" => {
                    status.banned = value
                        .split_whitespace()
                        .filter_map(|s| s.parse().ok())
                        .collect();
                }
                _ => {}
            }
        }
        status
    }
}

/// The ban daemon as the provisioner drives it.
#[cfg_attr(test, automock)]
pub trait BanDaemon: Send + Sync {
    /// Full service restart; starts the daemon if it was stopped.
    fn restart(&self) -> Result<(), ProvisionError>;

    fn status(&self, jail: &str) -> Result<JailStatus, ProvisionError>;

    fn unban(&self, jail: &str, address: IpAddr) -> Result<(), ProvisionError>;
}

/// [`BanDaemon`] backed by `fail2ban-client` and `systemctl`.
pub struct Fail2banClient<'a, E: CommandExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: CommandExecutor + ?Sized> Fail2banClient<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    fn run(&self, cmd: &str, args: &[&str]) -> Result<String, ProvisionError> {
        let output = self
            .executor
            .execute(cmd, &args_to_strings(args))
            .map_err(|e| ProvisionError::Daemon(format!("{} {}: {:#}", cmd, args.join(" "), e)))?;
        if !output.success {
            return Err(ProvisionError::Daemon(format!(
                "{} {} exited with {}: {}",
                cmd,
                args.join(" "),
                output
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl<E: CommandExecutor + ?Sized> BanDaemon for Fail2banClient<'_, E> {
    fn restart(&self) -> Result<(), ProvisionError> {
        self.run("systemctl", &["enable", SERVICE])?;
        self.run("systemctl", &["restart", SERVICE])?;
        info!("fail2ban restarted");
        Ok(())
    }

    fn status(&self, jail: &str) -> Result<JailStatus, ProvisionError> {
        let out = self.run(CLIENT, &["status", jail])?;
        Ok(JailStatus::parse(&out))
    }

    fn unban(&self, jail: &str, address: IpAddr) -> Result<(), ProvisionError> {
        self.run(CLIENT, &["set", jail, "unbanip", &address.to_string()])?;
        debug!("Unbanned {} from '{}'", address, jail);
        Ok(())
    }
}
