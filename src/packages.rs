//! Ban daemon package installation.

use tracing::{info, warn};

use crate::cmd_abstraction::{exec_checked, probe, CommandExecutor};
use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// First manager found, in apt, dnf, yum order.
    pub fn detect<E: CommandExecutor + ?Sized>(executor: &E) -> Option<Self> {
        [PackageManager::Apt, PackageManager::Dnf, PackageManager::Yum]
            .into_iter()
            .find(|pm| probe(executor, pm.binary(), &["--version"]))
    }

    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }

    fn sqlite_package(self) -> &'static str {
        match self {
            PackageManager::Apt => "sqlite3",
            PackageManager::Dnf | PackageManager::Yum => "sqlite",
        }
    }

    fn inotify_package(self) -> &'static str {
        match self {
            PackageManager::Apt => "python3-pyinotify",
            PackageManager::Dnf | PackageManager::Yum => "python3-inotify",
        }
    }
}

/// Packages one run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    pub manager: PackageManager,
    pub packages: Vec<&'static str>,
}

impl PackagePlan {
    /// `persistence` adds the sqlite client; `verification` adds inotify
    /// support so remediation can switch to the event-driven backend.
    pub fn new(manager: PackageManager, persistence: bool, verification: bool) -> Self {
        let mut packages = vec!["fail2ban"];
        if persistence {
            packages.push(manager.sqlite_package());
        }
        if verification {
            packages.push(manager.inotify_package());
        }
        Self { manager, packages }
    }

    pub fn install<E: CommandExecutor + ?Sized>(&self, executor: &E) -> Result<(), ProvisionError> {
        let bin = self.manager.binary();
        if self.manager == PackageManager::Apt {
            // stale indexes are common on fresh hosts; install still may work
            if let Err(e) = exec_checked(executor, bin, &["update", "-q"]) {
                warn!("Package index refresh failed: {:#}", e);
            }
        }

        let mut args = vec!["install", "-y"];
        args.extend(self.packages.iter().copied());
        info!("Installing {} with {}", self.packages.join(" "), bin);
        exec_checked(executor, bin, &args)
            .map_err(|e| ProvisionError::PackageInstall(format!("{:#}", e)))?;
        Ok(())
    }
}
