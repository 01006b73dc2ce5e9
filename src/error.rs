//! Error types for jailsmith.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Permission denied: {0}")]
    Privilege(String),

    #[error("No supported firewall (ufw or firewalld) found; bans may not be enforced")]
    FirewallAbsent,

    #[error("Package installation failed: {0}")]
    PackageInstall(String),

    #[error("Failed to write {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Verification inconclusive: jail '{jail}' did not ban {address} after remediation.\n\
         Check that the jail's log path is the file the service writes to, that the \
         filter matches its log format, and review /var/log/fail2ban.log"
    )]
    VerificationInconclusive { jail: String, address: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ban daemon error: {0}")]
    Daemon(String),
}

impl ProvisionError {
    pub(crate) fn config_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigWrite {
            path: path.into(),
            source,
        }
    }
}
