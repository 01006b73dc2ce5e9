//! Tool settings for jailsmith.
//!
//! These tune the tool itself (paths, probe timing). The ban policy is
//! decided by operator answers, not here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::DEFAULT_LOCK_FILE;
use crate::policy::PolicyDuration;
use crate::writer::ConfigLayout;

pub const DEFAULT_SETTINGS_FILE: &str = "/etc/jailsmith/settings.yaml";

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// fail2ban configuration root
    pub fail2ban_root: PathBuf,

    /// Address file read by the custom blocklist jail
    pub blocklist_file: PathBuf,

    pub lock_file: PathBuf,

    /// Kept open on the firewall before it is enabled
    pub ssh_port: u16,

    pub verification: VerificationSettings,
}

/// Probe timing and remediation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Wait after a restart before probing
    pub restart_settle_ms: u64,
    pub probe_records: u32,
    pub record_interval_ms: u64,
    /// Wait after the last record before reading status
    pub probe_settle_ms: u64,
    /// Subtracted from the retry threshold on remediation
    pub remediation_step: u32,
    /// Remediation never shrinks the window below this
    pub min_find_time: PolicyDuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fail2ban_root: PathBuf::from("/etc/fail2ban"),
            blocklist_file: PathBuf::from("/etc/fail2ban/blocklist.txt"),
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
            ssh_port: 22,
            verification: VerificationSettings::default(),
        }
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            restart_settle_ms: 5000,
            probe_records: 5,
            record_interval_ms: 1000,
            probe_settle_ms: 3000,
            remediation_step: 2,
            min_find_time: PolicyDuration::from_secs(60),
        }
    }
}

impl VerificationSettings {
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn record_interval(&self) -> Duration {
        Duration::from_millis(self.record_interval_ms)
    }

    pub fn probe_settle(&self) -> Duration {
        Duration::from_millis(self.probe_settle_ms)
    }

    /// No waits at all; for tests and dry environments.
    pub fn immediate() -> Self {
        Self {
            restart_settle_ms: 0,
            record_interval_ms: 0,
            probe_settle_ms: 0,
            ..Self::default()
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path.as_ref()))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Load from `path`, or built-in defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            tracing::debug!("No settings at {:?}, using defaults", path.as_ref());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ssh_port == 0 {
            anyhow::bail!("Invalid ssh_port 0");
        }
        if self.verification.probe_records == 0 {
            anyhow::bail!("verification.probe_records must be at least 1");
        }
        if !self.fail2ban_root.is_absolute() {
            anyhow::bail!(
                "fail2ban_root must be an absolute path: {:?}",
                self.fail2ban_root
            );
        }
        if !self.blocklist_file.is_absolute() {
            anyhow::bail!(
                "blocklist_file must be an absolute path: {:?}",
                self.blocklist_file
            );
        }
        Ok(())
    }

    pub fn layout(&self) -> ConfigLayout {
        ConfigLayout::new(&self.fail2ban_root, &self.blocklist_file)
    }

    /// Commented default settings file.
    pub fn generate_default_yaml() -> String {
        r#"# jailsmith settings
# Missing keys take the values shown here.

fail2ban_root: /etc/fail2ban
blocklist_file: /etc/fail2ban/blocklist.txt
lock_file: /run/jailsmith.lock

# Opened on the firewall before it is enabled
ssh_port: 22

verification:
  restart_settle_ms: 5000
  probe_records: 5
  record_interval_ms: 1000
  probe_settle_ms: 3000
  remediation_step: 2
  min_find_time: 1m
"#
        .to_string()
    }
}
