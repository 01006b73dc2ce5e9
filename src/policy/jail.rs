//! Service-scoped jail definitions.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::duration::{BanTime, PolicyDuration};
use crate::error::ProvisionError;

pub const SSHD: &str = "sshd";
pub const APACHE_AUTH: &str = "apache-auth";
pub const APACHE_BADBOTS: &str = "apache-badbots";
pub const NGINX_HTTP_AUTH: &str = "nginx-http-auth";
pub const VSFTPD: &str = "vsftpd";
pub const CUSTOM_BLOCKLIST: &str = "custom-blocklist";

/// One entry of a jail's `port` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortSpec {
    /// Service name from /etc/services (`ssh`, `http`)
    Named(String),
    Number(u16),
    /// Inclusive range, rendered `low:high`
    Range(u16, u16),
}

impl PortSpec {
    pub fn named(name: &str) -> Self {
        PortSpec::Named(name.to_string())
    }

    /// Every TCP/UDP port.
    pub fn all() -> Self {
        PortSpec::Range(0, 65535)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Named(name) => f.write_str(name),
            PortSpec::Number(n) => write!(f, "{}", n),
            PortSpec::Range(low, high) => write!(f, "{}:{}", low, high),
        }
    }
}

impl FromStr for PortSpec {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ProvisionError::InvalidInput(format!("invalid port '{}'", s));

        if let Some((low, high)) = s.split_once(':') {
            let low: u16 = low.parse().map_err(|_| invalid())?;
            let high: u16 = high.parse().map_err(|_| invalid())?;
            if low > high {
                return Err(invalid());
            }
            return Ok(PortSpec::Range(low, high));
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return s.parse::<u16>().map(PortSpec::Number).map_err(|_| invalid());
        }
        if !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Ok(PortSpec::Named(s.to_string()));
        }
        Err(invalid())
    }
}

impl TryFrom<String> for PortSpec {
    type Error = ProvisionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortSpec> for String {
    fn from(p: PortSpec) -> Self {
        p.to_string()
    }
}

/// Protection rule set for one service.
///
/// Empty `ports`/`log_paths` and `None` fields are "not set" and are
/// never written out; a jail created from an override alone carries only
/// the fields that override touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailDefinition {
    pub name: String,
    pub enabled: Option<bool>,
    pub ports: Vec<PortSpec>,
    pub filter: Option<String>,
    pub log_paths: Vec<PathBuf>,
    pub max_retry: Option<u32>,
    pub find_time: Option<PolicyDuration>,
    pub ban_time: Option<BanTime>,
}

impl JailDefinition {
    /// A jail with nothing set but its name.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: None,
            ports: Vec::new(),
            filter: None,
            log_paths: Vec::new(),
            max_retry: None,
            find_time: None,
            ban_time: None,
        }
    }

    /// An enabled jail whose filter shares its name.
    pub fn enabled(name: &str, ports: Vec<PortSpec>, log_paths: Vec<PathBuf>) -> Self {
        Self {
            enabled: Some(true),
            ports,
            filter: Some(name.to_string()),
            log_paths,
            ..Self::empty(name)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// First log path; where verification writes its synthetic records.
    pub fn primary_log(&self) -> Option<&PathBuf> {
        self.log_paths.first()
    }
}

/// Fields of a jail that an override layer can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JailField {
    Enabled,
    Port,
    Filter,
    LogPath,
    MaxRetry,
    FindTime,
    BanTime,
}

/// An address the custom blocklist jail bans unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlocklistEntry {
    pub address: IpNet,
}

impl From<IpNet> for BlocklistEntry {
    fn from(address: IpNet) -> Self {
        Self { address }
    }
}

impl fmt::Display for BlocklistEntry {
    /// Single hosts are written without a prefix length.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.prefix_len() == self.address.max_prefix_len() {
            write!(f, "{}", self.address.addr())
        } else {
            write!(f, "{}", self.address)
        }
    }
}
