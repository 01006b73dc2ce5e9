//! Global ban policy, rendered into the `[DEFAULT]` stanza.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::duration::{BanTime, PolicyDuration};
use crate::firewall::FirewallState;

pub const DEFAULT_BAN_TIME: PolicyDuration = PolicyDuration::from_mins(10);
pub const DEFAULT_FIND_TIME: PolicyDuration = PolicyDuration::from_mins(10);
pub const DEFAULT_MAX_RETRY: u32 = 5;
pub const LOOPBACK_IGNORE: &str = "127.0.0.1/8";
pub const PERSISTENCE_DB: &str = "/var/lib/fail2ban/fail2ban.sqlite3";

/// Which ports a ban covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanAction {
    /// Only the jail's own ports
    #[default]
    MultiPort,
    /// Every port for the offending address
    AllPorts,
}

impl BanAction {
    /// fail2ban action name for this strategy on the given front-end.
    pub fn action_name(self, firewall: FirewallState) -> &'static str {
        match (firewall, self) {
            (FirewallState::None, BanAction::MultiPort) => "iptables-multiport",
            (FirewallState::None, BanAction::AllPorts) => "iptables-allports",
            (FirewallState::Ufw, BanAction::MultiPort) => "ufw",
            // ufw's action has no all-ports variant
            (FirewallState::Ufw, BanAction::AllPorts) => "iptables-allports",
            (FirewallState::Firewalld, BanAction::MultiPort) => "firewallcmd-multiport",
            (FirewallState::Firewalld, BanAction::AllPorts) => "firewallcmd-allports",
        }
    }
}

/// How the daemon notices new log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogBackend {
    #[default]
    Auto,
    /// inotify-driven; picks up appended lines without a polling delay
    EventDriven,
}

impl LogBackend {
    pub fn as_config_value(self) -> &'static str {
        match self {
            LogBackend::Auto => "auto",
            LogBackend::EventDriven => "pyinotify",
        }
    }
}

/// Email notification on ban.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAlerts {
    pub destination: String,
    pub sender: String,
}

impl EmailAlerts {
    pub const MTA: &'static str = "sendmail";
    /// Ban, then mail with whois and matching log lines.
    pub const ACTION: &'static str = "%(action_mwl)s";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    /// Ordered, duplicate-free
    pub ignore_list: Vec<IpNet>,
    pub ban_time: BanTime,
    pub find_time: PolicyDuration,
    pub max_retry: u32,
    pub ban_action: BanAction,
    /// Front-end the ban action targets
    pub enforcer: FirewallState,
    pub backend: LogBackend,
    pub persist_path: Option<PathBuf>,
    pub email: Option<EmailAlerts>,
}

impl PolicyDefaults {
    /// Conservative baseline: 10 minute ban and window, 5 retries,
    /// loopback never banned.
    pub fn baseline(enforcer: FirewallState) -> Self {
        Self {
            ignore_list: vec![loopback()],
            ban_time: BanTime::Finite(DEFAULT_BAN_TIME),
            find_time: DEFAULT_FIND_TIME,
            max_retry: DEFAULT_MAX_RETRY,
            ban_action: BanAction::default(),
            enforcer,
            backend: LogBackend::default(),
            persist_path: None,
            email: None,
        }
    }

    /// Add networks to the ignore list, keeping order and skipping
    /// duplicates.
    pub fn extend_ignore_list<I: IntoIterator<Item = IpNet>>(&mut self, nets: I) {
        for net in nets {
            if !self.ignore_list.contains(&net) {
                self.ignore_list.push(net);
            }
        }
    }

    pub fn ban_action_name(&self) -> &'static str {
        self.ban_action.action_name(self.enforcer)
    }
}

pub(crate) fn loopback() -> IpNet {
    // constant input; parse cannot fail
    LOOPBACK_IGNORE
        .parse()
        .unwrap_or_else(|_| IpNet::from(std::net::IpAddr::from([127, 0, 0, 1])))
}
