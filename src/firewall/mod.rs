//! Firewall front-end detection (ufw, firewalld).
//!
//! Detection runs once per provisioning run, before policy generation.
//! A front-end that is installed but inactive is enabled on the spot,
//! after the management (SSH) port has been opened, so that the ban
//! actions chosen later have a live packet filter behind them.

mod firewalld;
mod ufw;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub use firewalld::Firewalld;
pub use ufw::Ufw;

use crate::cmd_abstraction::CommandExecutor;

/// Which packet-filter front-end enforces bans on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallState {
    /// Neither ufw nor firewalld; fail2ban falls back to raw iptables.
    None,
    Ufw,
    Firewalld,
}

impl fmt::Display for FirewallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallState::None => f.write_str("none"),
            FirewallState::Ufw => f.write_str("ufw"),
            FirewallState::Firewalld => f.write_str("firewalld"),
        }
    }
}

/// Operations jailsmith needs from a firewall front-end.
pub trait FirewallFrontend {
    fn state(&self) -> FirewallState;

    fn is_installed(&self) -> bool;

    fn is_active(&self) -> bool;

    /// Permit inbound TCP on `port`. Must work while the front-end is
    /// still inactive so the rule is in place before enabling.
    fn allow_port(&self, port: u16) -> Result<()>;

    fn enable(&self) -> Result<()>;

    /// Human-readable rule listing, passed through unparsed.
    fn list_rules(&self) -> Result<String>;
}

/// Outcome of [`detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub state: FirewallState,
    /// The front-end was found inactive and had to be enabled.
    pub enabled_now: bool,
}

impl Detection {
    /// No front-end means bans go to iptables directly and may be
    /// shadowed by other rules; the operator should be told.
    pub fn enforcement_uncertain(&self) -> bool {
        self.state == FirewallState::None
    }
}

/// Probe ufw, then firewalld. The first installed one wins.
pub fn detect<E: CommandExecutor + ?Sized>(executor: &E, management_port: u16) -> Result<Detection> {
    let ufw = Ufw::new(executor);
    let firewalld = Firewalld::new(executor);
    let frontends: [&dyn FirewallFrontend; 2] = [&ufw, &firewalld];
    detect_among(&frontends, management_port)
}

pub(crate) fn detect_among(
    frontends: &[&dyn FirewallFrontend],
    management_port: u16,
) -> Result<Detection> {
    for frontend in frontends {
        let state = frontend.state();
        if !frontend.is_installed() {
            debug!("{} not installed", state);
            continue;
        }

        if frontend.is_active() {
            info!("Detected active firewall: {}", state);
            return Ok(Detection {
                state,
                enabled_now: false,
            });
        }

        warn!("{} is installed but inactive; enabling it", state);
        frontend
            .allow_port(management_port)
            .with_context(|| format!("Failed to allow port {} in {}", management_port, state))?;
        frontend
            .enable()
            .with_context(|| format!("Failed to enable {}", state))?;
        info!("{} enabled with port {}/tcp open", state, management_port);
        return Ok(Detection {
            state,
            enabled_now: true,
        });
    }

    warn!("No firewall front-end found (ufw, firewalld)");
    Ok(Detection {
        state: FirewallState::None,
        enabled_now: false,
    })
}

/// Rule listing for the detected front-end, or `None` without one.
pub fn list_rules<E: CommandExecutor + ?Sized>(
    executor: &E,
    state: FirewallState,
) -> Result<Option<String>> {
    match state {
        FirewallState::None => Ok(None),
        FirewallState::Ufw => Ufw::new(executor).list_rules().map(Some),
        FirewallState::Firewalld => Firewalld::new(executor).list_rules().map(Some),
    }
}
