//! Builds the base policy layer from the firewall state and operator
//! answers.

use std::path::PathBuf;
use tracing::{debug, info};

use super::defaults::{BanAction, PolicyDefaults};
use super::duration::BanTime;
use super::jail::{
    BlocklistEntry, JailDefinition, PortSpec, APACHE_AUTH, APACHE_BADBOTS, CUSTOM_BLOCKLIST,
    NGINX_HTTP_AUTH, SSHD, VSFTPD,
};
use crate::answers::OperatorAnswers;
use crate::firewall::FirewallState;
use crate::services::DetectedServices;

/// Retry threshold written on the generated `sshd` jail.
pub const SSH_DEFAULT_MAX_RETRY: u32 = 5;

/// Rank-0 policy: global defaults, jails, and the blocklist addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPolicy {
    pub defaults: PolicyDefaults,
    pub jails: Vec<JailDefinition>,
    pub blocklist: Vec<BlocklistEntry>,
}

pub struct PolicyGenerator {
    services: DetectedServices,
    ssh_port: u16,
    blocklist_file: PathBuf,
}

impl PolicyGenerator {
    pub fn new(services: DetectedServices, ssh_port: u16, blocklist_file: PathBuf) -> Self {
        Self {
            services,
            ssh_port,
            blocklist_file,
        }
    }

    pub fn generate(&self, state: FirewallState, answers: &OperatorAnswers) -> GeneratedPolicy {
        let mut defaults = PolicyDefaults::baseline(state);
        defaults.extend_ignore_list(answers.trusted_networks.iter().copied());
        if answers.enhanced.as_ref().map(|e| e.aggressive).unwrap_or(false) {
            defaults.ban_action = BanAction::AllPorts;
        }

        let mut jails = vec![self.sshd_jail()];

        // service jails need both a detected service and a yes
        if answers.protect_http_auth {
            if let Some(apache) = self.services.apache {
                jails.push(JailDefinition::enabled(
                    APACHE_AUTH,
                    http_ports(),
                    vec![apache.error_log()],
                ));
            }
            if self.services.nginx {
                jails.push(JailDefinition::enabled(
                    NGINX_HTTP_AUTH,
                    http_ports(),
                    vec![self.services.nginx_error_log()],
                ));
            }
        }
        if answers.protect_bad_bots {
            if let Some(apache) = self.services.apache {
                jails.push(JailDefinition::enabled(
                    APACHE_BADBOTS,
                    http_ports(),
                    vec![apache.access_log()],
                ));
            }
        }
        if answers.protect_ftp && self.services.vsftpd {
            jails.push(JailDefinition::enabled(
                VSFTPD,
                ["ftp", "ftp-data", "ftps", "ftps-data"]
                    .iter()
                    .map(|p| PortSpec::named(p))
                    .collect(),
                vec![self.services.vsftpd_log()],
            ));
        }

        let blocklist: Vec<BlocklistEntry> = answers
            .blocklist
            .iter()
            .copied()
            .map(BlocklistEntry::from)
            .collect();
        if !blocklist.is_empty() {
            jails.push(self.blocklist_jail());
        }

        info!(
            "Generated {} jail(s): {}",
            jails.len(),
            jails
                .iter()
                .map(|j| j.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!("Base defaults: {:?}", defaults);

        GeneratedPolicy {
            defaults,
            jails,
            blocklist,
        }
    }

    fn sshd_jail(&self) -> JailDefinition {
        let port = if self.ssh_port == 22 {
            PortSpec::named("ssh")
        } else {
            PortSpec::Number(self.ssh_port)
        };
        JailDefinition {
            max_retry: Some(SSH_DEFAULT_MAX_RETRY),
            ..JailDefinition::enabled(SSHD, vec![port], vec![self.services.ssh_log.clone()])
        }
    }

    /// Any line in the address file is a ban, forever.
    fn blocklist_jail(&self) -> JailDefinition {
        JailDefinition {
            max_retry: Some(1),
            ban_time: Some(BanTime::Permanent),
            ..JailDefinition::enabled(
                CUSTOM_BLOCKLIST,
                vec![PortSpec::all()],
                vec![self.blocklist_file.clone()],
            )
        }
    }
}

fn http_ports() -> Vec<PortSpec> {
    vec![PortSpec::named("http"), PortSpec::named("https")]
}
