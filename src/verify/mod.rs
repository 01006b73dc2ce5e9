//! Post-install ban verification.
//!
//! Restart the daemon, append synthetic failures for a probe address to
//! a jail's log, and check that the daemon banned it. If not, tighten
//! the jail once (lower retry threshold, shorter window, event-driven
//! log backend), rewrite the configuration and probe again. A second
//! miss is reported as-is.
//!
//! A daemon that fails to restart, or a log that cannot be appended to,
//! counts as a miss for that attempt; the error is kept in the outcome
//! for the caller to report.
//!
//! ```text
//! Idle -> Restarted -> Probing -> Banned ----------------------> Done
//!                                 NotBanned -> Remediated -> Restarted -> Probing -> ... -> Done
//! ```

pub mod probe;

use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::config::VerificationSettings;
use crate::daemon::BanDaemon;
use crate::error::ProvisionError;
use crate::fs_abstraction::FileSystem;
use crate::policy::{
    DefaultsPatch, EffectivePolicy, JailPatch, LayerScope, LogBackend, OverrideLayer,
    PolicyDuration,
};
use crate::writer::ConfigWriter;
use probe::ProbeFormat;

/// Rank of the remediation layer; above every answer-derived layer.
pub const REMEDIATION_RANK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    Banned,
    NotBanned,
    Skipped,
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Banned => write!(f, "banned"),
            VerificationResult::NotBanned => write!(f, "not banned"),
            VerificationResult::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyState {
    Idle,
    Restarted,
    Probing,
    Banned,
    NotBanned,
    Remediated,
    Done,
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub result: VerificationResult,
    /// 0 or 1
    pub remediations: u32,
    pub trace: Vec<VerifyState>,
    /// Policy in force at the end; differs from the input after remediation
    pub policy: EffectivePolicy,
    /// Failed attempts, oldest first
    pub errors: Vec<ProvisionError>,
}

/// Where a remediated policy is persisted before the daemon restarts.
pub trait PolicySink {
    fn store(&mut self, policy: &EffectivePolicy) -> Result<(), ProvisionError>;
}

impl<F: FileSystem + ?Sized> PolicySink for ConfigWriter<'_, F> {
    fn store(&mut self, policy: &EffectivePolicy) -> Result<(), ProvisionError> {
        self.write(policy).map(|_| ())
    }
}

/// Override layer that tightens `jail` one step.
pub fn remediation_layer(
    policy: &EffectivePolicy,
    jail: &str,
    settings: &VerificationSettings,
) -> OverrideLayer {
    let (max_retry, find_time) = match policy.jail(jail) {
        Some(def) => (
            policy.effective_max_retry(def),
            policy.effective_find_time(def),
        ),
        None => (policy.defaults.max_retry, policy.defaults.find_time),
    };

    let tightened_retry = max_retry.saturating_sub(settings.remediation_step).max(1);
    let tightened_window = PolicyDuration::from_secs(
        (find_time.as_secs() / 2).max(settings.min_find_time.as_secs()),
    );

    OverrideLayer::new(REMEDIATION_RANK, LayerScope::PerService)
        .with_defaults(DefaultsPatch {
            backend: Some(LogBackend::EventDriven),
            ..Default::default()
        })
        .with_jail(
            jail,
            JailPatch {
                max_retry: Some(tightened_retry),
                find_time: Some(tightened_window),
                ..Default::default()
            },
        )
}

pub struct VerificationRunner<'a, D: BanDaemon + ?Sized, F: FileSystem + ?Sized> {
    daemon: &'a D,
    fs: &'a F,
    settings: VerificationSettings,
}

impl<'a, D: BanDaemon + ?Sized, F: FileSystem + ?Sized> VerificationRunner<'a, D, F> {
    pub fn new(daemon: &'a D, fs: &'a F, settings: VerificationSettings) -> Self {
        Self {
            daemon,
            fs,
            settings,
        }
    }

    pub async fn verify<S: PolicySink + ?Sized>(
        &self,
        mut policy: EffectivePolicy,
        jail: &str,
        probe_address: Option<IpAddr>,
        sink: &mut S,
    ) -> Result<VerificationOutcome, ProvisionError> {
        let mut trace = vec![VerifyState::Idle];

        let Some(address) = probe_address else {
            info!("No probe address; skipping verification");
            trace.push(VerifyState::Done);
            return Ok(VerificationOutcome {
                result: VerificationResult::Skipped,
                remediations: 0,
                trace,
                policy,
                errors: Vec::new(),
            });
        };

        let definition = policy
            .jail(jail)
            .filter(|j| j.is_enabled())
            .ok_or_else(|| {
                ProvisionError::InvalidInput(format!("jail '{}' is not enabled", jail))
            })?;
        if policy.defaults.ignore_list.iter().any(|n| n.contains(&address)) {
            return Err(ProvisionError::InvalidInput(format!(
                "probe address {} is in the ignore list",
                address
            )));
        }
        let log = definition.primary_log().cloned();
        let (Some(format), Some(log)) = (ProbeFormat::for_jail(jail), log) else {
            warn!("Jail '{}' cannot be probed; skipping verification", jail);
            trace.push(VerifyState::Done);
            return Ok(VerificationOutcome {
                result: VerificationResult::Skipped,
                remediations: 0,
                trace,
                policy,
                errors: Vec::new(),
            });
        };

        let mut remediations = 0;
        let mut errors = Vec::new();
        loop {
            let banned = match self.attempt(format, &log, jail, address, &mut trace).await {
                Ok(banned) => banned,
                Err(e) => {
                    warn!("Verification attempt failed: {}", e);
                    errors.push(e);
                    false
                }
            };

            if banned {
                trace.push(VerifyState::Banned);
                info!("Verification passed: {} banned by '{}'", address, jail);
                if let Err(e) = self.daemon.unban(jail, address) {
                    warn!("Failed to lift probe ban on {}: {}", address, e);
                }
                trace.push(VerifyState::Done);
                return Ok(VerificationOutcome {
                    result: VerificationResult::Banned,
                    remediations,
                    trace,
                    policy,
                    errors,
                });
            }

            trace.push(VerifyState::NotBanned);
            if remediations > 0 {
                warn!("Probe address {} still not banned after remediation", address);
                trace.push(VerifyState::Done);
                return Ok(VerificationOutcome {
                    result: VerificationResult::NotBanned,
                    remediations,
                    trace,
                    policy,
                    errors,
                });
            }

            let layer = remediation_layer(&policy, jail, &self.settings);
            policy.apply_layer(&layer);
            sink.store(&policy)?;
            remediations += 1;
            trace.push(VerifyState::Remediated);
            warn!(
                "No ban observed; tightened '{}' and switched to the {} backend",
                jail,
                LogBackend::EventDriven.as_config_value()
            );
        }
    }

    /// Restart, probe, settle, check. `Ok(false)` is a clean miss.
    async fn attempt(
        &self,
        format: ProbeFormat,
        log: &std::path::Path,
        jail: &str,
        address: IpAddr,
        trace: &mut Vec<VerifyState>,
    ) -> Result<bool, ProvisionError> {
        self.daemon.restart()?;
        trace.push(VerifyState::Restarted);
        tokio::time::sleep(self.settings.restart_settle()).await;

        trace.push(VerifyState::Probing);
        self.probe(format, log, address).await?;
        tokio::time::sleep(self.settings.probe_settle()).await;

        Ok(self.is_banned(jail, address))
    }

    async fn probe(
        &self,
        format: ProbeFormat,
        log: &std::path::Path,
        address: IpAddr,
    ) -> Result<(), ProvisionError> {
        let count = self.settings.probe_records;
        for seq in 0..count {
            let record = format.render(address, Local::now(), seq);
            self.fs
                .append(log, record.as_bytes())
                .map_err(|e| ProvisionError::config_write(log, e))?;
            if seq + 1 < count {
                tokio::time::sleep(self.settings.record_interval()).await;
            }
        }
        debug!("Appended {} probe record(s) to {:?}", count, log);
        Ok(())
    }

    /// A status query that fails counts as "not banned".
    fn is_banned(&self, jail: &str, address: IpAddr) -> bool {
        match self.daemon.status(jail) {
            Ok(status) => status.is_banned(address),
            Err(e) => {
                warn!("Could not read status of '{}': {}", jail, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::OperatorAnswers;
    use crate::daemon::{JailStatus, MockBanDaemon};
    use crate::firewall::FirewallState;
    use crate::fs_abstraction::MockFileSystem;
    use crate::policy::jail::SSHD;
    use crate::policy::{resolve, PolicyGenerator};
    use crate::services::DetectedServices;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSink {
        stored: Vec<EffectivePolicy>,
    }

    impl PolicySink for RecordingSink {
        fn store(&mut self, policy: &EffectivePolicy) -> Result<(), ProvisionError> {
            self.stored.push(policy.clone());
            Ok(())
        }
    }

    fn baseline() -> EffectivePolicy {
        let gen = PolicyGenerator::new(
            DetectedServices::ssh_only(),
            22,
            PathBuf::from("/etc/fail2ban/blocklist.txt"),
        )
        .generate(FirewallState::None, &OperatorAnswers::default());
        resolve(&gen, &[])
    }

    fn probe_addr() -> IpAddr {
        "192.0.2.10".parse().unwrap()
    }

    fn appending_fs() -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.expect_append()
            .withf(|path, _| path == std::path::Path::new("/var/log/auth.log"))
            .returning(|_, _| Ok(()));
        fs
    }

    fn status_with(banned: bool) -> JailStatus {
        JailStatus {
            banned: if banned { vec![probe_addr()] } else { vec![] },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_skipped_without_probe_address() {
        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().never();
        let fs = MockFileSystem::new();
        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());

        let outcome = runner
            .verify(baseline(), SSHD, None, &mut RecordingSink::default())
            .await
            .unwrap();
        assert_eq!(outcome.result, VerificationResult::Skipped);
        assert_eq!(outcome.trace, vec![VerifyState::Idle, VerifyState::Done]);
    }

    #[tokio::test]
    async fn test_banned_first_try_never_remediates() {
        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().times(1).returning(|| Ok(()));
        daemon
            .expect_status()
            .returning(|_| Ok(status_with(true)));
        daemon.expect_unban().times(1).returning(|_, _| Ok(()));

        let mut fs = MockFileSystem::new();
        fs.expect_append().times(5).returning(|_, _| Ok(()));

        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let mut sink = RecordingSink::default();
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome.result, VerificationResult::Banned);
        assert_eq!(outcome.remediations, 0);
        assert!(!outcome.trace.contains(&VerifyState::Remediated));
        assert!(sink.stored.is_empty());
    }

    #[tokio::test]
    async fn test_remediation_then_banned() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().times(2).returning(|| Ok(()));
        daemon.expect_status().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(status_with(n >= 1))
        });
        daemon.expect_unban().returning(|_, _| Ok(()));

        let fs = appending_fs();
        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let mut sink = RecordingSink::default();
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome.result, VerificationResult::Banned);
        assert_eq!(outcome.remediations, 1);
        assert_eq!(
            outcome.trace,
            vec![
                VerifyState::Idle,
                VerifyState::Restarted,
                VerifyState::Probing,
                VerifyState::NotBanned,
                VerifyState::Remediated,
                VerifyState::Restarted,
                VerifyState::Probing,
                VerifyState::Banned,
                VerifyState::Done,
            ]
        );

        let sshd = outcome.policy.jail(SSHD).unwrap();
        assert_eq!(sshd.max_retry, Some(3));
        assert_eq!(sshd.find_time, Some(PolicyDuration::from_mins(5)));
        assert_eq!(outcome.policy.defaults.backend, LogBackend::EventDriven);
        assert_eq!(sink.stored.len(), 1);
        assert_eq!(sink.stored[0], outcome.policy);
    }

    #[tokio::test]
    async fn test_second_miss_reported_without_further_change() {
        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().times(2).returning(|| Ok(()));
        daemon
            .expect_status()
            .times(2)
            .returning(|_| Ok(status_with(false)));
        daemon.expect_unban().never();

        let fs = appending_fs();
        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let mut sink = RecordingSink::default();
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome.result, VerificationResult::NotBanned);
        assert_eq!(outcome.remediations, 1);
        assert_eq!(sink.stored.len(), 1);
        assert_eq!(outcome.trace.last(), Some(&VerifyState::Done));
    }

    #[tokio::test]
    async fn test_status_error_counts_as_not_banned() {
        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().returning(|| Ok(()));
        daemon
            .expect_status()
            .returning(|_| Err(ProvisionError::Daemon("socket missing".to_string())));

        let fs = appending_fs();
        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut RecordingSink::default())
            .await
            .unwrap();
        assert_eq!(outcome.result, VerificationResult::NotBanned);
    }

    #[tokio::test]
    async fn test_restart_failure_is_a_miss_not_an_error() {
        let mut daemon = MockBanDaemon::new();
        daemon
            .expect_restart()
            .times(2)
            .returning(|| Err(ProvisionError::Daemon("jail sshd: no log file".to_string())));
        daemon.expect_status().never();
        daemon.expect_unban().never();

        let mut fs = MockFileSystem::new();
        fs.expect_append().never();

        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let mut sink = RecordingSink::default();
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome.result, VerificationResult::NotBanned);
        assert_eq!(outcome.remediations, 1);
        assert_eq!(sink.stored.len(), 1);
        assert_eq!(outcome.errors.len(), 2);
        assert!(matches!(outcome.errors[0], ProvisionError::Daemon(_)));
        assert_eq!(
            outcome.trace,
            vec![
                VerifyState::Idle,
                VerifyState::NotBanned,
                VerifyState::Remediated,
                VerifyState::NotBanned,
                VerifyState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_unwritable_log_then_banned() {
        let appends = Arc::new(AtomicU32::new(0));
        let counter = appends.clone();

        let mut daemon = MockBanDaemon::new();
        daemon.expect_restart().times(2).returning(|| Ok(()));
        daemon
            .expect_status()
            .times(1)
            .returning(|_| Ok(status_with(true)));
        daemon.expect_unban().returning(|_, _| Ok(()));

        let mut fs = MockFileSystem::new();
        fs.expect_append().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro"))
            } else {
                Ok(())
            }
        });

        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let outcome = runner
            .verify(baseline(), SSHD, Some(probe_addr()), &mut RecordingSink::default())
            .await
            .unwrap();

        assert_eq!(outcome.result, VerificationResult::Banned);
        assert_eq!(outcome.remediations, 1);
        assert!(matches!(
            outcome.errors.as_slice(),
            [ProvisionError::ConfigWrite { .. }]
        ));
    }

    #[tokio::test]
    async fn test_ignored_probe_address_rejected() {
        let daemon = MockBanDaemon::new();
        let fs = MockFileSystem::new();
        let runner = VerificationRunner::new(&daemon, &fs, VerificationSettings::immediate());
        let err = runner
            .verify(
                baseline(),
                SSHD,
                Some("127.0.0.1".parse().unwrap()),
                &mut RecordingSink::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidInput(_)));
    }

    #[test]
    fn test_remediation_layer_floors() {
        let mut policy = baseline();
        policy.defaults.find_time = PolicyDuration::from_secs(90);
        if let Some(sshd) = policy.jails.iter_mut().find(|j| j.name == SSHD) {
            sshd.max_retry = Some(2);
        }

        let layer = remediation_layer(&policy, SSHD, &VerificationSettings::default());
        let (_, patch) = &layer.jails[0];
        assert_eq!(patch.max_retry, Some(1));
        assert_eq!(patch.find_time, Some(PolicyDuration::from_secs(60)));
        assert_eq!(layer.rank, REMEDIATION_RANK);
    }
}
