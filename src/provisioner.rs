//! One provisioning run, end to end.
//!
//! Firewall detection, answers, package installation, policy generation,
//! override resolution, writing and verification, in that order. Every
//! host effect goes through the injected executor, filesystem, daemon
//! and prompter, so the whole run can be driven by fakes.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::answers::{collect_answers, OperatorAnswers};
use crate::cmd_abstraction::CommandExecutor;
use crate::config::Settings;
use crate::daemon::{BanDaemon, JailStatus};
use crate::error::ProvisionError;
use crate::firewall::{self, Detection};
use crate::fs_abstraction::FileSystem;
use crate::packages::{PackageManager, PackagePlan};
use crate::policy::jail::SSHD;
use crate::policy::{layers_from_answers, resolve, EffectivePolicy, PolicyGenerator};
use crate::prompt::Prompter;
use crate::services::DetectedServices;
use crate::verify::{VerificationOutcome, VerificationResult, VerificationRunner};
use crate::writer::{ConfigWriter, WrittenPaths};

/// Everything a run decided and did.
#[derive(Debug)]
pub struct ProvisionReport {
    pub firewall: Detection,
    pub answers: OperatorAnswers,
    pub policy: EffectivePolicy,
    pub written: WrittenPaths,
    pub verification: VerificationOutcome,
    /// Non-fatal problems, shown after the summary
    pub warnings: Vec<ProvisionError>,
    pub firewall_rules: Option<String>,
    pub jail_status: Vec<(String, JailStatus)>,
}

pub struct Provisioner<'a, E, F, D, P>
where
    E: CommandExecutor + ?Sized,
    F: FileSystem + ?Sized,
    D: BanDaemon + ?Sized,
    P: Prompter + ?Sized,
{
    executor: &'a E,
    fs: &'a F,
    daemon: &'a D,
    prompter: &'a P,
    settings: Settings,
}

impl<'a, E, F, D, P> Provisioner<'a, E, F, D, P>
where
    E: CommandExecutor + ?Sized,
    F: FileSystem + ?Sized,
    D: BanDaemon + ?Sized,
    P: Prompter + ?Sized,
{
    pub fn new(executor: &'a E, fs: &'a F, daemon: &'a D, prompter: &'a P, settings: Settings) -> Self {
        Self {
            executor,
            fs,
            daemon,
            prompter,
            settings,
        }
    }

    /// Run once. `scripted` answers replace the questionnaire.
    pub async fn run(&self, scripted: Option<OperatorAnswers>) -> Result<ProvisionReport> {
        let mut warnings = Vec::new();

        let detection = firewall::detect(self.executor, self.settings.ssh_port)
            .context("Firewall detection failed")?;
        if detection.enforcement_uncertain() {
            let proceed = match &scripted {
                Some(answers) => answers.continue_without_firewall,
                None => self.prompter.confirm(
                    "No firewall (ufw/firewalld) found. Continue with raw iptables bans?",
                    false,
                )?,
            };
            if !proceed {
                return Err(ProvisionError::FirewallAbsent.into());
            }
            warn!("{}", ProvisionError::FirewallAbsent);
            warnings.push(ProvisionError::FirewallAbsent);
        }

        let services = DetectedServices::detect(self.fs);
        let answers = match scripted {
            Some(answers) => answers,
            None => collect_answers(self.prompter, &services)?,
        };
        answers.validate()?;

        self.install_packages(&answers)?;

        let generated =
            PolicyGenerator::new(services, self.settings.ssh_port, self.settings.blocklist_file.clone())
                .generate(detection.state, &answers);
        let policy = resolve(&generated, &layers_from_answers(&answers));

        let mut writer = ConfigWriter::new(self.fs, self.settings.layout());
        let written = writer.write(&policy)?;

        let runner = VerificationRunner::new(
            self.daemon,
            self.fs,
            self.settings.verification.clone(),
        );
        let mut verification = runner
            .verify(policy, SSHD, answers.probe_address, &mut writer)
            .await?;
        warnings.append(&mut verification.errors);
        match verification.result {
            VerificationResult::Skipped => {
                if let Err(e) = self.daemon.restart() {
                    warn!("fail2ban did not restart with the new configuration: {}", e);
                    warnings.push(e);
                }
            }
            VerificationResult::NotBanned => {
                let err = ProvisionError::VerificationInconclusive {
                    jail: SSHD.to_string(),
                    address: answers
                        .probe_address
                        .map(|a| a.to_string())
                        .unwrap_or_default(),
                };
                warn!("{}", err);
                warnings.push(err);
            }
            VerificationResult::Banned => {}
        }
        let policy = verification.policy.clone();

        let firewall_rules = match firewall::list_rules(self.executor, detection.state) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Could not list firewall rules: {:#}", e);
                None
            }
        };
        let jail_status = policy
            .enabled_jails()
            .filter_map(|jail| match self.daemon.status(&jail.name) {
                Ok(status) => Some((jail.name.clone(), status)),
                Err(e) => {
                    warn!("Could not read status of '{}': {}", jail.name, e);
                    None
                }
            })
            .collect();

        info!("Provisioning complete");
        Ok(ProvisionReport {
            firewall: detection,
            answers,
            policy,
            written,
            verification,
            warnings,
            firewall_rules,
            jail_status,
        })
    }

    fn install_packages(&self, answers: &OperatorAnswers) -> Result<(), ProvisionError> {
        let manager = PackageManager::detect(self.executor).ok_or_else(|| {
            ProvisionError::PackageInstall(
                "no supported package manager (apt-get, dnf, yum)".to_string(),
            )
        })?;
        PackagePlan::new(
            manager,
            answers.wants_persistence(),
            answers.wants_verification(),
        )
        .install(self.executor)
    }
}

impl ProvisionReport {
    /// Operator-facing summary.
    pub fn print(&self) {
        println!();
        println!("=== jailsmith summary ===");
        println!("Firewall:      {}", self.firewall.state);
        println!("Ban action:    {}", self.policy.defaults.ban_action_name());
        println!("Ban time:      {}", self.policy.defaults.ban_time);
        println!("Find time:     {}", self.policy.defaults.find_time);
        println!("Max retry:     {}", self.policy.defaults.max_retry);
        println!(
            "Jails:         {}",
            self.policy
                .enabled_jails()
                .map(|j| j.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Verification:  {}", self.verification.result);
        if self.verification.remediations > 0 {
            println!("               (after tightening the sshd jail once)");
        }

        println!();
        println!("Files written:");
        for path in self.written.all() {
            println!("  {}", path.display());
        }
        for path in &self.written.backups {
            println!("  {} (backup)", path.display());
        }
        for path in &self.written.removed {
            println!("  {} (removed)", path.display());
        }

        if let Some(rules) = &self.firewall_rules {
            println!();
            println!("Firewall rules:");
            println!("{}", rules.trim_end());
        }

        for (name, status) in &self.jail_status {
            println!();
            println!(
                "[{}] failed now: {}, banned now: {}",
                name, status.currently_failed, status.currently_banned
            );
        }

        if !self.warnings.is_empty() {
            println!();
            println!("Warnings:");
            for warning in &self.warnings {
                println!("  - {}", warning);
            }
        }
    }
}
