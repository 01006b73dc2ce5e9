//! Operator answers, gathered once up front.
//!
//! Policy generation never prompts; it reads an [`OperatorAnswers`] value
//! that comes either from the interactive questionnaire in
//! [`collect_answers`] or from a YAML file passed with `--answers`.

use anyhow::{Context, Result};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use tracing::warn;

use crate::error::ProvisionError;
use crate::policy::defaults::{loopback, EmailAlerts};
use crate::policy::duration::{BanTime, PolicyDuration};
use crate::prompt::Prompter;
use crate::services::DetectedServices;
use crate::validation::{deserialize_nets, parse_address_list, validate_email, validate_ip};

/// Bad input is re-asked this many times before the run aborts.
const MAX_ATTEMPTS: usize = 3;

/// Default probe target: TEST-NET-1, never a real client.
pub const DEFAULT_PROBE_ADDRESS: &str = "192.0.2.10";

/// Enhanced-security tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedSecurity {
    /// `-1` is a permanent ban
    pub ban_time: BanTime,
    pub max_retry: u32,
    pub find_time: PolicyDuration,
    /// Ban on all ports instead of the service's ports
    pub aggressive: bool,
    pub email: Option<EmailAlerts>,
    /// Keep bans in an sqlite database across restarts
    pub persistence: bool,
}

impl Default for EnhancedSecurity {
    fn default() -> Self {
        Self {
            ban_time: BanTime::Finite(PolicyDuration::from_secs(3600)),
            max_retry: 3,
            find_time: PolicyDuration::from_mins(10),
            aggressive: false,
            email: None,
            persistence: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorAnswers {
    /// Proceed even though no firewall front-end was found
    pub continue_without_firewall: bool,
    /// Never banned, in addition to loopback
    #[serde(deserialize_with = "deserialize_nets")]
    pub trusted_networks: Vec<IpNet>,
    pub enhanced: Option<EnhancedSecurity>,
    pub protect_http_auth: bool,
    pub protect_bad_bots: bool,
    pub protect_ftp: bool,
    /// Banned permanently on sight
    #[serde(deserialize_with = "deserialize_nets")]
    pub blocklist: Vec<IpNet>,
    /// Address used for the post-install ban probe
    pub probe_address: Option<IpAddr>,
}

impl OperatorAnswers {
    /// Load scripted answers from YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read answers file: {:?}", path.as_ref()))?;
        let answers: OperatorAnswers = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse answers file: {:?}", path.as_ref()))?;
        answers.validate()?;
        Ok(answers)
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        if let Some(enhanced) = &self.enhanced {
            if enhanced.max_retry == 0 {
                return Err(ProvisionError::InvalidInput(
                    "max_retry must be at least 1".to_string(),
                ));
            }
            if let Some(email) = &enhanced.email {
                for addr in [&email.destination, &email.sender] {
                    validate_email(addr)
                        .map_err(|e| ProvisionError::InvalidInput(e.to_string()))?;
                }
            }
        }
        if let Some(probe) = self.probe_address {
            if self.is_ignored(probe) {
                return Err(ProvisionError::InvalidInput(format!(
                    "probe address {} is in the ignore list and can never be banned",
                    probe
                )));
            }
        }
        Ok(())
    }

    /// Would fail2ban ignore this address under these answers?
    pub fn is_ignored(&self, addr: IpAddr) -> bool {
        loopback().contains(&addr) || self.trusted_networks.iter().any(|n| n.contains(&addr))
    }

    pub fn wants_verification(&self) -> bool {
        self.probe_address.is_some()
    }

    pub fn wants_persistence(&self) -> bool {
        self.enhanced.as_ref().map(|e| e.persistence).unwrap_or(false)
    }
}

/// Interactive questionnaire.
///
/// Service questions are only asked for services that were detected.
pub fn collect_answers<P: Prompter + ?Sized>(
    prompter: &P,
    services: &DetectedServices,
) -> Result<OperatorAnswers> {
    let mut answers = OperatorAnswers::default();

    if prompter.confirm("Add trusted IPs or networks that must never be banned?", false)? {
        answers.trusted_networks = ask_parsed(
            prompter,
            "Trusted IPs/CIDRs (comma-separated)",
            "",
            |s| parse_address_list(s).map_err(|e| e.to_string()),
        )?;
    }

    if prompter.confirm("Configure enhanced security settings?", false)? {
        answers.enhanced = Some(collect_enhanced(prompter)?);
    }

    if services.has_http_server()
        && prompter.confirm(
            "Web server detected. Protect HTTP authentication against brute force?",
            true,
        )?
    {
        answers.protect_http_auth = true;
    }
    if services.apache.is_some()
        && prompter.confirm("Apache detected. Ban known bad bots and scanners?", true)?
    {
        answers.protect_bad_bots = true;
    }
    if services.vsftpd && prompter.confirm("vsftpd detected. Protect FTP logins?", true)? {
        answers.protect_ftp = true;
    }

    if prompter.confirm("Add a custom blocklist of addresses to ban permanently?", false)? {
        answers.blocklist = ask_parsed(
            prompter,
            "Addresses/CIDRs to block (comma-separated)",
            "",
            |s| parse_address_list(s).map_err(|e| e.to_string()),
        )?;
    }

    if prompter.confirm(
        "Verify the setup by simulating failed logins from a test address?",
        true,
    )? {
        let trusted = answers.clone();
        answers.probe_address = Some(ask_parsed(
            prompter,
            "Probe address (must not be one you use)",
            DEFAULT_PROBE_ADDRESS,
            |s| {
                let addr = validate_ip(s).map_err(|e| e.to_string())?;
                if trusted.is_ignored(addr) {
                    return Err(format!("{} is ignored by the policy and cannot be banned", addr));
                }
                Ok(addr)
            },
        )?);
    }

    Ok(answers)
}

fn collect_enhanced<P: Prompter + ?Sized>(prompter: &P) -> Result<EnhancedSecurity> {
    let defaults = EnhancedSecurity::default();

    let ban_time = ask_parsed(
        prompter,
        "Ban time (e.g. 1h, 1d; -1 for permanent)",
        &defaults.ban_time.to_string(),
        |s| s.parse::<BanTime>().map_err(|e| e.to_string()),
    )?;
    let max_retry = ask_parsed(
        prompter,
        "Failures allowed before a ban (maxretry)",
        &defaults.max_retry.to_string(),
        |s| match s.trim().parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(format!("'{}' is not a whole number of at least 1", s)),
        },
    )?;
    let find_time = ask_parsed(
        prompter,
        "Window in which failures are counted (findtime)",
        &defaults.find_time.to_string(),
        |s| s.parse::<PolicyDuration>().map_err(|e| e.to_string()),
    )?;
    let aggressive = prompter.confirm(
        "Ban offenders on all ports instead of only the attacked service?",
        false,
    )?;

    let email = if prompter.confirm("Send an email alert on each ban?", false)? {
        let destination = ask_parsed(prompter, "Alert recipient", "", email_parser)?;
        let sender = ask_parsed(prompter, "Alert sender", "fail2ban@localhost", email_parser)?;
        Some(EmailAlerts {
            destination,
            sender,
        })
    } else {
        None
    };

    let persistence = prompter.confirm("Keep bans across daemon restarts (sqlite)?", false)?;

    Ok(EnhancedSecurity {
        ban_time,
        max_retry,
        find_time,
        aggressive,
        email,
        persistence,
    })
}

fn email_parser(s: &str) -> Result<String, String> {
    validate_email(s).map_err(|e| e.to_string())?;
    Ok(s.trim().to_string())
}

fn ask_parsed<P, T, F>(prompter: &P, prompt: &str, default: &str, parse: F) -> Result<T>
where
    P: Prompter + ?Sized,
    F: Fn(&str) -> Result<T, String>,
{
    for _ in 0..MAX_ATTEMPTS {
        let raw = prompter.input(prompt, default)?;
        match parse(&raw) {
            Ok(value) => return Ok(value),
            Err(reason) => warn!("{}", reason),
        }
    }
    Err(ProvisionError::InvalidInput(format!(
        "no valid answer to '{}' after {} attempts",
        prompt, MAX_ATTEMPTS
    ))
    .into())
}
