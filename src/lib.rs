//! # jailsmith - fail2ban provisioning for a single host
//!
//! Detects the host firewall, gathers the operator's ban preferences,
//! generates a layered fail2ban policy, writes it, and proves it works by
//! getting a probe address banned.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CLI (clap) -> commands::provision -> Provisioner             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  firewall      ufw / firewalld detection, enable if inactive  │
//! │  answers       questionnaire (dialoguer) or --answers YAML    │
//! │  packages      apt-get / dnf / yum                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  policy        generator -> override layers -> resolve        │
//! │  writer        typed INI encoder, backups, atomic writes      │
//! │  verify        restart, probe, check ban, remediate once      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  cmd_abstraction / fs_abstraction / daemon / prompt (seams)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use jailsmith::answers::OperatorAnswers;
//! use jailsmith::firewall::FirewallState;
//! use jailsmith::policy::{layers_from_answers, resolve, PolicyGenerator};
//! use jailsmith::services::DetectedServices;
//! use jailsmith::writer::render_base;
//!
//! let answers = OperatorAnswers::default();
//! let generated = PolicyGenerator::new(
//!     DetectedServices::ssh_only(),
//!     22,
//!     "/etc/fail2ban/blocklist.txt".into(),
//! )
//! .generate(FirewallState::Ufw, &answers);
//! let policy = resolve(&generated, &layers_from_answers(&answers));
//!
//! let jail_local = render_base(&policy).render();
//! assert!(jail_local.contains("[sshd]"));
//! assert!(jail_local.contains("banaction = ufw"));
//! ```
//!
//! ## Modules
//!
//! - [`answers`] - Operator answers and the questionnaire
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Tool settings
//! - [`daemon`] - fail2ban client
//! - [`firewall`] - Firewall front-end detection
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`policy`] - Policy model, generation and override resolution
//! - [`provisioner`] - The end-to-end run
//! - [`verify`] - Ban verification and remediation
//! - [`writer`] - Configuration serialization

pub mod answers;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod firewall;
pub mod fs_abstraction;
pub mod lock;
pub mod packages;
pub mod policy;
pub mod prompt;
pub mod provisioner;
pub mod services;
pub mod validation;
pub mod verify;
pub mod writer;

pub use cli::Cli;
pub use config::Settings;
pub use error::ProvisionError;
