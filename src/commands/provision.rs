//! The provisioning command: privilege check, settings, lock, run.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::answers::OperatorAnswers;
use crate::cmd_abstraction::RealCommandExecutor;
use crate::config::Settings;
use crate::daemon::Fail2banClient;
use crate::error::ProvisionError;
use crate::fs_abstraction::real_fs;
use crate::lock::ProvisionLock;
use crate::prompt::DialoguerPrompter;
use crate::provisioner::Provisioner;

/// Fail unless running as root. Runs before anything touches the host.
pub fn check_root() -> Result<(), ProvisionError> {
    // SAFETY: geteuid() only reads the effective user ID; it has no
    // preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        return Err(ProvisionError::Privilege(
            "jailsmith changes firewall and fail2ban configuration; run it as root (sudo)"
                .to_string(),
        ));
    }
    Ok(())
}

pub async fn run(settings_path: &Path, answers_path: Option<&Path>) -> Result<()> {
    check_root()?;

    let settings = Settings::load_or_default(settings_path)
        .with_context(|| format!("Failed to load settings from {:?}", settings_path))?;
    let scripted = answers_path
        .map(OperatorAnswers::load)
        .transpose()
        .context("Failed to load operator answers")?;

    let _lock = ProvisionLock::acquire(&settings.lock_file)?;
    debug!("Holding {:?}", settings.lock_file);

    let executor = RealCommandExecutor::new();
    let daemon = Fail2banClient::new(&executor);
    let prompter = DialoguerPrompter;
    let provisioner = Provisioner::new(&executor, real_fs(), &daemon, &prompter, settings);

    let report = provisioner.run(scripted).await?;
    report.print();
    Ok(())
}
