//! Hand-written fakes for driving whole provisioning runs without root.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use jailsmith::cmd_abstraction::{CommandExecutor, CommandOutput};
use jailsmith::daemon::{BanDaemon, JailStatus};
use jailsmith::fs_abstraction::{FileSystem, RealFileSystem};
use jailsmith::prompt::Prompter;
use jailsmith::ProvisionError;
use tempfile::TempDir;

/// Real filesystem rooted in a temp dir: `/etc/fail2ban` lands at
/// `<tmp>/etc/fail2ban`.
pub struct SandboxFs {
    dir: TempDir,
    inner: RealFileSystem,
}

impl SandboxFs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            inner: RealFileSystem,
        }
    }

    /// A Debian host with sshd logging to /var/log/auth.log.
    pub fn debian() -> Self {
        let fs = Self::new();
        fs.seed("/etc/debian_version", "12.5\n");
        fs
    }

    pub fn host_path(&self, path: &Path) -> PathBuf {
        self.dir
            .path()
            .join(path.strip_prefix("/").unwrap_or(path))
    }

    pub fn seed(&self, path: &str, contents: &str) {
        let target = self.host_path(Path::new(path));
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, contents).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.host_path(Path::new(path))).unwrap()
    }

    pub fn has(&self, path: &str) -> bool {
        self.host_path(Path::new(path)).exists()
    }
}

impl FileSystem for SandboxFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner.read_to_string(&self.host_path(path))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.inner.write_atomic(&self.host_path(path), contents)
    }

    fn append(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let target = self.host_path(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.inner.append(&target, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(&self.host_path(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(&self.host_path(path))
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        self.inner.copy(&self.host_path(from), &self.host_path(to))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(&self.host_path(from), &self.host_path(to))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(&self.host_path(path))
    }

    /// Entries come back as host paths (`/etc/fail2ban/jail.d/x.local`).
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let root = self.dir.path();
        Ok(self
            .inner
            .read_dir(&self.host_path(path))?
            .into_iter()
            .map(|p| Path::new("/").join(p.strip_prefix(root).unwrap_or(&p)))
            .collect())
    }

    fn set_permissions_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.set_permissions_mode(&self.host_path(path), mode)
    }
}

/// Firewall and package manager commands answered from a small script.
pub struct HostExecutor {
    /// `Some("ufw")`, `Some("firewalld")` or `None`
    pub firewall: Option<&'static str>,
    pub firewall_active: bool,
    pub install_fails: bool,
    pub calls: Mutex<Vec<String>>,
}

impl HostExecutor {
    pub fn with_firewall(firewall: Option<&'static str>) -> Self {
        Self {
            firewall,
            firewall_active: true,
            install_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for HostExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> anyhow::Result<CommandOutput> {
        let line = format!("{} {}", cmd, args.join(" "));
        self.calls.lock().unwrap().push(line.trim().to_string());
        let first = args.first().map(String::as_str).unwrap_or("");

        let out = match (cmd, self.firewall) {
            ("ufw", Some("ufw")) => match first {
                "status" if args.len() == 1 => CommandOutput::ok(if self.firewall_active {
                    "Status: active\n"
                } else {
                    "Status: inactive\n"
                }),
                "status" => CommandOutput::ok("Status: active\n\nTo Action From\n22/tcp ALLOW IN Anywhere\n"),
                _ => CommandOutput::ok(""),
            },
            ("firewall-cmd", Some("firewalld")) => match first {
                "--state" => CommandOutput::ok("running\n"),
                "--list-all" => CommandOutput::ok("public (active)\n  services: ssh\n"),
                _ => CommandOutput::ok(""),
            },
            ("apt-get", _) if first == "install" && self.install_fails => {
                CommandOutput::failed(100, "E: Unable to locate package fail2ban")
            }
            ("apt-get", _) => CommandOutput::ok(""),
            _ => return Err(anyhow::anyhow!("{}: command not found", cmd)),
        };
        Ok(out)
    }
}

/// Ban daemon whose `status` answers come from a queue of "banned?" flags.
/// The last flag repeats once the queue is drained.
pub struct FakeDaemon {
    banned: Mutex<VecDeque<bool>>,
    last: Mutex<bool>,
    pub probe: IpAddr,
    pub restarts: Mutex<u32>,
    pub unbans: Mutex<Vec<(String, IpAddr)>>,
    /// Every restart fails, as when a jail's log file is missing
    pub restart_fails: bool,
}

impl FakeDaemon {
    pub fn new(banned: &[bool]) -> Self {
        Self {
            banned: Mutex::new(banned.iter().copied().collect()),
            last: Mutex::new(false),
            probe: "192.0.2.10".parse().unwrap(),
            restarts: Mutex::new(0),
            unbans: Mutex::new(Vec::new()),
            restart_fails: false,
        }
    }

    pub fn restarts(&self) -> u32 {
        *self.restarts.lock().unwrap()
    }
}

impl BanDaemon for FakeDaemon {
    fn restart(&self) -> Result<(), ProvisionError> {
        *self.restarts.lock().unwrap() += 1;
        if self.restart_fails {
            return Err(ProvisionError::Daemon(
                "systemctl restart fail2ban exited with 1: jail 'sshd' has no log file"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn status(&self, _jail: &str) -> Result<JailStatus, ProvisionError> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.banned.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(JailStatus {
            currently_banned: u32::from(*last),
            banned: if *last { vec![self.probe] } else { vec![] },
            ..Default::default()
        })
    }

    fn unban(&self, jail: &str, address: IpAddr) -> Result<(), ProvisionError> {
        self.unbans.lock().unwrap().push((jail.to_string(), address));
        Ok(())
    }
}

/// Says no to every question.
pub struct DecliningPrompter;

impl Prompter for DecliningPrompter {
    fn confirm(&self, _prompt: &str, _default: bool) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn input(&self, prompt: &str, _default: &str) -> anyhow::Result<String> {
        panic!("unexpected input prompt: {}", prompt)
    }
}
