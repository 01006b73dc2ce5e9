//! Serializes an [`EffectivePolicy`] into fail2ban's configuration tree.
//!
//! Artifacts, relative to the fail2ban root:
//!
//! - `jail.local`: `[DEFAULT]` plus one stanza per jail
//! - `jail.d/<jail>.local`: fields set by per-service layers
//! - `filter.d/custom-blocklist.conf`: filter for the blocklist jail
//! - the blocklist address file (path from settings)
//!
//! Every target that already exists is copied to `<file>.backup` before
//! anything is written. A writer remembers what it has backed up, so a
//! second write in the same run (after remediation) keeps the pre-run
//! backup intact. A backup left by an earlier run is renamed to
//! `<file>.backup.<timestamp>` first, so no backup is ever overwritten.
//!
//! Override files and the blocklist filter that carry our header but are
//! no longer part of the policy are backed up and removed, so fail2ban
//! never loads a stale `jail.d` override on top of `jail.local`.

pub mod ini;

use chrono::Local;
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ProvisionError;
use crate::fs_abstraction::FileSystem;
use crate::policy::defaults::EmailAlerts;
use crate::policy::jail::{BlocklistEntry, JailDefinition, JailField, CUSTOM_BLOCKLIST};
use crate::policy::EffectivePolicy;
use crate::validation::validate_jail_name;
use ini::{IniDocument, IniSection};

pub const BASE_FILE: &str = "jail.local";
pub const OVERRIDE_DIR: &str = "jail.d";
pub const FILTER_DIR: &str = "filter.d";
pub const BACKUP_SUFFIX: &str = ".backup";

/// Matches a line holding nothing but an address or CIDR range.
pub const BLOCKLIST_FAILREGEX: &str = r"^<SUBNET>\s*$";

const HEADER: &str = "Managed by jailsmith; local edits are replaced on the next run.";
const CONFIG_MODE: u32 = 0o644;
const ROTATE_STAMP: &str = "%Y%m%d%H%M%S";

/// Where the artifacts live on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    root: PathBuf,
    blocklist_file: PathBuf,
}

impl ConfigLayout {
    pub fn new(root: impl Into<PathBuf>, blocklist_file: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            blocklist_file: blocklist_file.into(),
        }
    }

    pub fn base_file(&self) -> PathBuf {
        self.root.join(BASE_FILE)
    }

    pub fn override_dir(&self) -> PathBuf {
        self.root.join(OVERRIDE_DIR)
    }

    pub fn override_file(&self, jail: &str) -> PathBuf {
        self.override_dir().join(format!("{}.local", jail))
    }

    pub fn blocklist_filter(&self) -> PathBuf {
        self.root
            .join(FILTER_DIR)
            .join(format!("{}.conf", CUSTOM_BLOCKLIST))
    }

    pub fn blocklist_file(&self) -> &Path {
        &self.blocklist_file
    }
}

/// `jail.local` -> `jail.local.backup`
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// True when `contents` was rendered by this writer.
pub fn is_managed(contents: &str) -> bool {
    contents
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("# "))
        == Some(HEADER)
}

/// What a write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenPaths {
    pub base: PathBuf,
    pub overrides: Vec<PathBuf>,
    pub blocklist_filter: Option<PathBuf>,
    pub blocklist_addresses: Option<PathBuf>,
    /// Backups created by this call
    pub backups: Vec<PathBuf>,
    /// Stale managed files removed by this call
    pub removed: Vec<PathBuf>,
}

impl WrittenPaths {
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.base)
            .chain(self.overrides.iter())
            .chain(self.blocklist_filter.iter())
            .chain(self.blocklist_addresses.iter())
    }
}

pub struct ConfigWriter<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    layout: ConfigLayout,
    /// Targets seen this run; each is backed up at most once
    seen: HashSet<PathBuf>,
    /// Suffix for backups rotated out of the way by this run
    stamp: String,
}

impl<'a, F: FileSystem + ?Sized> ConfigWriter<'a, F> {
    pub fn new(fs: &'a F, layout: ConfigLayout) -> Self {
        Self {
            fs,
            layout,
            seen: HashSet::new(),
            stamp: Local::now().format(ROTATE_STAMP).to_string(),
        }
    }

    pub fn with_backup_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = stamp.into();
        self
    }

    pub fn layout(&self) -> &ConfigLayout {
        &self.layout
    }

    /// Render, back up, then write every artifact for `policy` and remove
    /// managed files the policy no longer needs.
    ///
    /// Nothing is written or removed if any backup fails.
    pub fn write(&mut self, policy: &EffectivePolicy) -> Result<WrittenPaths, ProvisionError> {
        for jail in &policy.jails {
            validate_jail_name(&jail.name)
                .map_err(|e| ProvisionError::InvalidInput(e.to_string()))?;
        }

        let mut artifacts: Vec<(PathBuf, String)> = Vec::new();
        let mut written = WrittenPaths {
            base: self.layout.base_file(),
            ..Default::default()
        };
        artifacts.push((written.base.clone(), render_base(policy).render()));

        for (name, fields) in &policy.service_overrides {
            let Some(jail) = policy.jail(name) else {
                continue;
            };
            let doc = render_override(jail, fields);
            if doc.sections().iter().all(IniSection::is_empty) {
                continue;
            }
            let path = self.layout.override_file(name);
            artifacts.push((path.clone(), doc.render()));
            written.overrides.push(path);
        }

        if !policy.blocklist.is_empty() {
            let filter = self.layout.blocklist_filter();
            artifacts.push((filter.clone(), render_blocklist_filter().render()));
            written.blocklist_filter = Some(filter);

            let addresses = self.layout.blocklist_file().to_path_buf();
            artifacts.push((addresses.clone(), render_blocklist_addresses(&policy.blocklist)));
            written.blocklist_addresses = Some(addresses);
        }

        let targets: HashSet<&Path> = artifacts.iter().map(|(p, _)| p.as_path()).collect();
        let stale = self.stale_files(&targets)?;

        for path in artifacts.iter().map(|(p, _)| p).chain(stale.iter()) {
            if let Some(backup) = self.backup_once(path)? {
                written.backups.push(backup);
            }
        }

        for (path, contents) in &artifacts {
            if let Some(parent) = path.parent() {
                self.fs
                    .create_dir_all(parent)
                    .map_err(|e| ProvisionError::config_write(parent, e))?;
            }
            self.fs
                .write_atomic(path, contents.as_bytes())
                .map_err(|e| ProvisionError::config_write(path, e))?;
            self.fs
                .set_permissions_mode(path, CONFIG_MODE)
                .map_err(|e| ProvisionError::config_write(path, e))?;
            debug!("Wrote {:?} ({} bytes)", path, contents.len());
        }

        for path in stale {
            match self.fs.remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ProvisionError::config_write(&path, e)),
            }
            info!("Removed stale {:?}", path);
            written.removed.push(path);
        }

        info!(
            "Wrote {} configuration file(s), {} backup(s), removed {}",
            artifacts.len(),
            written.backups.len(),
            written.removed.len()
        );
        Ok(written)
    }

    /// Managed override files and blocklist filter not in `targets`.
    /// Files without our header belong to the operator and are left alone.
    fn stale_files(&self, targets: &HashSet<&Path>) -> Result<Vec<PathBuf>, ProvisionError> {
        let dir = self.layout.override_dir();
        let mut candidates = match self.fs.read_dir(&dir) {
            Ok(entries) => entries
                .into_iter()
                .filter(|p| p.extension().is_some_and(|ext| ext == "local"))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ProvisionError::config_write(dir, e)),
        };
        candidates.push(self.layout.blocklist_filter());

        Ok(candidates
            .into_iter()
            .filter(|p| !targets.contains(p.as_path()))
            .filter(|p| {
                self.fs
                    .read_to_string(p)
                    .map(|contents| is_managed(&contents))
                    .unwrap_or(false)
            })
            .collect())
    }

    fn backup_once(&mut self, path: &Path) -> Result<Option<PathBuf>, ProvisionError> {
        if !self.seen.insert(path.to_path_buf()) {
            return Ok(None);
        }
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let backup = backup_path(path);
        if self.fs.exists(&backup) {
            let rotated = self.rotated_path(&backup);
            self.fs
                .rename(&backup, &rotated)
                .map_err(|e| ProvisionError::config_write(&rotated, e))?;
            info!("Kept earlier backup as {:?}", rotated);
        }
        self.fs
            .copy(path, &backup)
            .map_err(|e| ProvisionError::config_write(&backup, e))?;
        info!("Backed up {:?} to {:?}", path, backup);
        Ok(Some(backup))
    }

    /// `<backup>.<stamp>`, or `<backup>.<stamp>.<n>` if that is taken.
    fn rotated_path(&self, backup: &Path) -> PathBuf {
        let mut candidate = with_suffix(backup, &format!(".{}", self.stamp));
        let mut n = 1;
        while self.fs.exists(&candidate) {
            candidate = with_suffix(backup, &format!(".{}.{}", self.stamp, n));
            n += 1;
        }
        candidate
    }
}

/// `jail.local`: global defaults followed by every jail.
pub fn render_base(policy: &EffectivePolicy) -> IniDocument {
    let mut doc = IniDocument::new().with_header(HEADER);

    let d = &policy.defaults;
    let mut defaults = IniSection::new("DEFAULT");
    defaults
        .set(
            "ignoreip",
            d.ignore_list
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        )
        .set("bantime", d.ban_time)
        .set("findtime", d.find_time)
        .set("maxretry", d.max_retry)
        .set("banaction", d.ban_action_name())
        .set("backend", d.backend.as_config_value())
        .set_opt("dbfile", d.persist_path.as_ref().map(|p| p.display()));
    if let Some(email) = &d.email {
        defaults
            .set("destemail", &email.destination)
            .set("sender", &email.sender)
            .set("mta", EmailAlerts::MTA)
            .set("action", EmailAlerts::ACTION);
    }
    doc.push(defaults);

    for jail in &policy.jails {
        let mut section = IniSection::new(jail.name.as_str());
        for field in ALL_FIELDS {
            write_field(&mut section, jail, field);
        }
        if section.is_empty() {
            debug!("Jail '{}' has no fields set; not rendered", jail.name);
            continue;
        }
        doc.push(section);
    }
    doc
}

/// `jail.d/<name>.local`: only the listed fields.
pub fn render_override(jail: &JailDefinition, fields: &BTreeSet<JailField>) -> IniDocument {
    let mut doc = IniDocument::new().with_header(HEADER);
    let mut section = IniSection::new(jail.name.as_str());
    for field in fields {
        write_field(&mut section, jail, *field);
    }
    doc.push(section);
    doc
}

pub fn render_blocklist_filter() -> IniDocument {
    let mut doc = IniDocument::new().with_header(HEADER);
    let mut definition = IniSection::new("Definition");
    definition
        .set("failregex", BLOCKLIST_FAILREGEX)
        .set("ignoreregex", "")
        .set("datepattern", "{NONE}");
    doc.push(definition);
    doc
}

/// One address per line.
pub fn render_blocklist_addresses(entries: &[BlocklistEntry]) -> String {
    entries.iter().map(|e| format!("{}\n", e)).collect()
}

const ALL_FIELDS: [JailField; 7] = [
    JailField::Enabled,
    JailField::Port,
    JailField::Filter,
    JailField::LogPath,
    JailField::MaxRetry,
    JailField::FindTime,
    JailField::BanTime,
];

fn write_field(section: &mut IniSection, jail: &JailDefinition, field: JailField) {
    match field {
        JailField::Enabled => {
            section.set_opt("enabled", jail.enabled);
        }
        JailField::Port if !jail.ports.is_empty() => {
            section.set(
                "port",
                jail.ports
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        JailField::Filter => {
            section.set_opt("filter", jail.filter.as_deref());
        }
        JailField::LogPath if !jail.log_paths.is_empty() => {
            section.set_many(
                "logpath",
                jail.log_paths.iter().map(|p| p.display().to_string()),
            );
        }
        JailField::MaxRetry => {
            section.set_opt("maxretry", jail.max_retry);
        }
        JailField::FindTime => {
            section.set_opt("findtime", jail.find_time);
        }
        JailField::BanTime => {
            section.set_opt("bantime", jail.ban_time);
        }
        JailField::Port | JailField::LogPath => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{EnhancedSecurity, OperatorAnswers};
    use crate::firewall::FirewallState;
    use crate::fs_abstraction::{MockFileSystem, RealFileSystem};
    use crate::policy::{layers_from_answers, resolve, PolicyDuration, PolicyGenerator};
    use crate::services::DetectedServices;
    use std::io;
    use tempfile::TempDir;

    fn policy_for(answers: &OperatorAnswers) -> EffectivePolicy {
        let gen = PolicyGenerator::new(
            DetectedServices::ssh_only(),
            22,
            PathBuf::from("/etc/fail2ban/blocklist.txt"),
        )
        .generate(FirewallState::Ufw, answers);
        resolve(&gen, &layers_from_answers(answers))
    }

    fn strict_answers() -> OperatorAnswers {
        OperatorAnswers {
            enhanced: Some(EnhancedSecurity {
                max_retry: 1,
                find_time: PolicyDuration::from_mins(1),
                ban_time: "-1".parse().unwrap(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_baseline_exact() {
        let rendered = render_base(&policy_for(&OperatorAnswers::default())).render();
        let expected = format!(
            "# {}\n\n[DEFAULT]\nignoreip = 127.0.0.1/8\nbantime = 10m\nfindtime = 10m\n\
             maxretry = 5\nbanaction = ufw\nbackend = auto\n\n[sshd]\nenabled = true\n\
             port = ssh\nfilter = sshd\nlogpath = /var/log/auth.log\nmaxretry = 5\n",
            HEADER
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_is_byte_stable() {
        let a = render_base(&policy_for(&strict_answers())).render();
        let b = render_base(&policy_for(&strict_answers())).render();
        assert_eq!(a, b);
    }

    #[test]
    fn test_permanent_ban_rendered_as_sentinel() {
        let rendered = render_base(&policy_for(&strict_answers())).render();
        assert!(rendered.contains("bantime = -1\n"));
        assert!(rendered.contains("findtime = 1m\n"));
    }

    #[test]
    fn test_email_and_persistence_in_defaults() {
        let answers = OperatorAnswers {
            enhanced: Some(EnhancedSecurity {
                persistence: true,
                email: Some(EmailAlerts {
                    destination: "admin@example.com".to_string(),
                    sender: "fail2ban@example.com".to_string(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let doc = render_base(&policy_for(&answers));
        let defaults = doc.section("DEFAULT").unwrap();
        assert_eq!(
            defaults.get("dbfile").unwrap()[0],
            "/var/lib/fail2ban/fail2ban.sqlite3"
        );
        assert_eq!(defaults.get("destemail").unwrap()[0], "admin@example.com");
        assert_eq!(defaults.get("mta").unwrap()[0], "sendmail");
        assert_eq!(defaults.get("action").unwrap()[0], "%(action_mwl)s");
    }

    #[test]
    fn test_unset_fields_never_written() {
        let doc = render_base(&policy_for(&OperatorAnswers::default()));
        assert!(doc.section("DEFAULT").unwrap().get("dbfile").is_none());
        assert!(doc.section("DEFAULT").unwrap().get("destemail").is_none());
        let sshd = doc.section("sshd").unwrap();
        assert!(sshd.get("bantime").is_none());
        assert!(sshd.get("findtime").is_none());
    }

    #[test]
    fn test_override_file_carries_only_overridden_fields() {
        let policy = policy_for(&strict_answers());
        let fields = &policy.service_overrides["sshd"];
        let rendered = render_override(policy.jail("sshd").unwrap(), fields).render();
        assert_eq!(
            rendered,
            format!("# {}\n\n[sshd]\nmaxretry = 1\nfindtime = 1m\n", HEADER)
        );
    }

    #[test]
    fn test_blocklist_artifacts() {
        let filter = render_blocklist_filter().render();
        assert!(filter.contains("failregex = ^<SUBNET>\\s*$\n"));
        assert!(filter.contains("ignoreregex =\n"));

        let entries = vec![
            BlocklistEntry::from("198.51.100.23/32".parse::<ipnet::IpNet>().unwrap()),
            BlocklistEntry::from("203.0.113.0/24".parse::<ipnet::IpNet>().unwrap()),
        ];
        assert_eq!(
            render_blocklist_addresses(&entries),
            "198.51.100.23\n203.0.113.0/24\n"
        );
    }

    #[test]
    fn test_write_creates_tree_on_empty_root() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        let fs = RealFileSystem;
        let mut writer = ConfigWriter::new(&fs, layout.clone());

        let answers = OperatorAnswers {
            blocklist: vec!["198.51.100.23".parse().unwrap()],
            ..strict_answers()
        };
        let written = writer.write(&policy_for(&answers)).unwrap();

        assert!(written.backups.is_empty());
        assert!(layout.base_file().exists());
        assert!(layout.override_file("sshd").exists());
        assert!(layout.blocklist_filter().exists());
        assert_eq!(
            std::fs::read_to_string(layout.blocklist_file()).unwrap(),
            "198.51.100.23\n"
        );
        assert_eq!(written.all().count(), 4);
    }

    #[test]
    fn test_backup_taken_once_per_run() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        std::fs::write(layout.base_file(), "[DEFAULT]\nbantime = 1d\n").unwrap();

        let fs = RealFileSystem;
        let mut writer = ConfigWriter::new(&fs, layout.clone());
        let first = writer.write(&policy_for(&OperatorAnswers::default())).unwrap();
        let second = writer.write(&policy_for(&strict_answers())).unwrap();

        let backup = backup_path(&layout.base_file());
        assert_eq!(first.backups, vec![backup.clone()]);
        assert!(second.backups.is_empty());
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap(),
            "[DEFAULT]\nbantime = 1d\n"
        );
        assert!(std::fs::read_to_string(layout.base_file())
            .unwrap()
            .contains("bantime = -1"));
    }

    #[test]
    fn test_failed_backup_aborts_before_any_write() {
        let mut fs = MockFileSystem::new();
        fs.expect_exists()
            .returning(|p| !p.to_string_lossy().ends_with(BACKUP_SUFFIX));
        fs.expect_read_dir().returning(|_| Ok(Vec::new()));
        fs.expect_read_to_string().returning(|_| Ok(String::new()));
        fs.expect_rename().never();
        fs.expect_remove_file().never();
        fs.expect_copy()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "ro")));
        fs.expect_write_atomic().never();
        fs.expect_create_dir_all().never();

        let mut writer = ConfigWriter::new(&fs, ConfigLayout::new("/etc/fail2ban", "/b.txt"));
        let err = writer
            .write(&policy_for(&OperatorAnswers::default()))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigWrite { .. }));
        assert!(err.to_string().contains("jail.local.backup"));
    }

    #[test]
    fn test_later_run_removes_stale_override() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        let fs = RealFileSystem;
        std::fs::create_dir_all(layout.override_dir()).unwrap();
        let operator_file = layout.override_file("postfix");
        std::fs::write(&operator_file, "[postfix]\nenabled = true\n").unwrap();

        ConfigWriter::new(&fs, layout.clone())
            .write(&policy_for(&strict_answers()))
            .unwrap();
        let strict_override = std::fs::read_to_string(layout.override_file("sshd")).unwrap();

        let written = ConfigWriter::new(&fs, layout.clone())
            .write(&policy_for(&OperatorAnswers::default()))
            .unwrap();

        assert!(!layout.override_file("sshd").exists());
        assert_eq!(written.removed, vec![layout.override_file("sshd")]);
        assert_eq!(
            std::fs::read_to_string(backup_path(&layout.override_file("sshd"))).unwrap(),
            strict_override
        );
        // not ours: untouched
        assert_eq!(
            std::fs::read_to_string(&operator_file).unwrap(),
            "[postfix]\nenabled = true\n"
        );
    }

    #[test]
    fn test_dropped_blocklist_removes_filter() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        let fs = RealFileSystem;
        let with_blocklist = OperatorAnswers {
            blocklist: vec!["198.51.100.23".parse().unwrap()],
            ..Default::default()
        };

        ConfigWriter::new(&fs, layout.clone())
            .write(&policy_for(&with_blocklist))
            .unwrap();
        assert!(layout.blocklist_filter().exists());

        let written = ConfigWriter::new(&fs, layout.clone())
            .write(&policy_for(&OperatorAnswers::default()))
            .unwrap();
        assert!(!layout.blocklist_filter().exists());
        assert_eq!(written.removed, vec![layout.blocklist_filter()]);
        assert!(!std::fs::read_to_string(layout.base_file())
            .unwrap()
            .contains("custom-blocklist"));
    }

    #[test]
    fn test_earlier_backup_rotated_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        std::fs::write(layout.base_file(), "# operator original\n").unwrap();
        let fs = RealFileSystem;

        ConfigWriter::new(&fs, layout.clone())
            .with_backup_stamp("20260301000000")
            .write(&policy_for(&strict_answers()))
            .unwrap();
        let first_run = std::fs::read_to_string(layout.base_file()).unwrap();

        ConfigWriter::new(&fs, layout.clone())
            .with_backup_stamp("20260302000000")
            .write(&policy_for(&OperatorAnswers::default()))
            .unwrap();

        let backup = backup_path(&layout.base_file());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), first_run);
        let rotated = dir.path().join("jail.local.backup.20260302000000");
        assert_eq!(
            std::fs::read_to_string(rotated).unwrap(),
            "# operator original\n"
        );
    }

    #[test]
    fn test_rotation_avoids_existing_name() {
        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        let base = layout.base_file();
        std::fs::write(&base, "current\n").unwrap();
        std::fs::write(backup_path(&base), "older\n").unwrap();
        std::fs::write(dir.path().join("jail.local.backup.stamp"), "oldest\n").unwrap();

        let fs = RealFileSystem;
        ConfigWriter::new(&fs, layout)
            .with_backup_stamp("stamp")
            .write(&policy_for(&OperatorAnswers::default()))
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("jail.local.backup.stamp")).unwrap(),
            "oldest\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("jail.local.backup.stamp.1")).unwrap(),
            "older\n"
        );
        assert_eq!(std::fs::read_to_string(backup_path(&base)).unwrap(), "current\n");
    }

    #[test]
    fn test_jail_without_fields_not_rendered() {
        let mut policy = policy_for(&OperatorAnswers::default());
        policy.apply_layer(
            &crate::policy::OverrideLayer::new(2, crate::policy::LayerScope::PerService)
                .with_jail("postfix", crate::policy::JailPatch::default()),
        );
        assert!(policy.jail("postfix").is_some());

        let rendered = render_base(&policy).render();
        assert!(!rendered.contains("[postfix]"));

        let dir = TempDir::new().unwrap();
        let layout = ConfigLayout::new(dir.path(), dir.path().join("blocklist.txt"));
        let written = ConfigWriter::new(&RealFileSystem, layout.clone())
            .write(&policy)
            .unwrap();
        assert!(written.overrides.is_empty());
        assert!(!layout.override_file("postfix").exists());
    }

    #[test]
    fn test_is_managed_checks_first_line() {
        assert!(is_managed(&render_blocklist_filter().render()));
        assert!(!is_managed("[sshd]\nenabled = true\n"));
        assert!(!is_managed(""));
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/etc/fail2ban/jail.local")),
            PathBuf::from("/etc/fail2ban/jail.local.backup")
        );
    }
}
