//! Layered override resolution.
//!
//! The generated policy is rank 0. Each [`OverrideLayer`] patches global
//! defaults and/or named jails; layers apply in ascending rank, so for any
//! field the highest-ranked layer that sets it wins. A field a layer does
//! not set is left as lower layers had it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use ipnet::IpNet;

use super::defaults::{BanAction, EmailAlerts, LogBackend, PolicyDefaults, PERSISTENCE_DB};
use super::duration::{BanTime, PolicyDuration};
use super::generator::GeneratedPolicy;
use super::jail::{BlocklistEntry, JailDefinition, JailField, PortSpec, SSHD};
use crate::answers::OperatorAnswers;

/// Rank of the global-local layer (`jail.local` semantics).
pub const GLOBAL_LOCAL_RANK: u32 = 1;
/// Rank of per-service layers (`jail.d/<name>.local` semantics).
pub const PER_SERVICE_RANK: u32 = 2;

/// Where a layer's settings live once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerScope {
    /// Folded into the base policy file
    Global,
    /// Also written to the per-jail override directory
    PerService,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsPatch {
    pub ignore_list: Option<Vec<IpNet>>,
    pub ban_time: Option<BanTime>,
    pub find_time: Option<PolicyDuration>,
    pub max_retry: Option<u32>,
    pub ban_action: Option<BanAction>,
    pub backend: Option<LogBackend>,
    pub persist_path: Option<PathBuf>,
    pub email: Option<EmailAlerts>,
}

impl DefaultsPatch {
    fn apply(&self, defaults: &mut PolicyDefaults) {
        if let Some(v) = &self.ignore_list {
            defaults.ignore_list.clear();
            defaults.extend_ignore_list(v.iter().copied());
        }
        if let Some(v) = self.ban_time {
            defaults.ban_time = v;
        }
        if let Some(v) = self.find_time {
            defaults.find_time = v;
        }
        if let Some(v) = self.max_retry {
            defaults.max_retry = v;
        }
        if let Some(v) = self.ban_action {
            defaults.ban_action = v;
        }
        if let Some(v) = self.backend {
            defaults.backend = v;
        }
        if let Some(v) = &self.persist_path {
            defaults.persist_path = Some(v.clone());
        }
        if let Some(v) = &self.email {
            defaults.email = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JailPatch {
    pub enabled: Option<bool>,
    pub ports: Option<Vec<PortSpec>>,
    pub filter: Option<String>,
    pub log_paths: Option<Vec<PathBuf>>,
    pub max_retry: Option<u32>,
    pub find_time: Option<PolicyDuration>,
    pub ban_time: Option<BanTime>,
}

impl JailPatch {
    /// Fields this patch sets.
    pub fn fields(&self) -> BTreeSet<JailField> {
        let mut fields = BTreeSet::new();
        if self.enabled.is_some() {
            fields.insert(JailField::Enabled);
        }
        if self.ports.is_some() {
            fields.insert(JailField::Port);
        }
        if self.filter.is_some() {
            fields.insert(JailField::Filter);
        }
        if self.log_paths.is_some() {
            fields.insert(JailField::LogPath);
        }
        if self.max_retry.is_some() {
            fields.insert(JailField::MaxRetry);
        }
        if self.find_time.is_some() {
            fields.insert(JailField::FindTime);
        }
        if self.ban_time.is_some() {
            fields.insert(JailField::BanTime);
        }
        fields
    }

    fn apply(&self, jail: &mut JailDefinition) {
        if let Some(v) = self.enabled {
            jail.enabled = Some(v);
        }
        if let Some(v) = &self.ports {
            jail.ports = v.clone();
        }
        if let Some(v) = &self.filter {
            jail.filter = Some(v.clone());
        }
        if let Some(v) = &self.log_paths {
            jail.log_paths = v.clone();
        }
        if let Some(v) = self.max_retry {
            jail.max_retry = Some(v);
        }
        if let Some(v) = self.find_time {
            jail.find_time = Some(v);
        }
        if let Some(v) = self.ban_time {
            jail.ban_time = Some(v);
        }
    }
}

/// A ranked set of patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideLayer {
    pub rank: u32,
    pub scope: LayerScope,
    #[serde(default)]
    pub defaults: DefaultsPatch,
    /// Applied in order; a name may repeat
    #[serde(default)]
    pub jails: Vec<(String, JailPatch)>,
}

impl OverrideLayer {
    pub fn new(rank: u32, scope: LayerScope) -> Self {
        Self {
            rank,
            scope,
            defaults: DefaultsPatch::default(),
            jails: Vec::new(),
        }
    }

    pub fn with_jail(mut self, name: &str, patch: JailPatch) -> Self {
        self.jails.push((name.to_string(), patch));
        self
    }

    pub fn with_defaults(mut self, patch: DefaultsPatch) -> Self {
        self.defaults = patch;
        self
    }
}

/// Fully resolved policy. The only value the writer serializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    pub defaults: PolicyDefaults,
    /// Generation order, then lazily created jails in order of first use
    pub jails: Vec<JailDefinition>,
    /// Fields each jail had set by a per-service layer
    pub service_overrides: BTreeMap<String, BTreeSet<JailField>>,
    pub blocklist: Vec<BlocklistEntry>,
}

impl EffectivePolicy {
    pub fn jail(&self, name: &str) -> Option<&JailDefinition> {
        self.jails.iter().find(|j| j.name == name)
    }

    pub fn enabled_jails(&self) -> impl Iterator<Item = &JailDefinition> {
        self.jails.iter().filter(|j| j.is_enabled())
    }

    /// Retry threshold the daemon will apply for `jail`.
    pub fn effective_max_retry(&self, jail: &JailDefinition) -> u32 {
        jail.max_retry.unwrap_or(self.defaults.max_retry)
    }

    pub fn effective_find_time(&self, jail: &JailDefinition) -> PolicyDuration {
        jail.find_time.unwrap_or(self.defaults.find_time)
    }

    /// Apply one more layer on top of an already resolved policy.
    pub fn apply_layer(&mut self, layer: &OverrideLayer) {
        layer.defaults.apply(&mut self.defaults);
        for (name, patch) in &layer.jails {
            let index = match self.jails.iter().position(|j| &j.name == name) {
                Some(i) => i,
                None => {
                    self.jails.push(JailDefinition::empty(name));
                    self.jails.len() - 1
                }
            };
            patch.apply(&mut self.jails[index]);

            if layer.scope == LayerScope::PerService {
                self.service_overrides
                    .entry(name.clone())
                    .or_default()
                    .extend(patch.fields());
            }
        }
    }
}

/// Merge the generated policy with `layers` into the effective policy.
///
/// Pure: the same inputs always produce the same value. Layers of equal
/// rank apply in the order given.
pub fn resolve(generated: &GeneratedPolicy, layers: &[OverrideLayer]) -> EffectivePolicy {
    let mut policy = EffectivePolicy {
        defaults: generated.defaults.clone(),
        jails: Vec::with_capacity(generated.jails.len()),
        service_overrides: BTreeMap::new(),
        blocklist: generated.blocklist.clone(),
    };

    // duplicate base names merge into the first occurrence
    for jail in &generated.jails {
        match policy.jails.iter_mut().find(|j| j.name == jail.name) {
            Some(existing) => JailPatch::from(jail.clone()).apply(existing),
            None => policy.jails.push(jail.clone()),
        }
    }

    let mut ordered: Vec<&OverrideLayer> = layers.iter().collect();
    ordered.sort_by_key(|layer| layer.rank);
    for layer in ordered {
        policy.apply_layer(layer);
    }
    policy
}

impl From<JailDefinition> for JailPatch {
    fn from(jail: JailDefinition) -> Self {
        Self {
            enabled: jail.enabled,
            ports: (!jail.ports.is_empty()).then_some(jail.ports),
            filter: jail.filter,
            log_paths: (!jail.log_paths.is_empty()).then_some(jail.log_paths),
            max_retry: jail.max_retry,
            find_time: jail.find_time,
            ban_time: jail.ban_time,
        }
    }
}

/// Layers implied by the operator's answers.
///
/// Enhanced security yields a global-local layer with the new thresholds
/// and a strict per-service `sshd` layer that forces the same retry
/// threshold and window onto the SSH jail, whatever it was generated with.
pub fn layers_from_answers(answers: &OperatorAnswers) -> Vec<OverrideLayer> {
    let Some(enhanced) = &answers.enhanced else {
        return Vec::new();
    };

    let global = OverrideLayer::new(GLOBAL_LOCAL_RANK, LayerScope::Global).with_defaults(
        DefaultsPatch {
            ban_time: Some(enhanced.ban_time),
            find_time: Some(enhanced.find_time),
            max_retry: Some(enhanced.max_retry),
            persist_path: enhanced
                .persistence
                .then(|| PathBuf::from(PERSISTENCE_DB)),
            email: enhanced.email.clone(),
            ..Default::default()
        },
    );

    let strict_ssh = OverrideLayer::new(PER_SERVICE_RANK, LayerScope::PerService).with_jail(
        SSHD,
        JailPatch {
            max_retry: Some(enhanced.max_retry),
            find_time: Some(enhanced.find_time),
            ..Default::default()
        },
    );

    vec![global, strict_ssh]
}
