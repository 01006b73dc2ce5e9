//! Ban policy model: defaults, jails, generation and override resolution.

pub mod defaults;
pub mod duration;
pub mod generator;
pub mod jail;
pub mod overrides;

pub use defaults::{BanAction, EmailAlerts, LogBackend, PolicyDefaults};
pub use duration::{BanTime, PolicyDuration};
pub use generator::{GeneratedPolicy, PolicyGenerator};
pub use jail::{BlocklistEntry, JailDefinition, JailField, PortSpec};
pub use overrides::{
    layers_from_answers, resolve, DefaultsPatch, EffectivePolicy, JailPatch, LayerScope,
    OverrideLayer,
};
