use thiserror::Error;

use crate::{PluginId, VariantName};

/// Failures raised while resolving variant orders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A resolved list names the same variant more than once.
    #[error("variant '{variant}' appears more than once in the variants of '{plugin}'")]
    DuplicateVariant {
        plugin: PluginId,
        variant: VariantName,
    },

    /// `variants()` references form a loop. `cycle` starts and ends with the
    /// same plugin.
    #[error("cyclic variant reference: {}", cycle.join(" -> "))]
    CyclicVariantReference { cycle: Vec<PluginId> },

    /// `variants()` named a plugin that neither the default table nor the
    /// user configuration knows about.
    #[error("'{referenced_by}' references unknown plugin '{plugin}'")]
    UnknownPlugin {
        plugin: PluginId,
        referenced_by: PluginId,
    },

    /// `variants()` read a plugin whose own resolution failed.
    #[error("'{plugin}' references '{dependency}', which failed to resolve")]
    DependencyFailed {
        plugin: PluginId,
        dependency: PluginId,
    },
}

impl ResolveError {
    /// Plugin whose resolution this error belongs to.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::DuplicateVariant { plugin, .. } => Some(plugin),
            Self::UnknownPlugin { referenced_by, .. } => Some(referenced_by),
            Self::DependencyFailed { plugin, .. } => Some(plugin),
            Self::CyclicVariantReference { cycle } => cycle.first().map(String::as_str),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicVariantReference { .. })
    }
}

/// Failures raised while planning the rule sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("plugin '{plugin}' uses unknown variant '{variant}'")]
    UnknownVariantName {
        plugin: PluginId,
        variant: VariantName,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}
