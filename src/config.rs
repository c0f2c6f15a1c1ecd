use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::algebra::VariantAlgebra;
use crate::error::ResolveError;
use crate::resolver::{ResolveOptions, UnknownPluginPolicy, UserVariantConfig, VariantOverride};
use crate::sequencer::{RawRule, RawRuleTable};
use crate::variant::{
    Breakpoint, UnknownVariantPolicy, VariantDefinition, VariantRegistry, default_breakpoints,
};
use crate::{PluginId, VariantList, VariantName};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub unknown_variants: UnknownVariantPolicy,
    #[serde(default)]
    pub unknown_plugins: UnknownPluginPolicy,
    /// `None` keeps the default breakpoints; an empty table disables them.
    #[serde(default)]
    pub breakpoints: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub variants: Option<VariantsSection>,
    /// Extra variant definitions, `name = "template"`.
    #[serde(default)]
    pub custom_variants: IndexMap<VariantName, String>,
    /// Raw rules per plugin: selector to declarations.
    #[serde(default)]
    pub rules: IndexMap<PluginId, IndexMap<String, IndexMap<String, String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VariantsSection {
    Global(VariantList),
    PerPlugin(IndexMap<PluginId, VariantExpr>),
}

/// Declarative form of a resolver function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VariantExpr {
    List(VariantList),
    Before(BeforeExpr),
    After(AfterExpr),
    Without(WithoutExpr),
    Reference(ReferenceExpr),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeforeExpr {
    pub before: VariantList,
    #[serde(default)]
    pub anchor: Option<VariantName>,
    #[serde(default)]
    pub base: Option<Box<VariantExpr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AfterExpr {
    pub after: VariantList,
    #[serde(default)]
    pub anchor: Option<VariantName>,
    #[serde(default)]
    pub base: Option<Box<VariantExpr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WithoutExpr {
    pub without: VariantList,
    #[serde(default)]
    pub base: Option<Box<VariantExpr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceExpr {
    pub variants: PluginId,
}

impl VariantExpr {
    pub fn evaluate(&self, algebra: VariantAlgebra<'_>) -> Result<VariantList, ResolveError> {
        match self {
            Self::List(list) => Ok(list.clone()),
            Self::Before(expr) => {
                let base = evaluate_base(expr.base.as_deref(), algebra)?;
                Ok(algebra.before(&expr.before, expr.anchor.as_deref(), base.as_deref()))
            }
            Self::After(expr) => {
                let base = evaluate_base(expr.base.as_deref(), algebra)?;
                Ok(algebra.after(&expr.after, expr.anchor.as_deref(), base.as_deref()))
            }
            Self::Without(expr) => {
                let base = evaluate_base(expr.base.as_deref(), algebra)?;
                Ok(algebra.without(&expr.without, base.as_deref()))
            }
            Self::Reference(expr) => algebra.variants(&expr.variants),
        }
    }

    fn to_override(&self) -> VariantOverride {
        match self {
            Self::List(list) => VariantOverride::List(list.clone()),
            expr => {
                let expr = expr.clone();
                VariantOverride::compose(move |algebra| expr.evaluate(algebra))
            }
        }
    }
}

fn evaluate_base(
    base: Option<&VariantExpr>,
    algebra: VariantAlgebra<'_>,
) -> Result<Option<VariantList>, ResolveError> {
    base.map(|expr| expr.evaluate(algebra)).transpose()
}

impl Config {
    pub fn user_variants(&self) -> UserVariantConfig {
        match &self.variants {
            None => UserVariantConfig::default(),
            Some(VariantsSection::Global(list)) => UserVariantConfig::Global(list.clone()),
            Some(VariantsSection::PerPlugin(entries)) => UserVariantConfig::PerPlugin(
                entries
                    .iter()
                    .map(|(plugin, expr)| (plugin.clone(), expr.to_override()))
                    .collect(),
            ),
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        match &self.breakpoints {
            None => default_breakpoints(),
            Some(entries) => entries
                .iter()
                .map(|(name, min_width)| Breakpoint::new(name.as_str(), min_width.as_str()))
                .collect(),
        }
    }

    /// Built-in variants plus `custom_variants`, which win on name clashes.
    pub fn registry(&self) -> VariantRegistry {
        let mut registry = VariantRegistry::with_builtins();
        for (name, template) in &self.custom_variants {
            registry.register(name.as_str(), VariantDefinition::parse(template));
        }
        registry
    }

    pub fn raw_rules(&self) -> RawRuleTable {
        self.rules
            .iter()
            .map(|(plugin, rules)| {
                let rules: Vec<RawRule> = rules
                    .iter()
                    .map(|(selector, declarations)| {
                        RawRule::new(
                            selector.as_str(),
                            declarations
                                .iter()
                                .map(|(property, value)| (property.as_str(), value.as_str())),
                        )
                    })
                    .collect();
                (plugin.clone(), rules)
            })
            .collect()
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            unknown_plugins: self.unknown_plugins,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError {
        message: format!("failed to read config {}: {}", path.display(), err),
    })?;
    parse(&text).map_err(|err| ConfigError {
        message: format!("failed to parse config {}: {}", path.display(), err.message),
    })
}

pub fn parse(text: &str) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|err| ConfigError {
        message: err.to_string(),
    })
}
