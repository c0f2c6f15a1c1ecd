//! Resolution of per-plugin variant orders.
//!
//! Plugins whose override calls `variants()` on another plugin depend on that
//! plugin. Dependencies are resolved depth-first before the dependent plugin
//! finishes, which yields a topological resolution order; a reference back to
//! a plugin that is still being resolved is a cycle and aborts the whole
//! configuration.

use indexmap::IndexMap;
use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;

use crate::algebra::{VariantAlgebra, VariantLookup, find_duplicate};
use crate::defaults::DefaultTable;
use crate::error::ResolveError;
use crate::{PluginId, VariantList, VariantName};

/// Function form of a per-plugin override.
pub type ResolverFn =
    dyn Fn(VariantAlgebra<'_>) -> Result<VariantList, ResolveError> + Send + Sync;

pub enum VariantOverride {
    /// Replaces the plugin's defaults verbatim.
    List(VariantList),
    /// Computes the list from the plugin's defaults through the helper algebra.
    Compose(Box<ResolverFn>),
}

impl VariantOverride {
    pub fn list<I, V>(variants: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<VariantName>,
    {
        Self::List(variants.into_iter().map(Into::into).collect())
    }

    pub fn compose<F>(resolver: F) -> Self
    where
        F: Fn(VariantAlgebra<'_>) -> Result<VariantList, ResolveError> + Send + Sync + 'static,
    {
        Self::Compose(Box::new(resolver))
    }
}

impl fmt::Debug for VariantOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(list) => f.debug_tuple("List").field(list).finish(),
            Self::Compose(_) => f.write_str("Compose(..)"),
        }
    }
}

/// User variant configuration. The two shapes are mutually exclusive.
#[derive(Debug)]
pub enum UserVariantConfig {
    /// One list applied verbatim to every plugin of the default table.
    Global(VariantList),
    /// Per-plugin overrides; plugins not listed keep their defaults.
    PerPlugin(IndexMap<PluginId, VariantOverride>),
}

impl UserVariantConfig {
    pub fn global<I, V>(variants: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<VariantName>,
    {
        Self::Global(variants.into_iter().map(Into::into).collect())
    }

    pub fn per_plugin<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, VariantOverride)>,
        P: Into<PluginId>,
    {
        Self::PerPlugin(
            entries
                .into_iter()
                .map(|(plugin, entry)| (plugin.into(), entry))
                .collect(),
        )
    }
}

impl Default for UserVariantConfig {
    fn default() -> Self {
        Self::PerPlugin(IndexMap::new())
    }
}

/// What `variants()` returns for a plugin nobody configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPluginPolicy {
    #[default]
    Empty,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub unknown_plugins: UnknownPluginPolicy,
}

/// Final variant list per plugin, in plugin processing order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedOrder {
    entries: IndexMap<PluginId, VariantList>,
}

impl ResolvedOrder {
    pub fn get(&self, plugin: &str) -> Option<&[VariantName]> {
        self.entries.get(plugin).map(Vec::as_slice)
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.entries.contains_key(plugin)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[VariantName])> {
        self.entries
            .iter()
            .map(|(plugin, variants)| (plugin.as_str(), variants.as_slice()))
    }

    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P, L, V> FromIterator<(P, L)> for ResolvedOrder
where
    P: Into<PluginId>,
    L: IntoIterator<Item = V>,
    V: Into<VariantName>,
{
    fn from_iter<T: IntoIterator<Item = (P, L)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(plugin, variants)| {
                    (plugin.into(), variants.into_iter().map(Into::into).collect())
                })
                .collect(),
        }
    }
}

/// Outcome of [`resolve_partial`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Plugins that resolved successfully.
    pub order: ResolvedOrder,
    /// One failure per plugin absent from `order`, in resolution order.
    pub errors: Vec<ResolveError>,
    dependencies: IndexMap<PluginId, Vec<PluginId>>,
    resolution_order: Vec<PluginId>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Plugins `plugin` read through `variants()`.
    pub fn dependencies_of(&self, plugin: &str) -> &[PluginId] {
        self.dependencies
            .get(plugin)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Order in which plugins finished resolving. Every plugin appears after
    /// the plugins it depends on.
    pub fn resolution_order(&self) -> &[PluginId] {
        &self.resolution_order
    }
}

pub fn resolve(
    config: &UserVariantConfig,
    defaults: &DefaultTable,
) -> Result<ResolvedOrder, ResolveError> {
    resolve_with_options(config, defaults, ResolveOptions::default())
}

/// Resolves every plugin and fails on the first error.
pub fn resolve_with_options(
    config: &UserVariantConfig,
    defaults: &DefaultTable,
    options: ResolveOptions,
) -> Result<ResolvedOrder, ResolveError> {
    let resolution = resolve_partial(config, defaults, options)?;
    match resolution.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(resolution.order),
    }
}

/// Resolves every plugin, collecting per-plugin failures instead of stopping.
///
/// Cycles still fail the whole call.
pub fn resolve_partial(
    config: &UserVariantConfig,
    defaults: &DefaultTable,
    options: ResolveOptions,
) -> Result<Resolution, ResolveError> {
    match config {
        UserVariantConfig::Global(list) => Ok(resolve_global(list, defaults)),
        UserVariantConfig::PerPlugin(overrides) => {
            ResolveContext::new(defaults, overrides, options).run()
        }
    }
}

fn resolve_global(list: &[VariantName], defaults: &DefaultTable) -> Resolution {
    let mut resolution = Resolution::default();
    let duplicate = find_duplicate(list).cloned();

    for plugin in defaults.plugins() {
        resolution.resolution_order.push(plugin.to_string());
        if let Some(variant) = duplicate.clone() {
            resolution.errors.push(ResolveError::DuplicateVariant {
                plugin: plugin.to_string(),
                variant,
            });
            continue;
        }
        resolution
            .order
            .entries
            .insert(plugin.to_string(), list.to_vec());
    }

    tracing::debug!(
        plugins = defaults.len(),
        variants = ?list,
        "applied global variant order"
    );
    resolution
}

struct ResolveContext<'a> {
    table: &'a DefaultTable,
    overrides: &'a IndexMap<PluginId, VariantOverride>,
    options: ResolveOptions,
    state: RefCell<ResolveState>,
}

#[derive(Default)]
struct ResolveState {
    // Insertion order is the order plugins finished resolving.
    resolved: IndexMap<PluginId, Result<VariantList, ResolveError>>,
    in_progress: Vec<PluginId>,
    dependencies: IndexMap<PluginId, Vec<PluginId>>,
    cycle: Option<ResolveError>,
}

impl<'a> ResolveContext<'a> {
    fn new(
        table: &'a DefaultTable,
        overrides: &'a IndexMap<PluginId, VariantOverride>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            table,
            overrides,
            options,
            state: RefCell::new(ResolveState::default()),
        }
    }

    fn plugins(&self) -> Vec<&'a str> {
        let table = self.table;
        let overrides = self.overrides;
        table
            .plugins()
            .chain(
                overrides
                    .keys()
                    .map(String::as_str)
                    .filter(|plugin| !table.contains(plugin)),
            )
            .collect()
    }

    fn is_known(&self, plugin: &str) -> bool {
        self.table.contains(plugin) || self.overrides.contains_key(plugin)
    }

    fn run(self) -> Result<Resolution, ResolveError> {
        let plugins = self.plugins();
        for plugin in &plugins {
            if let Err(err) = self.resolve_plugin(plugin) {
                if err.is_cycle() {
                    return Err(err);
                }
            }
        }

        let state = self.state.into_inner();
        let mut resolution = Resolution {
            resolution_order: state.resolved.keys().cloned().collect(),
            dependencies: state.dependencies,
            ..Resolution::default()
        };
        for plugin in plugins {
            if let Some(Ok(list)) = state.resolved.get(plugin) {
                resolution
                    .order
                    .entries
                    .insert(plugin.to_string(), list.clone());
            }
        }
        // Resolution order puts a failed dependency ahead of its dependents.
        resolution.errors = state
            .resolved
            .into_values()
            .filter_map(Result::err)
            .collect();
        Ok(resolution)
    }

    fn resolve_plugin(&self, plugin: &str) -> Result<VariantList, ResolveError> {
        {
            let mut state = self.state.borrow_mut();
            if let Some(cycle) = state.cycle.as_ref() {
                return Err(cycle.clone());
            }
            if let Some(result) = state.resolved.get(plugin) {
                return result.clone();
            }
            if let Some(start) = state.in_progress.iter().position(|p| p == plugin) {
                let mut cycle = state.in_progress[start..].to_vec();
                cycle.push(plugin.to_string());
                let err = ResolveError::CyclicVariantReference { cycle };
                state.cycle = Some(err.clone());
                return Err(err);
            }
            state.in_progress.push(plugin.to_string());
        }

        let result = self.compute(plugin);

        let mut state = self.state.borrow_mut();
        state.in_progress.pop();
        // A resolver function may have swallowed the cycle error.
        let result = match state.cycle.as_ref() {
            Some(cycle) => Err(cycle.clone()),
            None => result,
        };
        match &result {
            Ok(list) => tracing::debug!(plugin, variants = ?list, "resolved variant order"),
            Err(err) => tracing::debug!(plugin, error = %err, "variant order rejected"),
        }
        state.resolved.insert(plugin.to_string(), result.clone());
        result
    }

    fn compute(&self, plugin: &str) -> Result<VariantList, ResolveError> {
        let defaults = self.table.lookup(plugin);
        let list = match self.overrides.get(plugin) {
            None => defaults.to_vec(),
            Some(VariantOverride::List(list)) => list.clone(),
            Some(VariantOverride::Compose(resolver)) => {
                let lookup = PluginLookup { ctx: self, plugin };
                resolver(VariantAlgebra::new(defaults, &lookup))?
            }
        };

        if let Some(variant) = find_duplicate(&list) {
            return Err(ResolveError::DuplicateVariant {
                plugin: plugin.to_string(),
                variant: variant.clone(),
            });
        }
        Ok(list)
    }

    fn record_dependency(&self, plugin: &str, dependency: &str) {
        let mut state = self.state.borrow_mut();
        let edges = state.dependencies.entry(plugin.to_string()).or_default();
        if !edges.iter().any(|edge| edge == dependency) {
            tracing::trace!(plugin, dependency, "variant reference");
            edges.push(dependency.to_string());
        }
    }
}

/// `variants()` as seen from one plugin's resolver function.
struct PluginLookup<'c, 'a> {
    ctx: &'c ResolveContext<'a>,
    plugin: &'c str,
}

impl VariantLookup for PluginLookup<'_, '_> {
    fn variants(&self, plugin: &str) -> Result<VariantList, ResolveError> {
        if !self.ctx.is_known(plugin) {
            return match self.ctx.options.unknown_plugins {
                UnknownPluginPolicy::Empty => Ok(Vec::new()),
                UnknownPluginPolicy::Error => Err(ResolveError::UnknownPlugin {
                    plugin: plugin.to_string(),
                    referenced_by: self.plugin.to_string(),
                }),
            };
        }
        self.ctx.record_dependency(self.plugin, plugin);
        self.ctx.resolve_plugin(plugin).map_err(|err| {
            if err.is_cycle() {
                err
            } else {
                ResolveError::DependencyFailed {
                    plugin: self.plugin.to_string(),
                    dependency: plugin.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ResolveOptions, UnknownPluginPolicy, UserVariantConfig, VariantOverride, resolve,
        resolve_partial, resolve_with_options,
    };
    use crate::defaults::DefaultTable;
    use crate::error::ResolveError;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn table() -> DefaultTable {
        DefaultTable::new([
            ("backgroundColor", vec!["responsive", "hover", "focus"]),
            ("textColor", vec!["responsive", "hover", "focus"]),
            ("padding", vec!["responsive"]),
        ])
    }

    #[test]
    fn unconfigured_plugins_keep_their_defaults() {
        let table = table();
        let config = UserVariantConfig::per_plugin([(
            "padding",
            VariantOverride::list(["hover"]),
        )]);
        let order = resolve(&config, &table).expect("config should resolve");

        assert_eq!(order.get("backgroundColor"), Some(table.lookup("backgroundColor")));
        assert_eq!(order.get("textColor"), Some(table.lookup("textColor")));
        assert_eq!(order.get("padding"), Some(&list(&["hover"])[..]));
    }

    #[test]
    fn builtin_table_resolves_unchanged_without_config() {
        let table = DefaultTable::builtin();
        let order = resolve(&UserVariantConfig::default(), table).expect("defaults should resolve");
        assert_eq!(order.len(), table.len());
        for (plugin, variants) in order.iter() {
            assert_eq!(variants, table.lookup(plugin));
        }
    }

    #[test]
    fn global_list_replaces_every_plugin() {
        let config = UserVariantConfig::global(["focus", "hover"]);
        let order = resolve(&config, &table()).expect("global list should resolve");
        assert_eq!(order.len(), 3);
        for (_, variants) in order.iter() {
            assert_eq!(variants, ["focus", "hover"]);
        }
    }

    #[test]
    fn after_without_anchor_appends_to_defaults() {
        let config = UserVariantConfig::per_plugin([(
            "backgroundColor",
            VariantOverride::compose(|algebra| Ok(algebra.after(&["active"], None, None))),
        )]);
        let order = resolve(&config, &table()).expect("config should resolve");
        assert_eq!(
            order.get("backgroundColor"),
            Some(&list(&["responsive", "hover", "focus", "active"])[..])
        );
    }

    #[test]
    fn nested_helpers_compose() {
        let config = UserVariantConfig::per_plugin([(
            "backgroundColor",
            VariantOverride::compose(|algebra| {
                let with_focus_within = algebra.after(&["focus-within"], Some("responsive"), None);
                let with_active =
                    algebra.before(&["active"], Some("hover"), Some(with_focus_within.as_slice()));
                Ok(algebra.without(&["focus"], Some(with_active.as_slice())))
            }),
        )]);
        let order = resolve(&config, &table()).expect("config should resolve");
        assert_eq!(
            order.get("backgroundColor"),
            Some(&list(&["responsive", "focus-within", "active", "hover"])[..])
        );
    }

    #[test]
    fn mutual_references_are_a_cycle() {
        let config = UserVariantConfig::per_plugin([
            (
                "backgroundColor",
                VariantOverride::compose(|algebra| algebra.variants("textColor")),
            ),
            (
                "textColor",
                VariantOverride::compose(|algebra| algebra.variants("backgroundColor")),
            ),
        ]);
        let err = resolve(&config, &table()).expect_err("cycle should fail");
        assert_eq!(
            err,
            ResolveError::CyclicVariantReference {
                cycle: list(&["backgroundColor", "textColor", "backgroundColor"]),
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let config = UserVariantConfig::per_plugin([(
            "padding",
            VariantOverride::compose(|algebra| algebra.variants("padding")),
        )]);
        let err = resolve(&config, &table()).expect_err("cycle should fail");
        assert!(err.is_cycle());
    }

    #[test]
    fn swallowed_cycle_still_aborts_resolution() {
        let config = UserVariantConfig::per_plugin([
            (
                "backgroundColor",
                VariantOverride::compose(|algebra| {
                    Ok(algebra.variants("textColor").unwrap_or_default())
                }),
            ),
            (
                "textColor",
                VariantOverride::compose(|algebra| algebra.variants("backgroundColor")),
            ),
        ]);
        let err = resolve_partial(&config, &table(), ResolveOptions::default())
            .expect_err("cycle should abort everything");
        assert!(err.is_cycle());
    }

    #[test]
    fn duplicate_variant_is_rejected() {
        let config = UserVariantConfig::per_plugin([(
            "padding",
            VariantOverride::list(["x", "x"]),
        )]);
        let err = resolve(&config, &table()).expect_err("duplicate should fail");
        assert_eq!(
            err,
            ResolveError::DuplicateVariant {
                plugin: "padding".to_string(),
                variant: "x".to_string(),
            }
        );
    }

    #[test]
    fn partial_resolution_drops_failed_plugins_only() {
        let config = UserVariantConfig::per_plugin([(
            "padding",
            VariantOverride::compose(|algebra| Ok(algebra.after(&["responsive"], None, None))),
        )]);
        let resolution = resolve_partial(&config, &table(), ResolveOptions::default())
            .expect("no cycle");
        assert!(!resolution.is_complete());
        assert!(!resolution.order.contains("padding"));
        assert!(resolution.order.contains("backgroundColor"));
        assert_eq!(resolution.errors.len(), 1);
        assert_eq!(resolution.errors[0].plugin(), Some("padding"));
    }

    #[test]
    fn plugins_reading_a_failed_plugin_fail_with_their_own_error() {
        let config = UserVariantConfig::per_plugin([
            ("textColor", VariantOverride::list(["x", "x"])),
            (
                "backgroundColor",
                VariantOverride::compose(|algebra| algebra.variants("textColor")),
            ),
        ]);
        let resolution = resolve_partial(&config, &table(), ResolveOptions::default())
            .expect("no cycle");

        assert_eq!(
            resolution.errors,
            vec![
                ResolveError::DuplicateVariant {
                    plugin: "textColor".to_string(),
                    variant: "x".to_string(),
                },
                ResolveError::DependencyFailed {
                    plugin: "backgroundColor".to_string(),
                    dependency: "textColor".to_string(),
                },
            ]
        );
        for plugin in table().plugins() {
            let blamed = resolution
                .errors
                .iter()
                .filter(|err| err.plugin() == Some(plugin))
                .count();
            let expected = usize::from(!resolution.order.contains(plugin));
            assert_eq!(blamed, expected, "errors naming {plugin}");
        }

        let err = resolve(&config, &table()).expect_err("duplicate should fail");
        assert_eq!(err.plugin(), Some("textColor"));
    }

    #[test]
    fn global_list_with_duplicates_fails() {
        let config = UserVariantConfig::global(["hover", "hover"]);
        let err = resolve(&config, &table()).expect_err("duplicate should fail");
        assert!(matches!(err, ResolveError::DuplicateVariant { .. }));
    }

    #[test]
    fn references_see_customized_lists_and_resolve_first() {
        let config = UserVariantConfig::per_plugin([
            (
                "backgroundColor",
                VariantOverride::compose(|algebra| {
                    let text = algebra.variants("textColor")?;
                    Ok(algebra.after(&["active"], None, Some(text.as_slice())))
                }),
            ),
            ("textColor", VariantOverride::list(["hover"])),
        ]);
        let resolution = resolve_partial(&config, &table(), ResolveOptions::default())
            .expect("config should resolve");

        assert!(resolution.is_complete());
        assert_eq!(
            resolution.order.get("backgroundColor"),
            Some(&list(&["hover", "active"])[..])
        );
        assert_eq!(
            resolution.dependencies_of("backgroundColor"),
            &list(&["textColor"])[..]
        );
        let order = resolution.resolution_order();
        let text_idx = order.iter().position(|p| p == "textColor").expect("textColor");
        let bg_idx = order
            .iter()
            .position(|p| p == "backgroundColor")
            .expect("backgroundColor");
        assert!(text_idx < bg_idx);

        let plugins: Vec<&str> = resolution.order.plugins().collect();
        assert_eq!(plugins, vec!["backgroundColor", "textColor", "padding"]);
    }

    #[test]
    fn config_only_plugins_resolve_after_table_plugins() {
        let config = UserVariantConfig::per_plugin([
            (
                "customPlugin",
                VariantOverride::compose(|algebra| Ok(algebra.after(&["hover"], None, None))),
            ),
            ("padding", VariantOverride::list(["focus"])),
        ]);
        let order = resolve(&config, &table()).expect("config should resolve");
        let plugins: Vec<&str> = order.plugins().collect();
        assert_eq!(
            plugins,
            vec!["backgroundColor", "textColor", "padding", "customPlugin"]
        );
        assert_eq!(order.get("customPlugin"), Some(&list(&["hover"])[..]));
    }

    #[test]
    fn unknown_plugin_policy_controls_references() {
        let make_config = || {
            UserVariantConfig::per_plugin([(
                "padding",
                VariantOverride::compose(|algebra| {
                    let other = algebra.variants("missingPlugin")?;
                    Ok(algebra.after(&other, None, None))
                }),
            )])
        };

        let order = resolve(&make_config(), &table()).expect("empty policy should resolve");
        assert_eq!(order.get("padding"), Some(&list(&["responsive"])[..]));

        let err = resolve_with_options(
            &make_config(),
            &table(),
            ResolveOptions {
                unknown_plugins: UnknownPluginPolicy::Error,
            },
        )
        .expect_err("error policy should fail");
        assert_eq!(
            err,
            ResolveError::UnknownPlugin {
                plugin: "missingPlugin".to_string(),
                referenced_by: "padding".to_string(),
            }
        );
    }
}
