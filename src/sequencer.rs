//! Expansion of raw plugin rules into the ordered stream of generated rules.

use indexmap::IndexMap;
use std::iter::FusedIterator;

use crate::error::SequenceError;
use crate::resolver::ResolvedOrder;
use crate::variant::{
    Breakpoint, DEFAULT_VARIANT, RESPONSIVE_VARIANT, UnknownVariantPolicy, VariantDefinition,
    VariantRegistry, prefix_class_selector, sort_breakpoints,
};
use crate::{PluginId, VariantName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Selector and declarations a plugin produces before variant expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

impl RawRule {
    pub fn new<I, P, V>(selector: impl Into<String>, declarations: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<String>,
    {
        Self {
            selector: selector.into(),
            declarations: declarations
                .into_iter()
                .map(|(property, value)| Declaration::new(property, value))
                .collect(),
        }
    }
}

/// Raw rules per plugin. Iteration order is the plugin processing order.
pub type RawRuleTable = IndexMap<PluginId, Vec<RawRule>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRule {
    pub plugin: PluginId,
    pub selector: String,
    pub declarations: Vec<Declaration>,
    /// `None` for the unprefixed form.
    pub variant: Option<VariantName>,
    /// At-rule contributed by the variant itself.
    pub at_rule: Option<String>,
    /// Set for rules of a breakpoint group.
    pub breakpoint: Option<Breakpoint>,
}

impl GeneratedRule {
    pub fn is_unprefixed(&self) -> bool {
        self.variant.is_none()
    }

    /// Breakpoint and variant names that produced this rule, outermost first.
    pub fn variant_path(&self) -> Vec<&str> {
        self.breakpoint
            .iter()
            .map(|breakpoint| breakpoint.name.as_str())
            .chain(self.variant.as_deref())
            .collect()
    }
}

/// Builds rule streams against a variant registry and a set of breakpoints.
#[derive(Debug, Clone)]
pub struct Sequencer<'a> {
    registry: &'a VariantRegistry,
    breakpoints: Vec<Breakpoint>,
    unknown_variants: UnknownVariantPolicy,
}

impl<'a> Sequencer<'a> {
    pub fn new(registry: &'a VariantRegistry, breakpoints: &[Breakpoint]) -> Self {
        let mut breakpoints = breakpoints.to_vec();
        sort_breakpoints(&mut breakpoints);
        Self {
            registry,
            breakpoints,
            unknown_variants: UnknownVariantPolicy::default(),
        }
    }

    pub fn unknown_variants(mut self, policy: UnknownVariantPolicy) -> Self {
        self.unknown_variants = policy;
        self
    }

    /// Breakpoints in ascending width order.
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Plans every plugin of `raw_rules` and returns the lazy rule stream.
    ///
    /// Unknown variant names are reported here, before any rule is produced.
    /// Plugins without a resolved order produce nothing.
    pub fn sequence<'s>(
        &self,
        resolved: &'s ResolvedOrder,
        raw_rules: &'s RawRuleTable,
    ) -> Result<RuleStream<'s>, SequenceError>
    where
        'a: 's,
    {
        let mut plans = Vec::with_capacity(raw_rules.len());
        for (plugin, rules) in raw_rules {
            let Some(order) = resolved.get(plugin) else {
                tracing::debug!(plugin = %plugin, "no resolved variant order, skipping plugin");
                continue;
            };
            plans.push(self.plan_plugin(plugin, order, rules)?);
        }

        Ok(RuleStream {
            plans,
            breakpoints: self.breakpoints.clone(),
            plugin: 0,
            group: 0,
            step: 0,
            rule: 0,
        })
    }

    fn plan_plugin<'s>(
        &self,
        plugin: &'s str,
        order: &'s [VariantName],
        rules: &'s [RawRule],
    ) -> Result<PluginPlan<'s>, SequenceError>
    where
        'a: 's,
    {
        let mut steps = Vec::with_capacity(order.len() + 1);
        let mut responsive = false;
        let mut has_default = false;

        for variant in order {
            match variant.as_str() {
                RESPONSIVE_VARIANT => responsive = true,
                DEFAULT_VARIANT => {
                    has_default = true;
                    steps.push(Step::Unprefixed);
                }
                name => match self.registry.get(name) {
                    Some(definition) => steps.push(Step::Variant { name, definition }),
                    None => match self.unknown_variants {
                        UnknownVariantPolicy::Error => {
                            return Err(SequenceError::UnknownVariantName {
                                plugin: plugin.to_string(),
                                variant: name.to_string(),
                            });
                        }
                        UnknownVariantPolicy::Skip => {
                            tracing::warn!(plugin, variant = name, "skipping unknown variant");
                        }
                    },
                },
            }
        }

        if !has_default {
            steps.insert(0, Step::Unprefixed);
        }

        tracing::debug!(
            plugin,
            steps = steps.len(),
            rules = rules.len(),
            responsive,
            "planned rule sequence"
        );
        Ok(PluginPlan {
            plugin,
            rules,
            steps,
            responsive,
        })
    }
}

/// Sequences with the built-in variant registry, failing on unknown variants.
pub fn sequence<'s>(
    resolved: &'s ResolvedOrder,
    raw_rules: &'s RawRuleTable,
    breakpoints: &[Breakpoint],
) -> Result<RuleStream<'s>, SequenceError> {
    Sequencer::new(VariantRegistry::builtin(), breakpoints).sequence(resolved, raw_rules)
}

#[derive(Debug, Clone, Copy)]
enum Step<'a> {
    Unprefixed,
    Variant {
        name: &'a str,
        definition: &'a VariantDefinition,
    },
}

#[derive(Debug)]
struct PluginPlan<'a> {
    plugin: &'a str,
    rules: &'a [RawRule],
    steps: Vec<Step<'a>>,
    responsive: bool,
}

/// Ordered, single-pass stream of generated rules.
///
/// Per plugin: the base group, then one group per breakpoint when the plugin
/// is responsive. Within a group, steps follow the resolved order and every
/// raw rule is emitted per step.
#[derive(Debug)]
pub struct RuleStream<'a> {
    plans: Vec<PluginPlan<'a>>,
    breakpoints: Vec<Breakpoint>,
    plugin: usize,
    // 0 is the base group, `n` is the group of breakpoint `n - 1`.
    group: usize,
    step: usize,
    rule: usize,
}

impl Iterator for RuleStream<'_> {
    type Item = GeneratedRule;

    fn next(&mut self) -> Option<GeneratedRule> {
        loop {
            let plan = self.plans.get(self.plugin)?;
            let groups = if plan.responsive {
                1 + self.breakpoints.len()
            } else {
                1
            };
            if self.group >= groups {
                self.plugin += 1;
                self.group = 0;
                continue;
            }
            let Some(step) = plan.steps.get(self.step) else {
                self.group += 1;
                self.step = 0;
                continue;
            };
            let Some(raw) = plan.rules.get(self.rule) else {
                self.step += 1;
                self.rule = 0;
                continue;
            };

            let breakpoint = self
                .group
                .checked_sub(1)
                .and_then(|idx| self.breakpoints.get(idx));
            self.rule += 1;
            return Some(build_rule(plan.plugin, *step, raw, breakpoint));
        }
    }
}

impl FusedIterator for RuleStream<'_> {}

fn build_rule(
    plugin: &str,
    step: Step<'_>,
    raw: &RawRule,
    breakpoint: Option<&Breakpoint>,
) -> GeneratedRule {
    let (variant, definition) = match step {
        Step::Unprefixed => (None, None),
        Step::Variant { name, definition } => (Some(name), Some(definition)),
    };

    let mut selector = raw.selector.clone();
    if let Some(name) = variant {
        selector = prefix_class_selector(&selector, name);
    }
    if let Some(breakpoint) = breakpoint {
        selector = prefix_class_selector(&selector, &breakpoint.name);
    }
    if let Some(definition) = definition {
        selector = definition.apply(&selector);
    }

    GeneratedRule {
        plugin: plugin.to_string(),
        selector,
        declarations: raw.declarations.clone(),
        variant: variant.map(str::to_string),
        at_rule: definition
            .and_then(VariantDefinition::at_rule)
            .map(str::to_string),
        breakpoint: breakpoint.cloned(),
    }
}
