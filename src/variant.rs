use indexmap::IndexMap;
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::VariantName;

/// Marks the position of the unprefixed rule inside a variant list.
pub const DEFAULT_VARIANT: &str = "default";
/// Reproduces the whole variant sequence once per breakpoint.
pub const RESPONSIVE_VARIANT: &str = "responsive";

/// How a variant turns a base rule into its variant form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantDefinition {
    /// Selector template; `&` stands for the prefixed class selector.
    Selector(String),
    /// At-rule wrapped around the prefixed rule, e.g. `@media print`.
    AtRule(String),
}

impl VariantDefinition {
    /// Parses a user-supplied definition: templates starting with `@` are
    /// at-rules, everything else is a selector template. A template without
    /// `&` is appended to the selector.
    pub fn parse(template: &str) -> Self {
        let template = template.trim();
        if template.starts_with('@') {
            return Self::AtRule(template.to_string());
        }
        if template.contains('&') {
            Self::Selector(template.to_string())
        } else {
            Self::Selector(format!("&{}", template))
        }
    }

    pub fn apply(&self, selector: &str) -> String {
        match self {
            Self::Selector(template) => template.replace('&', selector),
            Self::AtRule(_) => selector.to_string(),
        }
    }

    pub fn at_rule(&self) -> Option<&str> {
        match self {
            Self::Selector(_) => None,
            Self::AtRule(rule) => Some(rule),
        }
    }
}

const BUILTIN_SELECTOR_VARIANTS: &[(&str, &str)] = &[
    ("group-hover", ".group:hover &"),
    ("group-focus", ".group:focus &"),
    ("focus-within", "&:focus-within"),
    ("first", "&:first-child"),
    ("last", "&:last-child"),
    ("odd", "&:nth-child(odd)"),
    ("even", "&:nth-child(even)"),
    ("hover", "&:hover"),
    ("focus", "&:focus"),
    ("focus-visible", "&:focus-visible"),
    ("active", "&:active"),
    ("visited", "&:visited"),
    ("checked", "&:checked"),
    ("disabled", "&:disabled"),
    ("placeholder", "&::placeholder"),
];

const BUILTIN_AT_RULE_VARIANTS: &[(&str, &str)] = &[
    ("dark", "@media (prefers-color-scheme: dark)"),
    ("motion-safe", "@media (prefers-reduced-motion: no-preference)"),
    ("motion-reduce", "@media (prefers-reduced-motion: reduce)"),
    ("print", "@media print"),
];

/// Selector construction rules keyed by variant name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantRegistry {
    definitions: IndexMap<VariantName, VariantDefinition>,
}

impl VariantRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> &'static VariantRegistry {
        static REGISTRY: OnceLock<VariantRegistry> = OnceLock::new();
        REGISTRY.get_or_init(VariantRegistry::with_builtins)
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (name, template) in BUILTIN_SELECTOR_VARIANTS {
            registry.register(*name, VariantDefinition::Selector(template.to_string()));
        }
        for (name, rule) in BUILTIN_AT_RULE_VARIANTS {
            registry.register(*name, VariantDefinition::AtRule(rule.to_string()));
        }
        registry
    }

    /// Adds or replaces a definition.
    pub fn register(&mut self, name: impl Into<VariantName>, definition: VariantDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&VariantDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

/// What the sequencer does with a variant the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownVariantPolicy {
    #[default]
    Error,
    Skip,
}

/// Named minimum-width threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub name: String,
    pub min_width: String,
}

impl Breakpoint {
    pub fn new(name: impl Into<String>, min_width: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_width: min_width.into(),
        }
    }

    /// Media condition for rules in this breakpoint's group.
    pub fn condition(&self) -> String {
        format!("(min-width: {})", self.min_width)
    }

    /// Total order over widths. `px`, `rem` and `em` compare by pixel size
    /// (16px root) and sort before other units, which group by unit name.
    /// Unparseable widths come last. Remaining ties fall back to the raw text.
    pub fn cmp_width(&self, other: &Self) -> Ordering {
        let (a, b) = (WidthKey::parse(&self.min_width), WidthKey::parse(&other.min_width));
        a.class
            .cmp(&b.class)
            .then_with(|| a.unit.cmp(b.unit))
            .then_with(|| a.size.total_cmp(&b.size))
            .then_with(|| self.min_width.cmp(&other.min_width))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum WidthClass {
    Pixels,
    OtherUnit,
    Unparsed,
}

#[derive(Debug, Clone, Copy)]
struct WidthKey<'a> {
    class: WidthClass,
    unit: &'a str,
    size: f64,
}

impl<'a> WidthKey<'a> {
    fn parse(raw: &'a str) -> Self {
        match split_length(raw) {
            Some((size, "px")) => Self::pixels(size),
            Some((size, "rem" | "em")) => Self::pixels(size * 16.0),
            Some((size, unit)) => Self {
                class: WidthClass::OtherUnit,
                unit,
                size,
            },
            None => Self {
                class: WidthClass::Unparsed,
                unit: "",
                size: 0.0,
            },
        }
    }

    fn pixels(size: f64) -> Self {
        Self {
            class: WidthClass::Pixels,
            unit: "",
            size,
        }
    }
}

pub fn default_breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint::new("sm", "640px"),
        Breakpoint::new("md", "768px"),
        Breakpoint::new("lg", "1024px"),
        Breakpoint::new("xl", "1280px"),
    ]
}

/// Sorts ascending by width. Ties keep their relative order.
pub fn sort_breakpoints(breakpoints: &mut [Breakpoint]) {
    breakpoints.sort_by(Breakpoint::cmp_width);
}

/// Splits `"768px"` into `(768.0, "px")`. A bare number or a missing number
/// does not parse.
fn split_length(raw: &str) -> Option<(f64, &str)> {
    let raw = raw.trim();
    let unit_start = raw.find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))?;
    let (number, unit) = raw.split_at(unit_start);
    let size = number.parse::<f64>().ok()?;
    let unit = unit.trim();
    (!unit.is_empty()).then_some((size, unit))
}

/// Escapes a variant or breakpoint name for use inside a class selector.
pub fn escape_class_fragment(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() * 2);
    for ch in raw.chars() {
        match ch {
            ':' | '/' | '[' | ']' | '(' | ')' | '&' | '>' | '+' | ',' | '%' | '=' | '!' | '*'
            | '@' | '#' | '\'' | '"' | '.' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Prefixes the leading class of `selector` with `prefix:`.
///
/// Selectors that do not start with a class are returned unchanged.
pub fn prefix_class_selector(selector: &str, prefix: &str) -> String {
    match selector.strip_prefix('.') {
        Some(class) => format!(".{}\\:{}", escape_class_fragment(prefix), class),
        None => selector.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Breakpoint, VariantDefinition, VariantRegistry, escape_class_fragment,
        prefix_class_selector, sort_breakpoints,
    };

    #[test]
    fn builtin_registry_knows_pseudo_and_structural_variants() {
        let registry = VariantRegistry::builtin();
        assert_eq!(
            registry.get("hover"),
            Some(&VariantDefinition::Selector("&:hover".to_string()))
        );
        assert_eq!(
            registry
                .get("group-hover")
                .map(|definition| definition.apply(".group-hover\\:p-4")),
            Some(".group:hover .group-hover\\:p-4".to_string())
        );
        assert_eq!(
            registry.get("dark").and_then(VariantDefinition::at_rule),
            Some("@media (prefers-color-scheme: dark)")
        );
        assert!(!registry.contains("default"));
        assert!(!registry.contains("responsive"));
    }

    #[test]
    fn parses_user_templates() {
        assert_eq!(
            VariantDefinition::parse("&:hover, &:focus").apply(".x"),
            ".x:hover, .x:focus"
        );
        assert_eq!(VariantDefinition::parse(":target").apply(".x"), ".x:target");
        assert_eq!(
            VariantDefinition::parse("@supports (display: grid)"),
            VariantDefinition::AtRule("@supports (display: grid)".to_string())
        );
    }

    #[test]
    fn sorts_breakpoints_by_width() {
        let mut breakpoints = vec![
            Breakpoint::new("xl", "1280px"),
            Breakpoint::new("sm", "640px"),
            Breakpoint::new("lg", "1024px"),
            Breakpoint::new("md", "768px"),
        ];
        sort_breakpoints(&mut breakpoints);
        let names: Vec<&str> = breakpoints.iter().map(|bp| bp.name.as_str()).collect();
        assert_eq!(names, vec!["sm", "md", "lg", "xl"]);
        assert_eq!(breakpoints[0].condition(), "(min-width: 640px)");
    }

    #[test]
    fn mixed_unit_widths_sort_the_same_from_any_input_order() {
        let breakpoints = [
            Breakpoint::new("a", "10px"),
            Breakpoint::new("b", "9em"),
            Breakpoint::new("c", "9px"),
            Breakpoint::new("d", "40ch"),
            Breakpoint::new("e", "wide"),
            Breakpoint::new("f", "1rem"),
        ];
        let orders: [[usize; 6]; 4] = [
            [0, 1, 2, 3, 4, 5],
            [5, 4, 3, 2, 1, 0],
            [1, 0, 2, 4, 5, 3],
            [3, 5, 1, 4, 0, 2],
        ];
        for order in orders {
            let mut input: Vec<Breakpoint> =
                order.iter().map(|&idx| breakpoints[idx].clone()).collect();
            sort_breakpoints(&mut input);
            let names: Vec<&str> = input.iter().map(|bp| bp.name.as_str()).collect();
            assert_eq!(names, vec!["c", "a", "f", "b", "d", "e"], "input {order:?}");
        }
    }

    #[test]
    fn prefixes_class_selectors() {
        assert_eq!(prefix_class_selector(".bg-red", "hover"), ".hover\\:bg-red");
        assert_eq!(
            prefix_class_selector(&prefix_class_selector(".bg-red", "hover"), "md"),
            ".md\\:hover\\:bg-red"
        );
        assert_eq!(prefix_class_selector("a", "hover"), "a");
        assert_eq!(escape_class_fragment("2xl"), "2xl");
        assert_eq!(escape_class_fragment("w-1/2"), "w-1\\/2");
    }
}
