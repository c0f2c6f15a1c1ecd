use indexmap::IndexMap;
use std::sync::OnceLock;

use crate::{PluginId, VariantList, VariantName};

const RESPONSIVE: &[&str] = &["responsive"];
const RESPONSIVE_FOCUS: &[&str] = &["responsive", "focus"];
const RESPONSIVE_HOVER_FOCUS: &[&str] = &["responsive", "hover", "focus"];

const BUILTIN_DEFAULT_VARIANTS: &[(&str, &[&str])] = &[
    ("accessibility", RESPONSIVE_FOCUS),
    ("alignContent", RESPONSIVE),
    ("alignItems", RESPONSIVE),
    ("alignSelf", RESPONSIVE),
    ("appearance", RESPONSIVE),
    ("backgroundAttachment", RESPONSIVE),
    ("backgroundClip", RESPONSIVE),
    ("backgroundColor", RESPONSIVE_HOVER_FOCUS),
    ("backgroundImage", RESPONSIVE),
    ("gradientColorStops", RESPONSIVE_HOVER_FOCUS),
    ("backgroundOpacity", RESPONSIVE_HOVER_FOCUS),
    ("backgroundPosition", RESPONSIVE),
    ("backgroundRepeat", RESPONSIVE),
    ("backgroundSize", RESPONSIVE),
    ("borderCollapse", RESPONSIVE),
    ("borderColor", RESPONSIVE_HOVER_FOCUS),
    ("borderOpacity", RESPONSIVE_HOVER_FOCUS),
    ("borderRadius", RESPONSIVE),
    ("borderStyle", RESPONSIVE),
    ("borderWidth", RESPONSIVE),
    ("boxShadow", RESPONSIVE_HOVER_FOCUS),
    ("boxSizing", RESPONSIVE),
    ("cursor", RESPONSIVE),
    ("display", RESPONSIVE),
    ("divideColor", RESPONSIVE),
    ("divideOpacity", RESPONSIVE),
    ("divideStyle", RESPONSIVE),
    ("divideWidth", RESPONSIVE),
    ("fill", RESPONSIVE),
    ("flex", RESPONSIVE),
    ("flexDirection", RESPONSIVE),
    ("flexGrow", RESPONSIVE),
    ("flexShrink", RESPONSIVE),
    ("flexWrap", RESPONSIVE),
    ("float", RESPONSIVE),
    ("clear", RESPONSIVE),
    ("fontFamily", RESPONSIVE),
    ("fontSize", RESPONSIVE),
    ("fontSmoothing", RESPONSIVE),
    ("fontStyle", RESPONSIVE),
    ("fontWeight", RESPONSIVE_HOVER_FOCUS),
    ("height", RESPONSIVE),
    ("inset", RESPONSIVE),
    ("justifyContent", RESPONSIVE),
    ("letterSpacing", RESPONSIVE),
    ("lineHeight", RESPONSIVE),
    ("listStylePosition", RESPONSIVE),
    ("listStyleType", RESPONSIVE),
    ("margin", RESPONSIVE),
    ("maxHeight", RESPONSIVE),
    ("maxWidth", RESPONSIVE),
    ("minHeight", RESPONSIVE),
    ("minWidth", RESPONSIVE),
    ("objectFit", RESPONSIVE),
    ("objectPosition", RESPONSIVE),
    ("opacity", RESPONSIVE_HOVER_FOCUS),
    ("order", RESPONSIVE),
    ("outline", RESPONSIVE_FOCUS),
    ("overflow", RESPONSIVE),
    ("padding", RESPONSIVE),
    ("placeholderColor", RESPONSIVE_FOCUS),
    ("placeholderOpacity", RESPONSIVE_FOCUS),
    ("pointerEvents", RESPONSIVE),
    ("position", RESPONSIVE),
    ("resize", RESPONSIVE),
    ("space", RESPONSIVE),
    ("stroke", RESPONSIVE),
    ("strokeWidth", RESPONSIVE),
    ("tableLayout", RESPONSIVE),
    ("textAlign", RESPONSIVE),
    ("textColor", RESPONSIVE_HOVER_FOCUS),
    ("textOpacity", RESPONSIVE_HOVER_FOCUS),
    ("textDecoration", RESPONSIVE_HOVER_FOCUS),
    ("textTransform", RESPONSIVE),
    ("userSelect", RESPONSIVE),
    ("verticalAlign", RESPONSIVE),
    ("visibility", RESPONSIVE),
    ("whitespace", RESPONSIVE),
    ("width", RESPONSIVE),
    ("wordBreak", RESPONSIVE),
    ("zIndex", RESPONSIVE),
    ("gap", RESPONSIVE),
    ("gridAutoFlow", RESPONSIVE),
    ("gridTemplateColumns", RESPONSIVE),
    ("gridColumn", RESPONSIVE),
    ("gridColumnStart", RESPONSIVE),
    ("gridColumnEnd", RESPONSIVE),
    ("gridTemplateRows", RESPONSIVE),
    ("gridRow", RESPONSIVE),
    ("gridRowStart", RESPONSIVE),
    ("gridRowEnd", RESPONSIVE),
    ("transform", RESPONSIVE),
    ("transformOrigin", RESPONSIVE),
    ("scale", RESPONSIVE_HOVER_FOCUS),
    ("rotate", RESPONSIVE_HOVER_FOCUS),
    ("translate", RESPONSIVE_HOVER_FOCUS),
    ("skew", RESPONSIVE_HOVER_FOCUS),
    ("transitionProperty", RESPONSIVE),
    ("transitionTimingFunction", RESPONSIVE),
    ("transitionDuration", RESPONSIVE),
    ("transitionDelay", RESPONSIVE),
    ("animation", RESPONSIVE),
];

/// House default variant list per plugin, in declaration order.
///
/// The table is immutable once built. Declaration order doubles as the
/// stable plugin processing order used by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefaultTable {
    entries: IndexMap<PluginId, VariantList>,
}

impl DefaultTable {
    pub fn new<I, P, L, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<PluginId>,
        L: IntoIterator<Item = V>,
        V: Into<VariantName>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(plugin, variants)| {
                    (plugin.into(), variants.into_iter().map(Into::into).collect())
                })
                .collect(),
        }
    }

    /// Process-wide table of the built-in utility plugins.
    pub fn builtin() -> &'static DefaultTable {
        static TABLE: OnceLock<DefaultTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            DefaultTable::new(
                BUILTIN_DEFAULT_VARIANTS
                    .iter()
                    .map(|(plugin, variants)| (*plugin, variants.iter().copied())),
            )
        })
    }

    /// Unknown plugins yield an empty list.
    pub fn lookup(&self, plugin: &str) -> &[VariantName] {
        self.entries
            .get(plugin)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.entries.contains_key(plugin)
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
