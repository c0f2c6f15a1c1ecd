//! Pure list operations used to compose variant orders.
//!
//! Every operation takes its base list explicitly and returns a new list, so
//! calls nest freely: the result of one helper is the `base` of the next.

use crate::defaults::DefaultTable;
use crate::error::ResolveError;
use crate::{VariantList, VariantName};

/// Returns `base` with `names` spliced in front of the first `anchor`.
///
/// Without an anchor, or when the anchor is not part of `base`, the names are
/// prepended.
pub fn insert_before<S: AsRef<str>>(
    base: &[VariantName],
    names: &[S],
    anchor: Option<&str>,
) -> VariantList {
    let index = anchor
        .and_then(|anchor| position_of(base, anchor))
        .unwrap_or(0);
    splice(base, names, index)
}

/// Returns `base` with `names` spliced right after the first `anchor`.
///
/// Without an anchor, or when the anchor is not part of `base`, the names are
/// appended.
pub fn insert_after<S: AsRef<str>>(
    base: &[VariantName],
    names: &[S],
    anchor: Option<&str>,
) -> VariantList {
    let index = anchor
        .and_then(|anchor| position_of(base, anchor))
        .map(|idx| idx + 1)
        .unwrap_or(base.len());
    splice(base, names, index)
}

/// Returns `base` without any of `names`. Missing names are ignored.
pub fn remove<S: AsRef<str>>(base: &[VariantName], names: &[S]) -> VariantList {
    base.iter()
        .filter(|variant| !names.iter().any(|name| name.as_ref() == variant.as_str()))
        .cloned()
        .collect()
}

/// First repeated name in `list`, if any.
pub fn find_duplicate(list: &[VariantName]) -> Option<&VariantName> {
    list.iter()
        .enumerate()
        .find(|(idx, variant)| list[..*idx].contains(variant))
        .map(|(_, variant)| variant)
}

fn position_of(base: &[VariantName], anchor: &str) -> Option<usize> {
    base.iter().position(|variant| variant == anchor)
}

fn splice<S: AsRef<str>>(base: &[VariantName], names: &[S], index: usize) -> VariantList {
    let mut out = Vec::with_capacity(base.len() + names.len());
    out.extend_from_slice(&base[..index]);
    out.extend(names.iter().map(|name| name.as_ref().to_string()));
    out.extend_from_slice(&base[index..]);
    out
}

/// Source of other plugins' variant lists for [`VariantAlgebra::variants`].
pub trait VariantLookup {
    fn variants(&self, plugin: &str) -> Result<VariantList, ResolveError>;
}

impl VariantLookup for DefaultTable {
    fn variants(&self, plugin: &str) -> Result<VariantList, ResolveError> {
        Ok(self.lookup(plugin).to_vec())
    }
}

/// Helper bundle handed to resolver functions.
///
/// `before`, `after` and `without` fall back to the plugin's default list when
/// no base is given.
#[derive(Clone, Copy)]
pub struct VariantAlgebra<'a> {
    defaults: &'a [VariantName],
    lookup: &'a dyn VariantLookup,
}

impl<'a> VariantAlgebra<'a> {
    pub fn new(defaults: &'a [VariantName], lookup: &'a dyn VariantLookup) -> Self {
        Self { defaults, lookup }
    }

    /// The plugin's default list.
    pub fn defaults(&self) -> &'a [VariantName] {
        self.defaults
    }

    pub fn before<S: AsRef<str>>(
        &self,
        names: &[S],
        anchor: Option<&str>,
        base: Option<&[VariantName]>,
    ) -> VariantList {
        insert_before(base.unwrap_or(self.defaults), names, anchor)
    }

    pub fn after<S: AsRef<str>>(
        &self,
        names: &[S],
        anchor: Option<&str>,
        base: Option<&[VariantName]>,
    ) -> VariantList {
        insert_after(base.unwrap_or(self.defaults), names, anchor)
    }

    pub fn without<S: AsRef<str>>(&self, names: &[S], base: Option<&[VariantName]>) -> VariantList {
        remove(base.unwrap_or(self.defaults), names)
    }

    /// Resolved list of another plugin.
    pub fn variants(&self, plugin: &str) -> Result<VariantList, ResolveError> {
        self.lookup.variants(plugin)
    }
}

impl std::fmt::Debug for VariantAlgebra<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantAlgebra")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{VariantAlgebra, find_duplicate, insert_after, insert_before, remove};
    use crate::defaults::DefaultTable;
    use proptest::prelude::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn before_splices_in_front_of_anchor() {
        let base = list(&["responsive", "hover", "focus"]);
        assert_eq!(
            insert_before(&base, &["active"], Some("focus")),
            list(&["responsive", "hover", "active", "focus"])
        );
        assert_eq!(
            insert_before(&base, &["first", "last"], None),
            list(&["first", "last", "responsive", "hover", "focus"])
        );
    }

    #[test]
    fn after_splices_behind_anchor() {
        let base = list(&["responsive", "hover", "focus"]);
        assert_eq!(
            insert_after(&base, &["focus-within"], Some("responsive")),
            list(&["responsive", "focus-within", "hover", "focus"])
        );
        assert_eq!(
            insert_after(&base, &["active"], None),
            list(&["responsive", "hover", "focus", "active"])
        );
    }

    #[test]
    fn missing_anchor_falls_back_to_list_edges() {
        let base = list(&["hover", "focus"]);
        assert_eq!(
            insert_before(&base, &["active"], Some("visited")),
            list(&["active", "hover", "focus"])
        );
        assert_eq!(
            insert_after(&base, &["active"], Some("visited")),
            list(&["hover", "focus", "active"])
        );
    }

    #[test]
    fn remove_ignores_missing_names() {
        let base = list(&["responsive", "hover", "focus"]);
        assert_eq!(
            remove(&base, &["focus", "visited"]),
            list(&["responsive", "hover"])
        );
        assert_eq!(remove(&base, &[] as &[&str]), base);
    }

    #[test]
    fn finds_first_duplicate() {
        assert_eq!(find_duplicate(&list(&["x", "y", "x"])), Some(&"x".to_string()));
        assert_eq!(find_duplicate(&list(&["x", "y"])), None);
    }

    #[test]
    fn algebra_defaults_to_plugin_list_and_nests() {
        let table = DefaultTable::new([("backgroundColor", vec!["responsive", "hover", "focus"])]);
        let algebra = VariantAlgebra::new(table.lookup("backgroundColor"), &table);

        let inner = algebra.after(&["focus-within"], Some("responsive"), None);
        let middle = algebra.before(&["active"], Some("hover"), Some(inner.as_slice()));
        let outer = algebra.without(&["focus"], Some(middle.as_slice()));

        assert_eq!(outer, list(&["responsive", "focus-within", "active", "hover"]));
        assert_eq!(
            algebra.variants("backgroundColor"),
            Ok(list(&["responsive", "hover", "focus"]))
        );
    }

    fn unique_list() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set("[a-z]{1,6}", 0..8)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn before_then_remove_restores_list(base in unique_list(), pick in any::<prop::sample::Index>()) {
            let fresh = "fresh-variant";
            let anchor = if base.is_empty() { None } else { Some(base[pick.index(base.len())].as_str()) };
            let inserted = insert_before(&base, &[fresh], anchor);
            prop_assert_eq!(inserted.len(), base.len() + 1);
            prop_assert_eq!(remove(&inserted, &[fresh]), base);
        }

        #[test]
        fn after_without_anchor_appends(base in unique_list(), names in unique_list()) {
            let mut expected = base.clone();
            expected.extend(names.iter().cloned());
            prop_assert_eq!(insert_after(&base, &names, None), expected);
        }
    }
}
