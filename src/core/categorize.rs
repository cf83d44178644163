// ProfLog - core/categorize.rs
//
// Rule-driven classification of invocations.
//
// Categories form an ordered list evaluated first-match-wins; subcategories
// are all evaluated and each match refines the category name. The rules are
// plain data, loaded and compiled by the platform config layer.

use crate::core::model::{Categorization, MethodInvocation};
use crate::core::template::Template;
use crate::util::constants;
use std::collections::BTreeMap;

/// A primary category: both templates must match.
#[derive(Debug, Clone)]
pub struct CategoryDefinition {
    pub name: String,
    pub method: Template,
    pub arguments: Template,
}

/// Refines a category by matching one captured parameter's value.
#[derive(Debug, Clone)]
pub struct SubcategoryDefinition {
    pub name: String,
    pub parameter: String,
    pub value: Template,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryRules {
    pub categories: Vec<CategoryDefinition>,
    pub subcategories: Vec<SubcategoryDefinition>,
}

impl CategoryRules {
    pub fn new(
        categories: Vec<CategoryDefinition>,
        subcategories: Vec<SubcategoryDefinition>,
    ) -> Self {
        Self {
            categories,
            subcategories,
        }
    }

    /// Classify a call by method name and serialised arguments.
    ///
    /// Subcategories look up their parameter among the primary captures and
    /// every one that matches contributes `.name` and its own captures.
    pub fn categorize(&self, method: &str, arguments: &str) -> Option<Categorization> {
        let (definition, mut parameters) = self.categories.iter().find_map(|def| {
            let mut params = def.method.matches(method)?;
            params.extend(def.arguments.matches(arguments)?);
            Some((def, params))
        })?;

        let primary = parameters.clone();
        let mut subcategories = Vec::new();
        for sub in &self.subcategories {
            let Some(value) = primary.get(&sub.parameter) else {
                continue;
            };
            if let Some(captures) = sub.value.matches(value) {
                subcategories.push(sub.name.clone());
                parameters.extend(captures);
            }
        }

        Some(Categorization {
            category: definition.name.clone(),
            subcategories,
            parameters,
        })
    }

    /// Categorise `invocation` in place from its method and arguments.
    pub fn apply(&self, invocation: &mut MethodInvocation) {
        invocation.categorization = self.categorize(invocation.method(), invocation.arguments());
    }
}

/// Number of long invocations per full category name, in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    counts: BTreeMap<String, u64>,
}

impl CategoryCounts {
    pub fn increment(&mut self, invocation: &MethodInvocation) {
        let name = invocation
            .category_name()
            .unwrap_or_else(|| constants::UNCATEGORIZED.to_string());
        *self.counts.entry(name).or_insert(0) += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::test_support::*;
    use crate::core::model::ItemKind;

    const SEARCH: &str = "repo.sql.SqlRepositoryServiceImpl->searchObjects";

    fn category(name: &str, method: Option<&str>, arguments: Option<&str>) -> CategoryDefinition {
        CategoryDefinition {
            name: name.to_string(),
            method: Template::compile_optional(method).unwrap(),
            arguments: Template::compile_optional(arguments).unwrap(),
        }
    }

    fn subcategory(name: &str, parameter: &str, value: &str) -> SubcategoryDefinition {
        SubcategoryDefinition {
            name: name.to_string(),
            parameter: parameter.to_string(),
            value: Template::compile(value).unwrap(),
        }
    }

    fn rules() -> CategoryRules {
        CategoryRules::new(
            vec![
                category("search-shadow", Some(SEARCH), Some("(ShadowType, ##{paging}##)")),
                category("search-user", Some(SEARCH), Some("(UserType, ##{}##)")),
                category("search-other", Some(SEARCH), Some("(##{}##)")),
            ],
            vec![
                subcategory("no-paging", "paging", "null paging"),
                subcategory("after-oid", "paging", "PAGING: after ##{oid}##"),
                subcategory("any-paging", "paging", "##{}##"),
            ],
        )
    }

    #[test]
    fn test_first_matching_definition_wins() {
        let c = rules().categorize(SEARCH, "(UserType, q)").unwrap();
        assert_eq!(c.category, "search-user", "search-other also matches but comes later");
        assert!(c.subcategories.is_empty(), "search-user captures no paging");
    }

    #[test]
    fn test_later_definitions_are_not_consulted() {
        let mut r = rules();
        r.categories.push(category("catch-all", None, None));
        let c = r.categorize(SEARCH, "(ShadowType, x)").unwrap();
        assert_eq!(c.category, "search-shadow");
    }

    #[test]
    fn test_method_and_arguments_must_both_match() {
        assert!(rules().categorize("other->method", "(UserType, q)").is_none());
        assert!(rules().categorize(SEARCH, "no parentheses").is_none());
    }

    #[test]
    fn test_all_matching_subcategories_apply() {
        let c = rules().categorize(SEARCH, "(ShadowType, null paging)").unwrap();
        assert_eq!(c.full_name(), "search-shadow.no-paging.any-paging");
        assert_eq!(c.parameters.get("paging").map(String::as_str), Some("null paging"));
    }

    #[test]
    fn test_subcategory_captures_are_merged() {
        let c = rules()
            .categorize(SEARCH, "(ShadowType, PAGING: after 1234)")
            .unwrap();
        assert_eq!(c.full_name(), "search-shadow.after-oid.any-paging");
        let keys: Vec<_> = c.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["paging", "oid"]);
        assert_eq!(c.parameters["oid"], "1234");
    }

    #[test]
    fn test_catch_all_category() {
        let mut r = rules();
        r.categories.push(category("other", None, None));
        let c = r.categorize("x->y", "").unwrap();
        assert_eq!(c.full_name(), "other");
    }

    #[test]
    fn test_apply_and_count() {
        let mut entry = item(ItemKind::Entry, 1, SEARCH, "t");
        entry.detail = Some(record(ts(9, 0, 0, 0), "t", "###### args: (UserType, q)"));
        let mut categorized = MethodInvocation::new(entry, item(ItemKind::Exit, 1, SEARCH, "t"));
        rules().apply(&mut categorized);
        assert_eq!(categorized.category_name().as_deref(), Some("search-user"));

        let mut uncategorized = MethodInvocation::new(
            item(ItemKind::Entry, 2, "a->b", "t"),
            item(ItemKind::Exit, 2, "a->b", "t"),
        );
        rules().apply(&mut uncategorized);

        let mut counts = CategoryCounts::default();
        counts.increment(&categorized);
        counts.increment(&categorized);
        counts.increment(&uncategorized);
        let rows: Vec<_> = counts.iter().collect();
        assert_eq!(rows, vec![("-", 1), ("search-user", 2)]);
    }
}
