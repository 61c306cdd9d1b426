//! Semantic rule engine for OMOP CDM queries.
//!
//! Each rule inspects the [`ScopeTree`] of one statement together with the
//! read-only [`SchemaGraph`] and reports [`Violation`]s. Rules are
//! independent of each other: none reads another's output.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ ScopeTree   │────▶│ RuleRegistry │────▶│ Violations  │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     │ SchemaGraph │
//!                     └─────────────┘
//! ```
//!
//! The [`RuleRegistry`] is built once and enumerates rules in identifier
//! order, which fixes the order of violations in every report.
//!
//! # Rule Categories
//!
//! - **semantic** - join paths, concept hierarchy, standard concepts,
//!   unmapped records, validity, domains, temporal anchoring and
//!   follow-up bounds
//! - **vocabulary** - how concepts are looked up by text or code
//!
//! # Configuration
//!
//! Rules can be disabled via [`RulesConfig`](crate::config::RulesConfig):
//!
//! ```toml
//! [rules]
//! disabled = ["semantic.measurement_unit_validation"]
//! ```
//!
//! # Implementing Custom Rules
//!
//! ```
//! use omop_sql_validator::{
//!     error::AppResult,
//!     rules::{Rule, RuleCategory, RuleInfo, Severity, Violation},
//!     schema::SchemaGraph,
//!     scope::ScopeTree
//! };
//!
//! pub struct NoPersonTable;
//!
//! impl Rule for NoPersonTable {
//!     fn info(&self) -> RuleInfo {
//!         RuleInfo {
//!             id:       "semantic.no_person_table",
//!             name:     "No person table",
//!             severity: Severity::Warning,
//!             category: RuleCategory::Semantic
//!         }
//!     }
//!
//!     fn evaluate(&self, tree: &ScopeTree, _schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
//!         if !tree.uses_table("person") {
//!             return Ok(vec![]);
//!         }
//!         let info = self.info();
//!         Ok(vec![Violation::new(info.id, info.severity, "person is read", "Drop it")])
//!     }
//! }
//! ```

mod helpers;
mod semantic;
mod types;
mod vocabulary;

use std::sync::LazyLock;

pub use types::{Diagnostic, Location, RuleCategory, RuleInfo, Severity, Violation};

use crate::{
    error::{AppResult, config_error},
    schema::SchemaGraph,
    scope::ScopeTree
};

static REGISTRY: LazyLock<RuleRegistry> = LazyLock::new(RuleRegistry::new);

/// Trait for implementing semantic rules.
///
/// Rules are stateless: `evaluate` is a pure function of the scope tree
/// and the schema. They must be `Send + Sync` so one registry can serve
/// parallel validations.
pub trait Rule: Send + Sync {
    /// Returns metadata about this rule.
    fn info(&self) -> RuleInfo;

    /// Analyzes one statement and returns violations in document order.
    ///
    /// An `Err` means the rule could not finish; the caller records it as a
    /// diagnostic and carries on with the other rules.
    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>>;
}

/// Every rule shipped with the crate, in no particular order.
pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(semantic::DomainSegregation),
        Box::new(semantic::FutureInformationLeakage),
        Box::new(semantic::HierarchyExpansionRequired),
        Box::new(semantic::InvalidReasonEnforcement),
        Box::new(semantic::JoinPathValidation),
        Box::new(semantic::MapsToDirection),
        Box::new(semantic::MeasurementUnitValidation),
        Box::new(semantic::ObservationPeriodAnchoring),
        Box::new(semantic::StandardConceptEnforcement),
        Box::new(semantic::UnmappedConceptHandling),
        Box::new(vocabulary::ConceptCodeRequiresVocabularyId),
        Box::new(vocabulary::ConceptLookupContext),
        Box::new(vocabulary::ConceptNameLookup),
        Box::new(vocabulary::NoStringIdentification),
        Box::new(vocabulary::SchemaValidation)
    ]
}

/// Deterministic table of rules, ordered by identifier.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Registry of all built-in rules
    pub fn new() -> Self {
        Self::from_rules(builtin_rules())
    }

    /// Registry over an explicit rule set, sorted by identifier.
    pub fn from_rules(mut rules: Vec<Box<dyn Rule>>) -> Self {
        rules.sort_by_key(|r| r.info().id);
        rules.dedup_by_key(|r| r.info().id);
        Self {
            rules
        }
    }

    /// Process-wide registry of the built-in rules.
    pub fn global() -> &'static RuleRegistry {
        &REGISTRY
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn infos(&self) -> Vec<RuleInfo> {
        self.iter().map(|r| r.info()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.iter().find(|r| r.info().id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Identifiers of the rules in `category`.
    pub fn ids_in(&self, category: RuleCategory) -> Vec<&'static str> {
        self.iter()
            .map(|r| r.info())
            .filter(|info| info.category == category)
            .map(|info| info.id)
            .collect()
    }

    /// Pick the rules to run.
    ///
    /// Explicit rule ids take precedence over categories; with neither, all
    /// rules run. Unknown ids or categories are a configuration error.
    /// The selection always follows registry order.
    pub fn select(&self, categories: Option<&[&str]>, rule_ids: Option<&[&str]>) -> AppResult<Vec<&dyn Rule>> {
        let categories = categories
            .unwrap_or_default()
            .iter()
            .map(|c| c.parse::<RuleCategory>())
            .collect::<AppResult<Vec<_>>>()?;
        let rule_ids = rule_ids.unwrap_or_default();
        if let Some(unknown) = rule_ids.iter().find(|id| !self.contains(id.trim())) {
            return Err(config_error(format!("Unknown rule id '{}'", unknown)));
        }
        let selected = self
            .iter()
            .filter(|rule| {
                let info = rule.info();
                if !rule_ids.is_empty() {
                    rule_ids.iter().any(|id| id.trim() == info.id)
                } else if !categories.is_empty() {
                    categories.contains(&info.category)
                } else {
                    true
                }
            })
            .collect();
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_sorted_and_unique() {
        let ids: Vec<&str> = RuleRegistry::global().iter().map(|r| r.info().id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_ids_are_namespaced_by_category() {
        for info in RuleRegistry::global().infos() {
            assert!(
                info.id.starts_with(&format!("{}.", info.category)),
                "{} is not in its category namespace",
                info.id
            );
        }
    }

    #[test]
    fn test_select_precedence() {
        let registry = RuleRegistry::global();
        let picked = registry
            .select(Some(&["vocabulary"]), Some(&["semantic.join_path_validation"]))
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].info().id, "semantic.join_path_validation");
        let vocab = registry.select(Some(&["vocabulary"]), None).unwrap();
        assert_eq!(vocab.len(), registry.ids_in(RuleCategory::Vocabulary).len());
        assert_eq!(registry.select(None, None).unwrap().len(), registry.len());
    }

    #[test]
    fn test_select_rejects_unknown_entries() {
        let registry = RuleRegistry::global();
        assert!(registry.select(None, Some(&["semantic.nope"])).is_err());
        assert!(registry.select(Some(&["style"]), None).is_err());
    }
}
