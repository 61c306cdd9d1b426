use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{all_atoms, atom_target, is_column}
    },
    schema::SchemaGraph,
    scope::{Atom, ScopeTree}
};

/// Any string filter on `concept.concept_name`.
///
/// Names are neither unique nor stable across vocabulary releases, so this
/// fires inside lookup CTEs and subqueries as well, where
/// `vocabulary.concept_lookup_context` stays silent.
pub struct ConceptNameLookup;

impl Rule for ConceptNameLookup {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "vocabulary.concept_name_lookup",
            name:     "Concept Name Lookup",
            severity: Severity::Warning,
            category: RuleCategory::Vocabulary
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let info = self.info();
        let mut violations = Vec::new();
        for (scope, atom) in all_atoms(tree) {
            if !atom.is_string_filter() {
                continue;
            }
            let Some(resolved) = atom_target(tree, schema, scope, atom) else {
                continue;
            };
            if !is_column(&resolved, "concept", "concept_name") {
                continue;
            }
            let how = match atom {
                Atom::Match { .. } => "with pattern matching",
                _ => "by value"
            };
            let mut violation = Violation::new(
                info.id,
                info.severity,
                format!(
                    "Query filters concept_name {}: {}. Concept names are not unique and change between vocabulary versions.",
                    how, atom
                ),
                format!(
                    "Filter on {alias}.concept_code together with {alias}.vocabulary_id, or on concept_id directly",
                    alias = resolved.alias
                )
            )
            .at(Location::column(Some("concept"), Some(resolved.alias.as_str()), &resolved.column))
            .detail("column", resolved.qualified());
            violation = match atom {
                Atom::Match { pattern, .. } => violation.detail("pattern", pattern.to_string()),
                _ => violation.detail("concept_names", atom.text_values())
            };
            violations.push(violation);
        }
        Ok(violations)
    }
}
