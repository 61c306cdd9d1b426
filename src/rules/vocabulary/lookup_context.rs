use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{all_atoms, atom_target}
    },
    schema::{SchemaGraph, concepts::VOCABULARY_TEXT_COLUMNS},
    scope::ScopeTree
};

/// String filters on vocabulary text (`concept_name`, `concept_code`, ..)
/// belong only in a scope that turns them into concept ids.
///
/// A concept-id-producing scope reads a vocabulary table and projects a
/// concept identifier, or is a subquery correlated to an outer concept
/// column. Anywhere else the text match feeds analytical results directly
/// and silently changes between vocabulary releases.
pub struct ConceptLookupContext;

impl Rule for ConceptLookupContext {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "vocabulary.concept_lookup_context",
            name:     "Concept Lookup Context",
            severity: Severity::Error,
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
            let Some(table) = resolved.table() else {
                continue;
            };
            let is_text = VOCABULARY_TEXT_COLUMNS
                .iter()
                .any(|(t, c)| *t == table && *c == resolved.column.as_str());
            if !is_text || tree.produces_concept_ids(schema, scope) {
                continue;
            }
            let kind = tree.scope(scope).kind;
            violations.push(
                Violation::new(
                    info.id,
                    info.severity,
                    format!(
                        "String filter on {} outside a concept id lookup ({} scope): {}. Text matches are not reproducible across vocabulary versions.",
                        resolved.qualified(),
                        kind,
                        atom
                    ),
                    format!(
                        "Move the filter into a CTE or subquery that selects concept_id from {}, then filter on the resulting concept ids",
                        table
                    )
                )
                .at(Location::column(Some(table), Some(resolved.alias.as_str()), &resolved.column))
                .detail("column", resolved.qualified())
                .detail("scope", kind.to_string())
            );
        }
        Ok(violations)
    }
}
