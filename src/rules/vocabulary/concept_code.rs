use compact_str::CompactString;

use crate::{
    error::AppResult,
    rules::{Location, Rule, RuleCategory, RuleInfo, Severity, Violation},
    schema::SchemaGraph,
    scope::{Atom, ColumnRef, ScopeId, ScopeTree}
};

/// `concept_code` is unique only within a vocabulary, so every filter on it
/// needs a `vocabulary_id` filter on the same alias in the same scope.
///
/// `E11.9` is a code in ICD10CM and may be something else entirely in
/// another vocabulary.
pub struct ConceptCodeRequiresVocabularyId;

impl Rule for ConceptCodeRequiresVocabularyId {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "vocabulary.concept_code_requires_vocabulary_id",
            name:     "Concept Code Requires Vocabulary ID",
            severity: Severity::Error,
            category: RuleCategory::Vocabulary
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let info = self.info();
        let mut reported: Vec<(ScopeId, Option<CompactString>)> = Vec::new();
        let mut violations = Vec::new();
        for scope in tree.scopes() {
            let codes: Vec<(&ColumnRef, &Atom)> = scope
                .filter_atoms()
                .filter(|atom| atom.is_string_filter())
                .filter_map(|atom| atom.target_column().map(|c| (c, atom)))
                .filter(|(c, _)| c.name == "concept_code")
                .collect();
            for (code, atom) in codes {
                if code.qualifier.is_none() && !scope_binds_concept(tree, schema, scope.id, code) {
                    continue;
                }
                let key = (scope.id, code.qualifier.clone());
                if reported.contains(&key) {
                    continue;
                }
                let restricted = scope.asserted_atoms().any(|other| {
                    other.target_column().is_some_and(|v| {
                        v.name == "vocabulary_id"
                            && same_alias(code, v)
                            && !other.text_values().is_empty()
                    })
                });
                if restricted {
                    continue;
                }
                reported.push(key);
                let alias = code.qualifier.as_deref().unwrap_or("concept");
                violations.push(
                    Violation::new(
                        info.id,
                        info.severity,
                        format!(
                            "concept_code filtered without vocabulary_id: {}. Concept codes are only unique within a vocabulary.",
                            atom
                        ),
                        format!(
                            "Add a vocabulary_id filter in the same scope, e.g.: AND {}.vocabulary_id = '<vocab>'",
                            alias
                        )
                    )
                    .at(Location::column(Some("concept"), code.qualifier.as_deref(), "concept_code"))
                    .detail("filter", atom.to_string())
                    .detail("scope", scope.kind.to_string())
                );
            }
        }
        Ok(violations)
    }
}

/// Unqualified references match any alias.
fn same_alias(a: &ColumnRef, b: &ColumnRef) -> bool {
    match (&a.qualifier, &b.qualifier) {
        (Some(x), Some(y)) => x == y,
        _ => true
    }
}

/// Guards unqualified `concept_code` against columns of derived scopes
/// that only happen to share the name.
fn scope_binds_concept(tree: &ScopeTree, schema: &SchemaGraph, scope: ScopeId, code: &ColumnRef) -> bool {
    match tree.resolve(schema, scope, code) {
        Some(r) => r.table() == Some("concept") || r.table().is_none(),
        None => true
    }
}
