use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{atom_target, filter_atoms}
    },
    schema::{
        SchemaGraph,
        concepts::{VALIDITY_DERIVED_TABLES, VALIDITY_TRACKED_TABLES}
    },
    scope::{Atom, ScopeId, ScopeTree}
};

/// Vocabulary lookups must exclude deprecated entries.
///
/// Every alias of `concept` or `concept_relationship` needs its own
/// `invalid_reason` filter. Tables that only point at concepts
/// (`concept_ancestor`, `concept_synonym`, ..) are flagged when no concept
/// alias in the statement is filtered at all.
pub struct InvalidReasonEnforcement;

impl Rule for InvalidReasonEnforcement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.invalid_reason_enforcement",
            name:     "Invalid Reason Enforcement",
            severity: Severity::Error,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let filtered: Vec<(ScopeId, String)> = filter_atoms(tree)
            .filter(|(_, atom)| is_validity_filter(atom))
            .filter_map(|(scope, atom)| atom_target(tree, schema, scope, atom))
            .filter(|r| r.column == "invalid_reason")
            .map(|r| (r.scope, r.alias.to_string()))
            .collect();

        let info = self.info();
        let mut violations = Vec::new();
        let mut any_filtered = false;
        for scope in tree.scopes() {
            for (alias, binding) in &scope.bindings {
                let Some(table) = binding.table() else {
                    continue;
                };
                if !VALIDITY_TRACKED_TABLES.contains(&table) {
                    continue;
                }
                if filtered.iter().any(|(s, a)| *s == scope.id && a == alias.as_str()) {
                    any_filtered = true;
                    continue;
                }
                violations.push(
                    Violation::new(
                        info.id,
                        info.severity,
                        format!(
                            "{} is queried as '{}' without an invalid_reason filter. Deprecated and upgraded vocabulary entries will be included.",
                            table, alias
                        ),
                        format!("Add: {}.invalid_reason IS NULL", alias)
                    )
                    .at(Location::alias(table, alias))
                    .detail("table", table)
                    .detail("alias", alias.as_str())
                );
            }
        }

        let derived: Vec<&str> = VALIDITY_DERIVED_TABLES
            .iter()
            .copied()
            .filter(|t| tree.uses_table(t))
            .collect();
        if !derived.is_empty() && !any_filtered {
            violations.push(
                Violation::new(
                    info.id,
                    Severity::Warning,
                    format!(
                        "{} reference concepts but no concept alias in the query filters on invalid_reason. Deprecated concepts can enter through these tables.",
                        derived.join(", ")
                    ),
                    "JOIN to concept table and add: WHERE concept.invalid_reason IS NULL"
                )
                .at(Location::fragment(derived.join(", ")))
                .detail("tables", derived)
            );
        }
        Ok(violations)
    }
}

/// `IS [NOT] NULL`, `=`, `<>`, `IN` and `NOT IN` all state an intent.
fn is_validity_filter(atom: &Atom) -> bool {
    matches!(
        atom,
        Atom::IsNull { .. } | Atom::Compare { .. } | Atom::InList { .. }
    )
}
