use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{all_atoms, filter_atoms, literal_id_filter, push_unique}
    },
    schema::{SchemaGraph, concepts::UNMAPPED_SENSITIVE_COLUMNS},
    scope::{Atom, ColumnRef, CompareOp, ScopeId, ScopeTree}
};

/// Filtering concept columns by specific ids should say what happens to
/// `concept_id = 0`.
///
/// Handling is any of `> 0`, `>= 1`, `<> 0`, `!= 0`, `= 0`, `IN (0, ..)`,
/// or a normalizing `COALESCE`/`CASE WHEN col = 0` on the same column,
/// anywhere in the statement.
pub struct UnmappedConceptHandling;

impl Rule for UnmappedConceptHandling {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.unmapped_concept_handling",
            name:     "Unmapped Concept Handling",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut filtered: Vec<(&'static str, &'static str)> = Vec::new();
        for (scope, atom) in filter_atoms(tree) {
            let Some((column, _)) = literal_id_filter(atom) else {
                continue;
            };
            let Some(table) = tree.table_of(schema, scope, column) else {
                continue;
            };
            if let Some(&key) = UNMAPPED_SENSITIVE_COLUMNS
                .iter()
                .find(|(t, c)| *t == table && *c == column.name.as_str())
            {
                push_unique(&mut filtered, key);
            }
        }

        let info = self.info();
        let violations = filtered
            .into_iter()
            .filter(|(table, column)| !handles_zero(tree, schema, table, column))
            .map(|(table, column)| {
                Violation::new(
                    info.id,
                    info.severity,
                    format!(
                        "Query filters {}.{} by specific value(s) but does not explicitly handle concept_id = 0 (unmapped records). Records whose source code could not be mapped to a standard concept are silently excluded.",
                        table, column
                    ),
                    format!("Add: {} > 0", column)
                )
                .at(Location::column(Some(table), None, column))
                .detail("table", table)
                .detail("column", column)
            })
            .collect();
        Ok(violations)
    }
}

fn handles_zero(tree: &ScopeTree, schema: &SchemaGraph, table: &str, column: &str) -> bool {
    let same = |scope: ScopeId, c: &ColumnRef| {
        tree.table_of(schema, scope, c) == Some(table) && c.name.as_str() == column
    };
    let normalized = tree
        .scopes()
        .iter()
        .any(|s| s.normalized.iter().any(|c| same(s.id, c)));
    normalized
        || all_atoms(tree).any(|(scope, atom)| match atom {
            Atom::Compare { .. } => atom
                .column_comparison()
                .is_some_and(|(c, op, value)| same(scope, c) && is_zero_guard(op, value.as_number())),
            Atom::InList {
                target, values, ..
            } => target
                .as_column()
                .is_some_and(|c| same(scope, c) && values.iter().any(|v| v.is_zero())),
            _ => false
        })
}

fn is_zero_guard(op: CompareOp, value: Option<f64>) -> bool {
    match (op, value) {
        (CompareOp::Eq | CompareOp::NotEq | CompareOp::Gt, Some(v)) => v == 0.0,
        (CompareOp::GtEq, Some(v)) => v == 1.0,
        _ => false
    }
}
