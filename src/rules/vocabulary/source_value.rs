use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::all_atoms
    },
    schema::SchemaGraph,
    scope::{Atom, ScopeTree}
};

/// Clinical concepts are identified by `*_concept_id`, never by matching
/// strings against `*_source_value`.
pub struct NoStringIdentification;

impl Rule for NoStringIdentification {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "vocabulary.no_string_identification",
            name:     "No String Identification",
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
            let Some(column) = atom.target_column() else {
                continue;
            };
            if !column.name.ends_with("_source_value") {
                continue;
            }
            let table = tree.table_of(schema, scope, column);
            let (kind, operation) = match atom {
                Atom::Match {
                    kind, negated, ..
                } => {
                    let not = if *negated { "NOT " } else { "" };
                    ("matching", format!("{}{}", not, kind))
                }
                Atom::InList {
                    negated, ..
                } => ("IN list", if *negated { "NOT IN" } else { "IN" }.to_string()),
                _ => ("equality", "=".to_string())
            };
            let qualified = match table {
                Some(t) => format!("{}.{}", t, column.name),
                None => column.name.to_string()
            };
            violations.push(
                Violation::new(
                    info.id,
                    info.severity,
                    format!("String {} on source value: {}", kind, atom),
                    "Use *_concept_id or *_source_concept_id instead of string matching"
                )
                .at(Location::column(table, column.qualifier.as_deref(), &column.name))
                .detail("column", qualified)
                .detail("operation", operation)
            );
        }
        Ok(violations)
    }
}
