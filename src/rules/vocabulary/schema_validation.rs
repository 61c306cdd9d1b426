use crate::{
    error::AppResult,
    rules::{Location, Rule, RuleCategory, RuleInfo, Severity, Violation},
    schema::SchemaGraph,
    scope::{Binding, ScopeTree}
};

/// Columns qualified by an alias of a CDM table must exist in that table.
///
/// Catches the classic slip of reading `ancestor_concept_id` off
/// `concept_relationship` (or `concept_id_1` off `concept_ancestor`).
pub struct SchemaValidation;

impl Rule for SchemaValidation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "vocabulary.schema_validation",
            name:     "Schema Validation",
            severity: Severity::Error,
            category: RuleCategory::Vocabulary
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let info = self.info();
        let mut reported: Vec<(&'static str, String)> = Vec::new();
        let mut violations = Vec::new();
        for scope in tree.scopes() {
            for usage in &scope.columns {
                let Some(qualifier) = &usage.column.qualifier else {
                    continue;
                };
                let Some((_, _, Binding::Table(table))) = tree.lookup(scope.id, qualifier) else {
                    continue;
                };
                let Some(definition) = schema.table(table) else {
                    continue;
                };
                let column = usage.column.name.as_str();
                if definition.has_column(column) {
                    continue;
                }
                let key = (*table, column.to_string());
                if reported.contains(&key) {
                    continue;
                }
                reported.push(key);
                let mut valid: Vec<&str> = definition.columns.to_vec();
                valid.sort_unstable();
                valid.truncate(10);
                violations.push(
                    Violation::new(
                        info.id,
                        info.severity,
                        format!("Column '{}' does not exist in table '{}'", column, table),
                        suggestion(table, column)
                    )
                    .at(Location::column(Some(*table), Some(qualifier.as_str()), column))
                    .detail("table", *table)
                    .detail("column", column)
                    .detail("valid_columns", valid)
                );
            }
        }
        Ok(violations)
    }
}

fn suggestion(table: &str, column: &str) -> String {
    match (table, column) {
        ("concept_relationship", "ancestor_concept_id" | "descendant_concept_id") => format!(
            "Column '{}' belongs to concept_ancestor, not concept_relationship. concept_relationship uses concept_id_1 and concept_id_2.",
            column
        ),
        ("concept_ancestor", "concept_id_1" | "concept_id_2") => format!(
            "Column '{}' belongs to concept_relationship, not concept_ancestor. concept_ancestor uses ancestor_concept_id and descendant_concept_id.",
            column
        ),
        _ => "Check the OMOP CDM documentation for the correct column name".to_string()
    }
}
