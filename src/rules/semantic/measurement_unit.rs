use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{filter_atoms, push_unique}
    },
    schema::SchemaGraph,
    scope::{Atom, Operand, ScopeTree}
};

/// Numeric thresholds on `measurement.value_as_number` only mean something
/// with a unit; `HbA1c > 7` is a different cohort in `%` and `mmol/mol`.
pub struct MeasurementUnitValidation;

impl Rule for MeasurementUnitValidation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.measurement_unit_validation",
            name:     "Measurement Unit Validation",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        if !tree.uses_table("measurement") {
            return Ok(vec![]);
        }
        let mut thresholds: Vec<String> = Vec::new();
        for (scope, atom) in filter_atoms(tree) {
            let Some(column) = atom.target_column() else {
                continue;
            };
            if column.name != "value_as_number" || !is_numeric_threshold(atom) {
                continue;
            }
            if tree.table_of(schema, scope, column) == Some("measurement") {
                push_unique(&mut thresholds, atom.to_string());
            }
        }
        if thresholds.is_empty() {
            return Ok(vec![]);
        }

        let unit_checked = tree
            .scopes()
            .iter()
            .any(|s| s.columns.iter().any(|u| u.column.name == "unit_concept_id"));
        if unit_checked {
            return Ok(vec![]);
        }
        let info = self.info();
        Ok(vec![
            Violation::new(
                info.id,
                info.severity,
                format!(
                    "Numeric filter on measurement.value_as_number ({}) without a unit_concept_id constraint. The same value means different things in different units.",
                    thresholds.join(", ")
                ),
                "Add: AND m.unit_concept_id = <unit_concept_id>"
            )
            .at(Location::column(Some("measurement"), None, "value_as_number"))
            .detail("filters", thresholds)
        ])
    }
}

fn is_numeric_threshold(atom: &Atom) -> bool {
    match atom {
        Atom::Compare { .. } => atom
            .column_comparison()
            .is_some_and(|(_, _, value)| matches!(value, Operand::Number(_))),
        Atom::Between { low, high, .. } => {
            matches!(low, Operand::Number(_)) || matches!(high, Operand::Number(_))
        }
        _ => false
    }
}
