use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{filter_atoms, is_date_column, push_unique, resolved_joins}
    },
    schema::{
        SchemaGraph,
        concepts::{DATE_FUNCTIONS, TEMPORAL_TABLES}
    },
    scope::{Atom, ScopeTree}
};

const OBSERVATION_PERIOD: &str = "observation_period";

/// Temporal constraints on clinical events need `observation_period`.
///
/// A constraint is a comparison or `BETWEEN` in `ON`/`WHERE` that touches a
/// date column of a clinical table, or applies a date function while
/// clinical tables are in play. Without `observation_period` joined on
/// `person_id`, washout and follow-up windows can reach into time where
/// the person's records are incomplete.
pub struct ObservationPeriodAnchoring;

impl Rule for ObservationPeriodAnchoring {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.observation_period_anchoring",
            name:     "Observation Period Anchoring",
            severity: Severity::Error,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut columns: Vec<String> = Vec::new();
        let mut clinical: Vec<&'static str> = Vec::new();
        let mut functions: Vec<String> = Vec::new();
        for (scope, atom) in filter_atoms(tree) {
            if !matches!(atom, Atom::Compare { .. } | Atom::Between { .. }) {
                continue;
            }
            for operand in atom.operands() {
                for column in operand.columns() {
                    if !is_date_column(&column.name) {
                        continue;
                    }
                    if let Some(table) = tree.table_of(schema, scope, column)
                        && TEMPORAL_TABLES.contains(&table)
                    {
                        push_unique(&mut columns, format!("{}.{}", table, column.name));
                        push_unique(&mut clinical, table);
                    }
                }
                for function in operand.functions() {
                    if DATE_FUNCTIONS.contains(&function.as_str()) {
                        push_unique(&mut functions, function.to_string());
                    }
                }
            }
        }
        if columns.is_empty() {
            if functions.is_empty() {
                return Ok(vec![]);
            }
            for table in TEMPORAL_TABLES {
                if tree.uses_table(table) {
                    push_unique(&mut clinical, *table);
                }
            }
            if clinical.is_empty() {
                return Ok(vec![]);
            }
        }

        let info = self.info();
        let mut constraints = columns.clone();
        constraints.extend(functions.iter().map(|f| format!("{}()", f)));
        if !tree.uses_table(OBSERVATION_PERIOD) {
            return Ok(vec![
                Violation::new(
                    info.id,
                    info.severity,
                    format!(
                        "Query applies temporal constraints ({}) without joining observation_period. Events outside a person's observation window may be incomplete or missing.",
                        constraints.join(", ")
                    ),
                    "JOIN observation_period op ON <table>.person_id = op.person_id and keep event dates between op.observation_period_start_date and op.observation_period_end_date"
                )
                .at(Location::fragment(constraints.join(", ")))
                .detail("temporal_columns", columns)
                .detail("date_functions", functions)
                .detail("clinical_tables", clinical)
            ]);
        }

        let anchored = resolved_joins(tree, schema).iter().any(|join| {
            join.oriented(OBSERVATION_PERIOD, "person_id")
                .is_some_and(|(_, other)| {
                    other.column == "person_id"
                        && other
                            .table()
                            .is_some_and(|t| t != OBSERVATION_PERIOD && (t == "person" || TEMPORAL_TABLES.contains(&t)))
                })
        });
        if anchored {
            return Ok(vec![]);
        }
        Ok(vec![
            Violation::new(
                info.id,
                Severity::Warning,
                format!(
                    "observation_period is referenced but not joined on person_id to {}. The temporal constraints are not anchored to each person's observation window.",
                    clinical.join(", ")
                ),
                "Ensure observation_period is joined on person_id: JOIN observation_period op ON table.person_id = op.person_id"
            )
            .at(Location::alias(OBSERVATION_PERIOD, OBSERVATION_PERIOD))
            .detail("clinical_tables", clinical)
        ])
    }
}
