use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{ResolvedJoin, resolved_joins}
    },
    schema::SchemaGraph,
    scope::{Clause, ScopeTree}
};

/// `JOIN ... ON a.x = b.y` must follow a foreign-key path of the CDM.
///
/// Only equalities between two CDM tables are checked; CTEs, derived
/// tables and tables outside the schema are skipped.
pub struct JoinPathValidation;

impl Rule for JoinPathValidation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.join_path_validation",
            name:     "Join Path Validation",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let info = self.info();
        let mut violations = Vec::new();
        for join in resolved_joins(tree, schema) {
            if join.edge.clause != Clause::On {
                continue;
            }
            let (Some(left_table), Some(right_table)) = (join.left.table(), join.right.table())
            else {
                continue;
            };
            if !schema.has_column(left_table, &join.left.column)
                || !schema.has_column(right_table, &join.right.column)
            {
                continue;
            }
            if schema.is_valid_join(left_table, &join.left.column, right_table, &join.right.column) {
                continue;
            }
            violations.push(self.violation(&info, schema, &join, left_table, right_table));
        }
        Ok(violations)
    }
}

impl JoinPathValidation {
    fn violation(
        &self,
        info: &RuleInfo,
        schema: &SchemaGraph,
        join: &ResolvedJoin<'_>,
        left_table: &str,
        right_table: &str
    ) -> Violation {
        let written = format!("{} = {}", join.left.qualified(), join.right.qualified());
        let expected: Vec<String> = schema
            .edges_between(left_table, right_table)
            .iter()
            .map(ToString::to_string)
            .collect();
        let (message, fix) = if expected.is_empty() {
            (
                format!(
                    "Join {} does not follow a foreign-key path: no declared relationship links {} and {} directly.",
                    written, left_table, right_table
                ),
                format!(
                    "Join {} and {} on columns that reference the same key, or route the join through a linking table",
                    left_table, right_table
                )
            )
        } else {
            (
                format!(
                    "Join {} does not follow a foreign-key path. Expected: {}.",
                    written,
                    expected.join(" or ")
                ),
                format!("Join on {}", expected[0])
            )
        };
        Violation::new(info.id, info.severity, message, fix)
            .at(Location::fragment(join.edge.left.to_string() + " = " + &join.edge.right.to_string()))
            .detail("left", join.left.qualified())
            .detail("right", join.right.qualified())
            .detail("expected", expected)
    }
}
