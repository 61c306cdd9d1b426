use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{atom_target, filter_atoms, resolved_joins}
    },
    schema::{ConceptField, SchemaGraph},
    scope::{ResolvedColumn, ScopeTree}
};

const RELATIONSHIP_TABLE: &str = "concept_relationship";

/// `Maps to` runs from a source concept (`concept_id_1`) to a standard one
/// (`concept_id_2`).
///
/// Only `concept_relationship` aliases restricted to `'Maps to'` are
/// checked. Joining `concept_id_1` to a standard field, or `concept_id_2`
/// to a source field, reads the mapping backwards.
pub struct MapsToDirection;

impl Rule for MapsToDirection {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.maps_to_direction",
            name:     "Maps To Direction",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        if !tree.uses_table(RELATIONSHIP_TABLE) {
            return Ok(vec![]);
        }
        let maps_to: Vec<ResolvedColumn> = filter_atoms(tree)
            .filter(|(_, atom)| {
                atom.text_values()
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case("maps to"))
            })
            .filter_map(|(scope, atom)| atom_target(tree, schema, scope, atom))
            .filter(|r| r.table() == Some(RELATIONSHIP_TABLE) && r.column == "relationship_id")
            .collect();
        if maps_to.is_empty() {
            return Ok(vec![]);
        }

        let info = self.info();
        let mut violations = Vec::new();
        for join in resolved_joins(tree, schema) {
            for (relationship, other) in [(&join.left, &join.right), (&join.right, &join.left)] {
                if relationship.table() != Some(RELATIONSHIP_TABLE) {
                    continue;
                }
                let restricted = maps_to
                    .iter()
                    .any(|m| m.scope == relationship.scope && m.alias == relationship.alias);
                let Some(other_table) = other.table() else {
                    continue;
                };
                if !restricted {
                    continue;
                }
                let field = schema.classify(other_table, &other.column);
                let (expected, found) = match (relationship.column.as_str(), field) {
                    ("concept_id_1", Some(ConceptField::Standard)) => ("concept_id_2", "standard"),
                    ("concept_id_2", Some(ConceptField::Source)) => ("concept_id_1", "source"),
                    _ => continue
                };
                violations.push(
                    Violation::new(
                        info.id,
                        info.severity,
                        format!(
                            "'Maps to' is used in the wrong direction: {}.{} is joined to {} field {}. concept_id_1 holds the source concept and concept_id_2 the standard concept it maps to.",
                            relationship.alias,
                            relationship.column,
                            found,
                            other.qualified()
                        ),
                        format!(
                            "Join {} to {}.{} instead",
                            other.qualified(),
                            relationship.alias,
                            expected
                        )
                    )
                    .at(Location::column(
                        Some(RELATIONSHIP_TABLE),
                        Some(relationship.alias.as_str()),
                        &relationship.column
                    ))
                    .detail("relationship_column", relationship.column.as_str())
                    .detail("joined_field", other.qualified())
                    .detail("expected_column", expected)
                );
            }
        }
        Ok(violations)
    }
}
