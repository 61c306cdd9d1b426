use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{ResolvedJoin, filter_atoms, is_column, literal_id_filter, push_unique, resolved_joins}
    },
    schema::{SchemaGraph, concepts::HIERARCHICAL_COLUMNS},
    scope::{Atom, ColumnRef, Operand, ScopeId, ScopeTree}
};

const ANCESTOR_TABLE: &str = "concept_ancestor";

/// Hierarchical column with the literals it is filtered on.
struct FilteredColumn {
    key:      (&'static str, &'static str),
    literals: Vec<String>
}

/// Literal filters on drug/condition concepts need `concept_ancestor`.
///
/// Clinical records carry the most specific concept, so
/// `condition_concept_id = <parent>` misses every descendant. A column is
/// expanded when it is joined to `concept_ancestor.descendant_concept_id`,
/// or tested `IN` a subquery projecting that column, and every literal it is
/// filtered on is also bound to `ancestor_concept_id`. Joining it to
/// `ancestor_concept_id` instead is reported as a reversed expansion.
pub struct HierarchyExpansionRequired;

impl Rule for HierarchyExpansionRequired {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.hierarchy_expansion_required",
            name:     "Hierarchy Expansion Required",
            severity: Severity::Error,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut filtered: Vec<FilteredColumn> = Vec::new();
        let mut literals: Vec<String> = Vec::new();
        for (scope, atom) in filter_atoms(tree) {
            let Some((column, values)) = literal_id_filter(atom) else {
                continue;
            };
            let Some(key) = hierarchical(tree, schema, scope, column) else {
                continue;
            };
            let index = match filtered.iter().position(|f| f.key == key) {
                Some(index) => index,
                None => {
                    filtered.push(FilteredColumn {
                        key,
                        literals: Vec::new()
                    });
                    filtered.len() - 1
                }
            };
            for value in values {
                push_unique(&mut filtered[index].literals, value.to_string());
                push_unique(&mut literals, value.to_string());
            }
        }
        if filtered.is_empty() {
            return Ok(vec![]);
        }

        let info = self.info();
        let joins = resolved_joins(tree, schema);
        let ancestors = ancestor_literals(tree, schema);
        let mut missing = Vec::new();
        let mut violations = Vec::new();
        for FilteredColumn {
            key: (table, column),
            literals: values
        } in filtered
        {
            let covered = values.iter().all(|v| ancestors.contains(v));
            let expanded = covered
                && (joins
                    .iter()
                    .any(|j| links(j, table, column, "descendant_concept_id"))
                    || has_descendant_subquery(tree, schema, table, column));
            if expanded {
                continue;
            }
            if let Some(join) = joins
                .iter()
                .find(|j| links(j, table, column, "ancestor_concept_id"))
            {
                violations.push(
                    Violation::new(
                        info.id,
                        Severity::Warning,
                        format!(
                            "{}.{} is joined to concept_ancestor.ancestor_concept_id. This walks the hierarchy upwards and returns ancestors of the recorded concept instead of its descendants.",
                            table, column
                        ),
                        "Join clinical table to concept_ancestor.descendant_concept_id, and filter on concept_ancestor.ancestor_concept_id"
                    )
                    .at(Location::fragment(format!("{} = {}", join.edge.left, join.edge.right)))
                    .detail("column", format!("{}.{}", table, column))
                );
                continue;
            }
            missing.push(format!("{}.{}", table, column));
        }
        if !missing.is_empty() {
            let columns = missing.join(", ");
            let error = Violation::new(
                info.id,
                info.severity,
                format!(
                    "Query filters on {} without hierarchy expansion using concept_ancestor. Data is recorded with specific descendant codes, so filtering a parent concept_id directly will miss most matching records.",
                    columns
                ),
                "JOIN concept_ancestor ca ON <column> = ca.descendant_concept_id and move the literal filter to ca.ancestor_concept_id"
            )
            .at(Location::fragment(columns.clone()))
            .detail("filtered_columns", missing)
            .detail("concept_ids", literals);
            violations.insert(0, error);
        }
        Ok(violations)
    }
}

/// Join edge between `table.column` and `concept_ancestor.<side>`.
fn links(join: &ResolvedJoin<'_>, table: &str, column: &str, side: &str) -> bool {
    join.oriented(ANCESTOR_TABLE, side)
        .is_some_and(|(_, other)| is_column(other, table, column))
}

/// Literals bound to `concept_ancestor.ancestor_concept_id` anywhere in
/// the statement.
fn ancestor_literals(tree: &ScopeTree, schema: &SchemaGraph) -> Vec<String> {
    let mut literals = Vec::new();
    for (scope, atom) in filter_atoms(tree) {
        let Some((column, values)) = literal_id_filter(atom) else {
            continue;
        };
        if tree
            .resolve(schema, scope, column)
            .is_some_and(|r| is_column(&r, ANCESTOR_TABLE, "ancestor_concept_id"))
        {
            for value in values {
                push_unique(&mut literals, value.to_string());
            }
        }
    }
    literals
}

/// `table.column IN (SELECT descendant_concept_id FROM concept_ancestor ...)`.
fn has_descendant_subquery(tree: &ScopeTree, schema: &SchemaGraph, table: &str, column: &str) -> bool {
    filter_atoms(tree).any(|(scope, atom)| {
        let Atom::InSubquery {
            target: Operand::Column(target),
            subquery,
            negated: false
        } = atom
        else {
            return false;
        };
        hierarchical(tree, schema, scope, target) == Some((table, column))
            && tree.scope(*subquery).projection.iter().any(|p| {
                p.source
                    .as_ref()
                    .and_then(|c| tree.resolve(schema, *subquery, c))
                    .is_some_and(|r| is_column(&r, ANCESTOR_TABLE, "descendant_concept_id"))
            })
    })
}

/// The hierarchical column `column` denotes, if any.
fn hierarchical(
    tree: &ScopeTree,
    schema: &SchemaGraph,
    scope: ScopeId,
    column: &ColumnRef
) -> Option<(&'static str, &'static str)> {
    let table = tree.table_of(schema, scope, column)?;
    HIERARCHICAL_COLUMNS
        .iter()
        .find(|(t, c)| *t == table && *c == column.name.as_str())
        .copied()
}
