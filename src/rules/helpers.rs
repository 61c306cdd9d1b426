//! Scope-tree queries shared by several rules.

use crate::{
    schema::SchemaGraph,
    scope::{Atom, ColumnRef, CompareOp, JoinEdge, Operand, ResolvedColumn, ScopeId, ScopeTree}
};

/// Join edge whose two sides both resolved to a binding.
pub(crate) struct ResolvedJoin<'t> {
    pub scope: ScopeId,
    pub edge:  &'t JoinEdge,
    pub left:  ResolvedColumn,
    pub right: ResolvedColumn
}

impl ResolvedJoin<'_> {
    /// The two sides, with the one matching `table.column` first.
    pub fn oriented(&self, table: &str, column: &str) -> Option<(&ResolvedColumn, &ResolvedColumn)> {
        if is_column(&self.left, table, column) {
            Some((&self.left, &self.right))
        } else if is_column(&self.right, table, column) {
            Some((&self.right, &self.left))
        } else {
            None
        }
    }
}

/// Every join edge of the tree, in document order.
pub(crate) fn resolved_joins<'t>(tree: &'t ScopeTree, schema: &SchemaGraph) -> Vec<ResolvedJoin<'t>> {
    let mut joins = Vec::new();
    for scope in tree.scopes() {
        for edge in &scope.joins {
            if let Some(left) = tree.resolve(schema, scope.id, &edge.left)
                && let Some(right) = tree.resolve(schema, scope.id, &edge.right)
            {
                joins.push(ResolvedJoin {
                    scope: scope.id,
                    edge,
                    left,
                    right
                });
            }
        }
    }
    joins
}

/// `ON`/`WHERE` atoms of every scope, tagged with their scope.
pub(crate) fn filter_atoms(tree: &ScopeTree) -> impl Iterator<Item = (ScopeId, &Atom)> {
    tree.scopes()
        .iter()
        .flat_map(|s| s.filter_atoms().map(move |atom| (s.id, atom)))
}

/// Asserted `ON`/`WHERE` atoms of every scope, tagged with their scope.
/// Only these count as proof that a required filter is present.
pub(crate) fn asserted_atoms(tree: &ScopeTree) -> impl Iterator<Item = (ScopeId, &Atom)> {
    tree.scopes()
        .iter()
        .flat_map(|s| s.asserted_atoms().map(move |atom| (s.id, atom)))
}

/// Atoms of every predicate in every clause, tagged with their scope.
pub(crate) fn all_atoms(tree: &ScopeTree) -> impl Iterator<Item = (ScopeId, &Atom)> {
    tree.scopes().iter().flat_map(|s| {
        s.predicates
            .iter()
            .flat_map(|p| p.atoms.iter())
            .map(move |atom| (s.id, atom))
    })
}

/// Column filtered by `=` or `IN` against non-zero numeric literals.
pub(crate) fn literal_id_filter(atom: &Atom) -> Option<(&ColumnRef, Vec<&str>)> {
    match atom {
        Atom::Compare { .. } => match atom.column_comparison()? {
            (column, CompareOp::Eq, Operand::Number(n)) if atom_number_nonzero(n) => {
                Some((column, vec![n.as_str()]))
            }
            _ => None
        },
        Atom::InList {
            target: Operand::Column(column),
            values,
            negated: false
        } => {
            let numbers: Vec<&str> = values
                .iter()
                .filter_map(|v| match v {
                    Operand::Number(n) if atom_number_nonzero(n) => Some(n.as_str()),
                    _ => None
                })
                .collect();
            (!numbers.is_empty()).then_some((column, numbers))
        }
        _ => None
    }
}

fn atom_number_nonzero(n: &str) -> bool {
    n.parse::<f64>().is_ok_and(|v| v != 0.0)
}

/// Date, datetime and time columns, by naming convention.
pub(crate) fn is_date_column(name: &str) -> bool {
    name.ends_with("_date") || name.ends_with("_datetime") || name.ends_with("_time")
}

pub(crate) fn is_column(resolved: &ResolvedColumn, table: &str, column: &str) -> bool {
    resolved.table() == Some(table) && resolved.column == column
}

/// Resolve the column an atom constrains.
pub(crate) fn atom_target(
    tree: &ScopeTree,
    schema: &SchemaGraph,
    scope: ScopeId,
    atom: &Atom
) -> Option<ResolvedColumn> {
    tree.resolve(schema, scope, atom.target_column()?)
}

/// Push unless already present, keeping first-seen order.
pub(crate) fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_column_suffixes() {
        assert!(is_date_column("condition_start_date"));
        assert!(is_date_column("measurement_datetime"));
        assert!(is_date_column("measurement_time"));
        assert!(!is_date_column("date_of_birth_id"));
        assert!(!is_date_column("person_id"));
    }
}
