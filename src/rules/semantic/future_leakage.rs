use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{filter_atoms, is_date_column}
    },
    schema::{SchemaGraph, concepts::TEMPORAL_TABLES},
    scope::{Atom, CompareOp, Operand, ScopeId, ScopeTree}
};

const PERIOD_END: &str = "observation_period_end_date";

/// Ordering between dates of two clinical tables must stay inside follow-up.
///
/// `co.condition_start_date > de.drug_exposure_start_date` selects people by
/// an event that may fall after their observation ends. Some `ON`/`WHERE`
/// predicate has to bound a date by `observation_period_end_date`, either
/// as a range comparison or as the upper end of a `BETWEEN`.
pub struct FutureInformationLeakage;

/// Date ordering across tables, with the later event first.
struct DateOrdering {
    later:   String,
    earlier: String,
    text:    String
}

impl Rule for FutureInformationLeakage {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.future_information_leakage",
            name:     "Future Information Leakage",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut orderings: Vec<DateOrdering> = Vec::new();
        for (scope, atom) in filter_atoms(tree) {
            if let Some(ordering) = cross_table_ordering(tree, schema, scope, atom)
                && !orderings.iter().any(|o| o.later == ordering.later && o.earlier == ordering.earlier)
            {
                orderings.push(ordering);
            }
        }
        if orderings.is_empty() || filter_atoms(tree).any(|(_, atom)| bounds_by_period_end(atom)) {
            return Ok(vec![]);
        }

        let info = self.info();
        Ok(orderings
            .iter()
            .map(|ordering| {
                Violation::new(
                    info.id,
                    info.severity,
                    format!(
                        "Query compares {} against {} without bounding the later event by {}. Events after the person's observation window leak into the selection.",
                        ordering.later, ordering.earlier, PERIOD_END
                    ),
                    format!(
                        "Add an upper bound such as AND {} <= op.{}, with observation_period op joined on person_id",
                        ordering.later, PERIOD_END
                    )
                )
                .at(Location::fragment(ordering.text.clone()))
                .detail("later_event", ordering.later.clone())
                .detail("index_event", ordering.earlier.clone())
                .detail("missing", format!("{} upper bound", PERIOD_END))
            })
            .collect())
    }
}

/// `a.x_date > b.y_date` between two different clinical tables.
fn cross_table_ordering(tree: &ScopeTree, schema: &SchemaGraph, scope: ScopeId, atom: &Atom) -> Option<DateOrdering> {
    let Atom::Compare {
        left: Operand::Column(left),
        op,
        right: Operand::Column(right)
    } = atom
    else {
        return None;
    };
    let later_is_left = match op {
        CompareOp::Gt | CompareOp::GtEq => true,
        CompareOp::Lt | CompareOp::LtEq => false,
        CompareOp::Eq | CompareOp::NotEq => return None
    };
    if !is_date_column(&left.name) || !is_date_column(&right.name) {
        return None;
    }
    let left_table = tree.table_of(schema, scope, left)?;
    let right_table = tree.table_of(schema, scope, right)?;
    if left_table == right_table
        || !TEMPORAL_TABLES.contains(&left_table)
        || !TEMPORAL_TABLES.contains(&right_table)
    {
        return None;
    }
    let left = format!("{}.{}", left_table, left.name);
    let right = format!("{}.{}", right_table, right.name);
    let (later, earlier) = if later_is_left { (left, right) } else { (right, left) };
    Some(DateOrdering {
        later,
        earlier,
        text: atom.to_string()
    })
}

/// Range comparison or `BETWEEN` upper end on `observation_period_end_date`.
fn bounds_by_period_end(atom: &Atom) -> bool {
    let is_end = |operand: &Operand| operand.as_column().is_some_and(|c| c.name == PERIOD_END);
    match atom {
        Atom::Compare {
            left,
            op: CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq,
            right
        } => is_end(left) || is_end(right),
        Atom::Between {
            high,
            negated: false,
            ..
        } => is_end(high),
        _ => false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ColumnRef;

    fn column(qualifier: &str, name: &str) -> Operand {
        Operand::Column(ColumnRef::new(Some(qualifier), name))
    }

    #[test]
    fn test_period_end_bounds() {
        let upper = Atom::Compare {
            left:  column("co", "condition_start_date"),
            op:    CompareOp::LtEq,
            right: column("op", PERIOD_END)
        };
        assert!(bounds_by_period_end(&upper));

        let between = Atom::Between {
            target:  column("co", "condition_start_date"),
            low:     column("op", "observation_period_start_date"),
            high:    column("op", PERIOD_END),
            negated: false
        };
        assert!(bounds_by_period_end(&between));

        let equality = Atom::Compare {
            left:  column("co", "condition_start_date"),
            op:    CompareOp::Eq,
            right: column("op", PERIOD_END)
        };
        assert!(!bounds_by_period_end(&equality));
    }
}
