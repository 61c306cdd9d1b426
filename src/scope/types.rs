//! Predicate atoms and their operands.

use std::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

use super::ScopeId;

/// Column reference as written: optional qualifier plus column name, both
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<CompactString>,
    pub name:      CompactString
}

impl ColumnRef {
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        Self {
            qualifier: qualifier.map(|q| CompactString::from(q.to_ascii_lowercase())),
            name:      CompactString::from(name.to_ascii_lowercase())
        }
    }

    pub fn bare(name: &str) -> Self {
        Self::new(None, name)
    }

    /// True when `self` may denote the same column as `other`.
    /// Unqualified references match any qualifier.
    pub fn matches(&self, other: &ColumnRef) -> bool {
        self.name == other.name
            && match (&self.qualifier, &other.qualifier) {
                (Some(a), Some(b)) => a == b,
                _ => true
            }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => f.write_str(&self.name)
        }
    }
}

/// Non-trivial expression, summarized by what it touches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composite {
    pub functions: SmallVec<[CompactString; 2]>,
    pub columns:   SmallVec<[ColumnRef; 4]>
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    /// Numeric literal, sign included
    Number(CompactString),
    Text(String),
    Null,
    Subquery(ScopeId),
    Expr(Composite)
}

impl Operand {
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Column(c) => Some(c),
            _ => None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.as_str()),
            _ => None
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.parse().ok(),
            _ => None
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number() == Some(0.0)
    }

    /// Every column the operand touches.
    pub fn columns(&self) -> &[ColumnRef] {
        match self {
            Self::Column(c) => std::slice::from_ref(c),
            Self::Expr(e) => &e.columns,
            _ => &[]
        }
    }

    /// Function names used inside the operand.
    pub fn functions(&self) -> &[CompactString] {
        match self {
            Self::Expr(e) => &e.functions,
            _ => &[]
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => write!(f, "{}", c),
            Self::Number(n) => f.write_str(n),
            Self::Text(t) => write!(f, "'{}'", t),
            Self::Null => f.write_str("NULL"),
            Self::Subquery(_) => f.write_str("(subquery)"),
            Self::Expr(_) => f.write_str("(expression)")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq
}

impl CompareOp {
    /// Operator with the operands swapped: `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
            other => other
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">="
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Like,
    ILike,
    SimilarTo,
    Regex
}

/// Elementary condition found inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Compare {
        left:  Operand,
        op:    CompareOp,
        right: Operand
    },
    InList {
        target:  Operand,
        values:  Vec<Operand>,
        negated: bool
    },
    InSubquery {
        target:   Operand,
        subquery: ScopeId,
        negated:  bool
    },
    Between {
        target:  Operand,
        low:     Operand,
        high:    Operand,
        negated: bool
    },
    Match {
        target:  Operand,
        pattern: Operand,
        kind:    MatchKind,
        negated: bool
    },
    IsNull {
        target:  Operand,
        negated: bool
    },
    Exists {
        subquery: ScopeId,
        negated:  bool
    }
}

impl Atom {
    /// Comparison oriented so a column is on the left.
    ///
    /// `5 < x` comes back as `x > 5`. When both sides are columns the
    /// original orientation is kept.
    pub fn column_comparison(&self) -> Option<(&ColumnRef, CompareOp, &Operand)> {
        let Self::Compare { left, op, right } = self else {
            return None;
        };
        match (left, right) {
            (Operand::Column(c), other) => Some((c, *op, other)),
            (other, Operand::Column(c)) => Some((c, op.flip(), other)),
            _ => None
        }
    }

    /// Column the atom constrains, when its subject is a plain column.
    pub fn target_column(&self) -> Option<&ColumnRef> {
        match self {
            Self::InList { target, .. }
            | Self::InSubquery { target, .. }
            | Self::Between { target, .. }
            | Self::Match { target, .. }
            | Self::IsNull { target, .. } => target.as_column(),
            Self::Compare { .. } => self.column_comparison().map(|(c, _, _)| c),
            Self::Exists { .. } => None
        }
    }

    /// Column/column equality, as used for joins.
    pub fn column_equality(&self) -> Option<(&ColumnRef, &ColumnRef)> {
        match self {
            Self::Compare {
                left: Operand::Column(l),
                op: CompareOp::Eq,
                right: Operand::Column(r)
            } => Some((l, r)),
            _ => None
        }
    }

    /// True if the atom filters `column` by one or more string literals
    /// through `=`, `IN` or a pattern match.
    pub fn is_string_filter(&self) -> bool {
        match self {
            Self::Compare { .. } => matches!(
                self.column_comparison(),
                Some((_, CompareOp::Eq | CompareOp::NotEq, Operand::Text(_)))
            ),
            Self::InList { values, .. } => values.iter().any(|v| matches!(v, Operand::Text(_))),
            Self::Match { .. } => true,
            _ => false
        }
    }

    /// String literals compared against the target column.
    pub fn text_values(&self) -> Vec<&str> {
        match self {
            Self::Compare { .. } => match self.column_comparison() {
                Some((_, CompareOp::Eq, Operand::Text(t))) => vec![t.as_str()],
                _ => Vec::new()
            },
            Self::InList {
                values,
                negated: false,
                ..
            } => values.iter().filter_map(Operand::as_text).collect(),
            _ => Vec::new()
        }
    }

    /// Operands on both sides of the atom.
    pub fn operands(&self) -> SmallVec<[&Operand; 3]> {
        let mut out = SmallVec::new();
        match self {
            Self::Compare { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Self::InList { target, values, .. } => {
                out.push(target);
                out.extend(values.iter());
            }
            Self::InSubquery { target, .. } | Self::IsNull { target, .. } => out.push(target),
            Self::Between {
                target, low, high, ..
            } => {
                out.push(target);
                out.push(low);
                out.push(high);
            }
            Self::Match {
                target, pattern, ..
            } => {
                out.push(target);
                out.push(pattern);
            }
            Self::Exists { .. } => {}
        }
        out
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => f.write_str("LIKE"),
            Self::ILike => f.write_str("ILIKE"),
            Self::SimilarTo => f.write_str("SIMILAR TO"),
            Self::Regex => f.write_str("~")
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |negated: &bool| if *negated { "NOT " } else { "" };
        match self {
            Self::Compare {
                left,
                op,
                right
            } => write!(f, "{} {} {}", left, op.symbol(), right),
            Self::InList {
                target,
                values,
                negated
            } => {
                let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{} {}IN ({})", target, not(negated), values.join(", "))
            }
            Self::InSubquery {
                target,
                negated,
                ..
            } => write!(f, "{} {}IN (subquery)", target, not(negated)),
            Self::Between {
                target,
                low,
                high,
                negated
            } => write!(f, "{} {}BETWEEN {} AND {}", target, not(negated), low, high),
            Self::Match {
                target,
                pattern,
                kind,
                negated
            } => write!(f, "{} {}{} {}", target, not(negated), kind, pattern),
            Self::IsNull {
                target,
                negated
            } => write!(f, "{} IS {}NULL", target, not(negated)),
            Self::Exists {
                negated, ..
            } => write!(f, "{}EXISTS (subquery)", not(negated))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_display() {
        let atom = Atom::InList {
            target:  col("co", "condition_concept_id"),
            values:  vec![Operand::Number("201826".into()), Operand::Number("443238".into())],
            negated: false
        };
        assert_eq!(atom.to_string(), "co.condition_concept_id IN (201826, 443238)");
        let like = Atom::Match {
            target:  col("c", "concept_name"),
            pattern: Operand::Text("%diabetes%".into()),
            kind:    MatchKind::ILike,
            negated: true
        };
        assert_eq!(like.to_string(), "c.concept_name NOT ILIKE '%diabetes%'");
    }

    fn col(q: &str, n: &str) -> Operand {
        Operand::Column(ColumnRef::new(Some(q), n))
    }

    #[test]
    fn test_column_comparison_flips_literal_first() {
        let atom = Atom::Compare {
            left:  Operand::Number("0".into()),
            op:    CompareOp::Lt,
            right: col("co", "condition_concept_id")
        };
        let (column, op, other) = atom.column_comparison().unwrap();
        assert_eq!(column.name, "condition_concept_id");
        assert_eq!(op, CompareOp::Gt);
        assert!(other.is_zero());
    }

    #[test]
    fn test_column_ref_matching() {
        let qualified = ColumnRef::new(Some("C"), "Concept_Id");
        assert_eq!(qualified.to_string(), "c.concept_id");
        assert!(ColumnRef::bare("concept_id").matches(&qualified));
        assert!(!ColumnRef::new(Some("c2"), "concept_id").matches(&qualified));
    }

    #[test]
    fn test_string_filter_detection() {
        let eq = Atom::Compare {
            left:  col("c", "concept_code"),
            op:    CompareOp::Eq,
            right: Operand::Text("E11.9".into())
        };
        assert!(eq.is_string_filter());
        assert_eq!(eq.text_values(), vec!["E11.9"]);
        let numeric = Atom::InList {
            target:  col("c", "concept_id"),
            values:  vec![Operand::Number("1".into())],
            negated: false
        };
        assert!(!numeric.is_string_filter());
    }
}
