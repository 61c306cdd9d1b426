//! Alias- and nesting-aware view of a parsed statement.
//!
//! A statement is resolved into a [`ScopeTree`]: an arena of [`Scope`]s
//! rooted at the MAIN query. Every CTE body, derived table and expression
//! subquery gets its own scope with a back-reference to its parent.
//!
//! ```text
//! WITH cohort AS (SELECT ...)            MAIN
//! SELECT ...                              ├── CTE cohort
//! FROM cohort c                           └── SUBQUERY (IN list)
//! WHERE c.x IN (SELECT ...)
//! ```
//!
//! Each scope records:
//! - alias bindings to CDM tables, external tables or child scopes
//! - join edges (column equalities) tagged with their clause
//! - predicate conjuncts from `ON`, `WHERE` and `HAVING`, decomposed into
//!   [`Atom`]s that rules pattern-match on
//! - its projection, every column reference and the functions it calls
//!
//! Column references are resolved lazily through [`ScopeTree::resolve`].

mod build;
mod types;

use std::fmt;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use sqlparser::ast::Statement;
pub use types::{Atom, ColumnRef, CompareOp, Composite, MatchKind, Operand};

use crate::schema::{SchemaGraph, concepts::VOCABULARY_TABLES};

/// Index of a scope inside its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The MAIN scope of every tree
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Lexical kind of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeKind {
    Main,
    Cte,
    Subquery
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "MAIN"),
            Self::Cte => write!(f, "CTE"),
            Self::Subquery => write!(f, "SUBQUERY")
        }
    }
}

/// What an alias in a `FROM`/`JOIN` clause refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A table of the CDM schema
    Table(&'static str),
    /// A table the schema does not know about
    External(CompactString),
    /// A CTE reference or a derived table
    Derived(ScopeId)
}

impl Binding {
    pub fn table(&self) -> Option<&'static str> {
        match self {
            Self::Table(name) => Some(name),
            _ => None
        }
    }
}

/// Clause a predicate or column reference appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Select,
    On,
    Where,
    GroupBy,
    Having,
    OrderBy
}

impl Clause {
    /// `ON` and `WHERE` are the clauses that filter rows.
    pub fn is_filter(self) -> bool {
        matches!(self, Self::On | Self::Where)
    }
}

/// One top-level conjunct of an `ON`, `WHERE` or `HAVING` clause.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub clause:   Clause,
    /// SQL text of the conjunct
    pub text:     String,
    /// Comparisons found inside the conjunct, through `AND`/`OR`/`NOT`
    pub atoms:    Vec<Atom>,
    /// False when the conjunct holds an `OR` or a `NOT`, so its atoms do not
    /// have to hold for a row to qualify
    pub asserted: bool
}

/// Column equality between two sides of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub left:   ColumnRef,
    pub right:  ColumnRef,
    pub clause: Clause
}

/// One item of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Output name: the alias, or the column name for a bare column
    pub name:     Option<CompactString>,
    /// The projected column when the item is a plain column reference
    pub source:   Option<ColumnRef>,
    pub wildcard: bool
}

/// A column reference together with the clause it appears in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnUse {
    pub column: ColumnRef,
    pub clause: Clause
}

/// A lexical scope: one `SELECT` body with its bindings and predicates.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id:         ScopeId,
    pub kind:       ScopeKind,
    pub parent:     Option<ScopeId>,
    /// CTE name or derived-table alias
    pub name:       Option<CompactString>,
    pub bindings:   IndexMap<CompactString, Binding>,
    /// CTEs introduced by a `WITH` attached to this scope
    pub ctes:       IndexMap<CompactString, ScopeId>,
    pub joins:      Vec<JoinEdge>,
    pub predicates: Vec<Predicate>,
    pub projection: Vec<Projection>,
    pub columns:    Vec<ColumnUse>,
    /// Columns wrapped in a null/zero normalizing expression
    /// (`COALESCE`, `NVL`, `CASE WHEN col = 0`)
    pub normalized: Vec<ColumnRef>,
    /// Lowercase names of functions called anywhere in the scope
    pub functions:  SmallVec<[CompactString; 4]>,
    pub children:   Vec<ScopeId>
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>, name: Option<CompactString>) -> Self {
        Self {
            id,
            kind,
            parent,
            name,
            bindings: IndexMap::new(),
            ctes: IndexMap::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            projection: Vec::new(),
            columns: Vec::new(),
            normalized: Vec::new(),
            functions: SmallVec::new(),
            children: Vec::new()
        }
    }

    /// Predicates from `ON` and `WHERE`.
    pub fn filters(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|p| p.clause.is_filter())
    }

    /// Atoms of every `ON`/`WHERE` conjunct, in textual order.
    pub fn filter_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.filters().flat_map(|p| p.atoms.iter())
    }

    /// Atoms every qualifying row must satisfy: those of `ON`/`WHERE`
    /// conjuncts that hold no `OR` or `NOT`.
    pub fn asserted_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.filters()
            .filter(|p| p.asserted)
            .flat_map(|p| p.atoms.iter())
    }

    /// Aliases bound to the given CDM table.
    pub fn aliases_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.bindings
            .iter()
            .filter(move |(_, b)| b.table() == Some(table))
            .map(|(alias, _)| alias.as_str())
    }

    pub fn binds_table(&self, table: &str) -> bool {
        self.aliases_of(table).next().is_some()
    }

    /// Output column names, lowercase.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.projection.iter().filter_map(|p| p.name.as_deref())
    }
}

/// A column reference resolved to the alias that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Scope that binds the alias (an ancestor for correlated references)
    pub scope:   ScopeId,
    pub alias:   CompactString,
    pub binding: Binding,
    pub column:  CompactString
}

impl ResolvedColumn {
    /// CDM table behind the alias, if any
    pub fn table(&self) -> Option<&'static str> {
        self.binding.table()
    }

    /// `table.column` when the table is known, the bare column otherwise
    pub fn qualified(&self) -> String {
        match self.table() {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.to_string()
        }
    }
}

/// Scope arena for one statement. Scopes are stored in creation order,
/// which follows the statement text depth-first.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>
}

impl ScopeTree {
    /// Resolve a parsed statement. Statements without a query body yield a
    /// tree holding only an empty MAIN scope.
    pub fn from_statement(statement: &Statement, schema: &SchemaGraph) -> Self {
        build::ScopeBuilder::new(schema).build(statement)
    }

    pub fn root(&self) -> &Scope {
        &self.scopes[ScopeId::ROOT.0]
    }

    /// Scope by id. Ids are only minted by the builder of this tree.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// All scopes in document order.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        std::iter::successors(self.scope(id).parent, |p| self.scope(*p).parent)
            .map(|p| self.scope(p))
    }

    /// True if any scope binds the CDM table.
    pub fn uses_table(&self, table: &str) -> bool {
        self.scopes.iter().any(|s| s.binds_table(table))
    }

    /// Find the binding for `alias`, searching `from` and then its ancestors.
    pub fn lookup(&self, from: ScopeId, alias: &str) -> Option<(ScopeId, &CompactString, &Binding)> {
        let alias = alias.to_ascii_lowercase();
        std::iter::once(self.scope(from))
            .chain(self.ancestors(from))
            .find_map(|s| {
                s.bindings
                    .get_key_value(alias.as_str())
                    .map(|(name, binding)| (s.id, name, binding))
            })
    }

    /// CTE visible from `from` under `name`.
    pub fn find_cte(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        std::iter::once(self.scope(from))
            .chain(self.ancestors(from))
            .find_map(|s| s.ctes.get(name).copied())
    }

    /// Resolve a column reference as seen from scope `from`.
    ///
    /// Qualified references follow the alias through the scope chain.
    /// Unqualified references pick the unique binding in the nearest scope
    /// that can supply the column: a CDM table that has it, a derived scope
    /// that outputs it, or the only binding of the scope.
    pub fn resolve(&self, schema: &SchemaGraph, from: ScopeId, column: &ColumnRef) -> Option<ResolvedColumn> {
        if let Some(qualifier) = &column.qualifier {
            let (scope, alias, binding) = self.lookup(from, qualifier)?;
            return Some(ResolvedColumn {
                scope,
                alias: alias.clone(),
                binding: binding.clone(),
                column: column.name.clone()
            });
        }
        for scope in std::iter::once(self.scope(from)).chain(self.ancestors(from)) {
            let candidates: SmallVec<[(&CompactString, &Binding); 2]> = scope
                .bindings
                .iter()
                .filter(|(_, binding)| self.supplies(schema, binding, &column.name))
                .collect();
            let chosen = match candidates.as_slice() {
                [single] => Some(*single),
                [] if scope.bindings.len() == 1 => scope.bindings.first(),
                [] => None,
                _ => return None
            };
            if let Some((alias, binding)) = chosen {
                return Some(ResolvedColumn {
                    scope: scope.id,
                    alias: alias.clone(),
                    binding: binding.clone(),
                    column: column.name.clone()
                });
            }
        }
        None
    }

    /// Resolve and return the CDM table a column belongs to.
    pub fn table_of(&self, schema: &SchemaGraph, from: ScopeId, column: &ColumnRef) -> Option<&'static str> {
        self.resolve(schema, from, column).and_then(|r| r.table())
    }

    fn supplies(&self, schema: &SchemaGraph, binding: &Binding, column: &str) -> bool {
        match binding {
            Binding::Table(table) => schema.has_column(table, column),
            Binding::Derived(id) => {
                let scope = self.scope(*id);
                scope.output_names().any(|n| n == column)
            }
            Binding::External(_) => false
        }
    }

    /// True if the scope is a concept-id lookup: it selects from a
    /// vocabulary table and either outputs a concept identifier or is a
    /// subquery correlated to an outer concept column.
    pub fn produces_concept_ids(&self, schema: &SchemaGraph, id: ScopeId) -> bool {
        let scope = self.scope(id);
        let reads_vocabulary = scope
            .bindings
            .values()
            .any(|b| b.table().is_some_and(|t| VOCABULARY_TABLES.contains(&t)));
        if !reads_vocabulary {
            return false;
        }
        let outputs_concept_id = scope.projection.iter().any(|p| {
            p.wildcard
                || p.name.as_deref().is_some_and(is_concept_id_name)
                || p.source.as_ref().is_some_and(|c| is_concept_id_name(&c.name))
        });
        outputs_concept_id || self.is_correlated_concept_lookup(schema, id)
    }

    fn is_correlated_concept_lookup(&self, schema: &SchemaGraph, id: ScopeId) -> bool {
        let scope = self.scope(id);
        scope.filter_atoms().any(|atom| {
            let Some((left, CompareOp::Eq, Operand::Column(right))) = atom.column_comparison()
            else {
                return false;
            };
            let (Some(l), Some(r)) = (
                self.resolve(schema, id, left),
                self.resolve(schema, id, right)
            ) else {
                return false;
            };
            let outer = |c: &ResolvedColumn| c.scope != id && is_concept_id_name(&c.column);
            let inner = |c: &ResolvedColumn| c.scope == id && is_concept_id_name(&c.column);
            (inner(&l) && outer(&r)) || (outer(&l) && inner(&r))
        })
    }
}

/// `concept_id`, `*_concept_id` and `concept_id_1`/`concept_id_2`.
pub fn is_concept_id_name(name: &str) -> bool {
    name == "concept_id"
        || name.ends_with("_concept_id")
        || name == "concept_id_1"
        || name == "concept_id_2"
}
