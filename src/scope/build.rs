//! Scope tree construction from the sqlparser AST.

use compact_str::{CompactString, format_compact};
use smallvec::SmallVec;
use sqlparser::ast::{
    BinaryOperator, CaseWhen, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments,
    GroupByExpr, JoinConstraint, JoinOperator, ObjectName, OrderByKind, Query, SelectItem,
    SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator, Value
};
use tracing::debug;

use super::{
    Atom, Binding, Clause, ColumnRef, ColumnUse, CompareOp, Composite, JoinEdge, MatchKind,
    Operand, Predicate, Projection, Scope, ScopeId, ScopeKind, ScopeTree
};
use crate::schema::SchemaGraph;

/// Functions that replace NULL or zero with a fallback value.
const NORMALIZING_FUNCTIONS: &[&str] = &["coalesce", "ifnull", "nvl", "isnull"];

pub(super) struct ScopeBuilder<'s> {
    schema: &'s SchemaGraph,
    scopes: Vec<Scope>
}

impl<'s> ScopeBuilder<'s> {
    pub(super) fn new(schema: &'s SchemaGraph) -> Self {
        Self {
            schema,
            scopes: Vec::new()
        }
    }

    pub(super) fn build(mut self, statement: &Statement) -> ScopeTree {
        let root = self.open(ScopeKind::Main, None, None);
        match statement {
            Statement::Query(query) => self.query(query, root),
            Statement::Insert(insert) => {
                if let Some(source) = &insert.source {
                    self.query(source, root);
                }
            }
            Statement::CreateTable(create) => {
                if let Some(query) = &create.query {
                    self.query(query, root);
                }
            }
            _ => {}
        }
        ScopeTree {
            scopes: self.scopes
        }
    }

    fn open(&mut self, kind: ScopeKind, parent: Option<ScopeId>, name: Option<CompactString>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(id, kind, parent, name));
        if let Some(parent) = parent {
            self.scopes[parent.0].children.push(id);
        }
        id
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    fn child(&mut self, query: &Query, kind: ScopeKind, parent: ScopeId, name: Option<CompactString>) -> ScopeId {
        let id = self.open(kind, Some(parent), name);
        self.query(query, id);
        id
    }

    fn query(&mut self, query: &Query, scope: ScopeId) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = lower(&cte.alias.name.value);
                let id = self.child(&cte.query, ScopeKind::Cte, scope, Some(name.clone()));
                self.scope_mut(scope).ctes.insert(name, id);
            }
        }
        self.set_expr(&query.body, scope);
        if let Some(order_by) = &query.order_by
            && let OrderByKind::Expressions(exprs) = &order_by.kind
        {
            for item in exprs {
                self.value(&item.expr, scope, Clause::OrderBy);
            }
        }
    }

    fn set_expr(&mut self, body: &SetExpr, scope: ScopeId) {
        match body {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    self.projection_item(item, scope);
                }
                for table in &select.from {
                    self.table_with_joins(table, scope);
                }
                if let Some(selection) = &select.selection {
                    self.predicate(selection, scope, Clause::Where);
                }
                if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                    for expr in exprs {
                        self.value(expr, scope, Clause::GroupBy);
                    }
                }
                if let Some(having) = &select.having {
                    self.predicate(having, scope, Clause::Having);
                }
            }
            SetExpr::Query(query) => self.query(query, scope),
            SetExpr::SetOperation {
                left,
                right,
                ..
            } => {
                // each branch is its own scope; the left one names the output
                let first = self.branch(left, scope);
                self.branch(right, scope);
                let projection = self.scopes[first.0].projection.clone();
                self.scope_mut(scope).projection = projection;
            }
            _ => {}
        }
    }

    fn branch(&mut self, body: &SetExpr, parent: ScopeId) -> ScopeId {
        let id = self.open(ScopeKind::Subquery, Some(parent), None);
        self.set_expr(body, id);
        id
    }

    fn projection_item(&mut self, item: &SelectItem, scope: ScopeId) {
        let projection = match item {
            SelectItem::UnnamedExpr(expr) => {
                let source = self.value(expr, scope, Clause::Select).as_column().cloned();
                Projection {
                    name: source.as_ref().map(|c| c.name.clone()),
                    source,
                    wildcard: false
                }
            }
            SelectItem::ExprWithAlias {
                expr,
                alias
            } => {
                let source = self.value(expr, scope, Clause::Select).as_column().cloned();
                Projection {
                    name: Some(lower(&alias.value)),
                    source,
                    wildcard: false
                }
            }
            _ => Projection {
                name:     None,
                source:   None,
                wildcard: true
            }
        };
        self.scope_mut(scope).projection.push(projection);
    }

    fn table_with_joins(&mut self, table: &TableWithJoins, scope: ScopeId) {
        let mut previous = self.factor(&table.relation, scope);
        for join in &table.joins {
            let current = self.factor(&join.relation, scope);
            match join_constraint(&join.join_operator) {
                Some(JoinConstraint::On(expr)) => self.predicate(expr, scope, Clause::On),
                Some(JoinConstraint::Using(columns)) => {
                    if let (Some(left), Some(right)) = (&previous, &current) {
                        for column in columns {
                            let name = leaf(&column.to_string());
                            self.using_column(scope, left, right, &name);
                        }
                    }
                }
                _ => {}
            }
            previous = current.or(previous);
        }
    }

    /// `USING (col)` is recorded as `left.col = right.col`.
    fn using_column(&mut self, scope: ScopeId, left: &str, right: &str, column: &str) {
        let l = ColumnRef::new(Some(left), column);
        let r = ColumnRef::new(Some(right), column);
        let text = format!("{} = {}", l, r);
        let target = self.scope_mut(scope);
        for c in [&l, &r] {
            target.columns.push(ColumnUse {
                column: c.clone(),
                clause: Clause::On
            });
        }
        target.joins.push(JoinEdge {
            left:   l.clone(),
            right:  r.clone(),
            clause: Clause::On
        });
        target.predicates.push(Predicate {
            clause: Clause::On,
            text,
            atoms: vec![Atom::Compare {
                left:  Operand::Column(l),
                op:    CompareOp::Eq,
                right: Operand::Column(r)
            }],
            asserted: true
        });
    }

    /// Bind one relation; returns the alias it was bound under.
    fn factor(&mut self, factor: &TableFactor, scope: ScopeId) -> Option<CompactString> {
        match factor {
            TableFactor::Table {
                name,
                alias,
                ..
            } => {
                let table = object_leaf(name);
                let binding = self.table_binding(name, &table, scope);
                let bound = alias.as_ref().map(|a| lower(&a.name.value)).unwrap_or(table);
                self.scope_mut(scope).bindings.insert(bound.clone(), binding);
                Some(bound)
            }
            TableFactor::Derived {
                subquery,
                alias,
                ..
            } => {
                let name = alias.as_ref().map(|a| lower(&a.name.value));
                let id = self.child(subquery, ScopeKind::Subquery, scope, name.clone());
                if let Some(name) = &name {
                    self.scope_mut(scope)
                        .bindings
                        .insert(name.clone(), Binding::Derived(id));
                }
                name
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                self.table_with_joins(table_with_joins, scope);
                alias.as_ref().map(|a| lower(&a.name.value))
            }
            _ => None
        }
    }

    fn table_binding(&self, name: &ObjectName, table: &str, scope: ScopeId) -> Binding {
        let qualified = name.to_string().contains('.');
        if !qualified && let Some(cte) = self.find_cte(scope, table) {
            return Binding::Derived(cte);
        }
        match self.schema.table(table) {
            Some(t) => Binding::Table(t.name),
            None => {
                debug!(table, "table outside the CDM schema");
                Binding::External(table.into())
            }
        }
    }

    fn find_cte(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(cte) = scope.ctes.get(name) {
                return Some(*cte);
            }
            current = scope.parent;
        }
        None
    }

    /// Record a boolean clause as one predicate per top-level conjunct.
    fn predicate(&mut self, expr: &Expr, scope: ScopeId, clause: Clause) {
        let mut conjuncts = Vec::new();
        split_conjuncts(expr, &mut conjuncts);
        for conjunct in conjuncts {
            let mut atoms = Vec::new();
            self.condition(conjunct, scope, clause, &mut atoms);
            let joins: Vec<JoinEdge> = if clause.is_filter() {
                atoms
                    .iter()
                    .filter_map(Atom::column_equality)
                    .map(|(l, r)| JoinEdge {
                        left: l.clone(),
                        right: r.clone(),
                        clause
                    })
                    .collect()
            } else {
                Vec::new()
            };
            let target = self.scope_mut(scope);
            target.joins.extend(joins);
            target.predicates.push(Predicate {
                clause,
                text: conjunct.to_string(),
                atoms,
                asserted: is_asserted(conjunct)
            });
        }
    }

    /// Walk boolean structure, pushing an atom for every comparison.
    fn condition(&mut self, expr: &Expr, scope: ScopeId, clause: Clause, atoms: &mut Vec<Atom>) {
        if !is_condition(expr) {
            self.value(expr, scope, clause);
            return;
        }
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And | BinaryOperator::Or,
                right
            } => {
                self.condition(left, scope, clause, atoms);
                self.condition(right, scope, clause, atoms);
            }
            Expr::BinaryOp {
                left,
                op,
                right
            } => {
                let l = self.value(left, scope, clause);
                let r = self.value(right, scope, clause);
                if let Some(op) = compare_op(op) {
                    atoms.push(Atom::Compare {
                        left: l,
                        op,
                        right: r
                    });
                } else if let Some((kind, negated)) = pattern_op(op) {
                    atoms.push(Atom::Match {
                        target: l,
                        pattern: r,
                        kind,
                        negated
                    });
                }
            }
            Expr::UnaryOp {
                expr: inner, ..
            }
            | Expr::Nested(inner) => self.condition(inner, scope, clause, atoms),
            Expr::InList {
                expr,
                list,
                negated
            } => {
                let target = self.value(expr, scope, clause);
                let values = list.iter().map(|v| self.value(v, scope, clause)).collect();
                atoms.push(Atom::InList {
                    target,
                    values,
                    negated: *negated
                });
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated
            } => {
                let target = self.value(expr, scope, clause);
                let subquery = self.child(subquery, ScopeKind::Subquery, scope, None);
                atoms.push(Atom::InSubquery {
                    target,
                    subquery,
                    negated: *negated
                });
            }
            Expr::Between {
                expr,
                negated,
                low,
                high
            } => {
                let target = self.value(expr, scope, clause);
                let low = self.value(low, scope, clause);
                let high = self.value(high, scope, clause);
                atoms.push(Atom::Between {
                    target,
                    low,
                    high,
                    negated: *negated
                });
            }
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => self.pattern(expr, pattern, MatchKind::Like, *negated, scope, clause, atoms),
            Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => self.pattern(expr, pattern, MatchKind::ILike, *negated, scope, clause, atoms),
            Expr::SimilarTo {
                negated,
                expr,
                pattern,
                ..
            } => self.pattern(expr, pattern, MatchKind::SimilarTo, *negated, scope, clause, atoms),
            Expr::RLike {
                negated,
                expr,
                pattern,
                ..
            } => self.pattern(expr, pattern, MatchKind::Regex, *negated, scope, clause, atoms),
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
                let target = self.value(inner, scope, clause);
                atoms.push(Atom::IsNull {
                    target,
                    negated: matches!(expr, Expr::IsNotNull(_))
                });
            }
            Expr::Exists {
                subquery,
                negated
            } => {
                let subquery = self.child(subquery, ScopeKind::Subquery, scope, None);
                atoms.push(Atom::Exists {
                    subquery,
                    negated: *negated
                });
            }
            _ => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn pattern(
        &mut self,
        expr: &Expr,
        pattern: &Expr,
        kind: MatchKind,
        negated: bool,
        scope: ScopeId,
        clause: Clause,
        atoms: &mut Vec<Atom>
    ) {
        let target = self.value(expr, scope, clause);
        let pattern = self.value(pattern, scope, clause);
        atoms.push(Atom::Match {
            target,
            pattern,
            kind,
            negated
        });
    }

    /// Summarize a value expression, recording the columns and functions it
    /// uses and building scopes for any subquery inside it.
    fn value(&mut self, expr: &Expr, scope: ScopeId, clause: Clause) -> Operand {
        if is_condition(expr) {
            let mut scratch = Vec::new();
            self.condition(expr, scope, clause, &mut scratch);
            return composite(scratch.iter().flat_map(|a| a.operands()), None);
        }
        match expr {
            Expr::Identifier(ident) => self.column(ColumnRef::bare(&ident.value), scope, clause),
            Expr::CompoundIdentifier(idents) => match idents.split_last() {
                Some((last, rest)) => {
                    let qualifier = rest.last().map(|i| i.value.as_str());
                    self.column(ColumnRef::new(qualifier, &last.value), scope, clause)
                }
                None => Operand::Expr(Composite::default())
            },
            Expr::Value(value) => literal(&value.value),
            Expr::UnaryOp {
                op,
                expr: inner
            } => match (op, self.value(inner, scope, clause)) {
                (UnaryOperator::Minus, Operand::Number(n)) => Operand::Number(format_compact!("-{}", n)),
                (UnaryOperator::Plus, Operand::Number(n)) => Operand::Number(n),
                (_, other) => composite([&other], None)
            },
            Expr::Nested(inner) => self.value(inner, scope, clause),
            Expr::Subquery(query) => {
                Operand::Subquery(self.child(query, ScopeKind::Subquery, scope, None))
            }
            Expr::Function(func) => self.function(func, scope, clause),
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => self.case(operand.as_deref(), conditions, else_result.as_deref(), scope, clause),
            Expr::Cast {
                expr: inner, ..
            } => {
                let inner = self.value(inner, scope, clause);
                composite([&inner], None)
            }
            Expr::Extract {
                expr: inner, ..
            } => {
                self.note_function(scope, "extract");
                let inner = self.value(inner, scope, clause);
                composite([&inner], Some("extract".into()))
            }
            Expr::Interval(_) => {
                self.note_function(scope, "interval");
                composite(std::iter::empty(), Some("interval".into()))
            }
            Expr::BinaryOp {
                left,
                right,
                ..
            }
            | Expr::AnyOp {
                left,
                right,
                ..
            }
            | Expr::AllOp {
                left,
                right,
                ..
            } => {
                let l = self.value(left, scope, clause);
                let r = self.value(right, scope, clause);
                composite([&l, &r], None)
            }
            Expr::Tuple(items) => {
                let items: Vec<Operand> = items.iter().map(|e| self.value(e, scope, clause)).collect();
                composite(&items, None)
            }
            Expr::Substring {
                expr: inner, ..
            } => {
                self.note_function(scope, "substring");
                let inner = self.value(inner, scope, clause);
                composite([&inner], Some("substring".into()))
            }
            _ => Operand::Expr(Composite::default())
        }
    }

    fn column(&mut self, column: ColumnRef, scope: ScopeId, clause: Clause) -> Operand {
        self.scope_mut(scope).columns.push(ColumnUse {
            column: column.clone(),
            clause
        });
        Operand::Column(column)
    }

    fn note_function(&mut self, scope: ScopeId, name: &str) {
        let functions = &mut self.scope_mut(scope).functions;
        if !functions.iter().any(|f| f == name) {
            functions.push(name.into());
        }
    }

    fn function(&mut self, func: &Function, scope: ScopeId, clause: Clause) -> Operand {
        let name = lower(&leaf(&func.name.to_string()));
        let mut args: SmallVec<[Operand; 4]> = SmallVec::new();
        if let FunctionArguments::List(list) = &func.args {
            for arg in &list.args {
                let expr = match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(e),
                        ..
                    } => e,
                    _ => continue
                };
                args.push(self.value(expr, scope, clause));
            }
        }
        if NORMALIZING_FUNCTIONS.contains(&name.as_str()) {
            let columns: Vec<ColumnRef> = args
                .iter()
                .flat_map(|a| a.columns().iter().cloned())
                .collect();
            self.scope_mut(scope).normalized.extend(columns);
        }
        self.note_function(scope, &name);
        composite(&args, Some(name))
    }

    /// `CASE WHEN col = 0` and `CASE col WHEN 0` mark `col` as normalized.
    fn case(
        &mut self,
        operand: Option<&Expr>,
        conditions: &[CaseWhen],
        else_result: Option<&Expr>,
        scope: ScopeId,
        clause: Clause
    ) -> Operand {
        let subject = operand.map(|o| self.value(o, scope, clause));
        let mut parts: Vec<Operand> = Vec::new();
        let mut normalized: Vec<ColumnRef> = Vec::new();
        for when in conditions {
            match &subject {
                Some(subject) => {
                    let value = self.value(&when.condition, scope, clause);
                    if value.is_zero()
                        && let Some(column) = subject.as_column()
                    {
                        normalized.push(column.clone());
                    }
                    parts.push(value);
                }
                None => {
                    let mut scratch = Vec::new();
                    self.condition(&when.condition, scope, clause, &mut scratch);
                    for atom in &scratch {
                        if let Some((column, CompareOp::Eq, other)) = atom.column_comparison()
                            && other.is_zero()
                        {
                            normalized.push(column.clone());
                        }
                        parts.extend(atom.operands().into_iter().cloned());
                    }
                }
            }
            let result = self.value(&when.result, scope, clause);
            parts.push(result);
        }
        if let Some(e) = else_result {
            let result = self.value(e, scope, clause);
            parts.push(result);
        }
        parts.extend(subject);
        self.scope_mut(scope).normalized.extend(normalized);
        composite(&parts, Some("case".into()))
    }
}

fn composite<'a>(parts: impl IntoIterator<Item = &'a Operand>, function: Option<CompactString>) -> Operand {
    let mut out = Composite::default();
    out.functions.extend(function);
    for part in parts {
        out.functions.extend(part.functions().iter().cloned());
        out.columns.extend(part.columns().iter().cloned());
    }
    Operand::Expr(out)
}

fn literal(value: &Value) -> Operand {
    match value {
        Value::Number(n, _) => Operand::Number(CompactString::from(n.as_str())),
        Value::SingleQuotedString(s)
        | Value::DoubleQuotedString(s)
        | Value::NationalStringLiteral(s)
        | Value::EscapedStringLiteral(s) => Operand::Text(s.clone()),
        Value::Null => Operand::Null,
        _ => Operand::Expr(Composite::default())
    }
}

/// Expressions [`ScopeBuilder::condition`] decomposes into atoms.
fn is_condition(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp {
            op, ..
        } => {
            matches!(op, BinaryOperator::And | BinaryOperator::Or)
                || compare_op(op).is_some()
                || pattern_op(op).is_some()
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => true,
        Expr::Nested(inner) => is_condition(inner),
        Expr::InList { .. }
        | Expr::InSubquery { .. }
        | Expr::Between { .. }
        | Expr::Like { .. }
        | Expr::ILike { .. }
        | Expr::SimilarTo { .. }
        | Expr::RLike { .. }
        | Expr::IsNull(_)
        | Expr::IsNotNull(_)
        | Expr::Exists { .. } => true,
        _ => false
    }
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::NotEq),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::LtEq),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::GtEq),
        _ => None
    }
}

/// Postgres operator forms of `LIKE` and regex matching.
fn pattern_op(op: &BinaryOperator) -> Option<(MatchKind, bool)> {
    match op {
        BinaryOperator::PGRegexMatch | BinaryOperator::PGRegexIMatch => Some((MatchKind::Regex, false)),
        BinaryOperator::PGRegexNotMatch | BinaryOperator::PGRegexNotIMatch => {
            Some((MatchKind::Regex, true))
        }
        BinaryOperator::PGLikeMatch => Some((MatchKind::Like, false)),
        BinaryOperator::PGNotLikeMatch => Some((MatchKind::Like, true)),
        BinaryOperator::PGILikeMatch => Some((MatchKind::ILike, false)),
        BinaryOperator::PGNotILikeMatch => Some((MatchKind::ILike, true)),
        _ => None
    }
}

/// True when the condition holds no disjunction or negation.
fn is_asserted(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        }
        | Expr::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => false,
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right
        } => is_asserted(left) && is_asserted(right),
        Expr::Nested(inner) => is_asserted(inner),
        _ => true
    }
}

fn split_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right
        } => {
            split_conjuncts(left, out);
            split_conjuncts(right, out);
        }
        Expr::Nested(inner)
            if matches!(
                inner.as_ref(),
                Expr::BinaryOp {
                    op: BinaryOperator::And,
                    ..
                }
            ) =>
        {
            split_conjuncts(inner, out)
        }
        _ => out.push(expr)
    }
}

fn join_constraint(op: &JoinOperator) -> Option<&JoinConstraint> {
    match op {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c) => Some(c),
        _ => None
    }
}

/// Last dotted segment of a name, unquoted and lowercased.
fn leaf(name: &str) -> CompactString {
    let last = name.rsplit('.').next().unwrap_or(name);
    lower(last.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']')))
}

fn object_leaf(name: &ObjectName) -> CompactString {
    leaf(&name.to_string())
}

fn lower(s: &str) -> CompactString {
    CompactString::from(s.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SqlDialect, parse_statements};

    fn tree(sql: &str) -> ScopeTree {
        let statements = parse_statements(sql, SqlDialect::PostgreSQL).unwrap();
        ScopeTree::from_statement(&statements[0], SchemaGraph::global())
    }

    #[test]
    fn test_aliases_bind_to_tables() {
        let t = tree("SELECT co.person_id FROM cdm.condition_occurrence co JOIN concept c ON co.condition_concept_id = c.concept_id");
        let root = t.root();
        assert_eq!(root.bindings.get("co"), Some(&Binding::Table("condition_occurrence")));
        assert_eq!(root.bindings.get("c"), Some(&Binding::Table("concept")));
        assert_eq!(root.joins.len(), 1);
        assert_eq!(root.joins[0].clause, Clause::On);
    }

    #[test]
    fn test_unaliased_table_binds_under_its_name() {
        let t = tree("SELECT person_id FROM Person");
        assert_eq!(t.root().bindings.get("person"), Some(&Binding::Table("person")));
    }

    #[test]
    fn test_cte_and_subquery_scopes() {
        let t = tree(
            "WITH dx AS (SELECT person_id FROM condition_occurrence) \
             SELECT * FROM dx WHERE dx.person_id IN (SELECT person_id FROM observation_period)"
        );
        assert_eq!(t.len(), 3);
        let cte = t.scope(ScopeId(1));
        assert_eq!(cte.kind, ScopeKind::Cte);
        assert_eq!(cte.parent, Some(ScopeId::ROOT));
        assert_eq!(t.root().bindings.get("dx"), Some(&Binding::Derived(ScopeId(1))));
        assert_eq!(t.scope(ScopeId(2)).kind, ScopeKind::Subquery);
    }

    #[test]
    fn test_conjuncts_and_atoms() {
        let t = tree("SELECT 1 FROM concept c WHERE c.standard_concept = 'S' AND (c.invalid_reason IS NULL OR c.invalid_reason = 'U')");
        let root = t.root();
        assert_eq!(root.predicates.len(), 2);
        assert_eq!(root.predicates[1].atoms.len(), 2);
        assert!(root.predicates[0].asserted);
        assert!(!root.predicates[1].asserted);
        assert_eq!(root.asserted_atoms().count(), 1);
    }

    #[test]
    fn test_negated_conjunct_is_not_asserted() {
        let t = tree("SELECT 1 FROM concept c WHERE NOT (c.standard_concept = 'S') AND ((c.domain_id = 'Drug'))");
        let root = t.root();
        assert_eq!(root.filter_atoms().count(), 2);
        let asserted: Vec<_> = root.asserted_atoms().filter_map(Atom::target_column).collect();
        assert_eq!(asserted, vec![&ColumnRef::new(Some("c"), "domain_id")]);
    }

    #[test]
    fn test_negative_numbers_and_normalizers() {
        let t = tree("SELECT COALESCE(m.value_as_number, 0) FROM measurement m WHERE m.value_as_number > -5");
        let root = t.root();
        let atom = root.filter_atoms().next().unwrap();
        let (_, op, value) = atom.column_comparison().unwrap();
        assert_eq!(op, CompareOp::Gt);
        assert_eq!(value.as_number(), Some(-5.0));
        assert_eq!(root.normalized, vec![ColumnRef::new(Some("m"), "value_as_number")]);
    }

    #[test]
    fn test_case_when_zero_normalizes() {
        let t = tree("SELECT CASE WHEN drug_concept_id = 0 THEN 'unmapped' ELSE 'ok' END FROM drug_exposure");
        assert_eq!(t.root().normalized, vec![ColumnRef::bare("drug_concept_id")]);
    }

    #[test]
    fn test_using_becomes_join_edge() {
        let t = tree("SELECT 1 FROM condition_occurrence co JOIN observation_period op USING (person_id)");
        let edge = &t.root().joins[0];
        assert_eq!(edge.left, ColumnRef::new(Some("co"), "person_id"));
        assert_eq!(edge.right, ColumnRef::new(Some("op"), "person_id"));
    }
}
