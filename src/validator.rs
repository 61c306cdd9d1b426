//! Validation orchestrator.
//!
//! Parses a query, resolves one [`ScopeTree`] per statement and runs the
//! selected rules against each tree. Rules are isolated from each other: a
//! rule that fails or panics is recorded as a [`Diagnostic`] and the
//! remaining rules still run.
//!
//! ```
//! use omop_sql_validator::{query::SqlDialect, validator::validate};
//!
//! let report = validate(
//!     "SELECT person_id FROM condition_occurrence WHERE condition_concept_id IN (201826, 443238);",
//!     SqlDialect::PostgreSQL,
//!     None,
//!     None
//! )
//! .unwrap();
//! assert!(!report.is_valid);
//! assert_eq!(report.error_count, 2);
//! assert_eq!(report.warning_count, 1);
//! ```

mod types;

use std::panic::{AssertUnwindSafe, catch_unwind};

use rayon::prelude::*;
use tracing::{debug, warn};
pub use types::{MultiReport, Outcome, Report};

use crate::{
    config::RulesConfig,
    error::{AppResult, config_error, parse_error_message, rule_fault},
    query::{SqlDialect, normalize_query, split_queries, try_parse},
    rules::{Diagnostic, Rule, RuleRegistry, Violation},
    schema::SchemaGraph,
    scope::ScopeTree
};

/// Validate one query with the built-in rules.
///
/// `categories` and `rule_ids` narrow the rule set (ids win over
/// categories). Unknown entries fail before the query is parsed. A query
/// that does not parse yields a report carrying `parse_error`.
pub fn validate(
    sql: &str,
    dialect: SqlDialect,
    categories: Option<&[&str]>,
    rule_ids: Option<&[&str]>
) -> AppResult<Report> {
    Validator::new().validate(sql, dialect, categories, rule_ids)
}

/// Runs rules from a registry against parsed queries.
pub struct Validator<'r> {
    registry: &'r RuleRegistry,
    schema:   &'static SchemaGraph,
    disabled: Vec<String>
}

impl Default for Validator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator<'static> {
    /// Validator over the built-in registry
    pub fn new() -> Self {
        Self::with_registry(RuleRegistry::global())
    }

    /// Built-in registry minus the rules disabled in configuration.
    ///
    /// Disabling an id that is not registered is a configuration error.
    pub fn with_config(config: &RulesConfig) -> AppResult<Self> {
        let registry = RuleRegistry::global();
        if let Some(unknown) = config.disabled.iter().find(|id| !registry.contains(id.trim())) {
            return Err(config_error(format!("Cannot disable unknown rule '{}'", unknown)));
        }
        Ok(Self {
            registry,
            schema: SchemaGraph::global(),
            disabled: config.disabled.iter().map(|id| id.trim().to_string()).collect()
        })
    }
}

impl<'r> Validator<'r> {
    pub fn with_registry(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            schema: SchemaGraph::global(),
            disabled: Vec::new()
        }
    }

    /// Rules to run for the given filters, in registry order.
    ///
    /// Rules disabled by configuration are skipped unless named explicitly
    /// in `rule_ids`.
    pub fn select(&self, categories: Option<&[&str]>, rule_ids: Option<&[&str]>) -> AppResult<Vec<&'r dyn Rule>> {
        let explicit = rule_ids.is_some_and(|ids| !ids.is_empty());
        let rules = self.registry.select(categories, rule_ids)?;
        Ok(rules
            .into_iter()
            .filter(|rule| explicit || !self.disabled.iter().any(|d| d == rule.info().id))
            .collect())
    }

    /// Validate one query.
    pub fn validate(
        &self,
        sql: &str,
        dialect: SqlDialect,
        categories: Option<&[&str]>,
        rule_ids: Option<&[&str]>
    ) -> AppResult<Report> {
        let rules = self.select(categories, rule_ids)?;
        Ok(self.run(sql, dialect, &rules))
    }

    /// Validate every query of a multi-query text independently.
    ///
    /// Queries are split on top-level `;` and validated in parallel; results
    /// keep input order and carry a 1-based `query_index`.
    pub fn validate_many(
        &self,
        sql: &str,
        dialect: SqlDialect,
        categories: Option<&[&str]>,
        rule_ids: Option<&[&str]>
    ) -> AppResult<MultiReport> {
        let rules = self.select(categories, rule_ids)?;
        let queries = split_queries(sql);
        debug!(queries = queries.len(), rules = rules.len(), "validating multi-query input");
        let results: Vec<Report> = queries
            .par_iter()
            .enumerate()
            .map(|(idx, query)| self.run(query, dialect, &rules).with_index(idx + 1))
            .collect();
        Ok(MultiReport::new(results))
    }

    /// Single-query shape for one query, multi-query shape otherwise.
    pub fn validate_input(
        &self,
        sql: &str,
        dialect: SqlDialect,
        categories: Option<&[&str]>,
        rule_ids: Option<&[&str]>
    ) -> AppResult<Outcome> {
        if split_queries(sql).len() > 1 {
            self.validate_many(sql, dialect, categories, rule_ids)
                .map(Outcome::Multi)
        } else {
            self.validate(sql, dialect, categories, rule_ids)
                .map(Outcome::Single)
        }
    }

    fn run(&self, sql: &str, dialect: SqlDialect, rules: &[&dyn Rule]) -> Report {
        let query = normalize_query(sql);
        let statements = match try_parse(sql, dialect) {
            Ok(statements) => statements,
            Err(e) => {
                debug!(dialect = dialect.name(), error = %e, "query did not parse");
                return Report::parse_failure(query, dialect, parse_error_message(&e.to_string()));
            }
        };
        let trees: Vec<ScopeTree> = statements
            .iter()
            .map(|statement| ScopeTree::from_statement(statement, self.schema))
            .collect();

        let mut violations = Vec::new();
        let mut diagnostics = Vec::new();
        for rule in rules {
            for tree in &trees {
                match self.evaluate(*rule, tree) {
                    Ok(found) => violations.extend(found),
                    Err(diagnostic) => diagnostics.push(diagnostic)
                }
            }
        }
        debug!(
            violations = violations.len(),
            diagnostics = diagnostics.len(),
            "validation finished"
        );
        Report::new(query, dialect, violations, diagnostics)
    }

    /// Run one rule, turning an error or a panic into a diagnostic.
    fn evaluate(&self, rule: &dyn Rule, tree: &ScopeTree) -> Result<Vec<Violation>, Diagnostic> {
        let rule_id = rule.info().id;
        let outcome = catch_unwind(AssertUnwindSafe(|| rule.evaluate(tree, self.schema)));
        let message = match outcome {
            Ok(Ok(violations)) => return Ok(violations),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                rule_fault(rule_id, reason).to_string()
            }
        };
        warn!(rule = rule_id, %message, "rule could not complete its analysis");
        Err(Diagnostic {
            rule_id,
            message
        })
    }
}
