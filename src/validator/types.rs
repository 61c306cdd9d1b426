//! Report types produced by the validator.

use serde::Serialize;

use crate::{
    query::SqlDialect,
    rules::{Diagnostic, Severity, Violation}
};

/// Outcome of validating one query.
///
/// `is_valid` is exactly `error_count == 0`. A query that did not parse
/// carries `parse_error` instead; callers decide how to treat it. Diagnostics
/// never affect validity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// 1-based position in a multi-query input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_index:   Option<usize>,
    /// Query text with comments stripped and whitespace collapsed
    pub query:         String,
    pub dialect:       SqlDialect,
    pub is_valid:      bool,
    pub error_count:   usize,
    pub warning_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations:    Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error:   Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics:   Vec<Diagnostic>
}

impl Report {
    /// Report over evaluated rules. Counts and validity are derived here.
    pub fn new(query: String, dialect: SqlDialect, violations: Vec<Violation>, diagnostics: Vec<Diagnostic>) -> Self {
        let error_count = violations.iter().filter(|v| v.is_error()).count();
        let warning_count = violations.len() - error_count;
        Self {
            query_index: None,
            query,
            dialect,
            is_valid: error_count == 0,
            error_count,
            warning_count,
            violations,
            parse_error: None,
            diagnostics
        }
    }

    /// Report for a query that could not be parsed; no rule ran.
    pub fn parse_failure(query: String, dialect: SqlDialect, message: String) -> Self {
        Self {
            parse_error: Some(message),
            ..Self::new(query, dialect, Vec::new(), Vec::new())
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.query_index = Some(index);
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_error.is_none()
    }

    /// Violations of the given severity, in report order.
    pub fn violations_of(&self, severity: Severity) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.severity() == severity)
    }
}

/// Reports for a file holding several queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiReport {
    pub total_queries:   usize,
    pub valid_queries:   usize,
    pub invalid_queries: usize,
    pub results:         Vec<Report>
}

impl MultiReport {
    pub fn new(results: Vec<Report>) -> Self {
        let valid_queries = results.iter().filter(|r| r.is_valid).count();
        Self {
            total_queries: results.len(),
            valid_queries,
            invalid_queries: results.len() - valid_queries,
            results
        }
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_queries == 0
    }
}

/// Either report shape, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Single(Report),
    Multi(MultiReport)
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Single(report) => report.is_valid,
            Self::Multi(multi) => multi.is_valid()
        }
    }

    pub fn error_count(&self) -> usize {
        self.reports().map(|r| r.error_count).sum()
    }

    /// Reports whose query did not parse.
    pub fn parse_failures(&self) -> usize {
        self.reports().filter(|r| !r.is_parsed()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.reports().map(|r| r.warning_count).sum()
    }

    /// Every single-query report, in input order.
    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        let slice = match self {
            Self::Single(report) => std::slice::from_ref(report),
            Self::Multi(multi) => multi.results.as_slice()
        };
        slice.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(severity: Severity) -> Violation {
        Violation::new("semantic.test", severity, "message", "fix")
    }

    #[test]
    fn test_report_counts() {
        let report = Report::new(
            "SELECT 1".to_string(),
            SqlDialect::PostgreSQL,
            vec![violation(Severity::Error), violation(Severity::Warning), violation(Severity::Warning)],
            vec![]
        );
        assert!(!report.is_valid);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 2);
        assert_eq!(report.violations_of(Severity::Warning).count(), 2);
    }

    #[test]
    fn test_warning_only_report_is_valid() {
        let report = Report::new(
            "SELECT 1".to_string(),
            SqlDialect::PostgreSQL,
            vec![violation(Severity::Warning)],
            vec![]
        );
        assert!(report.is_valid);
    }

    #[test]
    fn test_parse_failure_validity_follows_counts() {
        let report = Report::parse_failure("SELEC".to_string(), SqlDialect::PostgreSQL, "bad".to_string());
        assert_eq!(report.is_valid, report.error_count == 0);
        assert!(!report.is_parsed());
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let report = Report::new("SELECT 1".to_string(), SqlDialect::PostgreSQL, vec![], vec![]);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("violations").is_none());
        assert!(json.get("diagnostics").is_none());
        assert!(json.get("query_index").is_none());
        assert_eq!(json["dialect"], "postgres");
    }

    #[test]
    fn test_multi_report_totals() {
        let ok = Report::new("SELECT 1".to_string(), SqlDialect::PostgreSQL, vec![], vec![]).with_index(1);
        let bad = Report::new("SELECT 2".to_string(), SqlDialect::PostgreSQL, vec![violation(Severity::Error)], vec![])
            .with_index(2);
        let unparsed = Report::parse_failure("x".to_string(), SqlDialect::PostgreSQL, "bad".to_string()).with_index(3);
        let multi = MultiReport::new(vec![ok, bad, unparsed]);
        assert_eq!(multi.total_queries, 3);
        assert_eq!(multi.valid_queries, 2);
        assert_eq!(multi.invalid_queries, 1);
        let outcome = Outcome::Multi(multi);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.parse_failures(), 1);
    }
}
