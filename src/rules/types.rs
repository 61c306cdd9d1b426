//! Type definitions for the semantic rule system.
//!
//! This module defines the core types used throughout the rule engine:
//! - [`Severity`] - Violation severity levels (Warning, Error)
//! - [`RuleCategory`] - Rule namespaces (semantic, vocabulary)
//! - [`Violation`] - Individual rule violations with context
//! - [`Diagnostic`] - Rule faults surfaced next to the violations

use std::{fmt, str::FromStr};

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{AppError, config_error};

/// Severity level of a rule violation.
///
/// Only [`Severity::Error`] makes a report invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but possibly intended
    Warning,
    /// The query can return analytically wrong results
    Error
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR")
        }
    }
}

/// Namespace of a rule; the prefix of its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Join paths, hierarchy, standard concepts, temporal anchoring
    Semantic,
    /// How vocabulary entries are looked up
    Vocabulary
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 2] = [Self::Semantic, Self::Vocabulary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Vocabulary => "vocabulary"
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "vocabulary" => Ok(Self::Vocabulary),
            other => Err(config_error(format!(
                "Unknown rule category '{}' (expected: semantic, vocabulary)",
                other
            )))
        }
    }
}

/// Where in the query a violation was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table:    Option<CompactString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias:    Option<CompactString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column:   Option<CompactString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>
}

impl Location {
    pub fn column(table: Option<&str>, alias: Option<&str>, column: &str) -> Self {
        Self {
            table: table.map(Into::into),
            alias: alias.map(Into::into),
            column: Some(column.into()),
            fragment: None
        }
    }

    pub fn alias(table: &str, alias: &str) -> Self {
        Self {
            table: Some(table.into()),
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    pub fn fragment(text: impl Into<String>) -> Self {
        Self {
            fragment: Some(text.into()),
            ..Self::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        match (&self.alias, &self.table) {
            (Some(alias), Some(table)) if alias != table => parts.push(format!("{} ({})", alias, table)),
            (_, Some(table)) => parts.push(table.to_string()),
            (Some(alias), None) => parts.push(alias.to_string()),
            (None, None) => {}
        }
        if let Some(column) = &self.column {
            parts.push(column.to_string());
        }
        if let Some(fragment) = &self.fragment {
            parts.push(fragment.clone());
        }
        f.write_str(&parts.join(" "))
    }
}

/// A single rule violation found in a query.
///
/// Built by rules through [`Violation::new`] and the chained setters, then
/// read-only: severity and message are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    rule_id:       &'static str,
    severity:      Severity,
    #[serde(rename = "issue")]
    message:       String,
    suggested_fix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location:      Option<Location>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    details:       IndexMap<CompactString, serde_json::Value>
}

impl Violation {
    pub fn new(
        rule_id: &'static str,
        severity: Severity,
        message: impl Into<String>,
        suggested_fix: impl Into<String>
    ) -> Self {
        Self {
            rule_id,
            severity,
            message: message.into(),
            suggested_fix: suggested_fix.into(),
            location: None,
            details: IndexMap::new()
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn rule_id(&self) -> &'static str {
        self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggested_fix(&self) -> &str {
        &self.suggested_fix
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn details(&self) -> &IndexMap<CompactString, serde_json::Value> {
        &self.details
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Metadata about a rule for identification and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    /// Dot-namespaced identifier (`semantic.join_path_validation`)
    pub id:       &'static str,
    /// Human-readable rule name
    pub name:     &'static str,
    /// Default severity level
    pub severity: Severity,
    pub category: RuleCategory
}

/// A rule that could not finish its analysis.
///
/// Recorded on the report for visibility; never affects validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule_id: &'static str,
    pub message: String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_and_display() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Semantic".parse::<RuleCategory>().ok(), Some(RuleCategory::Semantic));
        assert!("performance".parse::<RuleCategory>().is_err());
    }

    #[test]
    fn test_violation_serialization_shape() {
        let violation = Violation::new(
            "semantic.test",
            Severity::Warning,
            "something is off",
            "fix it"
        );
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["issue"], "something is off");
        assert_eq!(json["suggested_fix"], "fix it");
        assert!(json.get("location").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_violation_details_keep_insertion_order() {
        let violation = Violation::new("semantic.test", Severity::Error, "m", "f")
            .detail("zeta", 1)
            .detail("alpha", "two");
        let keys: Vec<&str> = violation.details().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_location_display() {
        let location = Location::column(Some("concept"), Some("c"), "concept_code");
        assert_eq!(location.to_string(), "c (concept) concept_code");
    }
}
