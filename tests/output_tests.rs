// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::fs;

use omop_sql_validator::{
    output::{OutputFormat, OutputOptions, format_outcome, format_summary, write_report},
    query::SqlDialect,
    validator::{Outcome, Validator}
};
use tempfile::TempDir;

const TWO_QUERIES: &str = "SELECT person_id FROM person;\n\
                           SELECT person_id FROM drug_exposure WHERE drug_concept_id = 1503297;";

fn outcome(sql: &str) -> Outcome {
    Validator::new()
        .validate_input(sql, SqlDialect::PostgreSQL, None, None)
        .unwrap()
}

fn plain(format: OutputFormat) -> OutputOptions {
    OutputOptions {
        format,
        colored: false,
        verbose: false
    }
}

#[test]
fn test_json_multi_report() {
    let json = format_outcome(&outcome(TWO_QUERIES), &plain(OutputFormat::Json)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["total_queries"], 2);
    assert_eq!(value["valid_queries"], 1);
    assert_eq!(value["invalid_queries"], 1);
    assert_eq!(value["results"][0]["query_index"], 1);
    assert_eq!(value["results"][1]["query_index"], 2);
    assert_eq!(value["results"][1]["is_valid"], false);
}

#[test]
fn test_json_single_report() {
    let json = format_outcome(
        &outcome("SELECT person_id FROM person;"),
        &plain(OutputFormat::Json)
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["is_valid"], true);
    assert_eq!(value["error_count"], 0);
    assert!(value.get("violations").is_none());
    assert!(value.get("results").is_none());
}

#[test]
fn test_yaml_report() {
    let yaml = format_outcome(&outcome(TWO_QUERIES), &plain(OutputFormat::Yaml)).unwrap();
    assert!(yaml.contains("total_queries: 2"));
    assert!(yaml.contains("rule_id: semantic.hierarchy_expansion_required"));
}

#[test]
fn test_text_report() {
    let text = format_outcome(&outcome(TWO_QUERIES), &plain(OutputFormat::Text)).unwrap();
    assert!(text.contains("Query #1 (postgres)"));
    assert!(text.contains("No violations"));
    assert!(text.contains("[ERROR] semantic.hierarchy_expansion_required"));
    assert!(text.contains("fix: "));
    assert!(text.contains("Status: INVALID"));
    assert!(!text.contains("\u{1b}["));
}

#[test]
fn test_text_report_parse_error() {
    let text = format_outcome(&outcome("SELEC person_id FROM person"), &plain(OutputFormat::Text)).unwrap();
    assert!(text.contains("PARSE ERROR"));
    assert!(text.contains("Status: UNPARSED"));
    assert!(text.contains("Parse failures: 1"));
}

#[test]
fn test_verbose_text_includes_query() {
    let opts = OutputOptions {
        format:  OutputFormat::Text,
        colored: false,
        verbose: true
    };
    let text = format_outcome(&outcome("SELECT person_id FROM person -- cohort"), &opts).unwrap();
    assert!(text.contains("SELECT person_id FROM person"));
}

#[test]
fn test_summary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let summary = format_summary(&outcome(TWO_QUERIES), Some(&path), false);
    assert!(summary.contains("Status: INVALID"));
    assert!(summary.contains("Queries: 2 total, 1 valid, 1 invalid"));
    assert!(summary.contains("Errors: 2"));
    assert!(summary.contains(&format!("Report saved to: {}", path.display())));
}

#[test]
fn test_write_report_creates_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("out").join("report.json");
    write_report(&path, "{}").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
}
