//! Integration tests for the omop-sql-validator binary.

use std::{fs, io::Write};

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};

fn cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("omop-sql-validator");
    cmd.env_remove("OMOP_VALIDATOR_DIALECT")
        .env_remove("OMOP_VALIDATOR_DISABLED")
        .env_remove("RUST_LOG");
    cmd
}

fn sql_file(sql: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", sql).unwrap();
    file
}

#[test]
fn test_valid_query_exits_zero() {
    let file = sql_file("SELECT person_id, year_of_birth FROM person;");
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.json");

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .args(["--output", report.to_str().unwrap(), "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: VALID"))
        .stdout(predicate::str::contains("Report saved to:"));

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.contains("\"is_valid\": true"));
}

#[test]
fn test_error_violation_exits_one() {
    let file = sql_file(
        "SELECT person_id FROM condition_occurrence WHERE condition_concept_id IN (201826, 443238);"
    );
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.json");

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .args(["-o", report.to_str().unwrap(), "--no-color"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Status: INVALID"))
        .stdout(predicate::str::contains("Errors: 2"))
        .stdout(predicate::str::contains("Warnings: 1"));

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.contains("semantic.hierarchy_expansion_required"));
}

#[test]
fn test_default_report_path() {
    let file = sql_file("SELECT person_id FROM person;");
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .arg("--no-color")
        .assert()
        .success();

    assert!(dir.path().join("output").join("validation_report.json").exists());
}

#[test]
fn test_reads_stdin() {
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["-", "--format", "text", "--no-color"])
        .write_stdin("SELECT concept_id FROM concept WHERE concept_code = 'E11.9';")
        .assert()
        .code(1);

    let written = fs::read_to_string(dir.path().join("output").join("validation_report.json")).unwrap();
    assert!(written.contains("[ERROR] vocabulary.concept_code_requires_vocabulary_id"));
}

#[test]
fn test_rules_filter() {
    let file = sql_file(
        "SELECT person_id FROM condition_occurrence WHERE condition_concept_id IN (201826, 443238);"
    );
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .args(["--rules", "semantic.unmapped_concept_handling", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warnings: 1"));
}

#[test]
fn test_unknown_rule_is_an_error() {
    let file = sql_file("SELECT person_id FROM person;");
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .args(["--rules", "semantic.nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_unknown_category_is_rejected() {
    cmd()
        .args(["--categories", "performance", "-"])
        .write_stdin("SELECT 1;")
        .assert()
        .failure();
}

#[test]
fn test_parse_failure_exits_one() {
    let file = sql_file("SELEC person_id FROM person;");
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg(file.path())
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Status: UNPARSED"))
        .stdout(predicate::str::contains("Parse failures: 1"));
}

#[test]
fn test_file_not_found() {
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("/nonexistent/cohort.sql")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_list_rules() {
    cmd()
        .arg("--list-rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("semantic.join_path_validation"))
        .stdout(predicate::str::contains("vocabulary.schema_validation"));
}

#[test]
fn test_local_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".omop-validator.toml"),
        "[rules]\ndisabled = [\"semantic.hierarchy_expansion_required\", \"semantic.standard_concept_enforcement\"]\n"
    )
    .unwrap();
    let file = sql_file(
        "SELECT person_id FROM condition_occurrence WHERE condition_concept_id IN (201826, 443238);"
    );

    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg(file.path())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: VALID"));
}

#[test]
fn test_dialect_from_env() {
    let dir = TempDir::new().unwrap();
    let file = sql_file("SELECT person_id FROM person;");

    cmd()
        .current_dir(dir.path())
        .env("OMOP_VALIDATOR_DIALECT", "snowflake")
        .arg(file.path())
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("output").join("validation_report.json")).unwrap();
    assert!(written.contains("\"dialect\": \"snowflake\""));
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dialect"))
        .stdout(predicate::str::contains("--list-rules"));
}
