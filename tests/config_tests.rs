use std::io::Write;

use omop_sql_validator::{config::Config, output::OutputFormat, query::SqlDialect};
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(config.validator.dialect.is_none());
    assert!(config.rules.disabled.is_empty());
    assert!(config.output.path.is_none());
    assert!(config.output.format.is_none());
}

#[test]
fn test_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[validator]
dialect = "bigquery"

[rules]
disabled = ["semantic.measurement_unit_validation"]

[output]
path = "reports/cohort.yaml"
format = "yaml"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.dialect().unwrap(), SqlDialect::BigQuery);
    assert_eq!(config.output_format().unwrap(), OutputFormat::Yaml);
    assert_eq!(config.output.path.as_deref(), Some("reports/cohort.yaml"));
    assert_eq!(
        config.rules.disabled,
        vec!["semantic.measurement_unit_validation"]
    );
}

#[test]
fn test_partial_config() {
    let config = Config::parse("[rules]\ndisabled = []\n").unwrap();
    assert_eq!(config.dialect().unwrap(), SqlDialect::PostgreSQL);
    assert_eq!(config.output_format().unwrap(), OutputFormat::Json);
}

#[test]
fn test_unknown_dialect_in_config() {
    let config = Config::parse("[validator]\ndialect = \"cobol\"\n").unwrap();
    assert!(config.dialect().is_err());
}

#[test]
fn test_unknown_format_in_config() {
    let config = Config::parse("[output]\nformat = \"sarif\"\n").unwrap();
    assert!(config.output_format().is_err());
}

#[test]
fn test_missing_config_file() {
    assert!(Config::from_file(std::path::Path::new("/nonexistent/config.toml")).is_err());
}

#[test]
fn test_env_disabled_list() {
    let mut config = Config::default();
    config.apply_env(|key| {
        (key == "OMOP_VALIDATOR_DISABLED").then(|| {
            "semantic.join_path_validation,vocabulary.schema_validation".to_string()
        })
    });
    assert_eq!(
        config.rules.disabled,
        vec!["semantic.join_path_validation", "vocabulary.schema_validation"]
    );
    assert!(config.validator.dialect.is_none());
}

#[test]
fn test_dialect_aliases_in_config() {
    for (name, dialect) in [
        ("postgresql", SqlDialect::PostgreSQL),
        ("sqlserver", SqlDialect::MsSql),
        ("spark", SqlDialect::Databricks),
        ("DuckDB", SqlDialect::DuckDb)
    ] {
        let config = Config::parse(&format!("[validator]\ndialect = \"{}\"\n", name)).unwrap();
        assert_eq!(config.dialect().unwrap(), dialect, "{}", name);
    }
}
