//! Helper functions for CLI operations.

use std::{
    fmt::Write as _,
    fs::read_to_string,
    io::{self, Read},
    path::PathBuf
};

use super::{convert::convert_format, types::ValidateParams};
use crate::{
    config::Config,
    error::{AppResult, file_read_error},
    output::{DEFAULT_REPORT_PATH, OutputOptions},
    query::SqlDialect,
    rules::RuleRegistry,
    validator::Outcome
};

/// Process exit code for a validation outcome.
///
/// `0` when every query parsed and none has an error-severity violation,
/// `1` otherwise. Warnings alone never fail the run. An unparseable query
/// is valid by its counts but still fails the run.
pub fn calculate_exit_code(outcome: &Outcome) -> i32 {
    if outcome.is_valid() && outcome.parse_failures() == 0 { 0 } else { 1 }
}

/// Reads SQL from a file, or from stdin when the path is absent or "-".
pub fn read_sql_input(path: Option<&str>) -> AppResult<String> {
    match path {
        None | Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| file_read_error("stdin", e))?;
            Ok(buffer)
        }
        Some(path) => read_to_string(path).map_err(|e| file_read_error(path, e))
    }
}

/// Command line first, then configuration, then the default dialect.
pub fn resolve_dialect(params: &ValidateParams, config: &Config) -> AppResult<SqlDialect> {
    match &params.dialect {
        Some(name) => name.parse(),
        None => config.dialect()
    }
}

/// Command line first, then configuration, then the default location.
pub fn resolve_report_path(params: &ValidateParams, config: &Config) -> PathBuf {
    params
        .output_path
        .clone()
        .or_else(|| config.output.path.clone())
        .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string())
        .into()
}

/// Creates output options from CLI parameters and configuration.
pub fn create_output_options(params: &ValidateParams, config: &Config) -> AppResult<OutputOptions> {
    let format = match params.format {
        Some(format) => convert_format(format),
        None => config.output_format()?
    };
    Ok(OutputOptions {
        format,
        colored: !params.no_color,
        verbose: params.verbose
    })
}

/// One line per registered rule: id, default severity and name.
pub fn format_rule_list(registry: &RuleRegistry) -> String {
    let mut out = String::new();
    for info in registry.infos() {
        let _ = writeln!(out, "{:<48} {:<8} {}", info.id, info.severity.to_string(), info.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cli::Format,
        output::OutputFormat,
        rules::{Severity, Violation},
        validator::{Outcome, Report}
    };

    #[test]
    fn test_exit_code_follows_validity() {
        let ok = Report::new("SELECT 1".to_string(), SqlDialect::PostgreSQL, vec![], vec![]);
        assert_eq!(calculate_exit_code(&Outcome::Single(ok)), 0);
        let error = Report::new(
            "SELECT 1".to_string(),
            SqlDialect::PostgreSQL,
            vec![Violation::new("semantic.test", Severity::Error, "message", "fix")],
            vec![]
        );
        assert_eq!(calculate_exit_code(&Outcome::Single(error)), 1);
    }

    #[test]
    fn test_parse_failure_exits_one_while_valid() {
        let unparsed = Report::parse_failure("SELEC".to_string(), SqlDialect::PostgreSQL, "bad".to_string());
        let outcome = Outcome::Single(unparsed);
        assert!(outcome.is_valid());
        assert_eq!(calculate_exit_code(&outcome), 1);
    }

    #[test]
    fn test_cli_wins_over_config() {
        let mut config = Config::default();
        config.validator.dialect = Some("mysql".to_string());
        config.output.format = Some("yaml".to_string());
        config.output.path = Some("from-config.json".to_string());
        let params = ValidateParams {
            dialect: Some("snowflake".to_string()),
            format: Some(Format::Text),
            ..ValidateParams::default()
        };
        assert_eq!(resolve_dialect(&params, &config).unwrap(), SqlDialect::Snowflake);
        assert_eq!(create_output_options(&params, &config).unwrap().format, OutputFormat::Text);
        assert_eq!(resolve_report_path(&params, &config), PathBuf::from("from-config.json"));
        assert_eq!(resolve_dialect(&ValidateParams::default(), &config).unwrap(), SqlDialect::MySQL);
    }

    #[test]
    fn test_default_report_path() {
        let path = resolve_report_path(&ValidateParams::default(), &Config::default());
        assert_eq!(path, PathBuf::from(DEFAULT_REPORT_PATH));
    }

    #[test]
    fn test_rule_list_has_every_rule() {
        let registry = RuleRegistry::global();
        assert_eq!(format_rule_list(registry).lines().count(), registry.len());
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_sql_input(Some("/nonexistent/queries.sql")).is_err());
    }
}
