//! Core validation execution logic.

use tracing::info;

use super::{
    convert::category_names,
    helpers::{
        calculate_exit_code, create_output_options, read_sql_input, resolve_dialect,
        resolve_report_path
    },
    types::{ValidateParams, ValidateResult}
};
use crate::{
    config::Config,
    error::AppResult,
    output::{format_outcome, format_summary, write_report},
    validator::{Outcome, Validator}
};

/// Executes one validation run.
///
/// 1. **Input**: reads SQL from the file or stdin
/// 2. **Validation**: runs the selected rules on each query
/// 3. **Report**: renders the outcome and writes it to the report path
///
/// Filters and configuration are checked before any SQL is parsed, so an
/// unknown rule id or category fails the run without a report.
///
/// # Example
///
/// ```no_run
/// use omop_sql_validator::{
///     app::{ValidateParams, run_validate},
///     config::Config
/// };
///
/// let params = ValidateParams {
///     sql_path: Some("queries.sql".to_string()),
///     ..ValidateParams::default()
/// };
/// let result = run_validate(params, Config::default()).unwrap();
/// println!("{}", result.summary);
/// ```
pub fn run_validate(params: ValidateParams, config: Config) -> AppResult<ValidateResult> {
    let validator = Validator::with_config(&config.rules)?;
    let dialect = resolve_dialect(&params, &config)?;
    let opts = create_output_options(&params, &config)?;
    let report_path = resolve_report_path(&params, &config);

    let categories = category_names(&params.categories);
    let rules: Vec<&str> = params.rules.iter().map(String::as_str).collect();
    let categories = (!categories.is_empty()).then_some(categories.as_slice());
    let rules = (!rules.is_empty()).then_some(rules.as_slice());
    validator.select(categories, rules)?;

    let sql = read_sql_input(params.sql_path.as_deref())?;
    let outcome = if params.combined {
        Outcome::Single(validator.validate(&sql, dialect, categories, rules)?)
    } else {
        validator.validate_input(&sql, dialect, categories, rules)?
    };
    info!(
        dialect = dialect.name(),
        valid = outcome.is_valid(),
        errors = outcome.error_count(),
        warnings = outcome.warning_count(),
        "validation complete"
    );

    let report = format_outcome(&outcome, &opts)?;
    write_report(&report_path, &report)?;
    let summary = format_summary(&outcome, Some(&report_path), opts.colored);
    Ok(ValidateResult {
        exit_code: calculate_exit_code(&outcome),
        outcome,
        report,
        report_path,
        summary
    })
}
