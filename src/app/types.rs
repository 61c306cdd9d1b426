//! Application types for the CLI.

use std::path::PathBuf;

use crate::{
    cli::{Category, Format},
    validator::Outcome
};

/// Parameters for one validation run.
///
/// Unset options fall back to configuration, then to defaults.
///
/// # Example
///
/// ```
/// use omop_sql_validator::{app::ValidateParams, cli::Format};
///
/// let params = ValidateParams {
///     sql_path: Some("queries.sql".to_string()),
///     format: Some(Format::Text),
///     ..ValidateParams::default()
/// };
/// assert!(!params.combined);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidateParams {
    /// Path to the SQL file; `None` or "-" reads stdin.
    pub sql_path:    Option<String>,
    /// Dialect name or alias.
    pub dialect:     Option<String>,
    /// Explicit rule ids to run.
    pub rules:       Vec<String>,
    /// Rule categories to run.
    pub categories:  Vec<Category>,
    /// Report file path.
    pub output_path: Option<String>,
    /// Report file format.
    pub format:      Option<Format>,
    /// Validate the whole input as one query.
    pub combined:    bool,
    /// Disable colored terminal output.
    pub no_color:    bool,
    /// Include query text in text output.
    pub verbose:     bool
}

/// Result of a validation run.
#[derive(Debug, Clone)]
pub struct ValidateResult {
    /// 0 when every query parsed and has no error, 1 otherwise.
    pub exit_code:   i32,
    pub outcome:     Outcome,
    /// Report as written to `report_path`.
    pub report:      String,
    pub report_path: PathBuf,
    /// Console summary.
    pub summary:     String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_params_default() {
        let params = ValidateParams::default();
        assert!(params.sql_path.is_none());
        assert!(params.rules.is_empty());
        assert!(format!("{:?}", params).contains("ValidateParams"));
    }
}
