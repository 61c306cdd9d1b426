//! Application logic for the OMOP SQL Validator CLI.
//!
//! This module contains the application logic separated from the main
//! entry point to enable testing.

mod convert;
mod helpers;
mod types;
mod validate;

pub use convert::{category_names, convert_format};
pub use helpers::{
    calculate_exit_code, create_output_options, format_rule_list, read_sql_input, resolve_dialect,
    resolve_report_path
};
pub use types::{ValidateParams, ValidateResult};
pub use validate::run_validate;

use crate::cli::Cli;

impl From<Cli> for ValidateParams {
    fn from(cli: Cli) -> Self {
        Self {
            sql_path:    cli.sql_file.map(|p| p.display().to_string()),
            dialect:     cli.dialect,
            rules:       cli.rules,
            categories:  cli.categories,
            output_path: cli.output.map(|p| p.display().to_string()),
            format:      cli.format,
            combined:    cli.combined,
            no_color:    cli.no_color,
            verbose:     cli.verbose
        }
    }
}
