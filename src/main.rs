//! # OMOP SQL Validator
//!
//! Static semantic validation for SQL written against the OMOP Common Data
//! Model.
//!
//! `omop-sql-validator` parses SQL, resolves every CTE, derived table and
//! subquery into a scope tree and checks the tree against the CDM schema
//! graph. It never connects to a database: the checked property is whether
//! a syntactically valid query can return analytically wrong results.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate one file, report to output/validation_report.json
//! omop-sql-validator cohort.sql
//!
//! # Read stdin, only vocabulary rules, human-readable report
//! cat cohort.sql | omop-sql-validator - --categories vocabulary --format text
//!
//! # Run two rules on Snowflake SQL
//! omop-sql-validator cohort.sql --dialect snowflake \
//!     --rules semantic.join_path_validation,semantic.domain_segregation
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line arguments
//! 2. Environment variables (`OMOP_VALIDATOR_DIALECT`,
//!    `OMOP_VALIDATOR_DISABLED`)
//! 3. `.omop-validator.toml` in current directory
//! 4. `~/.config/omop-sql-validator/config.toml`
//!
//! ```toml
//! [validator]
//! dialect = "postgres"
//!
//! [rules]
//! disabled = ["semantic.measurement_unit_validation"]
//!
//! [output]
//! path = "output/validation_report.json"
//! format = "json"
//! ```
//!
//! # Rules
//!
//! | ID | Severity | Checks |
//! |----|----------|--------|
//! | semantic.domain_segregation | WARNING/ERROR | `domain_id` filter on each joined concept alias |
//! | semantic.future_information_leakage | WARNING | cross-table date ordering bounded by `observation_period_end_date` |
//! | semantic.hierarchy_expansion_required | ERROR | concept filters expanded through `concept_ancestor` |
//! | semantic.invalid_reason_enforcement | ERROR | `invalid_reason` filter on vocabulary lookups |
//! | semantic.join_path_validation | WARNING | joins follow declared foreign keys |
//! | semantic.maps_to_direction | WARNING | `Maps to` read from source to standard |
//! | semantic.measurement_unit_validation | WARNING | numeric thresholds carry a unit |
//! | semantic.observation_period_anchoring | ERROR | temporal filters joined to `observation_period` |
//! | semantic.standard_concept_enforcement | ERROR | `standard_concept = 'S'` or `Maps to` |
//! | semantic.unmapped_concept_handling | WARNING | `concept_id = 0` handled explicitly |
//! | vocabulary.concept_code_requires_vocabulary_id | ERROR | `concept_code` paired with `vocabulary_id` |
//! | vocabulary.concept_lookup_context | ERROR | text lookups only inside concept-id scopes |
//! | vocabulary.concept_name_lookup | WARNING | no filtering on `concept_name` |
//! | vocabulary.no_string_identification | ERROR | no matching on `*_source_value` |
//! | vocabulary.schema_validation | ERROR | qualified columns exist |
//!
//! # Exit Codes
//!
//! - `0` - Every query parsed and has no error-severity violation
//! - `1` - An error-severity violation, a parse failure, or a configuration
//!   or I/O error

use std::process;

use clap::Parser;
use omop_sql_validator::{
    app::{ValidateParams, format_rule_list, run_validate},
    cli::Cli,
    config::Config,
    error::AppResult,
    rules::RuleRegistry
};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> AppResult<i32> {
    if cli.list_rules {
        print!("{}", format_rule_list(RuleRegistry::global()));
        return Ok(0);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }
    let config = Config::load()?;
    let result = run_validate(ValidateParams::from(cli), config)?;
    print!("{}", result.summary);
    Ok(result.exit_code)
}

/// Log to stderr, `RUST_LOG` first, then `debug` with `--verbose`, else
/// `warn`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
