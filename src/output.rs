//! Report rendering and writing.

use std::{fmt::Write as _, fs, path::Path, str::FromStr};

use colored::Colorize;

use crate::{
    error::{AppError, AppResult, config_error, file_write_error, serialization_error},
    rules::{Severity, Violation},
    validator::{Outcome, Report}
};

/// Default location of the report file
pub const DEFAULT_REPORT_PATH: &str = "output/validation_report.json";

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Text
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "text" | "txt" => Ok(Self::Text),
            other => Err(config_error(format!(
                "Unknown output format '{}' (expected: json, yaml, text)",
                other
            )))
        }
    }
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Json,
            colored: true,
            verbose: false
        }
    }
}

/// Render a validation outcome in the requested format.
pub fn format_outcome(outcome: &Outcome, opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(outcome).map_err(serialization_error),
        OutputFormat::Yaml => serde_yaml::to_string(outcome).map_err(serialization_error),
        OutputFormat::Text => Ok(format_text(outcome, opts))
    }
}

/// Write a rendered report, creating parent directories as needed.
pub fn write_report(path: &Path, content: &str) -> AppResult<()> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| file_write_error(&display, e))?;
    }
    fs::write(path, content).map_err(|e| file_write_error(&display, e))
}

/// Short console summary: status, counts and where the report went.
pub fn format_summary(outcome: &Outcome, saved_to: Option<&Path>, colored: bool) -> String {
    let mut out = String::new();
    let parse_failures = outcome.parse_failures();
    let status = match (outcome.is_valid(), parse_failures) {
        (false, _) => "INVALID",
        (true, 0) => "VALID",
        (true, _) => "UNPARSED"
    };
    let status = match (colored, status) {
        (false, _) => status.to_string(),
        (true, "VALID") => status.green().bold().to_string(),
        (true, _) => status.red().bold().to_string()
    };
    let _ = writeln!(out, "Status: {}", status);
    if let Outcome::Multi(multi) = outcome {
        let _ = writeln!(
            out,
            "Queries: {} total, {} valid, {} invalid",
            multi.total_queries, multi.valid_queries, multi.invalid_queries
        );
    }
    if parse_failures > 0 {
        let _ = writeln!(out, "Parse failures: {}", parse_failures);
    }
    let _ = writeln!(out, "Errors: {}", outcome.error_count());
    let _ = writeln!(out, "Warnings: {}", outcome.warning_count());
    if let Some(path) = saved_to {
        let _ = writeln!(out, "Report saved to: {}", path.display());
    }
    out
}

fn format_text(outcome: &Outcome, opts: &OutputOptions) -> String {
    let mut out = String::new();
    let header = "=== OMOP SQL Validation ===";
    if opts.colored {
        let _ = writeln!(out, "{}\n", header.bold());
    } else {
        let _ = writeln!(out, "{}\n", header);
    }
    for report in outcome.reports() {
        format_report(&mut out, report, opts);
    }
    out.push_str(&format_summary(outcome, None, opts.colored));
    out
}

fn format_report(out: &mut String, report: &Report, opts: &OutputOptions) {
    let title = match report.query_index {
        Some(idx) => format!("Query #{} ({})", idx, report.dialect),
        None => format!("Query ({})", report.dialect)
    };
    if opts.colored {
        let _ = writeln!(out, "{}", title.cyan().bold());
    } else {
        let _ = writeln!(out, "{}", title);
    }
    if opts.verbose {
        let _ = writeln!(out, "{}", report.query);
    }
    if let Some(error) = &report.parse_error {
        let label = if opts.colored { "PARSE ERROR".red().bold().to_string() } else { "PARSE ERROR".to_string() };
        let _ = writeln!(out, "  {} {}\n", label, error.replace('\n', "\n  "));
        return;
    }
    if report.violations.is_empty() {
        let _ = writeln!(out, "  No violations\n");
    }
    for violation in &report.violations {
        format_violation(out, violation, opts);
    }
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "  note: {} could not finish: {}", diagnostic.rule_id, diagnostic.message);
    }
}

fn format_violation(out: &mut String, violation: &Violation, opts: &OutputOptions) {
    let severity = violation.severity().to_string();
    let severity = match (opts.colored, violation.severity()) {
        (false, _) => severity,
        (true, Severity::Error) => severity.red().bold().to_string(),
        (true, Severity::Warning) => severity.yellow().bold().to_string()
    };
    let _ = writeln!(out, "  [{}] {}", severity, violation.rule_id());
    let _ = writeln!(out, "    {}", violation.message());
    if let Some(location) = violation.location() {
        let _ = writeln!(out, "    at: {}", location);
    }
    let fix = if opts.colored { violation.suggested_fix().green().to_string() } else { violation.suggested_fix().to_string() };
    let _ = writeln!(out, "    fix: {}\n", fix);
}
