pub use masterror::{AppError, AppResult};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create report write error
pub fn file_write_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write file '{}': {}", path, source))
}

/// Create query parse error with optional position info
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(parse_error_message(&message.into()))
}

/// Render a parser message, highlighting the position when one is reported
pub fn parse_error_message(message: &str) -> String {
    format_sql_error("Query parse error", message)
}

/// Create config error (unknown rule id or category, malformed config file)
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create error for a table outside the CDM schema
pub fn unknown_table_error(table: &str) -> AppError {
    AppError::not_found(format!("Unknown table '{}'", table))
}

/// Create error for a rule that could not finish its analysis
pub fn rule_fault(rule_id: &str, message: impl Into<String>) -> AppError {
    AppError::internal(format!("Rule '{}' failed: {}", rule_id, message.into()))
}

/// Create serialization error
pub fn serialization_error(message: impl std::fmt::Display) -> AppError {
    AppError::internal(format!("Serialization failed: {}", message))
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    match extract_position(message) {
        Some(pos) => format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        ),
        None => format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

/// Pull "Line: X, Column: Y" out of a sqlparser message.
fn extract_position(message: &str) -> Option<SqlPosition> {
    let rest = &message[message.find("Line: ")? + "Line: ".len()..];
    let (line, rest) = rest.split_once(',')?;
    let rest = rest.trim_start().strip_prefix("Column")?;
    let rest = rest.trim_start_matches([':', ' ']);
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(SqlPosition {
        line:   line.trim().parse().ok()?,
        column: rest[..digits].parse().ok()?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_with_position() {
        let text = parse_error_message("Expected: an expression, found: EOF at Line: 3, Column: 14");
        assert!(text.contains("line 3, column 14"), "{}", text);
    }

    #[test]
    fn test_parse_error_without_position() {
        let text = parse_error_message("unexpected end of input");
        assert_eq!(text, "Query parse error:\n  unexpected end of input");
    }
}
