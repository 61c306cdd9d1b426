//! SQL parsing front end.
//!
//! Parsing is delegated to [`sqlparser`]; this module only selects the
//! grammar, rejects empty input and splits multi-query files.

mod split;

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
pub use split::{normalize_query, split_queries};
use sqlparser::{
    ast::Statement,
    dialect::{
        AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, Dialect, DuckDbDialect,
        GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
        RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect
    },
    parser::{Parser, ParserError}
};

use crate::error::{AppError, AppResult, config_error, query_parse_error};

/// SQL dialect for parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SqlDialect {
    Generic,
    #[default]
    PostgreSQL,
    MySQL,
    SQLite,
    ClickHouse,
    Snowflake,
    BigQuery,
    DuckDb,
    MsSql,
    Redshift,
    Hive,
    Databricks,
    Ansi
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 13] = [
        Self::Generic,
        Self::PostgreSQL,
        Self::MySQL,
        Self::SQLite,
        Self::ClickHouse,
        Self::Snowflake,
        Self::BigQuery,
        Self::DuckDb,
        Self::MsSql,
        Self::Redshift,
        Self::Hive,
        Self::Databricks,
        Self::Ansi
    ];

    /// Canonical lowercase name used in reports
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
            Self::ClickHouse => "clickhouse",
            Self::Snowflake => "snowflake",
            Self::BigQuery => "bigquery",
            Self::DuckDb => "duckdb",
            Self::MsSql => "tsql",
            Self::Redshift => "redshift",
            Self::Hive => "hive",
            Self::Databricks => "databricks",
            Self::Ansi => "ansi"
        }
    }

    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {}),
            Self::ClickHouse => Box::new(ClickHouseDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::BigQuery => Box::new(BigQueryDialect {}),
            Self::DuckDb => Box::new(DuckDbDialect {}),
            Self::MsSql => Box::new(MsSqlDialect {}),
            Self::Redshift => Box::new(RedshiftSqlDialect {}),
            Self::Hive => Box::new(HiveDialect {}),
            Self::Databricks => Box::new(DatabricksDialect {}),
            Self::Ansi => Box::new(AnsiDialect {})
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlDialect {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "postgres" | "postgresql" => Ok(Self::PostgreSQL),
            "mysql" => Ok(Self::MySQL),
            "sqlite" => Ok(Self::SQLite),
            "clickhouse" => Ok(Self::ClickHouse),
            "snowflake" => Ok(Self::Snowflake),
            "bigquery" => Ok(Self::BigQuery),
            "duckdb" => Ok(Self::DuckDb),
            "tsql" | "mssql" | "sqlserver" => Ok(Self::MsSql),
            "redshift" => Ok(Self::Redshift),
            "hive" => Ok(Self::Hive),
            "databricks" | "spark" => Ok(Self::Databricks),
            "ansi" => Ok(Self::Ansi),
            other => Err(config_error(format!("Unknown SQL dialect '{}'", other)))
        }
    }
}

impl Serialize for SqlDialect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Parse SQL text into statements under the given dialect.
///
/// Input that contains no statement at all is reported as a parse error.
pub fn parse_statements(sql: &str, dialect: SqlDialect) -> AppResult<Vec<Statement>> {
    try_parse(sql, dialect).map_err(|e| query_parse_error(e.to_string()))
}

/// Like [`parse_statements`], keeping the parser's own error.
pub fn try_parse(sql: &str, dialect: SqlDialect) -> Result<Vec<Statement>, ParserError> {
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)?;
    if statements.is_empty() {
        return Err(ParserError::ParserError("no SQL statement found".into()));
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("postgresql".parse::<SqlDialect>().ok(), Some(SqlDialect::PostgreSQL));
        assert_eq!("SPARK".parse::<SqlDialect>().ok(), Some(SqlDialect::Databricks));
        assert_eq!("mssql".parse::<SqlDialect>().ok(), Some(SqlDialect::MsSql));
        assert!("oracle-ish".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_dialect_names_round_trip() {
        for dialect in SqlDialect::ALL {
            assert_eq!(dialect.name().parse::<SqlDialect>().ok(), Some(dialect));
        }
    }

    #[test]
    fn test_parse_statements_rejects_empty_input() {
        assert!(parse_statements("  -- nothing here\n", SqlDialect::PostgreSQL).is_err());
    }

    #[test]
    fn test_parse_statements_multiple() {
        let stmts = parse_statements("SELECT 1; SELECT 2", SqlDialect::Generic).unwrap();
        assert_eq!(stmts.len(), 2);
    }
}
