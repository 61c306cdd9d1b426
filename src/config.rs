//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.omop-validator.toml` in current directory
//! 4. `~/.config/omop-sql-validator/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
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
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `OMOP_VALIDATOR_DIALECT` | Default SQL dialect |
//! | `OMOP_VALIDATOR_DISABLED` | Comma-separated rule ids to disable |

use std::{env, fs, path::Path};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AppResult, config_error},
    output::OutputFormat,
    query::SqlDialect
};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub rules:     RulesConfig,
    #[serde(default)]
    pub output:    OutputConfig
}

/// Parser settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ValidatorConfig {
    /// Dialect name, any alias accepted by [`SqlDialect`]
    pub dialect: Option<String>
}

/// Rules configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RulesConfig {
    /// Disabled rule IDs
    #[serde(default)]
    pub disabled: Vec<String>
}

/// Report file settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputConfig {
    pub path:   Option<String>,
    pub format: Option<String>
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.omop-validator.toml)
    /// 3. Config file in home directory
    ///    (~/.config/omop-sql-validator/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = Path::new(&home)
                .join(".config")
                .join("omop-sql-validator")
                .join("config.toml");
            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = Path::new(".omop-validator.toml");
        if local_config.exists() {
            config = Self::from_file(local_config)?;
        }

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Parse one TOML file.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        debug!(path = %path.display(), "loaded config file");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dialect) = var("OMOP_VALIDATOR_DIALECT") {
            self.validator.dialect = Some(dialect);
        }
        if let Some(disabled) = var("OMOP_VALIDATOR_DISABLED") {
            self.rules.disabled = disabled
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Configured dialect, or the default when none is set.
    pub fn dialect(&self) -> AppResult<SqlDialect> {
        match &self.validator.dialect {
            Some(name) => name.parse(),
            None => Ok(SqlDialect::default())
        }
    }

    /// Configured report format, or JSON when none is set.
    pub fn output_format(&self) -> AppResult<OutputFormat> {
        match &self.output.format {
            Some(name) => name.parse(),
            None => Ok(OutputFormat::Json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::parse(
            r#"
            [validator]
            dialect = "snowflake"

            [rules]
            disabled = ["semantic.join_path_validation"]
            "#
        )
        .unwrap();
        config.apply_env(|key| match key {
            "OMOP_VALIDATOR_DIALECT" => Some("duckdb".to_string()),
            "OMOP_VALIDATOR_DISABLED" => Some(" vocabulary.schema_validation , ".to_string()),
            _ => None
        });
        assert_eq!(config.dialect().unwrap(), SqlDialect::DuckDb);
        assert_eq!(config.rules.disabled, vec!["vocabulary.schema_validation"]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dialect().unwrap(), SqlDialect::PostgreSQL);
        assert_eq!(config.output_format().unwrap(), OutputFormat::Json);
        assert!(config.output.path.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(Config::parse("[rules\ndisabled = 1").is_err());
    }
}
