use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// OMOP SQL Validator - check SQL against OMOP CDM semantic conventions
#[derive(Parser, Debug)]
#[command(name = "omop-sql-validator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to SQL file (use - or omit for stdin)
    pub sql_file: Option<PathBuf>,

    /// SQL dialect for parsing (default: postgres, or the configured one)
    #[arg(short, long, env = "OMOP_VALIDATOR_DIALECT")]
    pub dialect: Option<String>,

    /// Only run these rule ids
    #[arg(short, long, value_delimiter = ',')]
    pub rules: Vec<String>,

    /// Only run rules in these categories
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub categories: Vec<Category>,

    /// Report file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Validate the whole input as one query
    #[arg(long)]
    pub combined: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging and include query text in text output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the rule registry and exit
    #[arg(long)]
    pub list_rules: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Category {
    Semantic,
    Vocabulary
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Vocabulary => "vocabulary"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
    Text
}
