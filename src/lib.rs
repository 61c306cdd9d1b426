//! # OMOP SQL Validator Library
//!
//! Static semantic validation of SQL written against the OMOP Common Data
//! Model: join paths, concept hierarchy, vocabulary lookups and predicate
//! co-location.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod query;
pub mod rules;
pub mod schema;
pub mod scope;
pub mod validator;
