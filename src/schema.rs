//! Static OMOP CDM schema graph.
//!
//! The graph is built once from the table definitions in [`tables`] and the
//! classification lists in [`concepts`], then shared read-only for the life
//! of the process through [`SchemaGraph::global`].
//!
//! # Join validity
//!
//! Two columns may be equated in a join when they resolve to the same key.
//! A column's key is the column it references through a declared foreign key,
//! or the column itself when it is its table's single-column primary key.
//! This covers the declared edges in both directions, self-joins on a primary
//! key and co-references such as
//! `condition_occurrence.person_id = observation_period.person_id`.
//!
//! Concept ids are the exception. Two columns that both reference
//! `concept.concept_id` only join when one side is `concept.concept_id`
//! itself or a vocabulary bridge from [`concepts::CONCEPT_BRIDGE_COLUMNS`],
//! so `condition_concept_id = drug_concept_id` is rejected.
//!
//! ```
//! use omop_sql_validator::schema::SchemaGraph;
//!
//! let schema = SchemaGraph::global();
//! assert!(schema.is_valid_join("condition_occurrence", "condition_concept_id", "concept", "concept_id"));
//! assert!(schema.is_valid_join("concept", "concept_id", "condition_occurrence", "condition_concept_id"));
//! assert!(!schema.is_valid_join("condition_occurrence", "condition_occurrence_id", "concept", "concept_id"));
//! assert!(!schema.is_valid_join("condition_occurrence", "condition_concept_id", "person", "gender_concept_id"));
//! ```

pub mod concepts;
mod tables;

use std::{collections::HashMap, sync::LazyLock};

use indexmap::IndexMap;
use serde::Serialize;
use tables::TABLES;

use crate::error::{AppResult, unknown_table_error};

static SCHEMA: LazyLock<SchemaGraph> = LazyLock::new(SchemaGraph::load);

const CONCEPT_KEY: ColumnKey = ("concept", "concept_id");

/// Classification of a concept-holding column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptField {
    /// Must reference a standard concept
    Standard,
    /// References the originating source concept
    Source
}

impl std::fmt::Display for ConceptField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "STANDARD"),
            Self::Source => write!(f, "SOURCE")
        }
    }
}

/// A CDM table.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub name:        &'static str,
    pub columns:     &'static [&'static str],
    pub primary_key: &'static [&'static str]
}

impl Table {
    pub fn has_column(&self, column: &str) -> bool {
        self.column(column).is_some()
    }

    fn column(&self, column: &str) -> Option<&'static str> {
        let column = column.to_ascii_lowercase();
        self.columns.iter().copied().find(|c| *c == column)
    }
}

/// Directed foreign-key edge `from_table.from_column -> to_table.to_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignKeyEdge {
    pub from_table:  &'static str,
    pub from_column: &'static str,
    pub to_table:    &'static str,
    pub to_column:   &'static str
}

impl ForeignKeyEdge {
    pub fn reversed(self) -> Self {
        Self {
            from_table:  self.to_table,
            from_column: self.to_column,
            to_table:    self.from_table,
            to_column:   self.from_column
        }
    }
}

impl std::fmt::Display for ForeignKeyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} = {}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

type ColumnKey = (&'static str, &'static str);

/// Read-only model of the CDM tables, their keys and concept fields.
#[derive(Debug)]
pub struct SchemaGraph {
    tables:         IndexMap<&'static str, Table>,
    edges:          Vec<ForeignKeyEdge>,
    references:     HashMap<ColumnKey, ColumnKey>,
    classification: HashMap<ColumnKey, ConceptField>
}

impl SchemaGraph {
    /// Process-wide instance, built on first use.
    pub fn global() -> &'static SchemaGraph {
        &SCHEMA
    }

    fn load() -> Self {
        let mut tables = IndexMap::with_capacity(TABLES.len());
        let mut edges = Vec::new();
        let mut references = HashMap::new();
        for def in TABLES {
            tables.insert(
                def.name,
                Table {
                    name:        def.name,
                    columns:     def.columns,
                    primary_key: def.primary_key
                }
            );
            for &(column, to_table, to_column) in def.foreign_keys {
                let edge = ForeignKeyEdge {
                    from_table: def.name,
                    from_column: column,
                    to_table,
                    to_column
                };
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
                references.insert((def.name, column), (to_table, to_column));
            }
        }
        let mut classification = HashMap::new();
        for &key in concepts::STANDARD_CONCEPT_FIELDS {
            classification.insert(key, ConceptField::Standard);
        }
        for &key in concepts::SOURCE_CONCEPT_FIELDS {
            classification.entry(key).or_insert(ConceptField::Source);
        }
        Self {
            tables,
            edges,
            references,
            classification
        }
    }

    /// Look up a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name.to_ascii_lowercase().as_str())
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table).is_some_and(|t| t.has_column(column))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Declared foreign-key edges in declaration order.
    pub fn edges(&self) -> &[ForeignKeyEdge] {
        &self.edges
    }

    /// Primary key column(s) of `table`; empty for tables without one.
    pub fn primary_key_of(&self, table: &str) -> AppResult<&'static [&'static str]> {
        self.table(table)
            .map(|t| t.primary_key)
            .ok_or_else(|| unknown_table_error(table))
    }

    /// Column referenced by `table.column` through a declared foreign key.
    pub fn references(&self, table: &str, column: &str) -> Option<(&'static str, &'static str)> {
        let key = self.canonical(table, column)?;
        self.references.get(&key).copied()
    }

    /// True iff the two columns may be equated in a join, in either order.
    pub fn is_valid_join(&self, table_a: &str, column_a: &str, table_b: &str, column_b: &str) -> bool {
        let (Some(a), Some(b)) = (self.canonical(table_a, column_a), self.canonical(table_b, column_b)) else {
            return false;
        };
        match (self.join_key(a), self.join_key(b)) {
            (Some(ka), Some(kb)) if ka == CONCEPT_KEY && kb == CONCEPT_KEY => {
                [a, b].iter().any(|k| *k == CONCEPT_KEY || concepts::CONCEPT_BRIDGE_COLUMNS.contains(k))
            }
            (Some(ka), Some(kb)) => ka == kb,
            _ => false
        }
    }

    /// Declared edges linking the two tables, oriented from `table_a`.
    pub fn edges_between(&self, table_a: &str, table_b: &str) -> Vec<ForeignKeyEdge> {
        let (a, b) = (table_a.to_ascii_lowercase(), table_b.to_ascii_lowercase());
        self.edges
            .iter()
            .filter_map(|e| {
                if e.from_table == a && e.to_table == b {
                    Some(*e)
                } else if e.from_table == b && e.to_table == a {
                    Some(e.reversed())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn classify(&self, table: &str, column: &str) -> Option<ConceptField> {
        let key = self.canonical(table, column)?;
        self.classification.get(&key).copied()
    }

    fn canonical(&self, table: &str, column: &str) -> Option<ColumnKey> {
        let table = self.table(table)?;
        Some((table.name, table.column(column)?))
    }

    fn join_key(&self, key: ColumnKey) -> Option<ColumnKey> {
        if let Some(target) = self.references.get(&key) {
            return Some(*target);
        }
        let pk = self.table(key.0)?.primary_key;
        (pk.len() == 1 && pk[0] == key.1).then_some(key)
    }
}
