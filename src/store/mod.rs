//! Generic metadata-store repository (spec §4.2).
//!
//! The relational persistence layer itself is an external collaborator
//! (spec §1): the core only depends on this trait. [`memory`] ships one
//! reference implementation used by the binary's default configuration and
//! by the test suite — not a production SQL backend.

pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// A value usable in an equality filter or as a primary key, independent of
/// the concrete backend's column type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Text(s) => write!(f, "{s}"),
            ColumnValue::Int(i) => write!(f, "{i}"),
            ColumnValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Equality-AND conjunction passed to `find_by_column_values`.
pub type ColumnFilter = BTreeMap<&'static str, ColumnValue>;

/// Declares the table name and primary-key accessor for an entity kind,
/// without reflective attribute enumeration (spec §9 design note).
pub trait Entity: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn primary_key(&self) -> ColumnValue;

    /// Explicit column-name to value mapping (no runtime reflection, per
    /// spec §9: "expose each entity's (column name -> accessor) mapping
    /// explicitly via per-entity metadata").
    fn column(&self, name: &str) -> Option<ColumnValue>;
}

/// Generic record repository parameterized by entity kind (spec §4.2).
#[async_trait]
pub trait MetadataStore<E: Entity>: Send + Sync {
    async fn find_all(&self) -> Result<Vec<E>, StoreError>;
    async fn find_by_primary_key(&self, key: &ColumnValue) -> Result<Option<E>, StoreError>;
    async fn find_by_column_values(&self, filter: &ColumnFilter) -> Result<Vec<E>, StoreError>;
    async fn insert(&self, records: Vec<E>) -> Result<(), StoreError>;
    async fn update(&self, records: Vec<E>) -> Result<(), StoreError>;
    async fn delete(&self, records: Vec<E>) -> Result<(), StoreError>;
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum StoreError {
    #[error("unique constraint violated for {table} primary key {key}")]
    UniqueViolation { table: &'static str, key: String },

    #[error("record not found in {table} for primary key {key}")]
    NotFound { table: &'static str, key: String },

    #[error("store backend error: {0}")]
    Backend(String),
}
