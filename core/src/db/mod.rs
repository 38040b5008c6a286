//! Per-language database content: schema discovery, cloning, JSON export/import.
//!
//! Everything here is written against [`SchemaIntrospector`] and
//! [`LocalizedRowStore`]; [`sqlite::SqliteStore`] is the bundled adapter.

pub mod bundle;
pub mod cloner;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::DatabaseConfig;

pub use cloner::KeyPolicy;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unknown table {0}")]
    UnknownTable(String),

    #[error("Unknown column {column} in {table}")]
    UnknownColumn { table: String, column: String },
}

/// A single column value as it travels through export bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Column name → value. Key order carries no meaning.
pub type Row = BTreeMap<String, ColumnValue>;

/// A table whose rows are scoped by language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedTable {
    pub name: String,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
}

impl LocalizedTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Read-only view of the schema. Tables are never enumerated statically.
pub trait SchemaIntrospector {
    /// Table names ending in `suffix`, sorted.
    fn list_localized_tables(&self, suffix: &str) -> Result<Vec<String>, StoreError>;

    /// Column names in declaration order; empty when the table does not exist.
    fn describe_columns(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Primary-key columns in key order; empty when there is none.
    fn describe_primary_key(&self, table: &str) -> Result<Vec<String>, StoreError>;
}

/// Row operations needed by the cloner and the bundle import/export.
///
/// Implementations bind every value as a statement parameter and quote every
/// identifier with [`quote_ident`].
pub trait LocalizedRowStore: SchemaIntrospector {
    fn fetch_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<Vec<Row>, StoreError>;

    fn count_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<usize, StoreError>;

    fn delete_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<usize, StoreError>;

    /// Inserts a copy of every `from` row with `language_column` set to `to`.
    fn copy_rows(
        &self,
        table: &str,
        columns: &[String],
        language_column: &str,
        from: i64,
        to: i64,
    ) -> Result<usize, StoreError>;

    /// `UPDATE table SET assignments WHERE key₁ IS v₁ AND …`; returns affected rows.
    fn update_row(
        &self,
        table: &str,
        key: &[(String, ColumnValue)],
        assignments: &[(String, ColumnValue)],
    ) -> Result<usize, StoreError>;

    fn savepoint(&self, name: &str) -> Result<(), StoreError>;

    fn release(&self, name: &str) -> Result<(), StoreError>;

    fn rollback_to(&self, name: &str) -> Result<(), StoreError>;

    /// Runs `work` inside a savepoint, undoing all of it on error.
    fn atomically<T, F>(&self, name: &str, work: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        self.savepoint(name)?;
        match work(self) {
            Ok(value) => {
                self.release(name)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_to(name).and_then(|_| self.release(name)) {
                    log::warn!("rollback of {} failed: {}", name, rollback_err);
                }
                Err(err)
            }
        }
    }
}

/// Double-quoted SQL identifier with embedded quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Full description of `table`, or None if it does not exist.
pub fn describe_table<S: SchemaIntrospector + ?Sized>(
    store: &S,
    table: &str,
) -> Result<Option<LocalizedTable>, StoreError> {
    let columns = store.describe_columns(table)?;
    if columns.is_empty() {
        return Ok(None);
    }
    let primary_key = store.describe_primary_key(table)?;
    Ok(Some(LocalizedTable {
        name: table.to_string(),
        columns,
        primary_key,
    }))
}

/// Localized tables of this shop: prefixed, suffixed, and not the language catalog itself.
pub fn discover_localized_tables<S: SchemaIntrospector + ?Sized>(
    store: &S,
    config: &DatabaseConfig,
) -> Result<Vec<String>, StoreError> {
    let catalog = config.prefixed_language_table();
    Ok(store
        .list_localized_tables(&config.localized_suffix)?
        .into_iter()
        .filter(|name| name.starts_with(&config.table_prefix) && *name != catalog)
        .collect())
}
