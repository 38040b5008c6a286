use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use std::path::Path;

use super::{quote_ident, ColumnValue, LocalizedRowStore, Row, SchemaIntrospector, StoreError};
use crate::context::{Language, LanguageCatalog};

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ColumnValue::Null => ToSqlOutput::Owned(Value::Null),
            ColumnValue::Bool(flag) => ToSqlOutput::Owned(Value::Integer(i64::from(*flag))),
            ColumnValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            ColumnValue::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            ColumnValue::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
        })
    }
}

impl From<Value> for ColumnValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ColumnValue::Null,
            Value::Integer(v) => ColumnValue::Integer(v),
            Value::Real(v) => ColumnValue::Real(v),
            Value::Text(text) => ColumnValue::Text(text),
            // Localized tables hold text; blobs are carried as lossy UTF-8.
            Value::Blob(bytes) => ColumnValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

/// [`LocalizedRowStore`] over a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Reads installed languages from `table` (`id_lang`, `iso_code`, `locale`, `name`).
    ///
    /// Returns an empty catalog when the table is missing or shaped differently.
    pub fn load_language_catalog(&self, table: &str) -> Result<LanguageCatalog, StoreError> {
        let columns = self.describe_columns(table)?;
        let required = ["id_lang", "iso_code", "locale", "name"];
        if let Some(missing) = required.iter().find(|col| !columns.iter().any(|c| c == *col)) {
            log::warn!("language table {} has no {} column, catalog left empty", table, missing);
            return Ok(LanguageCatalog::default());
        }

        let sql = format!(
            "SELECT id_lang, iso_code, locale, name FROM {} ORDER BY id_lang",
            quote_ident(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let languages = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: row.get(0)?,
                    iso_code: row.get(1)?,
                    locale: row.get(2)?,
                    name: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LanguageCatalog::new(languages))
    }

    fn table_info(&self, table: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let info = stmt
            .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(info)
    }
}

impl SchemaIntrospector for SqliteStore {
    fn list_localized_tables(&self, suffix: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.into_iter().filter(|name| name.ends_with(suffix)).collect())
    }

    fn describe_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.table_info(table)?.into_iter().map(|(name, _)| name).collect())
    }

    fn describe_primary_key(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut keyed: Vec<(String, i64)> = self
            .table_info(table)?
            .into_iter()
            .filter(|(_, pk)| *pk > 0)
            .collect();
        keyed.sort_by_key(|(_, pk)| *pk);
        Ok(keyed.into_iter().map(|(name, _)| name).collect())
    }
}

impl LocalizedRowStore for SqliteStore {
    fn fetch_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<Vec<Row>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(language_column)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([lang_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (index, name) in names.iter().enumerate() {
                let value: Value = row.get(index)?;
                record.insert(name.clone(), ColumnValue::from(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn count_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<usize, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(language_column)
        );
        let count: i64 = self.conn.query_row(&sql, [lang_id], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn delete_rows(
        &self,
        table: &str,
        language_column: &str,
        lang_id: i64,
    ) -> Result<usize, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(language_column)
        );
        Ok(self.conn.execute(&sql, [lang_id])?)
    }

    fn copy_rows(
        &self,
        table: &str,
        columns: &[String],
        language_column: &str,
        from: i64,
        to: i64,
    ) -> Result<usize, StoreError> {
        if !columns.iter().any(|c| c == language_column) {
            return Err(StoreError::UnknownColumn {
                table: table.to_string(),
                column: language_column.to_string(),
            });
        }

        let target_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let select_list = columns
            .iter()
            .map(|c| {
                if c == language_column {
                    "?1".to_string()
                } else {
                    quote_ident(c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({target_list}) SELECT {select_list} FROM {table} WHERE {lang} = ?2",
            table = quote_ident(table),
            lang = quote_ident(language_column),
        );
        Ok(self.conn.execute(&sql, [to, from])?)
    }

    fn update_row(
        &self,
        table: &str,
        key: &[(String, ColumnValue)],
        assignments: &[(String, ColumnValue)],
    ) -> Result<usize, StoreError> {
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", quote_ident(column), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = key
            .iter()
            .enumerate()
            .map(|(i, (column, _))| {
                format!("{} IS ?{}", quote_ident(column), assignments.len() + i + 1)
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table),
            set_clause,
            where_clause
        );

        let values = assignments.iter().chain(key.iter()).map(|(_, value)| value);
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    fn savepoint(&self, name: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", quote_ident(name)))?;
        Ok(())
    }

    fn release(&self, name: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!("RELEASE {}", quote_ident(name)))?;
        Ok(())
    }

    fn rollback_to(&self, name: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!("ROLLBACK TO {}", quote_ident(name)))?;
        Ok(())
    }
}
