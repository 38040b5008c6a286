//! Copies every localized row of one language onto another.

use serde::{Deserialize, Serialize};

use super::{
    describe_table, discover_localized_tables, LocalizedRowStore, LocalizedTable, StoreError,
};
use crate::config::DatabaseConfig;
use crate::context::LanguageCatalog;
use crate::report::OperationLog;

const TABLE_SAVEPOINT: &str = "clone_table";

/// What to do with tables whose primary key does not include the language column.
///
/// Copying such rows under a new language id reuses their key and collides
/// with the source rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Skip the table with a warning.
    #[default]
    RequireLanguageKey,
    /// Copy anyway; key collisions fail that table only.
    CopyVerbatim,
}

#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("Source and target language are the same ({0})")]
    SameLanguage(i64),

    #[error("Language {0} is not installed on this shop")]
    UnknownLanguage(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableClone {
    pub table: String,
    pub deleted: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CloneReport {
    pub from: i64,
    pub to: i64,
    pub cloned: Vec<TableClone>,
    pub skipped: Vec<SkippedTable>,
    pub warnings: Vec<String>,
}

impl CloneReport {
    pub fn to_log(&self) -> OperationLog {
        let mut log = OperationLog::new();
        log.success(format!(
            "Cloned {} tables from language {} to language {}.",
            self.cloned.len(),
            self.from,
            self.to
        ));
        for warning in &self.warnings {
            log.warning(warning.clone());
        }
        for skipped in &self.skipped {
            log.info(format!("skipped {}: {}", skipped.table, skipped.reason));
        }
        log
    }
}

/// Why `table` cannot be cloned, if anything.
fn skip_reason(table: &LocalizedTable, config: &DatabaseConfig) -> Option<String> {
    if !table.has_column(&config.language_column) {
        return Some(format!("no {} column", config.language_column));
    }
    let key_excludes_language = !table.primary_key.is_empty()
        && !table.primary_key.iter().any(|c| *c == config.language_column);
    if key_excludes_language && config.key_policy == KeyPolicy::RequireLanguageKey {
        return Some(format!(
            "primary key ({}) does not include {}",
            table.primary_key.join(", "),
            config.language_column
        ));
    }
    None
}

/// Replaces all rows of language `to` with copies of the rows of `from`.
///
/// Every discovered table is handled on its own: a failure is rolled back for
/// that table, recorded as a warning and the run moves on.
pub fn clone_language<S: LocalizedRowStore>(
    store: &S,
    config: &DatabaseConfig,
    languages: &LanguageCatalog,
    from: i64,
    to: i64,
) -> Result<CloneReport, CloneError> {
    if from == to {
        return Err(CloneError::SameLanguage(from));
    }
    for id in [from, to] {
        if !languages.accepts_id(id) {
            return Err(CloneError::UnknownLanguage(id));
        }
    }

    let mut report = CloneReport {
        from,
        to,
        ..CloneReport::default()
    };
    let lang = config.language_column.as_str();

    for name in discover_localized_tables(store, config)? {
        let table = match describe_table(store, &name) {
            Ok(Some(table)) => table,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("could not inspect {}: {}", name, err);
                report.warnings.push(format!("Error reading {}: {}", name, err));
                continue;
            }
        };

        if let Some(reason) = skip_reason(&table, config) {
            if table.has_column(lang) {
                report
                    .warnings
                    .push(format!("Table {} was not cloned: {}", name, reason));
            }
            log::debug!("skipping {}: {}", name, reason);
            report.skipped.push(SkippedTable { table: name, reason });
            continue;
        }

        let outcome = store.atomically(TABLE_SAVEPOINT, |s| {
            let deleted = s.delete_rows(&name, lang, to)?;
            let inserted = s.copy_rows(&name, &table.columns, lang, from, to)?;
            Ok((deleted, inserted))
        });
        match outcome {
            Ok((deleted, inserted)) => {
                log::debug!("{}: removed {} rows, copied {}", name, deleted, inserted);
                report.cloned.push(TableClone {
                    table: name,
                    deleted,
                    inserted,
                });
            }
            Err(err) => {
                log::warn!("clone of {} failed: {}", name, err);
                report.warnings.push(format!("Error cloning {}: {}", name, err));
            }
        }
    }

    log::info!(
        "cloned language {} to {}: {} tables, {} warnings",
        from,
        to,
        report.cloned.len(),
        report.warnings.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Language;
    use crate::db::sqlite::SqliteStore;
    use crate::db::tests::shop_store;
    use crate::db::{ColumnValue, Row, SchemaIntrospector};

    /// Delegates to SQLite but cannot describe one table.
    struct UnreadableTable {
        inner: SqliteStore,
        broken: &'static str,
    }

    impl SchemaIntrospector for UnreadableTable {
        fn list_localized_tables(&self, suffix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list_localized_tables(suffix)
        }

        fn describe_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
            if table == self.broken {
                return Err(StoreError::UnknownTable(table.to_string()));
            }
            self.inner.describe_columns(table)
        }

        fn describe_primary_key(&self, table: &str) -> Result<Vec<String>, StoreError> {
            self.inner.describe_primary_key(table)
        }
    }

    impl LocalizedRowStore for UnreadableTable {
        fn fetch_rows(&self, table: &str, column: &str, lang: i64) -> Result<Vec<Row>, StoreError> {
            self.inner.fetch_rows(table, column, lang)
        }

        fn count_rows(&self, table: &str, column: &str, lang: i64) -> Result<usize, StoreError> {
            self.inner.count_rows(table, column, lang)
        }

        fn delete_rows(&self, table: &str, column: &str, lang: i64) -> Result<usize, StoreError> {
            self.inner.delete_rows(table, column, lang)
        }

        fn copy_rows(
            &self,
            table: &str,
            columns: &[String],
            column: &str,
            from: i64,
            to: i64,
        ) -> Result<usize, StoreError> {
            self.inner.copy_rows(table, columns, column, from, to)
        }

        fn update_row(
            &self,
            table: &str,
            key: &[(String, ColumnValue)],
            assignments: &[(String, ColumnValue)],
        ) -> Result<usize, StoreError> {
            self.inner.update_row(table, key, assignments)
        }

        fn savepoint(&self, name: &str) -> Result<(), StoreError> {
            self.inner.savepoint(name)
        }

        fn release(&self, name: &str) -> Result<(), StoreError> {
            self.inner.release(name)
        }

        fn rollback_to(&self, name: &str) -> Result<(), StoreError> {
            self.inner.rollback_to(name)
        }
    }

    fn catalog(store: &SqliteStore) -> LanguageCatalog {
        store.load_language_catalog("ps_lang").unwrap()
    }

    fn cloned_tables(report: &CloneReport) -> Vec<&str> {
        report.cloned.iter().map(|c| c.table.as_str()).collect()
    }

    #[test]
    fn clone_replaces_target_rows_table_by_table() {
        let store = shop_store();
        let config = DatabaseConfig::default();
        let report = clone_language(&store, &config, &catalog(&store), 1, 2).unwrap();

        assert_eq!(
            cloned_tables(&report),
            vec!["ps_category_lang", "ps_log_lang", "ps_product_lang"]
        );
        for table in ["ps_category_lang", "ps_log_lang", "ps_product_lang"] {
            assert_eq!(
                store.count_rows(table, "id_lang", 2).unwrap(),
                store.count_rows(table, "id_lang", 1).unwrap(),
                "{table}"
            );
        }

        let product = report.cloned.iter().find(|c| c.table == "ps_product_lang").unwrap();
        assert_eq!((product.deleted, product.inserted), (1, 2));

        // "Telaio" was the old Italian row; it is gone.
        let strip = |rows: Vec<crate::db::Row>| {
            rows.into_iter()
                .map(|mut row| {
                    row.remove("id_lang");
                    row
                })
                .collect::<Vec<_>>()
        };
        let italian = strip(store.fetch_rows("ps_product_lang", "id_lang", 2).unwrap());
        let english = strip(store.fetch_rows("ps_product_lang", "id_lang", 1).unwrap());
        assert_eq!(italian.len(), english.len());
        assert!(italian.iter().all(|row| english.contains(row)));
    }

    #[test]
    fn other_languages_and_tables_are_untouched() {
        let store = shop_store();
        store
            .connection()
            .execute_batch("INSERT INTO ps_product_lang VALUES (1, 1, 3, 'Cadre', NULL);")
            .unwrap();
        let config = DatabaseConfig::default();
        clone_language(&store, &config, &catalog(&store), 1, 2).unwrap();

        let french = store.fetch_rows("ps_product_lang", "id_lang", 3).unwrap();
        assert_eq!(french.len(), 1);
        let prices: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM ps_product", [], |row| row.get(0))
            .unwrap();
        assert_eq!(prices, 2);
        let badges: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM ps_badge_lang", [], |row| row.get(0))
            .unwrap();
        assert_eq!(badges, 1);
    }

    #[test]
    fn tables_keyed_without_language_are_skipped_by_default() {
        let store = shop_store();
        let config = DatabaseConfig::default();
        let report = clone_language(&store, &config, &catalog(&store), 1, 2).unwrap();

        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(skipped, vec!["ps_badge_lang", "ps_tab_lang"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("ps_tab_lang"));
        assert_eq!(store.count_rows("ps_tab_lang", "id_lang", 2).unwrap(), 0);
    }

    #[test]
    fn verbatim_copy_collision_rolls_back_only_that_table() {
        let store = shop_store();
        store
            .connection()
            .execute_batch("INSERT INTO ps_tab_lang VALUES (101, 2, 'Catalogo');")
            .unwrap();
        let config = DatabaseConfig {
            key_policy: KeyPolicy::CopyVerbatim,
            ..DatabaseConfig::default()
        };
        let report = clone_language(&store, &config, &catalog(&store), 1, 2).unwrap();

        assert_eq!(report.cloned.len(), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("Error cloning ps_tab_lang"));
        // The delete of the Italian row was undone with the failed insert.
        let tabs = store.fetch_rows("ps_tab_lang", "id_lang", 2).unwrap();
        assert_eq!(tabs.len(), 1);
        assert_eq!(store.count_rows("ps_product_lang", "id_lang", 2).unwrap(), 2);
    }

    #[test]
    fn unreadable_table_is_a_warning_not_an_abort() {
        let store = UnreadableTable {
            inner: shop_store(),
            broken: "ps_category_lang",
        };
        let languages = catalog(&store.inner);
        let report =
            clone_language(&store, &DatabaseConfig::default(), &languages, 1, 2).unwrap();

        assert_eq!(cloned_tables(&report), vec!["ps_log_lang", "ps_product_lang"]);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with("Error reading ps_category_lang")));
        assert_eq!(store.count_rows("ps_category_lang", "id_lang", 2).unwrap(), 0);
        assert_eq!(store.count_rows("ps_product_lang", "id_lang", 2).unwrap(), 2);
    }

    #[test]
    fn rejects_same_or_unknown_language() {
        let store = shop_store();
        let config = DatabaseConfig::default();
        let languages = catalog(&store);

        assert!(matches!(
            clone_language(&store, &config, &languages, 1, 1),
            Err(CloneError::SameLanguage(1))
        ));
        assert!(matches!(
            clone_language(&store, &config, &languages, 1, 9),
            Err(CloneError::UnknownLanguage(9))
        ));
        assert_eq!(store.count_rows("ps_product_lang", "id_lang", 2).unwrap(), 1);
    }

    #[test]
    fn empty_catalog_accepts_any_id() {
        let store = shop_store();
        let report =
            clone_language(&store, &DatabaseConfig::default(), &LanguageCatalog::default(), 1, 7)
                .unwrap();
        assert_eq!(store.count_rows("ps_product_lang", "id_lang", 7).unwrap(), 2);
        assert!(report.to_log().render_text().starts_with("[OK] Cloned 3 tables"));

        let single = LanguageCatalog::new(vec![Language {
            id: 1,
            iso_code: "en".into(),
            locale: "en-US".into(),
            name: "English".into(),
        }]);
        assert!(clone_language(&store, &DatabaseConfig::default(), &single, 1, 7).is_err());
    }
}
