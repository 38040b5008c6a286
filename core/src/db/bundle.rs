//! Per-language row dumps as portable JSON, and re-applying them as updates.
//!
//! ```json
//! { "ps_product_lang": { "primary_keys": ["id_product", "id_shop", "id_lang"],
//!                        "rows": [ { "id_product": 1, "name": "Frame" } ] } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{
    describe_table, discover_localized_tables, ColumnValue, LocalizedRowStore, Row, StoreError,
};
use crate::config::DatabaseConfig;
use crate::download::{Download, CONTENT_TYPE_JSON};
use crate::report::OperationLog;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Invalid export file: {0}")]
    InvalidFormat(String),

    #[error("Failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDump {
    pub primary_keys: Vec<String>,
    pub rows: Vec<Row>,
}

/// Table name → dump, for one language.
pub type ExportBundle = BTreeMap<String, TableDump>;

pub fn export_filename(lang_id: i64) -> String {
    format!("db_content_lang_{}.json", lang_id)
}

/// Seed tables plus discovered localized tables, minus discovered tables that
/// look like logs or statistics. Sorted, without duplicates.
pub fn export_tables<S: LocalizedRowStore>(
    store: &S,
    config: &DatabaseConfig,
) -> Result<Vec<String>, StoreError> {
    let mut tables: BTreeSet<String> = config.prefixed_seed_tables().into_iter().collect();
    for name in discover_localized_tables(store, config)? {
        let excluded = config
            .excluded_tokens
            .iter()
            .any(|token| name.contains(token.as_str()));
        if excluded {
            log::debug!("leaving {} out of the export", name);
        } else {
            tables.insert(name);
        }
    }
    Ok(tables.into_iter().collect())
}

/// Rows of `lang_id` from every export table that exists and has any.
pub fn export_language<S: LocalizedRowStore>(
    store: &S,
    config: &DatabaseConfig,
    lang_id: i64,
) -> Result<ExportBundle, BundleError> {
    let mut bundle = ExportBundle::new();
    for name in export_tables(store, config)? {
        let table = match describe_table(store, &name)? {
            Some(table) if table.has_column(&config.language_column) => table,
            Some(_) => {
                log::debug!("{} has no {} column", name, config.language_column);
                continue;
            }
            None => continue,
        };

        let rows = store.fetch_rows(&name, &config.language_column, lang_id)?;
        if rows.is_empty() {
            continue;
        }
        bundle.insert(
            name,
            TableDump {
                primary_keys: table.primary_key,
                rows,
            },
        );
    }
    log::info!("exported {} tables for language {}", bundle.len(), lang_id);
    Ok(bundle)
}

/// [`export_language`] as a pretty-printed JSON download.
pub fn export_download<S: LocalizedRowStore>(
    store: &S,
    config: &DatabaseConfig,
    lang_id: i64,
) -> Result<Download, BundleError> {
    let bundle = export_language(store, config, lang_id)?;
    let body = serde_json::to_vec_pretty(&bundle)?;
    Ok(Download::from_bytes(CONTENT_TYPE_JSON, export_filename(lang_id), body))
}

pub fn parse_bundle(bytes: &[u8]) -> Result<ExportBundle, BundleError> {
    serde_json::from_slice(bytes).map_err(|err| BundleError::InvalidFormat(err.to_string()))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub tables_processed: usize,
    pub rows_updated: usize,
    pub skipped_rows: usize,
    pub warnings: Vec<String>,
}

impl ImportSummary {
    pub fn to_log(&self) -> OperationLog {
        let mut log = OperationLog::new();
        log.success(format!(
            "Import completed: {} tables processed, {} rows updated.",
            self.tables_processed, self.rows_updated
        ));
        if self.skipped_rows > 0 {
            log.info(format!("{} rows skipped", self.skipped_rows));
        }
        for warning in &self.warnings {
            log.warning(warning.clone());
        }
        log
    }
}

/// Applies `bundle` as updates keyed on each table's primary key.
///
/// Only tables [`export_tables`] would produce are accepted, and the file's
/// `primary_keys` must match the schema's key exactly. Nothing is inserted or
/// deleted. Tables and columns unknown to the schema are reported and left alone.
pub fn import_bundle<S: LocalizedRowStore>(
    store: &S,
    config: &DatabaseConfig,
    bundle: &ExportBundle,
) -> Result<ImportSummary, BundleError> {
    let mut summary = ImportSummary::default();
    let accepted: BTreeSet<String> = export_tables(store, config)?.into_iter().collect();

    for (name, dump) in bundle {
        let table = match describe_table(store, name)? {
            Some(table) if accepted.contains(name) && table.has_column(&config.language_column) => {
                table
            }
            _ => {
                summary.warnings.push(format!("Unknown table {} skipped", name));
                summary.skipped_rows += dump.rows.len();
                continue;
            }
        };
        if table.primary_key.is_empty() {
            summary
                .warnings
                .push(format!("Table {} has no primary key, skipped", name));
            summary.skipped_rows += dump.rows.len();
            continue;
        }
        let declared: BTreeSet<&String> = dump.primary_keys.iter().collect();
        let schema: BTreeSet<&String> = table.primary_key.iter().collect();
        if declared != schema {
            summary.warnings.push(format!(
                "Primary keys of {} in the file ({}) do not match the schema ({}), table skipped",
                name,
                dump.primary_keys.join(", "),
                table.primary_key.join(", ")
            ));
            summary.skipped_rows += dump.rows.len();
            continue;
        }
        summary.tables_processed += 1;

        let mut unknown_columns = BTreeSet::new();
        for row in &dump.rows {
            let key: Option<Vec<(String, ColumnValue)>> = table
                .primary_key
                .iter()
                .map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
                .collect();
            let key = match key {
                Some(key) => key,
                None => {
                    summary.skipped_rows += 1;
                    continue;
                }
            };

            let mut assignments = Vec::new();
            for (column, value) in row {
                if table.primary_key.contains(column) {
                    continue;
                }
                if table.has_column(column) {
                    assignments.push((column.clone(), value.clone()));
                } else {
                    unknown_columns.insert(column.clone());
                }
            }
            if assignments.is_empty() {
                summary.skipped_rows += 1;
                continue;
            }

            match store.update_row(name, &key, &assignments) {
                Ok(updated) => summary.rows_updated += updated,
                Err(err) => {
                    log::warn!("update in {} failed: {}", name, err);
                    summary.warnings.push(format!("Error updating {}: {}", name, err));
                    summary.skipped_rows += 1;
                }
            }
        }

        for column in unknown_columns {
            summary
                .warnings
                .push(format!("Unknown column {} in {} ignored", column, name));
        }
    }

    log::info!(
        "bundle import: {} tables, {} rows updated, {} skipped",
        summary.tables_processed,
        summary.rows_updated,
        summary.skipped_rows
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::shop_store;
    use proptest::prelude::*;

    fn snapshot<S: LocalizedRowStore>(store: &S, table: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        for lang in 1..=3 {
            rows.extend(store.fetch_rows(table, "id_lang", lang).unwrap());
        }
        rows
    }

    #[test]
    fn export_picks_seed_and_discovered_tables() {
        let store = shop_store();
        let config = DatabaseConfig::default();
        let tables = export_tables(&store, &config).unwrap();

        assert!(tables.contains(&"ps_tab_lang".to_string()));
        assert!(tables.contains(&"ps_cms_lang".to_string()));
        assert!(!tables.contains(&"ps_log_lang".to_string()));
        assert!(!tables.contains(&"ps_lang".to_string()));

        let bundle = export_language(&store, &config, 1).unwrap();
        let names: Vec<&str> = bundle.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ps_category_lang", "ps_product_lang", "ps_tab_lang"]);
        assert_eq!(
            bundle["ps_product_lang"].primary_keys,
            vec!["id_product", "id_shop", "id_lang"]
        );
        assert_eq!(bundle["ps_product_lang"].rows.len(), 2);
    }

    #[test]
    fn download_is_pretty_json() {
        let store = shop_store();
        let download = export_download(&store, &DatabaseConfig::default(), 2).unwrap();
        assert_eq!(download.content_type, "application/json");
        assert_eq!(download.filename, "db_content_lang_2.json");

        let text = String::from_utf8(download.into_bytes().unwrap()).unwrap();
        assert!(text.contains("\n  \"ps_product_lang\": {"));
        let parsed = parse_bundle(text.as_bytes()).unwrap();
        assert_eq!(parsed["ps_product_lang"].rows[0]["name"], ColumnValue::Text("Telaio".into()));
    }

    #[test]
    fn export_then_import_changes_nothing() {
        let store = shop_store();
        let config = DatabaseConfig::default();
        let before = snapshot(&store, "ps_category_lang");

        let download = export_download(&store, &config, 1).unwrap();
        let bundle = parse_bundle(&download.into_bytes().unwrap()).unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();

        assert_eq!(summary.tables_processed, 3);
        assert_eq!(summary.rows_updated, 6);
        assert!(summary.warnings.is_empty());
        assert_eq!(snapshot(&store, "ps_category_lang"), before);
    }

    #[test]
    fn edited_values_are_applied_by_key() {
        let store = shop_store();
        let mut bundle = export_language(&store, &DatabaseConfig::default(), 1).unwrap();
        let products = bundle.get_mut("ps_product_lang").unwrap();
        for row in &mut products.rows {
            if row["id_product"] == ColumnValue::Integer(2) {
                row.insert("description".into(), ColumnValue::Text("<b>Gypsum</b>".into()));
            }
        }

        import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();
        let rows = store.fetch_rows("ps_product_lang", "id_lang", 1).unwrap();
        let drywall = rows
            .iter()
            .find(|r| r["id_product"] == ColumnValue::Integer(2))
            .unwrap();
        assert_eq!(drywall["description"], ColumnValue::Text("<b>Gypsum</b>".into()));
        // Italian row with the same product id is untouched.
        let italian = store.fetch_rows("ps_product_lang", "id_lang", 2).unwrap();
        assert_eq!(italian[0]["name"], ColumnValue::Text("Telaio".into()));
    }

    #[test]
    fn import_never_inserts() {
        let store = shop_store();
        let bundle = parse_bundle(
            br#"{"ps_product_lang": {"primary_keys": ["id_product", "id_shop", "id_lang"],
                 "rows": [{"id_product": 99, "id_shop": 1, "id_lang": 1, "name": "Ghost"}]}}"#,
        )
        .unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();
        assert_eq!(summary.rows_updated, 0);
        assert_eq!(store.count_rows("ps_product_lang", "id_lang", 1).unwrap(), 2);
    }

    #[test]
    fn incomplete_rows_and_unknown_names_are_skipped() {
        let store = shop_store();
        let bundle = parse_bundle(
            br#"{
                "ps_product_lang": {"primary_keys": ["id_product", "id_shop", "id_lang"], "rows": [
                    {"id_product": 1, "id_lang": 1, "name": "no shop"},
                    {"id_product": 1, "id_shop": 1, "id_lang": 1},
                    {"id_product": 1, "id_shop": 1, "id_lang": 1, "name": "Frame", "bogus\"; --": 1}
                ]},
                "ps_missing_lang": {"primary_keys": ["id"], "rows": [{"id": 1, "x": 2}]},
                "ps_category_lang": {"primary_keys": ["nope"], "rows": [{"nope": 1, "name": "x"}]},
                "ps_log_lang": {"primary_keys": [], "rows": [{"id_log": 1, "message": "x"}]}
            }"#,
        )
        .unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();

        assert_eq!(summary.tables_processed, 1);
        assert_eq!(summary.rows_updated, 1);
        assert_eq!(summary.skipped_rows, 5);
        assert_eq!(summary.warnings.len(), 4);
        assert!(summary.warnings.iter().any(|w| w.contains("ps_missing_lang")));
        assert!(summary.warnings.iter().any(|w| w.contains("bogus")));
    }

    #[test]
    fn keys_not_matching_the_schema_skip_the_table() {
        let store = shop_store();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE ps_note_lang (k TEXT, id_lang INTEGER, body TEXT);
                 INSERT INTO ps_note_lang VALUES ('a', 1, 'one'), ('b', 1, 'two');",
            )
            .unwrap();
        let bundle = parse_bundle(
            br#"{
                "ps_product_lang": {"primary_keys": ["id_lang"], "rows": [{"id_lang": 1, "name": "X"}]},
                "ps_note_lang": {"primary_keys": ["k", "id_lang"], "rows": [{"k": "a", "id_lang": 1, "body": "X"}]}
            }"#,
        )
        .unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();

        assert_eq!(summary.tables_processed, 0);
        assert_eq!(summary.rows_updated, 0);
        assert_eq!(summary.skipped_rows, 2);
        assert!(summary.warnings.iter().any(|w| w.contains("do not match the schema")));
        assert!(summary.warnings.iter().any(|w| w.contains("ps_note_lang has no primary key")));

        let products = store.fetch_rows("ps_product_lang", "id_lang", 1).unwrap();
        assert!(products
            .iter()
            .all(|row| row["name"] != ColumnValue::Text("X".into())));
        let notes = store.fetch_rows("ps_note_lang", "id_lang", 1).unwrap();
        assert!(notes.iter().all(|row| row["body"] != ColumnValue::Text("X".into())));
    }

    #[test]
    fn key_order_in_the_file_does_not_matter() {
        let store = shop_store();
        let bundle = parse_bundle(
            br#"{"ps_product_lang": {"primary_keys": ["id_lang", "id_product", "id_shop"],
                 "rows": [{"id_product": 2, "id_shop": 1, "id_lang": 1, "name": "Plasterboard"}]}}"#,
        )
        .unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();
        assert_eq!(summary.rows_updated, 1);
    }

    #[test]
    fn only_localized_export_tables_are_updated() {
        let store = shop_store();
        let bundle = parse_bundle(
            br#"{
                "ps_product": {"primary_keys": ["id_product"], "rows": [{"id_product": 1, "price": 0.0}]},
                "ps_lang": {"primary_keys": ["id_lang"], "rows": [{"id_lang": 1, "locale": "xx-XX"}]},
                "ps_badge_lang": {"primary_keys": [], "rows": [{"id_badge": 1, "name": "Lead"}]}
            }"#,
        )
        .unwrap();
        let summary = import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();

        assert_eq!(summary.tables_processed, 0);
        assert_eq!(summary.rows_updated, 0);
        assert_eq!(
            summary
                .warnings
                .iter()
                .filter(|w| w.starts_with("Unknown table"))
                .count(),
            3
        );

        let price: f64 = store
            .connection()
            .query_row("SELECT price FROM ps_product WHERE id_product = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(price, 9.5);
        let catalog = store.load_language_catalog("ps_lang").unwrap();
        assert_eq!(catalog.by_id(1).map(|l| l.locale.as_str()), Some("en-US"));
    }

    #[test]
    fn wrong_shape_is_invalid_format() {
        for input in [&b"[1, 2]"[..], b"{\"t\": {\"rows\": 5}}", b"not json"] {
            assert!(matches!(parse_bundle(input), Err(BundleError::InvalidFormat(_))));
        }
    }

    proptest! {
        #[test]
        fn round_trip_keeps_arbitrary_text(names in proptest::collection::vec(".{0,40}", 2)) {
            let store = shop_store();
            for (id, name) in [1i64, 2].iter().zip(names.iter()) {
                store
                    .update_row(
                        "ps_product_lang",
                        &[
                            ("id_product".into(), ColumnValue::Integer(*id)),
                            ("id_shop".into(), ColumnValue::Integer(1)),
                            ("id_lang".into(), ColumnValue::Integer(1)),
                        ],
                        &[("name".into(), ColumnValue::Text(name.clone()))],
                    )
                    .unwrap();
            }
            let before = snapshot(&store, "ps_product_lang");

            let download = export_download(&store, &DatabaseConfig::default(), 1).unwrap();
            let bundle = parse_bundle(&download.into_bytes().unwrap()).unwrap();
            import_bundle(&store, &DatabaseConfig::default(), &bundle).unwrap();

            prop_assert_eq!(snapshot(&store, "ps_product_lang"), before);
        }
    }
}
