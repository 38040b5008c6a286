pub mod archive;
pub mod backup;
pub mod classifier;
pub mod config;
pub mod context;
pub mod db;
pub mod distributor;
pub mod download;
pub mod exporter;
pub mod importer;
pub mod report;
mod time;

pub use archive::{is_archive_file, ArchiveError, StagedFile, StagingDir, Upload};
pub use backup::{list_runs, restore_run, BackupError, BackupManifest, BackupVault, RestoreOutcome};
pub use classifier::{Classifier, CoreLayout, TargetMode};
pub use config::{ConfigError, DatabaseConfig, ImporterConfig, MarkerConfig, PathsConfig};
pub use context::{is_valid_locale, Language, LanguageCatalog, OperationContext, RootPaths};
pub use db::bundle::{
    export_download as export_language_download, export_language, import_bundle, parse_bundle,
    BundleError, ExportBundle, ImportSummary, TableDump,
};
pub use db::cloner::{clone_language, CloneError, CloneReport, KeyPolicy};
pub use db::sqlite::SqliteStore;
pub use db::{ColumnValue, LocalizedRowStore, LocalizedTable, Row, SchemaIntrospector, StoreError};
pub use distributor::{distribute, CopyFailure, DistributionReport, MovedFile};
pub use download::{Download, CONTENT_TYPE_JSON, CONTENT_TYPE_ZIP};
pub use exporter::{export_translations, ExportError, ExportMode};
pub use importer::{import_archive, ImportError, ImportRequest};
pub use report::{OperationLog, Severity};
pub use time::{format_run_timestamp, RunStamp};
