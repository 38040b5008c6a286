use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use translation_importer_core::{
    clone_language, export_language_download, export_translations, import_archive, import_bundle,
    list_runs, parse_bundle, restore_run, Download, ExportMode, ImportRequest, ImporterConfig,
    OperationContext, OperationLog, SqliteStore, TargetMode, Upload,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Import and export shop translations", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file (YAML or JSON); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shop installation root
    #[arg(long, global = true)]
    shop_root: Option<PathBuf>,

    /// Working root holding tmp/ and backups/
    #[arg(long, global = true)]
    module_root: Option<PathBuf>,

    /// Active theme name
    #[arg(long, global = true)]
    theme: Option<String>,

    /// Shop database (SQLite)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print the run log as HTML instead of text
    #[arg(long, global = true)]
    html: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a ZIP of translation files into the shop.
    Import {
        /// Archive to import
        archive: PathBuf,
        /// auto, theme or core
        #[arg(short = 't', long, default_value = "auto")]
        target: TargetMode,
        /// Target language locale, e.g. it-IT
        #[arg(short, long)]
        iso: String,
    },

    /// Export existing translation files of one language as a ZIP.
    Export {
        /// theme or core
        #[arg(short = 't', long)]
        target: ExportMode,
        #[arg(short, long)]
        iso: String,
        /// Directory to write the archive to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Replace all localized rows of one language with copies of another.
    Clone {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
    },

    /// Export localized rows of one language as JSON.
    DbExport {
        #[arg(long)]
        lang: i64,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Apply a JSON export as updates by primary key.
    DbImport {
        /// JSON file produced by db-export
        file: PathBuf,
    },

    /// List or restore backup runs.
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    List,
    /// Copy the files of a backup run back to where they came from.
    Restore { run: String },
}

fn load_config(global: &GlobalArgs) -> Result<ImporterConfig> {
    let mut config = match &global.config {
        Some(path) => ImporterConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ImporterConfig::load_default().context("loading default config")?,
    };

    if let Some(shop_root) = &global.shop_root {
        config.paths.shop_root = shop_root.clone();
    }
    if let Some(module_root) = &global.module_root {
        config.paths.module_root = module_root.clone();
    }
    if let Some(theme) = &global.theme {
        config.paths.theme_name = theme.clone();
    }
    Ok(config)
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("opening database {}", path.display()))
}

fn require_store(store: Option<&SqliteStore>) -> Result<&SqliteStore> {
    store.context("--database is required for this command")
}

fn print_log(log: &OperationLog, html: bool) {
    if html {
        println!("{}", log.render_html());
    } else {
        println!("{}", log.render_text());
    }
}

fn save_download(download: Download, out: &Path) -> Result<PathBuf> {
    let filename = download.filename.clone();
    download
        .save_into(out)
        .with_context(|| format!("writing {} into {}", filename, out.display()))
}

fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;
    let config = load_config(global)?;

    let store = global.database.as_deref().map(open_store).transpose()?;
    let languages = match &store {
        Some(store) => store
            .load_language_catalog(&config.database.prefixed_language_table())
            .context("reading installed languages")?,
        None => Default::default(),
    };
    let ctx = OperationContext::from_config(&config).with_languages(languages);
    log::debug!("shop root {}", ctx.shop_root().display());

    match cli.command {
        Command::Import { archive, target, iso } => {
            let upload = Upload::from_path(&archive)
                .with_context(|| format!("reading {}", archive.display()))?;
            let request = ImportRequest {
                upload,
                mode: target,
                iso_code: iso,
            };
            let report = import_archive(&ctx, &request).context("import failed")?;
            print_log(&report.to_log(), global.html);
        }
        Command::Export { target, iso, out } => {
            let download = export_translations(&ctx, target, &iso)?;
            let saved = save_download(download, &out)?;
            println!("{}", saved.display());
        }
        Command::Clone { from, to } => {
            let store = require_store(store.as_ref())?;
            let report = clone_language(store, &config.database, &ctx.languages, from, to)?;
            print_log(&report.to_log(), global.html);
        }
        Command::DbExport { lang, out } => {
            let store = require_store(store.as_ref())?;
            let download = export_language_download(store, &config.database, lang)?;
            let saved = save_download(download, &out)?;
            println!("{}", saved.display());
        }
        Command::DbImport { file } => {
            let store = require_store(store.as_ref())?;
            let bytes =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let bundle = parse_bundle(&bytes)?;
            let summary = import_bundle(store, &config.database, &bundle)?;
            print_log(&summary.to_log(), global.html);
        }
        Command::Backups { action } => {
            let backups_root = ctx.paths.backups_root();
            match action {
                BackupAction::List => {
                    for run in list_runs(&backups_root)? {
                        println!("{run}");
                    }
                }
                BackupAction::Restore { run } => {
                    let outcome = restore_run(&backups_root, &run)?;
                    let mut log = OperationLog::new();
                    log.success(format!("Restored {} files from {}", outcome.restored.len(), run));
                    for path in &outcome.corrupted {
                        log.error(format!(
                            "backup of {} is corrupted, not restored",
                            path.display()
                        ));
                    }
                    print_log(&log, global.html);
                }
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
