//! Packages existing translation catalogs of one language into a ZIP download.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::archive::{pack_flat, ArchiveError};
use crate::classifier::TRANSLATION_EXTENSION;
use crate::context::{is_valid_locale, OperationContext};
use crate::download::{Download, CONTENT_TYPE_ZIP};
use crate::time::RunStamp;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No translation files found for {mode} / {iso_code}")]
    NoFilesFound { mode: ExportMode, iso_code: String },

    #[error("Invalid language code: {0:?}")]
    InvalidLocale(String),

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Theme,
    Core,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Theme => f.write_str("theme"),
            Self::Core => f.write_str("core"),
        }
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "theme" => Ok(Self::Theme),
            "core" => Ok(Self::Core),
            other => Err(format!("unknown export type: {other}")),
        }
    }
}

/// `translations_export_<mode>_<iso>_<label>.zip`
pub fn export_filename(mode: ExportMode, iso_code: &str, label: &str) -> String {
    format!("translations_export_{mode}_{iso_code}_{label}.zip")
}

/// Directories searched for `mode`: the theme folder, or both core layouts
/// (modern first) regardless of which one the installation uses.
pub fn search_dirs(ctx: &OperationContext, mode: ExportMode, iso_code: &str) -> Vec<PathBuf> {
    match mode {
        ExportMode::Theme => vec![ctx.paths.theme_translations(&ctx.theme_name, iso_code)],
        ExportMode::Core => vec![
            ctx.paths.modern_core_translations(iso_code),
            ctx.paths.legacy_core_translations(iso_code),
        ],
    }
}

/// Every translation catalog below `dir`, sorted.
fn find_catalogs(dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        TRANSLATION_EXTENSION
    );
    let mut found = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => found.push(path),
            Ok(_) => {}
            Err(err) => log::warn!("unreadable path during export: {}", err),
        }
    }
    found.sort();
    Ok(found)
}

pub fn collect_translation_files(
    ctx: &OperationContext,
    mode: ExportMode,
    iso_code: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut files = Vec::new();
    for dir in search_dirs(ctx, mode, iso_code) {
        files.extend(find_catalogs(&dir)?);
    }
    Ok(files)
}

/// Builds the export archive and hands it back as a [`Download`].
///
/// The archive lives in the module's `tmp/` folder until the download is read
/// and dropped.
pub fn export_translations(
    ctx: &OperationContext,
    mode: ExportMode,
    iso_code: &str,
) -> Result<Download, ExportError> {
    if !is_valid_locale(iso_code) {
        return Err(ExportError::InvalidLocale(iso_code.to_string()));
    }

    let files = collect_translation_files(ctx, mode, iso_code)?;
    if files.is_empty() {
        return Err(ExportError::NoFilesFound {
            mode,
            iso_code: iso_code.to_string(),
        });
    }

    let stamp = RunStamp::now();
    let filename = export_filename(mode, iso_code, &stamp.label);
    let temp_path = ctx
        .paths
        .tmp_root()
        .join(format!("{}_{}", stamp.nonce, filename));

    let written = match pack_flat(&files, &temp_path) {
        Ok(written) => written,
        Err(err) => {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err.into());
        }
    };
    log::info!(
        "packed {} of {} translation files into {}",
        written.len(),
        files.len(),
        filename
    );

    Ok(Download::from_temp_file(CONTENT_TYPE_ZIP, filename, temp_path)?)
}
