//! Destination routing for staged translation files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::MarkerConfig;
use crate::context::{OperationContext, RootPaths};

/// Extensions the distributor accepts: translation catalogs, templates and scripts.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["xlf", "tpl", "php"];

/// Extension of translation catalogs, the only kind the exporter collects.
pub const TRANSLATION_EXTENSION: &str = "xlf";

/// Case-sensitive, like the shop's own loaders.
pub fn is_accepted_extension(ext: &str) -> bool {
    ACCEPTED_EXTENSIONS.contains(&ext)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Auto,
    Theme,
    Core,
}

impl TargetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Theme => "theme",
            Self::Core => "core",
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(Self::Auto),
            "theme" => Ok(Self::Theme),
            "core" => Ok(Self::Core),
            other => Err(format!("unknown target type: {other}")),
        }
    }
}

/// Where core translations live on the target installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreLayout {
    /// `<shop-root>/translations/<iso>`
    Modern,
    /// `<shop-root>/app/Resources/translations/<iso>`
    Legacy,
}

impl CoreLayout {
    /// Single directory-existence probe; callers run it once per distribution.
    pub fn detect(paths: &RootPaths) -> Self {
        if paths.modern_core_root().is_dir() {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

/// Resolves destination directories for one run.
///
/// Holds no mutable state: the same inputs always produce the same output.
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    paths: &'a RootPaths,
    theme_name: &'a str,
    markers: &'a MarkerConfig,
    layout: CoreLayout,
}

impl<'a> Classifier<'a> {
    pub fn new(
        paths: &'a RootPaths,
        theme_name: &'a str,
        markers: &'a MarkerConfig,
        layout: CoreLayout,
    ) -> Self {
        Self {
            paths,
            theme_name,
            markers,
            layout,
        }
    }

    /// Builds a classifier for `ctx`, probing the core layout on disk.
    pub fn for_context(ctx: &'a OperationContext) -> Self {
        let layout = CoreLayout::detect(&ctx.paths);
        Self::new(&ctx.paths, &ctx.theme_name, &ctx.markers, layout)
    }

    pub fn layout(&self) -> CoreLayout {
        self.layout
    }

    /// Destination directory for a staged file.
    ///
    /// `relative_path` is the file's path inside the archive, with `/` separators.
    pub fn classify(
        &self,
        relative_path: &str,
        filename: &str,
        mode: TargetMode,
        iso_code: &str,
    ) -> PathBuf {
        match resolve_scope(relative_path, filename, mode, self.markers) {
            Scope::Theme => self.theme_dir(iso_code),
            Scope::Core => self.core_dir(iso_code),
        }
    }

    pub fn theme_dir(&self, iso_code: &str) -> PathBuf {
        self.paths.theme_translations(self.theme_name, iso_code)
    }

    pub fn core_dir(&self, iso_code: &str) -> PathBuf {
        match self.layout {
            CoreLayout::Modern => self.paths.modern_core_translations(iso_code),
            CoreLayout::Legacy => self.paths.legacy_core_translations(iso_code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Theme,
    Core,
}

fn resolve_scope(
    relative_path: &str,
    filename: &str,
    mode: TargetMode,
    markers: &MarkerConfig,
) -> Scope {
    match mode {
        TargetMode::Theme => Scope::Theme,
        TargetMode::Core => Scope::Core,
        TargetMode::Auto => {
            if relative_path.contains(&markers.theme_path_token)
                || filename.starts_with(&markers.shop_prefix)
            {
                Scope::Theme
            } else if relative_path.contains(&markers.core_path_token)
                || filename.starts_with(&markers.admin_prefix)
            {
                Scope::Core
            } else {
                Scope::Theme
            }
        }
    }
}

/// Relative path of `path` under `root` with `/` separators.
pub fn archive_relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
