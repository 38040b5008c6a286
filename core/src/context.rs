//! Per-invocation operation context.
//!
//! Everything the components would otherwise read from ambient shop state
//! (active theme, installed languages, filesystem roots) is captured here once
//! and passed explicitly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ImporterConfig, MarkerConfig};

static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})?$").expect("valid regex")
});

/// Returns true when `iso_code` looks like a locale (`it-IT`, `fr`, `pt_BR`).
///
/// Anything else is rejected before it is used as a directory name.
pub fn is_valid_locale(iso_code: &str) -> bool {
    LOCALE_PATTERN.is_match(iso_code)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub id: i64,
    pub iso_code: String,
    /// Full locale, e.g. `it-IT`; translation folders are named after it
    pub locale: String,
    pub name: String,
}

/// Languages installed on the shop.
///
/// An empty catalog means "unknown": lookups then accept any well-formed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
}

impl LanguageCatalog {
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn by_id(&self, id: i64) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.id == id)
    }

    pub fn by_locale(&self, locale: &str) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.locale == locale)
    }

    pub fn accepts_locale(&self, locale: &str) -> bool {
        self.is_empty() || self.by_locale(locale).is_some()
    }

    pub fn accepts_id(&self, id: i64) -> bool {
        self.is_empty() || self.by_id(id).is_some()
    }
}

/// Filesystem layout of the shop and of the module's working area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPaths {
    pub shop_root: PathBuf,
    pub module_root: PathBuf,
}

impl RootPaths {
    pub fn new(shop_root: impl Into<PathBuf>, module_root: impl Into<PathBuf>) -> Self {
        Self {
            shop_root: shop_root.into(),
            module_root: module_root.into(),
        }
    }

    /// `<module-root>/tmp`
    pub fn tmp_root(&self) -> PathBuf {
        self.module_root.join("tmp")
    }

    /// `<module-root>/backups`
    pub fn backups_root(&self) -> PathBuf {
        self.module_root.join("backups")
    }

    /// `<shop-root>/themes/<theme>/translations/<iso>`
    pub fn theme_translations(&self, theme_name: &str, iso_code: &str) -> PathBuf {
        self.shop_root
            .join("themes")
            .join(theme_name)
            .join("translations")
            .join(iso_code)
    }

    /// `<shop-root>/translations`, present on modern installations
    pub fn modern_core_root(&self) -> PathBuf {
        self.shop_root.join("translations")
    }

    /// `<shop-root>/app/Resources/translations`
    pub fn legacy_core_root(&self) -> PathBuf {
        self.shop_root.join("app").join("Resources").join("translations")
    }

    pub fn modern_core_translations(&self, iso_code: &str) -> PathBuf {
        self.modern_core_root().join(iso_code)
    }

    pub fn legacy_core_translations(&self, iso_code: &str) -> PathBuf {
        self.legacy_core_root().join(iso_code)
    }
}

#[derive(Debug, Clone)]
pub struct OperationContext {
    pub theme_name: String,
    pub languages: LanguageCatalog,
    pub paths: RootPaths,
    pub markers: MarkerConfig,
}

impl OperationContext {
    pub fn new(theme_name: impl Into<String>, paths: RootPaths) -> Self {
        Self {
            theme_name: theme_name.into(),
            languages: LanguageCatalog::default(),
            paths,
            markers: MarkerConfig::default(),
        }
    }

    pub fn from_config(config: &ImporterConfig) -> Self {
        Self {
            theme_name: config.paths.theme_name.clone(),
            languages: LanguageCatalog::default(),
            paths: RootPaths::new(&config.paths.shop_root, &config.paths.module_root),
            markers: config.markers.clone(),
        }
    }

    pub fn with_languages(mut self, languages: LanguageCatalog) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_markers(mut self, markers: MarkerConfig) -> Self {
        self.markers = markers;
        self
    }

    pub fn shop_root(&self) -> &Path {
        &self.paths.shop_root
    }
}
