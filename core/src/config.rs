/// Configuration for the translation importer
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::KeyPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write config file: {0}")]
    Write(#[from] std::io::Error),
}

/// Filesystem roots of the shop installation and of this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    /// Shop installation root (holds `themes/`, `translations/`, `app/`)
    #[serde(default = "default_shop_root")]
    pub shop_root: PathBuf,

    /// Module working root (holds `tmp/` and `backups/`)
    #[serde(default = "default_module_root")]
    pub module_root: PathBuf,

    /// Active theme name
    #[serde(default = "default_theme")]
    pub theme_name: String,
}

fn default_shop_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_module_root() -> PathBuf {
    PathBuf::from("modules/translationimporter")
}

fn default_theme() -> String {
    "classic".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            shop_root: default_shop_root(),
            module_root: default_module_root(),
            theme_name: default_theme(),
        }
    }
}

/// Tokens used by auto-detect routing. Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerConfig {
    /// Substring of the archive path that routes a file to the theme
    pub theme_path_token: String,
    /// Filename prefix that routes a file to the theme
    pub shop_prefix: String,
    /// Substring of the archive path that routes a file to core
    pub core_path_token: String,
    /// Filename prefix that routes a file to core
    pub admin_prefix: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            theme_path_token: "Theme".to_string(),
            shop_prefix: "Shop".to_string(),
            core_path_token: "prestashop".to_string(),
            admin_prefix: "Admin".to_string(),
        }
    }
}

/// Database naming conventions for localized tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    #[serde(default = "default_localized_suffix")]
    pub localized_suffix: String,

    #[serde(default = "default_language_column")]
    pub language_column: String,

    /// Tables always considered by the JSON export, without the prefix
    #[serde(default = "default_seed_tables")]
    pub seed_tables: Vec<String>,

    /// Discovered tables containing one of these tokens are left out of the JSON export
    #[serde(default = "default_excluded_tokens")]
    pub excluded_tokens: Vec<String>,

    /// Table holding the language catalog, without the prefix
    #[serde(default = "default_language_table")]
    pub language_table: String,

    #[serde(default)]
    pub key_policy: KeyPolicy,
}

fn default_table_prefix() -> String {
    "ps_".to_string()
}

fn default_localized_suffix() -> String {
    "_lang".to_string()
}

fn default_language_column() -> String {
    "id_lang".to_string()
}

fn default_language_table() -> String {
    "lang".to_string()
}

pub fn default_seed_tables() -> Vec<String> {
    [
        "product_lang",
        "category_lang",
        "cms_lang",
        "cms_category_lang",
        "meta_lang",
        "attribute_lang",
        "attribute_group_lang",
        "feature_lang",
        "feature_value_lang",
        "manufacturer_lang",
        "supplier_lang",
        "carrier_lang",
        "configuration_lang",
        "order_state_lang",
        "contact_lang",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_excluded_tokens() -> Vec<String> {
    vec![
        "log".to_string(),
        "stats".to_string(),
        "connections".to_string(),
    ]
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            localized_suffix: default_localized_suffix(),
            language_column: default_language_column(),
            seed_tables: default_seed_tables(),
            excluded_tokens: default_excluded_tokens(),
            language_table: default_language_table(),
            key_policy: KeyPolicy::default(),
        }
    }
}

impl DatabaseConfig {
    /// Seed tables with the table prefix applied.
    pub fn prefixed_seed_tables(&self) -> Vec<String> {
        self.seed_tables
            .iter()
            .map(|table| format!("{}{}", self.table_prefix, table))
            .collect()
    }

    pub fn prefixed_language_table(&self) -> String {
        format!("{}{}", self.table_prefix, self.language_table)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImporterConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl ImporterConfig {
    /// Load configuration from a YAML or JSON file, picked by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json(&content)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    /// Save configuration as YAML
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `<config dir>/translation-importer/config.yaml`, when the platform has a config dir.
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("translation-importer").join("config.yaml"))
    }

    /// Load the file at [`Self::default_location`] if present, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_location() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}
