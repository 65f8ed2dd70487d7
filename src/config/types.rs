//! Configuration types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

impl Config {
    /// Load a single YAML config file, filling unspecified fields with defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }
}

/// Destination database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file of the destination blog.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("blog-import/blog.db")
}

/// Import policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Setting keys an import may never overwrite.
    #[serde(default = "default_protected_settings")]
    pub protected_settings: Vec<String>,

    /// Role for imported users that arrive without a role association.
    #[serde(default = "default_role")]
    pub default_role: String,

    /// Role an imported owner is demoted to when the destination already has one.
    #[serde(default = "default_owner_fallback_role")]
    pub owner_fallback_role: String,

    /// Status given to newly inserted users.
    #[serde(default = "default_new_user_status")]
    pub new_user_status: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            protected_settings: default_protected_settings(),
            default_role: default_role(),
            owner_fallback_role: default_owner_fallback_role(),
            new_user_status: default_new_user_status(),
        }
    }
}

impl ImportConfig {
    pub fn is_protected(&self, key: &str) -> bool {
        self.protected_settings.iter().any(|k| k == key)
    }
}

fn default_protected_settings() -> Vec<String> {
    [
        "active_theme",
        "active_apps",
        "installed_apps",
        "db_hash",
        "next_update_check",
        "is_private",
        "password",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_role() -> String {
    "Author".to_string()
}

fn default_owner_fallback_role() -> String {
    "Administrator".to_string()
}

fn default_new_user_status() -> String {
    "locked".to_string()
}
