//! User settings and preferences
//!
//! Manages settings stored in ~/.pgsense/config.toml

use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// URL used when a buffer does not carry its own
    #[serde(default)]
    pub default_url: Option<String>,

    #[serde(default = "default_true")]
    pub autocomplete: bool,

    #[serde(default)]
    pub table_style: TableStyle,

    /// Upper bound on concurrently running connects, refreshes and queries
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_column_width")]
    pub max_column_width: usize,

    /// Command template for opening an external CLI; `{url}` is substituted
    #[serde(default = "default_system_cmd")]
    pub system_cmd: String,

    /// Tracing filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub save_recent: bool,

    #[serde(default)]
    pub recent_limit: Option<usize>,

    #[serde(default = "default_history_size")]
    pub history_size: usize,

    #[serde(default = "default_true")]
    pub save_history: bool,
}

/// Table layout used when rendering result sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    /// psql-like: ` a | b ` with a `---+---` separator
    #[default]
    Psql,
    /// Boxed with `+---+` borders
    Ascii,
    /// Columns separated by whitespace only
    Plain,
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    4
}

fn default_max_column_width() -> usize {
    80
}

fn default_system_cmd() -> String {
    "pgcli {url}".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_history_size() -> usize {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_url: None,
            autocomplete: default_true(),
            table_style: TableStyle::default(),
            max_workers: default_max_workers(),
            max_column_width: default_max_column_width(),
            system_cmd: default_system_cmd(),
            log_level: default_log_level(),
            save_recent: default_true(),
            recent_limit: None,
            history_size: default_history_size(),
            save_history: default_true(),
        }
    }
}

impl Settings {
    /// Worker cap, never below one
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Render the external CLI command for `url`
    pub fn cli_command(&self, url: &str) -> String {
        self.system_cmd.replace("{url}", url)
    }
}

/// Load settings from ~/.pgsense/config.toml, falling back to defaults
pub fn load_settings() -> ConfigResult<Settings> {
    let path = super::config_dir()?.join("config.toml");
    load_settings_from(&path)
}

pub fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
