//! Configuration management
//!
//! Handles connection targets parsed from database URLs and user settings.

pub mod settings;
pub mod target;

pub use settings::{Settings, TableStyle, load_settings};
pub use target::{ConnectionTarget, SslMode};

use crate::error::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Get the config directory path (~/.pgsense/)
pub fn config_dir() -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".pgsense"))
}
