//! Error types for pgsense
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.
//! Background failures are converted into state (status labels, sink events)
//! rather than being raised into the editor's call stack.

use std::io;

/// Main error type for the pgsense crate
#[derive(Debug, thiserror::Error)]
pub enum PgsenseError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A cached or fresh connect failure for a buffer
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// REPL integration errors
    #[error("REPL error: {0}")]
    Repl(String),
}

/// Database operation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Schema introspection failed
    #[error("Schema loading failed: {0}")]
    SchemaLoadFailed(String),

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found or unreadable
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A failed connect attempt, cached in the connection registry.
///
/// Cloneable so every caller awaiting the same attempt receives it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not connect to {label}: {message}")]
pub struct ConnectError {
    /// Password-free label of the target
    pub label: String,
    /// Driver message
    pub message: String,
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::NotFound(e.to_string())
    }
}

/// Specialized Result type for pgsense operations
pub type Result<T> = std::result::Result<T, PgsenseError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = ConnectError {
            label: "app@db:5432/main".to_string(),
            message: "timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not connect to app@db:5432/main: timed out"
        );
    }

    #[test]
    fn test_db_error_wraps_into_top_level() {
        let err: PgsenseError = DbError::NotConnected.into();
        assert_eq!(err.to_string(), "Database error: Not connected to database");
    }
}
