//! Shared helpers for integration tests

use pgsense::config::ConnectionTarget;
use pgsense::db::Driver;
use pgsense::db::postgres::{PostgresDriver, PostgresSession};

/// Test database URL built from `TEST_DB_*`
pub fn test_url() -> String {
    let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        var("TEST_DB_USER", "test_user"),
        var("TEST_DB_PASSWORD", "test_password"),
        var("TEST_DB_HOST", "localhost"),
        var("TEST_DB_PORT", "5433"),
        var("TEST_DB_NAME", "test_db"),
    )
}

pub fn test_target() -> ConnectionTarget {
    ConnectionTarget::from_url(&test_url()).expect("valid test url")
}

/// A session, or `None` (with a note on stderr) when the database is down
pub async fn try_session() -> Option<PostgresSession> {
    let target = test_target();
    match PostgresDriver.connect(&target).await {
        Ok(session) => Some(session),
        Err(e) => {
            eprintln!("Skipping test: database not available at {} - {}", target, e);
            None
        }
    }
}

/// Schema name unique to this test process and `tag`
pub fn scratch_schema(tag: &str) -> String {
    format!("pgsense_it_{}_{}", tag, std::process::id())
}
