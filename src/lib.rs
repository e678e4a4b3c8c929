//! pgsense - connection and completion lifecycle for PostgreSQL editor integrations
//!
//! pgsense sits between an editor surface and a PostgreSQL server. It keeps
//! one session per editor buffer, one schema-aware completion index per
//! distinct database URL, and runs SQL batches on a bounded background pool
//! so the editor never blocks on the network.
//!
//! # Architecture
//!
//! - [`config`]: Connection targets parsed from URLs, and user settings
//! - [`connection`]: Per-buffer connections and their status
//! - [`completion`]: Completion indexes, their registry and background refresh
//! - [`executor`]: Batch execution with streamed results and side effects
//! - [`history`]: Recently used targets and executed statements
//! - [`sql`]: Statement splitting, classification and result formatting
//! - [`db`]: Engine interfaces and the PostgreSQL driver
//! - [`workspace`]: The facade an editor integration talks to
//!
//! # Example
//!
//! ```no_run
//! use pgsense::Workspace;
//! use pgsense::config::Settings;
//! use pgsense::connection::BufferId;
//! use pgsense::db::postgres::PostgresDriver;
//!
//! # async fn example() -> pgsense::Result<()> {
//! let workspace = Workspace::new(PostgresDriver, Settings::default());
//! let buffer = BufferId::from("queries.sql");
//!
//! workspace
//!     .ensure_connected(&buffer, Some("postgres://app@localhost/shop"))
//!     .await?;
//!
//! let text = "SELECT * FROM ord";
//! for s in workspace.get_completions(&buffer, text, text.len()) {
//!     println!("{} ({})", s.text, s.display);
//! }
//!
//! let mut run = workspace.run_query(&buffer, "SELECT 1; SELECT 2", false)?;
//! while let Some(event) = run.events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod executor;
pub mod history;
pub mod logging;
pub mod pool;
pub mod repl;
pub mod sql;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, ConnectError, DbError, PgsenseError, Result};
pub use workspace::Workspace;
