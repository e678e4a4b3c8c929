//! Engine interfaces
//!
//! A `Driver` opens sessions; a `Session` executes single statements and
//! answers introspection queries. Both are consumed as opaque services: the
//! orchestration layer never looks at the wire protocol.

use crate::config::ConnectionTarget;
use crate::db::schema::SchemaTree;
use crate::db::types::StatementResult;
use crate::error::DbResult;
use std::future::Future;

/// Opens sessions against a target
pub trait Driver: Send + Sync + 'static {
    type Session: Session;

    /// Establish a session
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` if the server is unreachable or
    /// rejects the credentials
    fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> impl Future<Output = DbResult<Self::Session>> + Send;
}

/// A live session
pub trait Session: Send + Sync + 'static {
    /// Execute exactly one statement
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` with the engine's message
    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<StatementResult>> + Send;

    /// Current `search_path`, resolved to existing schema names in order
    fn current_search_path(&self) -> impl Future<Output = DbResult<Vec<String>>> + Send;

    /// Schemas, relations, columns and functions visible to the session
    ///
    /// # Errors
    /// Returns `DbError::SchemaLoadFailed` if introspection fails
    fn load_schema(&self) -> impl Future<Output = DbResult<SchemaTree>> + Send;
}
