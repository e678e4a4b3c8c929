//! Background completion refresh
//!
//! Introspects the schema and search path of a connection on the worker pool
//! and hands the finished index over a oneshot channel. A failed refresh
//! delivers nothing; whatever index is installed stays in place.

use super::{CompleterRegistry, CompletionIndex};
use crate::connection::Connection;
use crate::db::Session;
use crate::error::DbResult;
use crate::pool::WorkerPool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CompletionRefresher {
    pool: WorkerPool,
}

impl CompletionRefresher {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Build a fresh index for `connection` in the background.
    ///
    /// The receiver yields the index once on success and errors (sender
    /// dropped) if introspection fails.
    pub fn refresh<S: Session>(&self, connection: Arc<Connection<S>>) -> oneshot::Receiver<CompletionIndex> {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(async move {
            let start = Instant::now();
            match build_index(&connection).await {
                Ok(index) => {
                    tracing::debug!(
                        db = %connection.target(),
                        relations = index.schema_tree().relation_count(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "completions refreshed"
                    );
                    // receiver gone means nobody wants this index anymore
                    let _ = tx.send(index);
                }
                Err(e) => {
                    tracing::warn!(db = %connection.target(), error = %e, "completion refresh failed");
                }
            }
        });
        rx
    }

    /// Refresh and publish the result into `registry`.
    ///
    /// The returned handle resolves to true when an index was installed.
    /// Racing refreshes for the same target each install; the last one wins.
    pub fn refresh_and_install<S: Session>(
        &self,
        connection: Arc<Connection<S>>,
        registry: Arc<CompleterRegistry>,
    ) -> JoinHandle<bool> {
        let target = connection.target().clone();
        let rx = self.refresh(connection);
        tokio::spawn(async move {
            match rx.await {
                Ok(index) => {
                    registry.swap(&target, index);
                    true
                }
                Err(_) => false,
            }
        })
    }
}

#[tracing::instrument(skip_all, fields(db = %connection.target()))]
async fn build_index<S: Session>(connection: &Connection<S>) -> DbResult<CompletionIndex> {
    let tree = connection.session().load_schema().await?;
    let search_path = connection.session().current_search_path().await?;
    connection.set_search_path(search_path.clone());
    Ok(CompletionIndex::build(tree, search_path))
}
