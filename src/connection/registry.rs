//! Connection registry
//!
//! One slot per buffer. The slot is reserved under the map lock and the
//! connect runs on the worker pool; concurrent callers for the same buffer
//! await the same attempt. A failed attempt stays in its slot until the
//! buffer is forgotten, so a bad URL never turns into a retry loop.
//!
//! The attempt settles its slot and reports the final status from the pool
//! task itself, so it completes even when every caller has gone away. An
//! attempt whose slot was forgotten meanwhile stays silent.

use super::status::{ConnectionStatus, StatusReporter, TracingReporter};
use super::{BufferId, Connection};
use crate::config::ConnectionTarget;
use crate::db::{Driver, Session};
use crate::error::{ConnectError, DbError};
use crate::pool::WorkerPool;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::Instrument;

type ConnectResult<S> = Result<Arc<Connection<S>>, ConnectError>;
type Slots<S> = Arc<Mutex<HashMap<BufferId, Slot<S>>>>;

/// One connect attempt for a buffer
struct Slot<S> {
    /// Tells an attempt apart from the one that replaced it after a forget
    id: u64,
    settled: Arc<OnceCell<ConnectResult<S>>>,
    attempt: Shared<BoxFuture<'static, ConnectResult<S>>>,
}

impl<S> Slot<S> {
    fn outcome(&self) -> Option<&ConnectResult<S>> {
        self.settled.get()
    }
}

pub struct ConnectionRegistry<D: Driver> {
    driver: Arc<D>,
    pool: WorkerPool,
    reporter: Arc<dyn StatusReporter>,
    slots: Slots<D::Session>,
    next_id: AtomicU64,
}

impl<D: Driver> ConnectionRegistry<D> {
    pub fn new(driver: Arc<D>, pool: WorkerPool) -> Self {
        Self::with_reporter(driver, pool, Arc::new(TracingReporter))
    }

    pub fn with_reporter(driver: Arc<D>, pool: WorkerPool, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            driver,
            pool,
            reporter,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Connection for `buffer`, connecting on first use.
    ///
    /// An existing slot is returned as-is, including a cached failure.
    /// Call [`forget`](Self::forget) to retry or to switch targets.
    /// Dropping the returned future does not cancel the attempt.
    pub async fn ensure_connected(
        &self,
        buffer: &BufferId,
        target: &ConnectionTarget,
    ) -> ConnectResult<D::Session> {
        let attempt = {
            let mut slots = self.slots.lock();
            match slots.get(buffer) {
                Some(slot) => slot.attempt.clone(),
                None => {
                    self.reporter.report(buffer, &ConnectionStatus::Connecting);
                    let slot = self.start(buffer, target);
                    let attempt = slot.attempt.clone();
                    slots.insert(buffer.clone(), slot);
                    attempt
                }
            }
        };
        attempt.await
    }

    /// Spawn the attempt. Called with the map lock held, so the task cannot
    /// look for its slot before it has been inserted.
    fn start(&self, buffer: &BufferId, target: &ConnectionTarget) -> Slot<D::Session> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let settled = Arc::new(OnceCell::new());
        let label = target.label();
        let span = tracing::info_span!("connect", %buffer, db = %label);

        let task = {
            let driver = Arc::clone(&self.driver);
            let reporter = Arc::clone(&self.reporter);
            let slots = Arc::clone(&self.slots);
            let settled = Arc::clone(&settled);
            let buffer = buffer.clone();
            let target = target.clone();
            let label = label.clone();
            async move {
                let result = open(driver.as_ref(), target)
                    .await
                    .map(Arc::new)
                    .map_err(|e| ConnectError {
                        label: label.clone(),
                        message: e.to_string(),
                    });
                settle(&slots, &buffer, id, &settled, &result, reporter.as_ref(), label);
                result
            }
            .instrument(span)
        };
        let handle = self.pool.spawn(task);

        let attempt = async move {
            handle.await.unwrap_or_else(|join| {
                Err(ConnectError {
                    label,
                    message: join.to_string(),
                })
            })
        }
        .boxed()
        .shared();

        Slot {
            id,
            settled,
            attempt,
        }
    }

    /// Live connection for `buffer`, if it is connected
    pub fn get(&self, buffer: &BufferId) -> Option<Arc<Connection<D::Session>>> {
        match self.slots.lock().get(buffer)?.outcome() {
            Some(Ok(connection)) => Some(Arc::clone(connection)),
            _ => None,
        }
    }

    /// Whether `connection` is still the one held for `buffer`
    pub fn is_current(&self, buffer: &BufferId, connection: &Arc<Connection<D::Session>>) -> bool {
        self.get(buffer)
            .is_some_and(|current| Arc::ptr_eq(&current, connection))
    }

    pub fn status_of(&self, buffer: &BufferId) -> ConnectionStatus {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(buffer) else {
            return ConnectionStatus::Disconnected;
        };
        match slot.outcome() {
            None => ConnectionStatus::Connecting,
            Some(Ok(connection)) => ConnectionStatus::Connected(connection.label()),
            Some(Err(e)) => ConnectionStatus::Error(e.label.clone()),
        }
    }

    /// Drop the buffer's slot. An in-flight attempt finishes but is discarded.
    pub fn forget(&self, buffer: &BufferId) -> bool {
        let removed = self.slots.lock().remove(buffer).is_some();
        if removed {
            tracing::debug!(%buffer, "connection forgotten");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn shutdown(&self) {
        let mut slots = self.slots.lock();
        tracing::debug!(connections = slots.len(), "closing connections");
        slots.clear();
    }
}

async fn open<D: Driver>(driver: &D, target: ConnectionTarget) -> Result<Connection<D::Session>, DbError> {
    let session = driver.connect(&target).await?;
    let search_path = match session.current_search_path().await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "could not read search_path");
            Vec::new()
        }
    };
    Ok(Connection::new(target, session, search_path))
}

/// Record the outcome and report it, unless the slot was forgotten
fn settle<S>(
    slots: &Mutex<HashMap<BufferId, Slot<S>>>,
    buffer: &BufferId,
    id: u64,
    settled: &OnceCell<ConnectResult<S>>,
    result: &ConnectResult<S>,
    reporter: &dyn StatusReporter,
    label: String,
) {
    // settled before the check so a concurrent status_of never sees a
    // finished attempt as still connecting
    settled.set(result.clone()).ok();

    let slots = slots.lock();
    if !slots.get(buffer).is_some_and(|slot| slot.id == id) {
        tracing::debug!("attempt was forgotten, status not reported");
        return;
    }
    match result {
        Ok(_) => {
            tracing::info!("connected");
            reporter.report(buffer, &ConnectionStatus::Connected(label));
        }
        Err(e) => {
            tracing::warn!(error = %e.message, "connect failed");
            reporter.report(buffer, &ConnectionStatus::Error(label));
        }
    }
}
