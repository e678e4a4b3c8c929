//! Editor-facing facade
//!
//! `Workspace` wires the registries, refresher, executor and worker pool
//! together and exposes the handful of operations an editor integration
//! calls from its event handlers. Background failures never surface as
//! errors here: connect failures become a buffer status, query failures
//! become the last event of the run's stream.

use crate::completion::{CompleterRegistry, CompletionRefresher, Suggestion};
use crate::config::{ConnectionTarget, Settings};
use crate::connection::{
    BufferId, Connection, ConnectionRegistry, ConnectionStatus, StatusReporter, TracingReporter,
};
use crate::db::Driver;
use crate::error::{ConfigError, DbError, PgsenseError, Result};
use crate::executor::{QueryEvent, QueryExecutor, RunOutcome};
use crate::history::{QueryHistory, RecentTargets};
use crate::pool::WorkerPool;
use crate::repl::{ReplHost, ReplSession};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 64;

/// A query run in progress
pub struct QueryRun {
    /// Results in statement order; an error, if any, is the last event
    pub events: mpsc::Receiver<QueryEvent>,
    pub outcome: JoinHandle<RunOutcome>,
}

pub struct Workspace<D: Driver> {
    settings: Settings,
    pool: WorkerPool,
    connections: Arc<ConnectionRegistry<D>>,
    completers: Arc<CompleterRegistry>,
    refresher: CompletionRefresher,
    executor: QueryExecutor,
    recent: Mutex<RecentTargets>,
    history: Arc<Mutex<QueryHistory>>,
    repl_host: Option<Arc<dyn ReplHost<D::Session>>>,
}

/// Builder for [`Workspace`]
pub struct WorkspaceBuilder<D: Driver> {
    driver: D,
    settings: Settings,
    reporter: Arc<dyn StatusReporter>,
    repl_host: Option<Arc<dyn ReplHost<D::Session>>>,
    persist: bool,
}

impl<D: Driver> WorkspaceBuilder<D> {
    pub fn reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn repl_host(mut self, host: Arc<dyn ReplHost<D::Session>>) -> Self {
        self.repl_host = Some(host);
        self
    }

    /// Keep recent targets and query history in memory only
    pub fn ephemeral(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn build(self) -> Workspace<D> {
        let settings = self.settings;
        let pool = WorkerPool::new(settings.workers());
        let connections = Arc::new(ConnectionRegistry::with_reporter(
            Arc::new(self.driver),
            pool.clone(),
            self.reporter,
        ));
        let completers = Arc::new(CompleterRegistry::new());
        let refresher = CompletionRefresher::new(pool.clone());

        let recent = if self.persist && settings.save_recent {
            RecentTargets::load(settings.recent_limit)
        } else {
            RecentTargets::new(settings.recent_limit)
        };
        let history = if self.persist && settings.save_history {
            QueryHistory::load(settings.history_size)
        } else {
            QueryHistory::new(settings.history_size)
        };
        let history = Arc::new(Mutex::new(history));

        let executor = QueryExecutor::new(Arc::clone(&completers), refresher.clone())
            .with_history(Arc::clone(&history));

        tracing::debug!(workers = pool.size(), "workspace ready");
        Workspace {
            settings,
            pool,
            connections,
            completers,
            refresher,
            executor,
            recent: Mutex::new(recent),
            history,
            repl_host: self.repl_host,
        }
    }
}

impl<D: Driver> Workspace<D> {
    pub fn builder(driver: D, settings: Settings) -> WorkspaceBuilder<D> {
        WorkspaceBuilder {
            driver,
            settings,
            reporter: Arc::new(TracingReporter),
            repl_host: None,
            persist: true,
        }
    }

    pub fn new(driver: D, settings: Settings) -> Self {
        Self::builder(driver, settings).build()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn completers(&self) -> &Arc<CompleterRegistry> {
        &self.completers
    }

    pub fn history(&self) -> &Arc<Mutex<QueryHistory>> {
        &self.history
    }

    /// Target for `url`, falling back to the configured default URL
    pub fn resolve_target(&self, url: Option<&str>) -> Result<ConnectionTarget> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .or(self.settings.default_url.as_deref())
            .ok_or_else(|| ConfigError::Invalid("no database URL for this buffer".to_string()))?;
        Ok(ConnectionTarget::from_url(url)?)
    }

    /// Connect `buffer` if it has no connection yet.
    ///
    /// On first sight of a target the completer gets a placeholder right
    /// away and a background refresh replaces it with the real index.
    /// If the buffer is forgotten while connecting, the finished connection
    /// is returned but nothing is installed or recorded for it.
    pub async fn ensure_connected(
        &self,
        buffer: &BufferId,
        url: Option<&str>,
    ) -> Result<Arc<Connection<D::Session>>> {
        let target = self.resolve_target(url)?;
        let fresh = self.connections.get(buffer).is_none();
        let connection = self.connections.ensure_connected(buffer, &target).await?;

        if !self.connections.is_current(buffer, &connection) {
            tracing::debug!(%buffer, db = %connection.label(), "connection superseded, skipping setup");
            return Ok(connection);
        }
        if self.completers.ensure_placeholder(connection.target()) {
            self.refresher
                .refresh_and_install(Arc::clone(&connection), Arc::clone(&self.completers));
        }
        if fresh {
            self.recent.lock().record(connection.target());
        }
        Ok(connection)
    }

    /// Fire-and-forget variant of [`ensure_connected`](Self::ensure_connected).
    ///
    /// The handle resolves to the buffer's status once the attempt settles.
    pub fn connect_in_background(
        self: &Arc<Self>,
        buffer: BufferId,
        url: Option<String>,
    ) -> JoinHandle<ConnectionStatus> {
        let workspace = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = workspace.ensure_connected(&buffer, url.as_deref()).await {
                tracing::debug!(%buffer, error = %e, "background connect did not complete");
            }
            workspace.status_of(&buffer)
        })
    }

    /// Rebuild the completion index of the buffer's target in the background
    ///
    /// # Errors
    /// `DbError::NotConnected` when the buffer has no live connection
    pub fn refresh_completions(&self, buffer: &BufferId) -> Result<JoinHandle<bool>> {
        let connection = self
            .connections
            .get(buffer)
            .ok_or(PgsenseError::Database(DbError::NotConnected))?;
        self.completers.ensure_placeholder(connection.target());
        Ok(self
            .refresher
            .refresh_and_install(connection, Arc::clone(&self.completers)))
    }

    /// Drop the buffer's connection so the next ensure reconnects
    pub fn forget(&self, buffer: &BufferId) -> bool {
        self.connections.forget(buffer)
    }

    /// Ranked suggestions for the buffer's text at byte offset `cursor`
    pub fn get_completions(&self, buffer: &BufferId, text: &str, cursor: usize) -> Vec<Suggestion> {
        if !self.settings.autocomplete {
            return Vec::new();
        }
        let Some(connection) = self.connections.get(buffer) else {
            tracing::trace!(%buffer, "no connection, no completions");
            return Vec::new();
        };
        self.completers
            .get(connection.target())
            .map(|index| index.complete(text, cursor))
            .unwrap_or_default()
    }

    /// Run `sql` on the buffer's connection in the background.
    ///
    /// # Errors
    /// `DbError::NotConnected` when the buffer has no live connection
    pub fn run_query(&self, buffer: &BufferId, sql: &str, selection: bool) -> Result<QueryRun> {
        let connection = self
            .connections
            .get(buffer)
            .ok_or(PgsenseError::Database(DbError::NotConnected))?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let executor = self.executor.clone();
        let sql = sql.to_string();
        let outcome = self
            .pool
            .spawn(async move { executor.run(connection, &sql, selection, tx).await });
        Ok(QueryRun {
            events: rx,
            outcome,
        })
    }

    /// Recently used URLs followed by `extras` not already listed
    pub fn recent_targets(&self, extras: &[String]) -> Vec<String> {
        self.recent.lock().list(extras)
    }

    pub fn status_of(&self, buffer: &BufferId) -> ConnectionStatus {
        self.connections.status_of(buffer)
    }

    /// External CLI command for the buffer's target (or the default URL)
    pub fn cli_command(&self, buffer: &BufferId) -> Option<String> {
        let url = match self.connections.get(buffer) {
            Some(connection) => connection.target().to_url(),
            None => self.settings.default_url.clone()?,
        };
        Some(self.settings.cli_command(&url))
    }

    /// Hand a REPL session for the buffer to the configured host
    pub fn open_repl(&self, buffer: &BufferId) -> Result<()> {
        let host = self
            .repl_host
            .as_ref()
            .ok_or_else(|| PgsenseError::Repl("no REPL host configured".to_string()))?;
        let connection = self
            .connections
            .get(buffer)
            .ok_or(PgsenseError::Database(DbError::NotConnected))?;
        host.open(ReplSession::new(
            connection,
            Arc::clone(&self.completers),
            self.executor.clone(),
            Arc::clone(&self.history),
            self.settings.table_style,
            self.settings.max_column_width,
        ))
    }

    pub fn shutdown(&self) {
        tracing::debug!("workspace shutting down");
        self.connections.shutdown();
        self.completers.shutdown();
    }
}
