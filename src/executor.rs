//! Query execution
//!
//! Runs a batch of statements on a buffer's connection, streaming each
//! result to a sink as soon as it is produced. After the batch the executed
//! statements are inspected for side effects: DDL triggers a completion
//! refresh, a search-path change updates the connection and its completer.

use crate::completion::{CompleterRegistry, CompletionRefresher};
use crate::connection::Connection;
use crate::db::Session;
use crate::db::types::StatementResult;
use crate::error::DbError;
use crate::history::QueryHistory;
use crate::sql::{PostgresClassifier, StatementClassifier, split_statements};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// One entry in a run's result stream
#[derive(Debug, Clone)]
pub enum QueryEvent {
    /// A statement finished
    Result(StatementResult),
    /// The batch stopped on this error; always the last event
    Error(String),
}

/// How a batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success { executed: usize },
    Failure { executed: usize, message: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    /// Statements that completed before the batch ended
    pub fn executed(&self) -> usize {
        match self {
            RunOutcome::Success { executed } | RunOutcome::Failure { executed, .. } => *executed,
        }
    }
}

#[derive(Clone)]
pub struct QueryExecutor {
    completers: Arc<CompleterRegistry>,
    refresher: CompletionRefresher,
    classifier: Arc<dyn StatementClassifier>,
    history: Option<Arc<Mutex<QueryHistory>>>,
}

impl QueryExecutor {
    pub fn new(completers: Arc<CompleterRegistry>, refresher: CompletionRefresher) -> Self {
        Self {
            completers,
            refresher,
            classifier: Arc::new(PostgresClassifier),
            history: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StatementClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Record successfully executed statements into `history`
    pub fn with_history(mut self, history: Arc<Mutex<QueryHistory>>) -> Self {
        self.history = Some(history);
        self
    }

    /// Run `sql` on `connection`.
    ///
    /// With `selection` set the text is sent as one unit; otherwise it is
    /// split into statements first. Execution stops at the first error. A
    /// dropped receiver does not stop the batch.
    pub async fn run<S: Session>(
        &self,
        connection: Arc<Connection<S>>,
        sql: &str,
        selection: bool,
        sink: mpsc::Sender<QueryEvent>,
    ) -> RunOutcome {
        let statements = if selection {
            let trimmed = sql.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        } else {
            split_statements(sql)
        };

        let start = Instant::now();
        let mut executed: Vec<&str> = Vec::with_capacity(statements.len());
        let mut failure = None;

        for statement in &statements {
            match connection.session().execute(statement).await {
                Ok(result) => {
                    executed.push(statement);
                    deliver(&sink, QueryEvent::Result(result)).await;
                }
                Err(e) => {
                    let message = error_text(&e);
                    deliver(&sink, QueryEvent::Error(message.clone())).await;
                    failure = Some(message);
                    break;
                }
            }
        }

        tracing::debug!(
            db = %connection.target(),
            statements = statements.len(),
            executed = executed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch finished"
        );

        if let Some(history) = &self.history {
            let mut history = history.lock();
            for statement in &executed {
                history.push(statement);
            }
        }

        self.after_run(&connection, &executed).await;

        match failure {
            None => RunOutcome::Success {
                executed: executed.len(),
            },
            Some(message) => RunOutcome::Failure {
                executed: executed.len(),
                message,
            },
        }
    }

    async fn after_run<S: Session>(&self, connection: &Arc<Connection<S>>, executed: &[&str]) {
        let target = connection.target();

        if executed.iter().any(|s| self.classifier.is_schema_mutating(s)) {
            tracing::debug!(db = %target, "schema changed, refreshing completions");
            self.refresher
                .refresh_and_install(Arc::clone(connection), Arc::clone(&self.completers));
        }

        if executed.iter().any(|s| self.classifier.is_search_path_changing(s)) {
            match connection.session().current_search_path().await {
                Ok(path) => {
                    tracing::debug!(db = %target, search_path = ?path, "search path changed");
                    connection.set_search_path(path.clone());
                    self.completers.set_search_path(target, path);
                }
                Err(e) => tracing::warn!(db = %target, error = %e, "could not read search_path"),
            }
        }
    }
}

async fn deliver(sink: &mpsc::Sender<QueryEvent>, event: QueryEvent) {
    if sink.send(event).await.is_err() {
        tracing::trace!("result sink closed");
    }
}

/// Engine message without the error-kind prefix
fn error_text(e: &DbError) -> String {
    match e {
        DbError::QueryFailed(message)
        | DbError::ConnectionFailed(message)
        | DbError::SchemaLoadFailed(message) => message.clone(),
        DbError::NotConnected => e.to_string(),
    }
}
