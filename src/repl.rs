//! Interactive REPL sessions
//!
//! A `ReplSession` bundles a buffer's connection with its completer so a
//! line-oriented front-end can prompt, run input and offer completions. The
//! front-end itself is a [`ReplHost`] supplied by the embedder; without one,
//! opening a REPL is an error.
//!
//! Up/down navigation walks the shared query history, so statements run from
//! the editor are reachable in the REPL and the other way round.

use crate::completion::{CompleterRegistry, Suggestion};
use crate::config::TableStyle;
use crate::connection::Connection;
use crate::db::Session;
use crate::error::Result;
use crate::executor::{QueryEvent, QueryExecutor};
use crate::history::QueryHistory;
use crate::sql::format_result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Front-end that takes ownership of an opened session
pub trait ReplHost<S>: Send + Sync {
    /// # Errors
    /// Implementations return `PgsenseError::Repl` when they cannot start
    fn open(&self, session: ReplSession<S>) -> Result<()>;
}

pub struct ReplSession<S> {
    connection: Arc<Connection<S>>,
    completers: Arc<CompleterRegistry>,
    executor: QueryExecutor,
    history: Arc<Mutex<QueryHistory>>,
    style: TableStyle,
    max_width: usize,
}

impl<S: Session> ReplSession<S> {
    pub fn new(
        connection: Arc<Connection<S>>,
        completers: Arc<CompleterRegistry>,
        executor: QueryExecutor,
        history: Arc<Mutex<QueryHistory>>,
        style: TableStyle,
        max_width: usize,
    ) -> Self {
        Self {
            connection,
            completers,
            executor,
            history,
            style,
            max_width,
        }
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.connection.database())
    }

    pub fn connection(&self) -> &Arc<Connection<S>> {
        &self.connection
    }

    /// Run `sql` and render every result block; errors become text
    pub async fn submit(&self, sql: &str) -> String {
        let (tx, mut rx) = mpsc::channel(32);
        let run = self.executor.run(Arc::clone(&self.connection), sql, false, tx);
        let render = async {
            let mut blocks = Vec::new();
            while let Some(event) = rx.recv().await {
                blocks.push(match event {
                    QueryEvent::Result(result) => format_result(&result, self.style, self.max_width),
                    QueryEvent::Error(message) => message,
                });
            }
            blocks
        };
        let (_, blocks) = futures::join!(run, render);
        blocks.join("\n\n")
    }

    /// Older history entry for the input line.
    ///
    /// The first step back keeps `current` as a draft; `None` at the oldest entry.
    pub fn history_back(&self, current: &str) -> Option<String> {
        self.history.lock().back(current).map(str::to_string)
    }

    /// Newer history entry, or the draft once past the newest
    pub fn history_forward(&self) -> Option<String> {
        self.history.lock().forward().map(str::to_string)
    }

    /// Completions for `line` with the cursor at byte offset `pos`
    pub fn completions(&self, line: &str, pos: usize) -> Vec<Suggestion> {
        self.completers
            .get(self.connection.target())
            .map(|index| index.complete(line, pos))
            .unwrap_or_default()
    }
}
