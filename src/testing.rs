//! Scripted in-memory engine for unit tests
//!
//! `MockDriver` hands out sessions that share one script: the schema they
//! report, the search path, and which statements or connects fail. A
//! `CREATE TABLE` or `SET search_path` run through a session updates the
//! script the way a real server would, so refresh paths can be observed.

use crate::config::ConnectionTarget;
use crate::connection::{BufferId, ConnectionStatus, StatusReporter};
use crate::db::schema::{Column, Schema, SchemaTree, Table};
use crate::db::types::{CellValue, ColumnDef, DataType, Row, StatementResult};
use crate::db::{Driver, Session};
use crate::error::{DbError, DbResult};
use crate::sql::classifier::leading_keywords;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug)]
struct Script {
    schema: SchemaTree,
    search_path: Vec<String>,
    connect_error: Option<String>,
    connect_delay: Duration,
    schema_error: Option<String>,
    schema_gate: Option<Arc<Semaphore>>,
    query_errors: Vec<(String, String)>,
    executed: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            schema: SchemaTree {
                schemas: vec![Schema {
                    name: "public".to_string(),
                    ..Schema::default()
                }],
            },
            search_path: vec!["public".to_string()],
            connect_error: None,
            connect_delay: Duration::ZERO,
            schema_error: None,
            schema_gate: None,
            query_errors: Vec::new(),
            executed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    script: Arc<Mutex<Script>>,
    connects: Arc<AtomicUsize>,
    schema_loads: Arc<AtomicUsize>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to `schema`, creating the schema if needed
    pub fn with_table(self, schema: &str, table: &str, columns: &[&str]) -> Self {
        add_table(
            &mut self.script.lock().schema,
            schema,
            table,
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn fail_connect(&self, message: &str) {
        self.script.lock().connect_error = Some(message.to_string());
    }

    pub fn allow_connect(&self) {
        self.script.lock().connect_error = None;
    }

    pub fn connect_delay(&self, delay: Duration) {
        self.script.lock().connect_delay = delay;
    }

    /// Statements containing `fragment` fail with `message`
    pub fn fail_query(&self, fragment: &str, message: &str) {
        self.script
            .lock()
            .query_errors
            .push((fragment.to_string(), message.to_string()));
    }

    pub fn fail_schema(&self, message: &str) {
        self.script.lock().schema_error = Some(message.to_string());
    }

    /// Block schema loads until the returned gate is released
    pub fn hold_schema_loads(&self) -> SchemaGate {
        let gate = Arc::new(Semaphore::new(0));
        self.script.lock().schema_gate = Some(Arc::clone(&gate));
        SchemaGate(gate)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn schema_load_count(&self) -> usize {
        self.schema_loads.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.script.lock().executed.clone()
    }
}

/// Releases schema loads held by [`MockDriver::hold_schema_loads`]
pub struct SchemaGate(Arc<Semaphore>);

impl SchemaGate {
    pub fn release(&self) {
        self.0.close();
    }
}

impl Driver for MockDriver {
    type Session = MockSession;

    async fn connect(&self, _target: &ConnectionTarget) -> DbResult<MockSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (delay, error) = {
            let script = self.script.lock();
            (script.connect_delay, script.connect_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(message) => Err(DbError::ConnectionFailed(message)),
            None => Ok(MockSession {
                script: Arc::clone(&self.script),
                schema_loads: Arc::clone(&self.schema_loads),
            }),
        }
    }
}

#[derive(Debug)]
pub struct MockSession {
    script: Arc<Mutex<Script>>,
    schema_loads: Arc<AtomicUsize>,
}

impl Session for MockSession {
    async fn execute(&self, sql: &str) -> DbResult<StatementResult> {
        let mut script = self.script.lock();
        script.executed.push(sql.to_string());
        if let Some((_, message)) = script
            .query_errors
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(DbError::QueryFailed(message.clone()));
        }

        let words = leading_keywords(sql, 2);
        let result = match words.as_slice() {
            [c, t] if c == "CREATE" && t == "TABLE" => {
                if let Some((schema, table, columns)) = created_table(sql) {
                    add_table(&mut script.schema, &schema, &table, columns);
                }
                StatementResult::command("CREATE TABLE", 0, Duration::ZERO)
            }
            [s, ..] if s == "SET" => {
                if let Some(path) = assigned_search_path(sql) {
                    script.search_path = path;
                }
                StatementResult::command("SET", 0, Duration::ZERO)
            }
            [s, ..] if s == "SELECT" => StatementResult::rows(
                vec![ColumnDef::new("?column?", DataType::Integer)],
                vec![Row {
                    values: vec![CellValue::Integer(1)],
                }],
                Duration::ZERO,
            ),
            [first, ..] => StatementResult::command(first.clone(), 0, Duration::ZERO),
            [] => StatementResult::command("", 0, Duration::ZERO),
        };
        Ok(result)
    }

    async fn current_search_path(&self) -> DbResult<Vec<String>> {
        Ok(self.script.lock().search_path.clone())
    }

    async fn load_schema(&self) -> DbResult<SchemaTree> {
        self.schema_loads.fetch_add(1, Ordering::SeqCst);
        let gate = self.script.lock().schema_gate.clone();
        if let Some(gate) = gate {
            // closed gate means released
            let _ = gate.acquire().await;
        }
        let script = self.script.lock();
        match &script.schema_error {
            Some(message) => Err(DbError::SchemaLoadFailed(message.clone())),
            None => Ok(script.schema.clone()),
        }
    }
}

fn add_table(tree: &mut SchemaTree, schema: &str, table: &str, columns: Vec<String>) {
    let columns = columns
        .into_iter()
        .map(|name| Column {
            name,
            type_name: "text".to_string(),
        })
        .collect();
    let table = Table {
        name: table.to_string(),
        columns,
    };
    match tree.schemas.iter_mut().find(|s| s.name == schema) {
        Some(s) => s.tables.push(table),
        None => tree.schemas.push(Schema {
            name: schema.to_string(),
            tables: vec![table],
            ..Schema::default()
        }),
    }
}

/// `(schema, table, columns)` from `CREATE TABLE [schema.]name(col type, ...)`
fn created_table(sql: &str) -> Option<(String, String, Vec<String>)> {
    let name = sql.split_whitespace().nth(2)?.split('(').next()?.to_lowercase();
    let (schema, table) = match name.split_once('.') {
        Some((s, t)) => (s.to_string(), t.to_string()),
        None => ("public".to_string(), name),
    };
    let columns = match (sql.find('('), sql.rfind(')')) {
        (Some(open), Some(close)) if open < close => sql[open + 1..close]
            .split(',')
            .filter_map(|c| c.split_whitespace().next())
            .map(str::to_lowercase)
            .collect(),
        _ => Vec::new(),
    };
    Some((schema, table, columns))
}

fn assigned_search_path(sql: &str) -> Option<Vec<String>> {
    let lower = sql.to_lowercase();
    let rest = lower[lower.find("search_path")? + "search_path".len()..].trim_start();
    let rest = rest
        .strip_prefix("to")
        .or_else(|| rest.strip_prefix('='))?;
    Some(
        rest.split(',')
            .map(|s| s.trim().trim_matches('\'').trim_matches('"').to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Collects every status transition it is sent
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(BufferId, ConnectionStatus)>>,
}

impl RecordingReporter {
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.events.lock().iter().map(|(_, s)| s.clone()).collect()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&self, buffer: &BufferId, status: &ConnectionStatus) {
        self.events.lock().push((buffer.clone(), status.clone()));
    }
}

pub fn target(db: &str) -> ConnectionTarget {
    ConnectionTarget::from_url(&format!("postgres://tester@localhost/{}", db))
        .unwrap_or_else(|e| panic!("bad test url: {}", e))
}

/// Poll `cond` until it holds; panics after five seconds
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
