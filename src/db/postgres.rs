//! PostgreSQL driver
//!
//! Concrete implementation using tokio-postgres. Server notices raised while
//! a statement runs (`RAISE NOTICE`, implicit index creation, ...) become the
//! title of that statement's result.

use crate::config::{ConnectionTarget, SslMode};
use crate::db::provider::{Driver, Session};
use crate::db::schema::{Column, Function, Schema, SchemaTree, Table};
use crate::db::types::{CellValue, ColumnDef, DataType, Row, StatementResult};
use crate::error::{DbError, DbResult};
use crate::sql::classifier::leading_keywords;
use futures::StreamExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_postgres::types::Type;
use tokio_postgres::{AsyncMessage, Client};

/// Opens tokio-postgres sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

/// A connected tokio-postgres client
pub struct PostgresSession {
    client: Client,
    notices: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Driver for PostgresDriver {
    type Session = PostgresSession;

    #[tracing::instrument(skip(self, target), fields(db = %target))]
    async fn connect(&self, target: &ConnectionTarget) -> DbResult<PostgresSession> {
        let conn_string = target.connection_string_with_password();
        let label = target.label();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let client = match target.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                        .await
                        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                drive(connection, label, notice_tx);
                client
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                drive(connection, label, notice_tx);
                client
            }
        };

        tracing::debug!("session established");
        Ok(PostgresSession {
            client,
            notices: Mutex::new(notice_rx),
        })
    }
}

/// Run the connection on its own task, forwarding notices to the session
fn drive<S, T>(
    mut connection: tokio_postgres::Connection<S, T>,
    label: String,
    notices: mpsc::UnboundedSender<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut messages = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
        while let Some(message) = messages.next().await {
            match message {
                Ok(AsyncMessage::Notice(notice)) => {
                    // receiver gone means the session was dropped
                    notices
                        .send(format!("{}:  {}", notice.severity(), notice.message()))
                        .ok();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(db = %label, error = %e, "connection lost");
                    break;
                }
            }
        }
    });
}

impl PostgresSession {
    /// Notices received since the last call, oldest first
    fn take_notices(&self) -> Vec<String> {
        let mut rx = self.notices.lock();
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    async fn run_statement(&self, sql: &str) -> DbResult<StatementResult> {
        let start = Instant::now();
        let query_err = |e: tokio_postgres::Error| DbError::QueryFailed(pg_error_message(&e));

        let stmt = self.client.prepare(sql).await.map_err(query_err)?;

        if stmt.columns().is_empty() {
            let affected = self.client.execute(&stmt, &[]).await.map_err(query_err)?;
            return Ok(StatementResult::command(
                command_tag(sql, affected),
                affected,
                start.elapsed(),
            ));
        }

        let columns: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDef::new(col.name(), pg_type_to_datatype(col.type_())))
            .collect();

        let pg_rows = self.client.query(&stmt, &[]).await.map_err(query_err)?;
        let rows = pg_rows
            .iter()
            .map(|pg_row| Row {
                values: columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| extract_cell_value(pg_row, i, &col.data_type))
                    .collect(),
            })
            .collect();

        Ok(StatementResult::rows(columns, rows, start.elapsed()))
    }
}

impl Session for PostgresSession {
    async fn execute(&self, sql: &str) -> DbResult<StatementResult> {
        // leftovers from introspection queries belong to no statement
        self.take_notices();
        let result = self.run_statement(sql).await?;
        let notices = self.take_notices();
        Ok(if notices.is_empty() {
            result
        } else {
            result.with_title(notices.join("\n"))
        })
    }

    async fn current_search_path(&self) -> DbResult<Vec<String>> {
        let rows = self
            .client
            .query("SELECT unnest(current_schemas(true))::text", &[])
            .await
            .map_err(|e| DbError::QueryFailed(pg_error_message(&e)))?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn load_schema(&self) -> DbResult<SchemaTree> {
        let map_err = |e: tokio_postgres::Error| DbError::SchemaLoadFailed(pg_error_message(&e));

        // Schemas (pg_catalog kept so built-in functions complete; toast/temp skipped)
        let schema_rows = self
            .client
            .query(
                "SELECT nspname FROM pg_namespace \
                 WHERE nspname NOT LIKE 'pg_toast%' \
                 AND nspname NOT LIKE 'pg_temp_%' \
                 AND nspname != 'information_schema' \
                 ORDER BY nspname",
                &[],
            )
            .await
            .map_err(&map_err)?;

        // Tables + views + columns (relkind: r/p=table, v=view, m=materialized view)
        let rel_rows = self
            .client
            .query(
                "SELECT n.nspname, c.relname, c.relkind::text, \
                        a.attname, format_type(a.atttypid, a.atttypmod) \
                 FROM pg_class c \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 JOIN pg_attribute a ON a.attrelid = c.oid \
                 WHERE c.relkind IN ('r','p','v','m') \
                   AND n.nspname NOT LIKE 'pg_toast%' \
                   AND n.nspname != 'information_schema' \
                   AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY n.nspname, c.relname, a.attnum",
                &[],
            )
            .await
            .map_err(&map_err)?;

        let func_rows = self
            .client
            .query(
                "SELECT n.nspname, p.proname, \
                        pg_get_function_identity_arguments(p.oid), \
                        pg_get_function_result(p.oid) \
                 FROM pg_proc p \
                 JOIN pg_namespace n ON n.oid = p.pronamespace \
                 WHERE n.nspname != 'information_schema' \
                   AND p.prokind IN ('f', 'p', 'a', 'w') \
                 ORDER BY n.nspname, p.proname",
                &[],
            )
            .await
            .map_err(&map_err)?;

        let mut schemas: Vec<Schema> = schema_rows
            .iter()
            .map(|r| Schema {
                name: r.get(0),
                ..Schema::default()
            })
            .collect();
        let position: HashMap<String, usize> = schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        // Rows arrive ordered by (schema, relation), so a relation's columns are contiguous
        let mut current: Option<(usize, bool, Table)> = None;
        for row in &rel_rows {
            let schema: String = row.get(0);
            let relname: String = row.get(1);
            let relkind: String = row.get(2);
            let column = Column {
                name: row.get(3),
                type_name: row.get(4),
            };
            let Some(&idx) = position.get(&schema) else {
                continue;
            };

            let same_relation = matches!(
                &current,
                Some((i, _, table)) if *i == idx && table.name == relname
            );
            if same_relation {
                if let Some((_, _, table)) = current.as_mut() {
                    table.columns.push(column);
                }
                continue;
            }

            if let Some((i, is_view, table)) = current.take() {
                push_relation(&mut schemas[i], is_view, table);
            }
            current = Some((
                idx,
                matches!(relkind.as_str(), "v" | "m"),
                Table {
                    name: relname,
                    columns: vec![column],
                },
            ));
        }
        if let Some((i, is_view, table)) = current.take() {
            push_relation(&mut schemas[i], is_view, table);
        }

        for row in &func_rows {
            let schema: String = row.get(0);
            let Some(&idx) = position.get(&schema) else {
                continue;
            };
            // pg_get_function_result() returns NULL for procedures
            let return_type: Option<String> = row.get(3);
            schemas[idx].functions.push(Function {
                name: row.get(1),
                args: row.get(2),
                return_type: return_type.unwrap_or_default(),
            });
        }

        Ok(SchemaTree { schemas })
    }
}

fn push_relation(schema: &mut Schema, is_view: bool, table: Table) {
    if is_view {
        schema.views.push(table);
    } else {
        schema.tables.push(table);
    }
}

/// Prefer the server's message over tokio-postgres' generic "db error"
fn pg_error_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => e.to_string(),
    }
}

/// Reconstruct a psql-style command tag for statements that return no rows
fn command_tag(sql: &str, affected: u64) -> String {
    let words = leading_keywords(sql, 2);
    let first = words.first().map(String::as_str).unwrap_or("");
    match first {
        "INSERT" => format!("INSERT 0 {}", affected),
        "UPDATE" | "DELETE" | "MERGE" | "COPY" | "FETCH" | "MOVE" => {
            format!("{} {}", first, affected)
        }
        "CREATE" | "DROP" | "ALTER" | "COMMENT" => words.join(" "),
        _ => first.to_string(),
    }
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 | Type::OID => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME | Type::VARCHAR | Type::CHAR | Type::BPCHAR => DataType::Text,
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY | Type::INT4_ARRAY | Type::INT8_ARRAY => {
            DataType::Array(Box::new(DataType::BigInt))
        }
        Type::FLOAT4_ARRAY | Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let loaded = native_certs
        .certs
        .into_iter()
        .filter(|cert| root_store.add(cert.clone()).is_ok())
        .count();
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Try a typed `Option<T>` read, mapping through `$wrap`; fall back to text
macro_rules! typed_cell {
    ($row:expr, $idx:expr, $ty:ty, $wrap:expr) => {
        match $row.try_get::<_, Option<$ty>>($idx) {
            Ok(Some(v)) => $wrap(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string($row, $idx),
        }
    };
}

/// Extract a cell value based on the column's DataType, falling back to text.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => typed_cell!(row, idx, i16, |v: i16| CellValue::Integer(v as i64)),
        DataType::Integer if *row.columns()[idx].type_() == Type::OID => {
            typed_cell!(row, idx, u32, |v: u32| CellValue::Integer(v as i64))
        }
        DataType::Integer => typed_cell!(row, idx, i32, |v: i32| CellValue::Integer(v as i64)),
        DataType::BigInt => typed_cell!(row, idx, i64, CellValue::Integer),
        DataType::Real => typed_cell!(row, idx, f32, |v: f32| CellValue::Float(v as f64)),
        DataType::Double => typed_cell!(row, idx, f64, CellValue::Float),
        DataType::Numeric => typed_cell!(row, idx, Decimal, |v: Decimal| CellValue::Text(
            v.to_string()
        )),
        DataType::Boolean => typed_cell!(row, idx, bool, CellValue::Boolean),
        DataType::Json | DataType::Jsonb => {
            typed_cell!(row, idx, serde_json::Value, CellValue::Json)
        }
        DataType::Bytea => typed_cell!(row, idx, Vec<u8>, CellValue::Binary),
        DataType::Uuid => typed_cell!(row, idx, uuid::Uuid, |v: uuid::Uuid| CellValue::Uuid(
            v.to_string()
        )),
        DataType::Timestamp => typed_cell!(row, idx, chrono::NaiveDateTime, |v: chrono::NaiveDateTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::TimestampTz => typed_cell!(
            row,
            idx,
            chrono::DateTime<chrono::Utc>,
            |v: chrono::DateTime<chrono::Utc>| CellValue::DateTime(v.to_string())
        ),
        DataType::Date => typed_cell!(row, idx, chrono::NaiveDate, |v: chrono::NaiveDate| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Time => typed_cell!(row, idx, chrono::NaiveTime, |v: chrono::NaiveTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        _ => try_as_string(row, idx),
    }
}

fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    let array = |items: Vec<CellValue>| CellValue::Array(items);
    match (inner, row.columns()[idx].type_()) {
        (DataType::Text, _) => typed_cell!(row, idx, Vec<String>, |v: Vec<String>| array(
            v.into_iter().map(CellValue::Text).collect()
        )),
        (DataType::Boolean, _) => typed_cell!(row, idx, Vec<bool>, |v: Vec<bool>| array(
            v.into_iter().map(CellValue::Boolean).collect()
        )),
        (DataType::BigInt, t) if *t == Type::INT2_ARRAY => {
            typed_cell!(row, idx, Vec<i16>, |v: Vec<i16>| array(
                v.into_iter().map(|n| CellValue::Integer(n as i64)).collect()
            ))
        }
        (DataType::BigInt, t) if *t == Type::INT4_ARRAY => {
            typed_cell!(row, idx, Vec<i32>, |v: Vec<i32>| array(
                v.into_iter().map(|n| CellValue::Integer(n as i64)).collect()
            ))
        }
        (DataType::BigInt, _) => typed_cell!(row, idx, Vec<i64>, |v: Vec<i64>| array(
            v.into_iter().map(CellValue::Integer).collect()
        )),
        (DataType::Double, t) if *t == Type::FLOAT4_ARRAY => {
            typed_cell!(row, idx, Vec<f32>, |v: Vec<f32>| array(
                v.into_iter().map(|n| CellValue::Float(n as f64)).collect()
            ))
        }
        (DataType::Double, _) => typed_cell!(row, idx, Vec<f64>, |v: Vec<f64>| array(
            v.into_iter().map(CellValue::Float).collect()
        )),
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}
