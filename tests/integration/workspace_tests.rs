//! End-to-end tests through the workspace facade

use crate::support::{scratch_schema, test_target, test_url, try_session};
use pgsense::Workspace;
use pgsense::config::Settings;
use pgsense::connection::{BufferId, ConnectionStatus};
use pgsense::db::postgres::PostgresDriver;
use pgsense::executor::QueryEvent;
use std::time::Duration;

fn workspace() -> Workspace<PostgresDriver> {
    Workspace::builder(PostgresDriver, Settings::default())
        .ephemeral()
        .build()
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_batch_stops_at_first_error_and_refreshes() {
    if try_session().await.is_none() {
        return;
    }
    let ws = workspace();
    let buffer = BufferId::from("batch.sql");
    let schema = scratch_schema("batch");

    ws.ensure_connected(&buffer, Some(&test_url())).await.unwrap();
    assert!(ws.status_of(&buffer).is_connected());

    // let the first-connect refresh land before changing the schema
    let completers = ws.completers().clone();
    let target = test_target();
    assert!(wait_until(|| completers.get(&target).is_some_and(|i| !i.is_placeholder())).await);

    let sql = format!(
        "DROP SCHEMA IF EXISTS {0} CASCADE; CREATE SCHEMA {0}; \
         CREATE TABLE {0}.shipments(id int, carrier text); SELECT 1/0; SELECT 3",
        schema
    );
    let mut run = ws.run_query(&buffer, &sql, false).unwrap();
    let mut events = Vec::new();
    while let Some(e) = run.events.recv().await {
        events.push(e);
    }
    let outcome = run.outcome.await.unwrap();

    assert_eq!(events.len(), 4);
    assert!(matches!(events.last(), Some(QueryEvent::Error(m)) if m.contains("division by zero")));
    assert_eq!(outcome.executed(), 3);

    // DDL in the batch triggers a refresh that picks up the new table
    let found = wait_until(|| {
        completers
            .get(&target)
            .and_then(|i| i.schema_tree().schema(&schema).map(|s| !s.tables.is_empty()))
            .unwrap_or(false)
    })
    .await;
    assert!(found, "refresh should pick up {}.shipments", schema);

    let text = format!("SELECT * FROM {}.ship", schema);
    let suggestions = ws.get_completions(&buffer, &text, text.len());
    assert_eq!(suggestions.first().map(|s| s.text.as_str()), Some("shipments"));

    let mut cleanup = ws
        .run_query(&buffer, &format!("DROP SCHEMA {} CASCADE", schema), true)
        .unwrap();
    while cleanup.events.recv().await.is_some() {}
    ws.shutdown();
}

#[tokio::test]
async fn test_unreachable_server_cached_as_error() {
    if try_session().await.is_none() {
        return;
    }
    let ws = workspace();
    let buffer = BufferId::from("bad.sql");
    let mut target = test_target();
    // nothing listens on port 1
    target.port = 1;

    assert!(ws.ensure_connected(&buffer, Some(&target.to_url())).await.is_err());
    assert_eq!(ws.status_of(&buffer), ConnectionStatus::Error(target.label()));
    assert!(ws.ensure_connected(&buffer, Some(&test_url())).await.is_err());

    ws.forget(&buffer);
    assert!(ws.ensure_connected(&buffer, Some(&test_url())).await.is_ok());
}
