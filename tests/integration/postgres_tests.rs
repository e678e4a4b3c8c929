//! Integration tests for the PostgreSQL driver

use crate::support::{scratch_schema, try_session};
use pgsense::DbError;
use pgsense::db::Session;
use pgsense::db::types::CellValue;

#[tokio::test]
async fn test_execute_select_returns_typed_cells() {
    let Some(session) = try_session().await else { return };

    let result = session
        .execute("SELECT 1 AS num, 'hello' AS msg, NULL::int AS nothing, true AS flag")
        .await
        .expect("query should succeed");

    assert_eq!(result.headers(), vec!["num", "msg", "nothing", "flag"]);
    assert_eq!(result.row_count, 1);
    let row = &result.rows[0];
    assert!(matches!(row.values[0], CellValue::Integer(1)));
    assert!(matches!(&row.values[1], CellValue::Text(s) if s == "hello"));
    assert!(row.values[2].is_null());
    assert!(matches!(row.values[3], CellValue::Boolean(true)));
}

#[tokio::test]
async fn test_execute_command_reports_tag() {
    let Some(session) = try_session().await else { return };

    let result = session
        .execute("SET application_name = 'pgsense-it'")
        .await
        .expect("SET should succeed");
    assert!(!result.has_table());
    assert_eq!(result.status, "SET");
}

#[tokio::test]
async fn test_execute_error_carries_server_message() {
    let Some(session) = try_session().await else { return };

    match session.execute("SELECT 1/0").await {
        Err(DbError::QueryFailed(message)) => assert!(message.contains("division by zero")),
        other => panic!("expected QueryFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_notices_become_title() {
    let Some(session) = try_session().await else { return };

    let result = session
        .execute("DO $$ BEGIN RAISE NOTICE 'hello from pgsense'; END $$")
        .await
        .expect("DO block should succeed");
    let title = result.title.expect("notice should be attached");
    assert!(title.ends_with(":  hello from pgsense"), "title: {}", title);

    let next = session.execute("SELECT 1").await.unwrap();
    assert!(next.title.is_none());
}

#[tokio::test]
async fn test_search_path_follows_set() {
    let Some(session) = try_session().await else { return };
    let schema = scratch_schema("path");

    session
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .await
        .unwrap();
    session
        .execute(&format!("SET search_path TO {}, public", schema))
        .await
        .unwrap();

    let path = session.current_search_path().await.unwrap();
    let pos = path.iter().position(|s| *s == schema);
    assert!(pos.is_some(), "search path {:?} should include {}", path, schema);
    assert!(pos < path.iter().position(|s| s == "public"));

    session
        .execute(&format!("DROP SCHEMA {} CASCADE", schema))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_load_schema_sees_tables_views_and_functions() {
    let Some(session) = try_session().await else { return };
    let schema = scratch_schema("intro");

    for sql in [
        format!("DROP SCHEMA IF EXISTS {} CASCADE", schema),
        format!("CREATE SCHEMA {}", schema),
        format!("CREATE TABLE {}.items(id int, label text)", schema),
        format!("CREATE VIEW {0}.item_labels AS SELECT label FROM {0}.items", schema),
        format!(
            "CREATE FUNCTION {}.double_it(x int) RETURNS int AS 'SELECT x * 2' LANGUAGE sql",
            schema
        ),
    ] {
        session.execute(&sql).await.unwrap();
    }

    let tree = session.load_schema().await.expect("introspection should succeed");
    let s = tree.schema(&schema).expect("scratch schema present");

    let items = s.tables.iter().find(|t| t.name == "items").expect("items table");
    let columns: Vec<&str> = items.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "label"]);
    assert!(s.views.iter().any(|v| v.name == "item_labels"));
    assert!(s.functions.iter().any(|f| f.name == "double_it"));

    session
        .execute(&format!("DROP SCHEMA {} CASCADE", schema))
        .await
        .unwrap();
}
