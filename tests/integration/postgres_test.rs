//! Tests against a live PostgreSQL server.
//!
//! Skipped unless DATABASE_URL points at Postgres.

use db_cell::config::Config;
use db_cell::db::{self, ConnectOptions};
use db_cell::{CellError, Outcome, Session};

/// Helper to get the test database URL from the environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres"))
}

#[tokio::test]
async fn test_connect_and_select() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set to a Postgres server");
        return;
    };

    let client = db::connect(&url, &ConnectOptions::default()).await.unwrap();
    assert!(client.dialect().is_postgres_family());

    let result = client
        .execute("SELECT 1 AS num, 'hello' AS greeting", None)
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["num".to_string(), "greeting".to_string()]);
    assert_eq!(result.rows.len(), 1);
    assert!(result.returns_rows);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_session_round_trip() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set to a Postgres server");
        return;
    };

    let mut session = Session::new(Config::default());
    session.execute(&url, "").await.unwrap();
    session
        .execute(
            "",
            "DROP TABLE IF EXISTS db_cell_it_writers;\n\
             CREATE TABLE db_cell_it_writers (name TEXT, born INTEGER);\n\
             INSERT INTO db_cell_it_writers VALUES ('Woolf', 1882), ('Orwell', 1903);",
        )
        .await
        .unwrap();

    let reply = session
        .execute("", "SELECT name FROM db_cell_it_writers ORDER BY born")
        .await
        .unwrap();
    let Outcome::Rows(rows) = reply.outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);

    let reply = session.execute("", "\\d db_cell_it_writers").await.unwrap();
    let Outcome::Rows(columns) = reply.outcome else {
        panic!("expected rows");
    };
    assert_eq!(columns.len(), 2);

    let err = session
        .execute("", "\\d db_cell_it_no_such_table")
        .await
        .unwrap_err();
    assert!(matches!(err, CellError::Usage(_)));

    session
        .execute("", "DROP TABLE db_cell_it_writers")
        .await
        .unwrap();
    session.shutdown().await;
}
