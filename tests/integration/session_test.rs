//! End-to-end command tests against in-memory SQLite.

use db_cell::config::Config;
use db_cell::db::Value;
use db_cell::result::ResultSet;
use db_cell::variables::Binding;
use db_cell::{CellError, Outcome, Reply, Session};
use pretty_assertions::assert_eq;

/// Opens an in-memory database with a small `writers` table.
async fn writers_session() -> Session {
    let mut session = Session::new(Config::default());
    let reply = session.execute("sqlite://", "").await.unwrap();
    assert_eq!(reply.outcome, Outcome::Status("Connected: sqlite://".to_string()));

    session
        .execute(
            "",
            "CREATE TABLE writers (name TEXT, born INTEGER);\n\
             INSERT INTO writers VALUES ('Shakespeare', 1564), ('Woolf', 1882), ('Orwell', 1903);",
        )
        .await
        .unwrap();
    session
}

fn rows(reply: Reply) -> ResultSet {
    match reply.outcome {
        Outcome::Rows(rows) => rows,
        other => panic!("expected rows, got {other:?}"),
    }
}

fn names(rows: &ResultSet) -> Vec<String> {
    rows.rows()
        .iter()
        .map(|row| row[0].to_display_string())
        .collect()
}

#[tokio::test]
async fn test_insert_reports_rows_affected() {
    let mut session = writers_session().await;
    let reply = session
        .execute("", "INSERT INTO writers VALUES ('Austen', 1775)")
        .await
        .unwrap();
    assert!(reply.notices.contains(&"1 rows affected.".to_string()));

    let reply = session.execute("", "SELECT COUNT(*) AS n FROM writers").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(4)]]);
}

#[tokio::test]
async fn test_select_after_connecting() {
    let mut session = writers_session().await;
    let reply = session
        .execute("", "SELECT name, born FROM writers ORDER BY born")
        .await
        .unwrap();
    assert_eq!(reply.notices, vec!["*  sqlite://".to_string()]);

    let rows = rows(reply);
    assert_eq!(rows.keys(), &["name".to_string(), "born".to_string()]);
    assert_eq!(
        rows.rows()[0],
        vec![Value::from("Shakespeare"), Value::Int(1564)]
    );
    assert_eq!(names(&rows), vec!["Shakespeare", "Woolf", "Orwell"]);
}

#[tokio::test]
async fn test_connection_and_sql_on_one_line() {
    let mut session = Session::new(Config::default());
    let reply = session.execute("sqlite:// SELECT 1 AS a, 2 AS a", "").await.unwrap();
    let rows = rows(reply);
    assert_eq!(rows.keys(), &["a".to_string(), "a_1".to_string()]);
    assert_eq!(rows.rows(), &[vec![Value::Int(1), Value::Int(2)]]);
}

#[tokio::test]
async fn test_last_statement_wins() {
    let mut session = writers_session().await;
    let reply = session
        .execute(
            "",
            "SELECT name FROM writers WHERE born < 1600; SELECT born FROM writers WHERE name = 'Orwell'",
        )
        .await
        .unwrap();
    let rows = rows(reply);
    assert_eq!(rows.keys(), &["born".to_string()]);
    assert_eq!(rows.rows(), &[vec![Value::Int(1903)]]);
}

#[tokio::test]
async fn test_autolimit_bounds_fetch() {
    let mut session = writers_session().await;
    session.settings_mut().autolimit = 2;

    let reply = session.execute("", "SELECT * FROM writers").await.unwrap();
    let rows = rows(reply);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.row_limit(), Some(2));
}

#[tokio::test]
async fn test_transactions_are_rejected() {
    let mut session = writers_session().await;
    let err = session
        .execute("", "BEGIN; DELETE FROM writers; COMMIT;")
        .await
        .unwrap_err();
    assert!(matches!(err, CellError::Runtime(_)));

    // Nothing ran
    let reply = session.execute("", "SELECT COUNT(*) FROM writers").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(3)]]);
}

#[tokio::test]
async fn test_trigger_body_runs_as_one_statement() {
    let mut session = writers_session().await;
    session
        .execute(
            "",
            "CREATE TABLE births (name TEXT, born INTEGER);\n\
             CREATE TRIGGER log_birth AFTER INSERT ON writers BEGIN\n\
                 INSERT INTO births VALUES (new.name, new.born);\n\
                 INSERT INTO births VALUES (new.name, new.born + 100);\n\
             END;",
        )
        .await
        .unwrap();

    session
        .execute("", "INSERT INTO writers VALUES ('Austen', 1775)")
        .await
        .unwrap();
    let reply = session
        .execute("", "SELECT born FROM births ORDER BY born")
        .await
        .unwrap();
    assert_eq!(
        rows(reply).rows(),
        &[vec![Value::Int(1775)], vec![Value::Int(1875)]]
    );
}

#[tokio::test]
async fn test_template_variables() {
    let mut session = writers_session().await;
    session.variables_mut().set("year", 1900i64);

    let reply = session
        .execute("", "SELECT name FROM writers WHERE born < {{year}} ORDER BY born")
        .await
        .unwrap();
    assert_eq!(names(&rows(reply)), vec!["Shakespeare", "Woolf"]);
}

#[tokio::test]
async fn test_save_and_compose_snippets() {
    let mut session = writers_session().await;

    let reply = session
        .execute("--save old --no-execute", "SELECT * FROM writers WHERE born < 1900")
        .await
        .unwrap();
    assert_eq!(reply.outcome, Outcome::Status("Skipping execution...".to_string()));

    let reply = session
        .execute("--with old", "SELECT name FROM old ORDER BY born")
        .await
        .unwrap();
    assert_eq!(names(&rows(reply)), vec!["Shakespeare", "Woolf"]);

    session
        .execute("--save oldest --with old", "SELECT name FROM old WHERE born < 1600")
        .await
        .unwrap();
    let reply = session.execute("--with oldest", "SELECT * FROM oldest").await.unwrap();
    assert_eq!(names(&rows(reply)), vec!["Shakespeare"]);
}

#[tokio::test]
async fn test_syntax_errors_get_detail() {
    let mut session = writers_session().await;
    let err = session.execute("", "SELEC name FROM writers").await.unwrap_err();
    assert!(matches!(err, CellError::Usage(_)));
    assert!(err.to_string().contains("syntax error"));

    session.settings_mut().short_errors = false;
    let err = session.execute("", "SELEC name FROM writers").await.unwrap_err();
    assert!(matches!(err, CellError::Driver(_)));
}

#[tokio::test]
async fn test_result_variable() {
    let mut session = writers_session().await;

    let reply = session
        .execute("modern << SELECT name FROM writers WHERE born > 1800", "")
        .await
        .unwrap();
    assert_eq!(reply.outcome, Outcome::Nothing);

    let Some(Binding::Rows(modern)) = session.variables().get("modern") else {
        panic!("expected a bound result set");
    };
    assert_eq!(modern.len(), 2);
    assert_eq!(modern.by_key("Woolf").unwrap(), &vec![Value::from("Woolf")]);
}

#[tokio::test]
async fn test_persist_round_trip() {
    let mut session = writers_session().await;
    session
        .execute("Old_Writers << SELECT name, born FROM writers WHERE born < 1900", "")
        .await
        .unwrap();

    let reply = session.execute("--persist", "Old_Writers").await.unwrap();
    assert_eq!(reply.outcome, Outcome::Status("Persisted old_writers".to_string()));

    let reply = session
        .execute("", "SELECT * FROM old_writers ORDER BY \"index\"")
        .await
        .unwrap();
    let persisted = rows(reply);
    assert_eq!(
        persisted.keys(),
        &["index".to_string(), "name".to_string(), "born".to_string()]
    );
    assert_eq!(
        persisted.rows()[1],
        vec![Value::Int(1), Value::from("Woolf"), Value::Int(1882)]
    );

    let err = session.execute("--persist", "Old_Writers").await.unwrap_err();
    assert!(err.to_string().contains("already exists"));

    session.execute("--append", "Old_Writers").await.unwrap();
    let reply = session.execute("", "SELECT COUNT(*) FROM old_writers").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(4)]]);

    session.execute("--persist-replace", "Old_Writers").await.unwrap();
    let reply = session.execute("", "SELECT COUNT(*) FROM old_writers").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(2)]]);
}

#[tokio::test]
async fn test_persist_without_index() {
    let mut session = writers_session().await;
    session
        .execute("df << SELECT name FROM writers", "")
        .await
        .unwrap();
    session.execute("--persist --no-index", "df").await.unwrap();

    let reply = session.execute("", "SELECT * FROM df").await.unwrap();
    assert_eq!(rows(reply).keys(), &["name".to_string()]);
}

#[tokio::test]
async fn test_aliases_listing_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.db");
    let url = format!("sqlite:///{}", path.display());

    let mut session = writers_session().await;
    session
        .execute(&format!("{url} --alias other"), "CREATE TABLE t (x INTEGER)")
        .await
        .unwrap();

    let reply = session.execute("--connections", "").await.unwrap();
    assert_eq!(
        reply.outcome,
        Outcome::Status(format!("*  (other) {url}\n   sqlite://"))
    );

    // Switch back by connection string, then to the alias by name
    session.execute("sqlite://", "").await.unwrap();
    let reply = session.execute("", "SELECT COUNT(*) FROM writers").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(3)]]);

    let reply = session.execute("other", "SELECT COUNT(*) FROM t").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(0)]]);

    let reply = session.execute("--close other", "").await.unwrap();
    assert_eq!(reply.outcome, Outcome::Nothing);
    assert_eq!(session.registry().keys(), vec!["sqlite://".to_string()]);

    let err = session.execute("--close other", "").await.unwrap_err();
    assert!(matches!(err, CellError::Runtime(_)));

    session.shutdown().await;
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn test_no_connection() {
    let mut session = Session::new(Config::default());
    let err = session.execute("", "SELECT 1").await.unwrap_err();
    assert!(matches!(err, CellError::Usage(_)));
    assert!(err.to_string().contains("No active connection"));
    assert!(err.to_string().contains("To fix it:"));
}

#[tokio::test]
async fn test_database_url_fallback() {
    let mut session = Session::new(Config::default()).with_database_url(Some("sqlite://".to_string()));
    let reply = session.execute("", "SELECT 42 AS answer").await.unwrap();
    assert_eq!(rows(reply).rows(), &[vec![Value::Int(42)]]);
}

#[tokio::test]
async fn test_autoframe_returns_frame() {
    let mut session = writers_session().await;
    session.settings_mut().autoframe = true;

    let reply = session
        .execute("", "SELECT name, born FROM writers ORDER BY born")
        .await
        .unwrap();
    let Outcome::Frame(frame) = reply.outcome else {
        panic!("expected a frame");
    };
    assert_eq!(
        frame.column("born").unwrap(),
        &[Value::Int(1564), Value::Int(1882), Value::Int(1903)]
    );
}
