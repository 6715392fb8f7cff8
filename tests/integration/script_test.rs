//! Running whole scripts cell by cell.

use db_cell::config::Config;
use db_cell::db::Value;
use db_cell::script::split_cells;
use db_cell::{Outcome, Session};
use pretty_assertions::assert_eq;
use std::io::Write;

#[tokio::test]
async fn test_script_against_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("library.db");

    let script = format!(
        "%sql sqlite:///{}\n\
         \n\
         %%sql\n\
         CREATE TABLE books (title TEXT, year INTEGER);\n\
         INSERT INTO books VALUES ('Dubliners', 1914), ('Ulysses', 1922);\n\
         \n\
         %%sql --save recent --no-execute\n\
         SELECT * FROM books WHERE year > 1915\n\
         \n\
         %%sql --with recent\n\
         SELECT title FROM recent\n",
        db_path.display()
    );

    let mut session = Session::new(Config::default());
    let mut last = None;
    for cell in split_cells(&script) {
        last = Some(session.execute(&cell.header, &cell.body).await.unwrap());
    }
    session.shutdown().await;

    let Some(Outcome::Rows(rows)) = last.map(|reply| reply.outcome) else {
        panic!("expected rows from the last cell");
    };
    assert_eq!(rows.rows(), &[vec![Value::from("Ulysses")]]);
    assert!(db_path.exists());
}

#[tokio::test]
async fn test_file_flag_reads_sql() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "SELECT 1 AS one").unwrap();

    let mut session = Session::new(Config::default());
    session.execute("sqlite://", "").await.unwrap();

    let header = format!("--file {}", file.path().display());
    let reply = session.execute(&header, "").await.unwrap();
    let Outcome::Rows(rows) = reply.outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.keys(), &["one".to_string()]);
    assert_eq!(rows.rows(), &[vec![Value::Int(1)]]);
}

#[tokio::test]
async fn test_section_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[settings]\nfeedback = false\n\n[connections.scratch]\nurl = \"sqlite://\"\n",
    )
    .unwrap();
    let config = Config::load_from_file(&config_path).unwrap();

    let mut session = Session::new(config);
    session.execute("--section scratch", "").await.unwrap();
    let reply = session
        .execute("", "CREATE TABLE t (x INTEGER)")
        .await
        .unwrap();
    // Feedback is off, only the connection listing is shown
    assert_eq!(reply.notices, vec!["*  sqlite://".to_string()]);
}
