//! Snippet composition through a live session.

use db_cell::config::Config;
use db_cell::db::{IdentifierQuoting, Value};
use db_cell::snippets::SnippetStore;
use db_cell::{CellError, Outcome, Session};
use pretty_assertions::assert_eq;

async fn orders_session() -> Session {
    let mut session = Session::new(Config::default());
    session
        .execute(
            "sqlite://",
            "CREATE TABLE orders (id INTEGER, customer TEXT, amount INTEGER);\n\
             INSERT INTO orders VALUES (1, 'ann', 10), (2, 'bob', 250), (3, 'ann', 400), (4, 'cid', 5);",
        )
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_diamond_runs_each_cte_once() {
    let mut session = orders_session().await;
    for (header, body) in [
        ("--save base --no-execute", "SELECT * FROM orders WHERE amount > 8"),
        ("--save big --with base --no-execute", "SELECT * FROM base WHERE amount > 100"),
        ("--save anns --with base --no-execute", "SELECT * FROM base WHERE customer = 'ann'"),
        (
            "--save both --with big --with anns --no-execute",
            "SELECT big.id FROM big JOIN anns USING (id)",
        ),
    ] {
        session.execute(header, body).await.unwrap();
    }

    assert_eq!(
        session.render("both").unwrap(),
        "WITH `base` AS (SELECT * FROM orders WHERE amount > 8), \
         `big` AS (SELECT * FROM base WHERE amount > 100), \
         `anns` AS (SELECT * FROM base WHERE customer = 'ann') \
         SELECT big.id FROM big JOIN anns USING (id)"
    );

    let reply = session.execute("--with both", "SELECT * FROM both").await.unwrap();
    let Outcome::Rows(rows) = reply.outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.rows(), &[vec![Value::Int(3)]]);
}

#[tokio::test]
async fn test_unknown_snippet_suggests_close_name() {
    let mut session = orders_session().await;
    session
        .execute("--save big_orders --no-execute", "SELECT * FROM orders WHERE amount > 100")
        .await
        .unwrap();

    let err = session
        .execute("--with big_order", "SELECT * FROM big_order")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CellError::usage(
            "\"big_order\" is not a valid snippet identifier. Did you mean \"big_orders\"?"
        )
    );
}

#[tokio::test]
async fn test_hyphenated_names_are_rejected() {
    let mut session = orders_session().await;
    let err = session
        .execute("--save big-orders --no-execute", "SELECT * FROM orders")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Please use underscores (_) instead"));
    assert!(session.snippets().is_empty());

    let err = session
        .execute("--with big-orders", "SELECT * FROM orders")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("big_orders"));
}

#[tokio::test]
async fn test_cycles_are_rejected_when_saving() {
    let mut session = orders_session().await;
    session
        .execute("--save a --no-execute", "SELECT * FROM orders")
        .await
        .unwrap();
    session
        .execute("--save b --with a --no-execute", "SELECT * FROM a")
        .await
        .unwrap();

    let err = session
        .execute("--save a --with b --no-execute", "SELECT * FROM b")
        .await
        .unwrap_err();
    assert!(matches!(err, CellError::Usage(_)));
    assert!(err.to_string().contains("circular dependency"));
    assert_eq!(session.render("a").unwrap(), "SELECT * FROM orders");
}

#[test]
fn test_store_keeps_insertion_order_on_overwrite() {
    let mut store = SnippetStore::new();
    store.store("first", "SELECT 1", &[]).unwrap();
    store.store("second", "SELECT 2", &[]).unwrap();
    store.store("first", "SELECT 10", &[]).unwrap();

    assert_eq!(store.names(), vec!["first", "second"]);
    assert_eq!(
        store
            .render("SELECT * FROM first", &["first".to_string()], IdentifierQuoting::None)
            .unwrap(),
        "WITH first AS (SELECT 10) SELECT * FROM first"
    );
}
