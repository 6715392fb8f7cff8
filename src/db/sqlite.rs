//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for SQLite files and in-memory databases using sqlx.

use crate::db::{DatabaseClient, Dialect, RawResult, Row, Value};
use crate::error::{CellError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Either, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

/// SQLite database client.
///
/// The pool holds exactly one connection so that in-memory databases and
/// session state survive between statements.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    dialect: Dialect,
    url: String,
}

impl SqliteClient {
    /// Opens a SQLite database from a `sqlite://` connection string.
    ///
    /// `sqlite://` and `sqlite::memory:` open an in-memory database,
    /// `sqlite:///relative.db` and `sqlite:////absolute.db` open files.
    pub async fn connect(url: &str, dialect: Dialect) -> Result<Self> {
        let path = sqlite_path(url);
        debug!("Opening SQLite database at {}", path);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
            .map_err(|e| CellError::connection(format!("Invalid SQLite connection string: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| CellError::connection(format!("Cannot open SQLite database: {e}")))?;

        Ok(Self {
            pool,
            dialect,
            url: url.to_string(),
        })
    }

    async fn column_names(&self, sql: &str) -> Vec<String> {
        match (&self.pool).prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn execute(&self, sql: &str, fetch_limit: Option<usize>) -> Result<RawResult> {
        let mut stream = sqlx::raw_sql(sql).fetch_many(&self.pool);

        let mut columns: Option<Vec<String>> = None;
        let mut rows: Vec<Row> = Vec::new();
        let mut rows_affected = None;

        while let Some(item) = stream.try_next().await.map_err(format_query_error)? {
            match item {
                Either::Left(done) => rows_affected = Some(done.rows_affected()),
                Either::Right(row) => {
                    if columns.is_none() {
                        columns = Some(row.columns().iter().map(|c| c.name().to_string()).collect());
                    }
                    if fetch_limit.is_some_and(|limit| rows.len() >= limit) {
                        break;
                    }
                    rows.push(convert_row(&row));
                }
            }
        }
        drop(stream);

        let columns = match columns {
            Some(columns) => columns,
            None => self.column_names(sql).await,
        };

        Ok(RawResult {
            returns_rows: !columns.is_empty(),
            columns,
            rows,
            rows_affected,
        })
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(CellError::driver(
                "SQLite sessions run in autocommit mode; the AUTOCOMMIT option cannot be turned off",
            ))
        }
    }

    async fn commit(&self) -> Result<()> {
        debug!("SQLite session runs in autocommit mode, nothing to commit");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Maps a SQLAlchemy-style SQLite URL to the path sqlx expects.
///
/// A query string (connection arguments such as `mode=ro`) is kept.
fn sqlite_path(url: &str) -> String {
    let rest = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url.split_once(':').map(|(_, rest)| rest).unwrap_or(""),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((rest, query)) => (rest, Some(query)),
        None => (rest, None),
    };

    let path = if rest.is_empty() || rest == ":memory:" || rest == "/:memory:" {
        ":memory:"
    } else {
        // The leading slash separates the (empty) host from the path
        rest.strip_prefix('/').unwrap_or(rest)
    };

    match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single column using the value's storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Formats a driver error, keeping the database's own message.
fn format_query_error(error: sqlx::Error) -> CellError {
    match error.as_database_error() {
        Some(db_error) => CellError::driver(db_error.message().to_string()),
        None => CellError::driver(error.to_string()),
    }
}
