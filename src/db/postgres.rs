//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::db::{mask_password, DatabaseClient, Dialect, RawResult, Row, Value};
use crate::error::{CellError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Either, Executor, Row as SqlxRow, Statement, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
///
/// A single pooled connection backs the client so `SET` and temporary
/// tables persist across cells.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    dialect: Dialect,
    url: String,
}

impl PostgresClient {
    /// Connects with retry and exponential backoff on transient failures.
    pub async fn connect(url: &str, dialect: Dialect) -> Result<Self> {
        let conn_str = normalize_url(url);

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", mask_password(url));
                    return Ok(Self {
                        pool,
                        dialect,
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(error) => map_connection_error(error, &conn_str),
            None => CellError::connection(format!("Cannot connect to {}", mask_password(url))),
        })
    }

    /// Column names of a statement, taken from its prepared description.
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
impl DatabaseClient for PostgresClient {
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
                        debug!("Fetch limit reached, leaving remaining rows unread");
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
                "pooled PostgreSQL sessions always run in autocommit mode",
            ))
        }
    }

    async fn commit(&self) -> Result<()> {
        debug!("PostgreSQL session runs in autocommit mode, nothing to commit");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Rewrites `postgresql[+driver]://` and `redshift://` URLs to the scheme sqlx accepts.
fn normalize_url(url: &str) -> String {
    match url.split_once("://") {
        Some((_, rest)) => format!("postgres://{rest}"),
        None => url.to_string(),
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // Simple-protocol results arrive as text, so any other type reads as a string
        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, conn_str: &str) -> CellError {
    let parsed = url::Url::parse(conn_str).ok();
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());
    let port = parsed.as_ref().and_then(|u| u.port()).unwrap_or(5432);
    let user = parsed
        .as_ref()
        .map(|u| u.username().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let database = parsed
        .as_ref()
        .map(|u| u.path().trim_start_matches('/').to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        CellError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        CellError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        CellError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        CellError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection string.",
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        CellError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        CellError::connection(error.to_string())
    }
}

/// Formats a query error, keeping Postgres detail and hint lines.
fn format_query_error(error: sqlx::Error) -> CellError {
    let Some(db_error) = error.as_database_error() else {
        return CellError::driver(error.to_string());
    };

    let mut message = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            message.push_str("\n  DETAIL: ");
            message.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            message.push_str("\n  HINT: ");
            message.push_str(hint);
        }
    }

    CellError::driver(message)
}
