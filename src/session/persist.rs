//! Writes a bound result into a database table.

use crate::db::{DatabaseClient, Dialect, DialectFamily, Value};
use crate::error::{CellError, Result};
use crate::result::Frame;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const INSERT_BATCH: usize = 500;

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    Fail,
    Replace,
    Append,
}

fn legal_sql_identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9#_$]+").expect("static pattern is valid")
    })
}

/// Table name for a variable: lower-cased, cut at the first illegal character.
pub fn table_name_for(variable: &str) -> Result<String> {
    let lowered = variable.to_lowercase();
    legal_sql_identifier()
        .find(&lowered)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CellError::usage(format!("{variable:?} cannot be used as a table name")))
}

/// Writes `frame` to `table`, optionally with a leading `index` column.
///
/// A failed `COMMIT` is not an error; it is reported through `notices`.
pub async fn persist_frame(
    client: &dyn DatabaseClient,
    table: &str,
    frame: &Frame,
    if_exists: IfExists,
    index: bool,
    notices: &mut Vec<String>,
) -> Result<()> {
    let dialect = client.dialect();
    let exists = client
        .execute(&format!("SELECT 1 FROM {table} WHERE 1 = 0"), Some(0))
        .await
        .is_ok();
    debug!("Persisting {} rows to {} (exists: {})", frame.len(), table, exists);

    match (exists, if_exists) {
        (true, IfExists::Fail) => {
            return Err(CellError::usage(format!(
                "Table {table:?} already exists. Consider using --persist-replace to drop the table before persisting the data frame"
            )));
        }
        (true, IfExists::Replace) => {
            client.execute(&format!("DROP TABLE {table}"), None).await?;
            client.execute(&create_table(dialect, table, frame, index), None).await?;
        }
        (true, IfExists::Append) => {}
        (false, _) => {
            client.execute(&create_table(dialect, table, frame, index), None).await?;
        }
    }

    for statement in insert_statements(dialect, table, frame, index) {
        client.execute(&statement, None).await?;
    }
    if !dialect.caps.rejects_explicit_commit {
        if let Err(e) = client.commit().await {
            debug!("COMMIT after persist failed: {}", e);
            let message = "The database does not support the COMMIT command";
            warn!("{}", message);
            notices.push(message.to_string());
        }
    }

    info!("Persisted {} rows to {}", frame.len(), table);
    Ok(())
}

fn quote_column(dialect: &Dialect, name: &str) -> String {
    match dialect.family {
        DialectFamily::MySql | DialectFamily::Spark | DialectFamily::BigQuery => {
            format!("`{}`", name.replace('`', "``"))
        }
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn column_type(dialect: &Dialect, values: &[Value]) -> &'static str {
    let postgres = dialect.is_postgres_family();
    match values.iter().find(|v| !v.is_null()) {
        Some(Value::Bool(_)) => "BOOLEAN",
        Some(Value::Int(_)) if postgres => "BIGINT",
        Some(Value::Int(_)) => "INTEGER",
        Some(Value::Float(_)) if postgres => "DOUBLE PRECISION",
        Some(Value::Float(_)) => "REAL",
        Some(Value::Bytes(_)) if postgres => "BYTEA",
        Some(Value::Bytes(_)) => "BLOB",
        Some(Value::String(_)) | Some(Value::Null) | None => "TEXT",
    }
}

fn literal(dialect: &Dialect, value: &Value) -> String {
    match value {
        Value::Bytes(bytes) if dialect.is_postgres_family() => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("'\\x{hex}'::bytea")
        }
        other => other.to_sql_literal(),
    }
}

fn create_table(dialect: &Dialect, table: &str, frame: &Frame, index: bool) -> String {
    let mut columns = Vec::with_capacity(frame.names.len() + 1);
    if index {
        columns.push(format!("{} INTEGER", quote_column(dialect, "index")));
    }
    for (name, values) in frame.names.iter().zip(&frame.columns) {
        columns.push(format!(
            "{} {}",
            quote_column(dialect, name),
            column_type(dialect, values)
        ));
    }
    format!("CREATE TABLE {table} ({})", columns.join(", "))
}

fn insert_statements(dialect: &Dialect, table: &str, frame: &Frame, index: bool) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(frame.names.len() + 1);
    if index {
        names.push(quote_column(dialect, "index"));
    }
    names.extend(frame.names.iter().map(|n| quote_column(dialect, n)));
    let header = format!("INSERT INTO {table} ({}) VALUES ", names.join(", "));

    let tuples: Vec<String> = frame
        .rows()
        .enumerate()
        .map(|(position, row)| {
            let mut values: Vec<String> = Vec::with_capacity(row.len() + 1);
            if index {
                values.push(position.to_string());
            }
            values.extend(row.iter().map(|v| literal(dialect, v)));
            format!("({})", values.join(", "))
        })
        .collect();

    tuples
        .chunks(INSERT_BATCH)
        .map(|chunk| format!("{header}{}", chunk.join(", ")))
        .collect()
}
