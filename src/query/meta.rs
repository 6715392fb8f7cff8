//! Backslash meta-commands for Postgres-family connections.

use crate::db::{DatabaseClient, RawResult, Value};
use crate::error::{CellError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Executes `\`-prefixed meta-commands against a connection.
#[async_trait]
pub trait MetaCommandHandler: Send + Sync {
    async fn execute(&self, client: &dyn DatabaseClient, command: &str) -> Result<RawResult>;
}

/// psql-style catalog commands answered from `information_schema` and `pg_catalog`.
///
/// Supported: `\dt`, `\dv`, `\d [name]`, `\dn`, `\l`. Patterns accept `*` wildcards.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgMetaCommands;

impl PgMetaCommands {
    /// Translates a meta-command into the catalog query that answers it.
    pub fn translate(command: &str) -> Result<String> {
        let command = command.trim().trim_end_matches(';');
        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default();
        let argument = words.next();

        let sql = match (name, argument) {
            ("\\dt" | "\\dt+", pattern) => list_relations(&["BASE TABLE"], pattern),
            ("\\dv" | "\\dv+", pattern) => list_relations(&["VIEW"], pattern),
            ("\\d" | "\\d+", None) => list_relations(&["BASE TABLE", "VIEW"], None),
            ("\\d" | "\\d+", Some(relation)) => describe_relation(relation),
            ("\\dn" | "\\dn+", _) => "SELECT schema_name AS \"Name\", schema_owner AS \"Owner\" \
                 FROM information_schema.schemata \
                 WHERE left(schema_name, 3) <> 'pg_' AND schema_name <> 'information_schema' \
                 ORDER BY 1"
                .to_string(),
            ("\\l" | "\\l+" | "\\list", _) => "SELECT datname AS \"Name\", \
                 pg_catalog.pg_get_userbyid(datdba) AS \"Owner\", \
                 pg_catalog.pg_encoding_to_char(encoding) AS \"Encoding\" \
                 FROM pg_catalog.pg_database WHERE NOT datistemplate ORDER BY 1"
                .to_string(),
            (other, _) => {
                return Err(CellError::usage(format!(
                    "Unsupported meta-command: {other} (supported: \\dt, \\dv, \\d, \\dn, \\l)"
                )))
            }
        };
        Ok(sql)
    }
}

#[async_trait]
impl MetaCommandHandler for PgMetaCommands {
    async fn execute(&self, client: &dyn DatabaseClient, command: &str) -> Result<RawResult> {
        let sql = Self::translate(command)?;
        debug!("Meta-command {} -> {}", command.trim(), sql);
        let result = client.execute(&sql, None).await?;

        let describing = command.trim().starts_with("\\d ") || command.trim().starts_with("\\d+ ");
        if describing && result.rows.is_empty() {
            let relation = command.split_whitespace().nth(1).unwrap_or_default();
            return Err(CellError::usage(format!(
                "Did not find any relation named \"{}\".",
                relation.trim_end_matches(';')
            )));
        }
        Ok(result)
    }
}

/// Turns a psql pattern into a LIKE literal (`*` and `?` become `%` and `_`).
fn like_pattern(pattern: &str) -> String {
    Value::from(pattern.replace('*', "%").replace('?', "_")).to_sql_literal()
}

fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, relation)) => (Some(schema), relation),
        None => (None, name),
    }
}

fn list_relations(types: &[&str], pattern: Option<&str>) -> String {
    let types = types
        .iter()
        .map(|t| Value::from(*t).to_sql_literal())
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT table_schema AS \"Schema\", table_name AS \"Name\", \
         CASE table_type WHEN 'BASE TABLE' THEN 'table' WHEN 'VIEW' THEN 'view' \
         ELSE lower(table_type) END AS \"Type\" \
         FROM information_schema.tables \
         WHERE table_type IN ({types}) \
         AND table_schema NOT IN ('pg_catalog', 'information_schema')"
    );

    if let Some(pattern) = pattern {
        let (schema, relation) = split_qualified(pattern);
        if let Some(schema) = schema {
            sql.push_str(&format!(" AND table_schema LIKE {}", like_pattern(schema)));
        }
        sql.push_str(&format!(" AND table_name LIKE {}", like_pattern(relation)));
    }
    sql.push_str(" ORDER BY 1, 2");
    sql
}

fn describe_relation(name: &str) -> String {
    let (schema, relation) = split_qualified(name.trim_end_matches(';'));
    let mut sql = format!(
        "SELECT column_name AS \"Column\", data_type AS \"Type\", \
         CASE WHEN is_nullable = 'NO' THEN 'not null' ELSE '' END AS \"Nullable\", \
         COALESCE(column_default, '') AS \"Default\" \
         FROM information_schema.columns \
         WHERE table_name = {}",
        Value::from(relation).to_sql_literal()
    );
    if let Some(schema) = schema {
        sql.push_str(&format!(
            " AND table_schema = {}",
            Value::from(schema).to_sql_literal()
        ));
    }
    sql.push_str(" ORDER BY ordinal_position");
    sql
}
