//! Turns a header line and body into a `ParsedCommand`.

use super::args::CommandArgs;
use super::cell::parse_cell;
use super::template;
use crate::config::Config;
use crate::db::{ConnectOptions, IdentifierQuoting};
use crate::error::{CellError, Result};
use crate::snippets::SnippetStore;
use crate::variables::Variables;
use std::fs;
use tracing::debug;

/// How a command names its target connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRef {
    /// A connection string (`sqlite://`, `postgresql://user@host/db`, ...).
    ConnectString(String),
    /// The name of a variable bound to a live connection handle.
    Handle(String),
    /// The key or alias of an already-open connection.
    Alias(String),
}

/// Everything the parser consults besides the command text.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub config: &'a Config,
    pub variables: &'a Variables,
    pub snippets: &'a SnippetStore,
    /// Keys and aliases of the open connections.
    pub known_connections: &'a [String],
    /// Quoting used by the current connection for CTE names.
    pub quoting: IdentifierQuoting,
}

/// A fully assembled command.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub connection: Option<ConnectionRef>,
    /// The SQL to execute, with any `--with` CTE chain applied.
    pub sql: String,
    /// The SQL after template expansion but before CTE composition.
    pub sql_original: String,
    pub result_var: Option<String>,
    pub return_result_var: bool,
    pub connect_options: ConnectOptions,
    pub args: CommandArgs,
}

impl ParsedCommand {
    /// Names given with `--with`.
    pub fn with_list(&self) -> &[String] {
        &self.args.with_
    }
}

/// Parser for command headers and bodies.
pub struct CommandParser;

impl CommandParser {
    /// Parses one command.
    ///
    /// File contents (`--file`) are prepended before template expansion, and
    /// template expansion happens before CTE composition.
    pub fn parse(header: &str, body: &str, ctx: &ParseContext<'_>) -> Result<ParsedCommand> {
        let args = CommandArgs::parse(header)?;

        let single = match args.line.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        };

        let mut connection = None;
        let mut line_for_command: &[String] = &args.line;

        if let Some(name) = single {
            if ctx.variables.connection(name).is_some() {
                debug!("Using connection handle bound to '{}'", name);
                connection = Some(ConnectionRef::Handle(name.to_string()));
                line_for_command = &[];
            } else if ctx.known_connections.iter().any(|known| known == name) {
                debug!("Switching to open connection '{}'", name);
                connection = Some(ConnectionRef::Alias(name.to_string()));
                line_for_command = &[];
            }
        }

        let mut command_text = format!("{}\n{}", line_for_command.join(" "), body);

        if let Some(path) = &args.file {
            let contents = fs::read_to_string(path)
                .map_err(|e| CellError::io(format!("Cannot read {path}: {e}")))?;
            command_text = format!("{contents}\n{command_text}");
        }

        let parts = parse_cell(&command_text, ctx.config)?;

        let sql = template::expand(&parts.sql, ctx.variables);
        let sql_original = sql.clone();

        if connection.is_none() && !parts.connection.is_empty() {
            connection = Some(ConnectionRef::ConnectString(parts.connection));
        }
        if connection.is_none() {
            if let Some(section) = &args.section {
                connection = Some(ConnectionRef::ConnectString(
                    ctx.config.section_connection_string(section)?,
                ));
            }
        }

        let sql = if args.with_.is_empty() {
            sql
        } else {
            ctx.snippets.render(&sql, &args.with_, ctx.quoting)?
        };

        let connect_options = match &args.connection_arguments {
            Some(json) => parse_connection_arguments(json)?,
            None => ConnectOptions::default(),
        };

        Ok(ParsedCommand {
            connection,
            sql,
            sql_original,
            result_var: parts.result_var,
            return_result_var: parts.return_result_var,
            connect_options,
            args,
        })
    }
}

fn parse_connection_arguments(json: &str) -> Result<ConnectOptions> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(connect_args)) => Ok(ConnectOptions { connect_args }),
        Ok(_) => Err(CellError::usage(
            "--connection_arguments must be a JSON object",
        )),
        Err(e) => Err(CellError::usage(format!(
            "Invalid JSON in --connection_arguments: {e}"
        ))),
    }
}
