//! The process-scoped context that every command runs in.
//!
//! A `Session` owns the connection registry, the snippet store and the
//! calling scope's variables. Nothing here is global: independent sessions
//! never see each other's connections or snippets.

pub mod persist;

use crate::command::{CommandParser, ConnectionRef, ParseContext, ParsedCommand};
use crate::config::{Config, Settings};
use crate::connection::{ConnectionRegistry, Descriptor, OpenOptions};
use crate::db::{IdentifierQuoting, SharedClient};
use crate::error::{CellError, Result};
use crate::query::{error_message, PgMetaCommands, QueryExecutor, RunOutput};
use crate::result::{Frame, ResultSet};
use crate::snippets::SnippetStore;
use crate::variables::{Binding, Variables};
use persist::IfExists;
use tracing::{debug, info, warn};

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to show (result bound to a variable, connection closed, ...).
    Nothing,
    /// A status line such as `Connected: me@db` or `Persisted writers`.
    Status(String),
    Rows(ResultSet),
    Frame(Frame),
}

/// An outcome plus the notices printed while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub outcome: Outcome,
    pub notices: Vec<String>,
}

impl Reply {
    fn new(outcome: Outcome, notices: Vec<String>) -> Self {
        Self { outcome, notices }
    }
}

/// Connections, snippets and variables shared by consecutive commands.
pub struct Session {
    config: Config,
    registry: ConnectionRegistry,
    snippets: SnippetStore,
    variables: Variables,
    meta: PgMetaCommands,
    database_url: Option<String>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: ConnectionRegistry::new(),
            snippets: SnippetStore::new(),
            variables: Variables::new(),
            meta: PgMetaCommands,
            database_url: None,
        }
    }

    /// Connection string opened when a command names no connection and none is open.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        self.database_url = url;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.config.settings
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn snippets(&self) -> &SnippetStore {
        &self.snippets
    }

    pub fn snippets_mut(&mut self) -> &mut SnippetStore {
        &mut self.snippets
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    fn quoting(&self) -> IdentifierQuoting {
        self.registry
            .current()
            .map(|connection| connection.dialect().identifier_quoting())
            .unwrap_or_default()
    }

    /// Parses a command without running it.
    pub fn parse(&self, header: &str, body: &str) -> Result<ParsedCommand> {
        let known = self.registry.keys();
        let ctx = ParseContext {
            config: &self.config,
            variables: &self.variables,
            snippets: &self.snippets,
            known_connections: &known,
            quoting: self.quoting(),
        };
        CommandParser::parse(header, body, &ctx)
    }

    /// Returns a saved snippet composed with everything it depends on.
    pub fn render(&self, name: &str) -> Result<String> {
        self.snippets.render_snippet(name, self.quoting())
    }

    /// Runs one command: a header line plus an optional body.
    pub async fn execute(&mut self, header: &str, body: &str) -> Result<Reply> {
        let parsed = self.parse(header, body)?;
        let args = &parsed.args;
        let mut notices = Vec::new();

        if !args.interact.is_empty() {
            return Err(CellError::missing_package(
                "--interact needs an interactive widget frontend, which is not available here",
            ));
        }
        if args.connections {
            return Ok(Reply::new(
                Outcome::Status(self.registry.connection_list()),
                notices,
            ));
        }
        if let Some(name) = &args.close {
            self.registry.close(name).await?;
            return Ok(Reply::new(Outcome::Nothing, notices));
        }

        self.select_connection(&parsed, &mut notices).await?;

        if args.wants_persist() {
            let outcome = self.persist(&parsed, &mut notices).await?;
            return Ok(Reply::new(outcome, notices));
        }

        if parsed.sql.trim().is_empty() {
            if self.registry.current().is_none() {
                return Ok(Reply::new(Outcome::Nothing, notices));
            }
        } else {
            if let Some(name) = &args.save {
                self.snippets
                    .store(name, &parsed.sql_original, &args.with_)?;
                info!("Saved snippet '{}'", name);
            }
            if args.no_execute {
                return Ok(Reply::new(
                    Outcome::Status("Skipping execution...".to_string()),
                    notices,
                ));
            }
        }

        let connection = self.registry.require_current()?;
        let client = connection.client().clone();
        let name = connection.name.clone();

        let mut executor = QueryExecutor::new(client.as_ref(), &self.config.settings, &name);
        if client.dialect().caps.meta_commands {
            executor = executor.with_meta_handler(&self.meta);
        }

        let execution = match executor.run(&parsed.sql).await {
            Ok(execution) => execution,
            Err(CellError::Driver(message)) => {
                return Err(self.driver_error(message, &parsed.sql));
            }
            Err(e) => return Err(e),
        };
        notices.extend(execution.notices);

        let outcome = self.route(execution.output, &parsed, &mut notices);
        Ok(Reply::new(outcome, notices))
    }

    async fn select_connection(&mut self, parsed: &ParsedCommand, notices: &mut Vec<String>) -> Result<()> {
        let args = &parsed.args;
        let creator = match &args.creator {
            Some(name) => Some(self.handle(name)?),
            None => None,
        };
        let options = OpenOptions {
            connect_options: parsed.connect_options.clone(),
            alias: args.alias.as_deref(),
            creator,
        };

        match &parsed.connection {
            Some(ConnectionRef::ConnectString(connect_str)) => {
                self.registry
                    .set(Descriptor::ConnectString(connect_str), options)
                    .await?;
            }
            Some(ConnectionRef::Handle(name)) => {
                let client = self.handle(name)?;
                self.registry.set(Descriptor::Handle(client), options).await?;
            }
            Some(ConnectionRef::Alias(key)) => {
                self.registry.set(Descriptor::Key(key), options).await?;
            }
            None => {
                let listing = self
                    .registry
                    .resolve_default(
                        self.config.settings.displaycon,
                        self.database_url.clone(),
                        options,
                    )
                    .await?;
                notices.extend(listing);
            }
        }
        Ok(())
    }

    fn handle(&self, name: &str) -> Result<SharedClient> {
        self.variables
            .connection(name)
            .cloned()
            .ok_or_else(|| CellError::usage(format!("{name:?} is not bound to a connection")))
    }

    async fn persist(&mut self, parsed: &ParsedCommand, notices: &mut Vec<String>) -> Result<Outcome> {
        let args = &parsed.args;
        let if_exists = if args.persist && args.persist_replace {
            let message = "Please use either --persist or --persist-replace";
            warn!("{}", message);
            notices.push(message.to_string());
            IfExists::Replace
        } else if args.persist_replace {
            IfExists::Replace
        } else if args.append {
            IfExists::Append
        } else {
            IfExists::Fail
        };

        let variable = parsed.sql.trim().trim_matches(';').trim();
        if variable.is_empty() {
            return Err(CellError::usage(
                "Missing argument: --persist <name_of_result_variable>",
            ));
        }
        if !is_identifier(variable) {
            return Err(CellError::usage(format!(
                "Expected {variable:?} to be a result set but it's not a valid identifier"
            )));
        }
        let frame = match self.variables.get(variable) {
            None => {
                return Err(CellError::usage(format!(
                    "Expected {variable:?} to be a result set but it's undefined"
                )))
            }
            Some(Binding::Rows(rows)) => rows.to_frame(),
            Some(Binding::Frame(frame)) => frame.clone(),
            Some(Binding::Column(values)) => Frame {
                names: vec![variable.to_string()],
                columns: vec![values.clone()],
            },
            Some(_) => {
                return Err(CellError::usage(format!(
                    "{variable:?} is not a result set or frame"
                )))
            }
        };

        let table = persist::table_name_for(variable)?;
        let client = self.registry.require_current()?.client().clone();
        persist::persist_frame(
            client.as_ref(),
            &table,
            &frame,
            if_exists,
            !args.no_index,
            notices,
        )
        .await?;
        Ok(Outcome::Status(format!("Persisted {table}")))
    }

    /// Rewrites a driver error into a usage error with detail when `short_errors` is on.
    fn driver_error(&self, message: String, sql: &str) -> CellError {
        match error_message::detail(&message, sql) {
            Some(detail) if self.config.settings.short_errors => CellError::usage(detail),
            Some(detail) => {
                debug!("{}", detail);
                CellError::driver(message)
            }
            None => CellError::driver(message),
        }
    }

    /// Binds results to variables as configured and picks what to return.
    fn route(&mut self, output: RunOutput, parsed: &ParsedCommand, notices: &mut Vec<String>) -> Outcome {
        let (binding, outcome) = match output {
            RunOutput::Status(status) => return Outcome::Status(status),
            RunOutput::Rows(rows) => (Binding::Rows(rows.clone()), Outcome::Rows(rows)),
            RunOutput::Frame(frame) => (Binding::Frame(frame.clone()), Outcome::Frame(frame)),
        };

        if self.config.settings.column_local_vars {
            let frame = match &binding {
                Binding::Rows(rows) => rows.to_frame(),
                Binding::Frame(frame) => frame.clone(),
                _ => Frame::default(),
            };
            if self.config.settings.feedback {
                notices.push(format!(
                    "Returning data to local variables [{}]",
                    frame.names.join(", ")
                ));
            }
            for (name, values) in frame.names.into_iter().zip(frame.columns) {
                self.variables.set(name, Binding::Column(values));
            }
            return Outcome::Nothing;
        }

        match &parsed.result_var {
            Some(name) => {
                debug!("Binding result to '{}'", name);
                self.variables.set(name.clone(), binding);
                if parsed.return_result_var {
                    outcome
                } else {
                    Outcome::Nothing
                }
            }
            None => outcome,
        }
    }

    /// Closes every open connection.
    pub async fn shutdown(&mut self) {
        self.registry.close_all().await;
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
