//! Statement execution and commit policy.
//!
//! Every call to [`QueryExecutor::run`] walks the same state machine:
//! `Idle -> Splitting -> {MetaCommand | TransactionRejected | Executing} ->
//! Committing -> Materializing -> Done`. The native frame path is a terminal
//! branch of `Materializing` rather than a separate pipeline.

use super::meta::MetaCommandHandler;
use super::splitter::{is_meta_command, is_transaction_start, split_statements};
use crate::config::Settings;
use crate::db::{DatabaseClient, RawResult, RawSession};
use crate::error::{CellError, Result};
use crate::result::{Frame, ResultSet};
use tracing::{debug, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Splitting,
    MetaCommand,
    Executing,
    Committing,
    Materializing,
    Done,
    /// Terminal failure: the payload asked for explicit transaction control.
    TransactionRejected,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    /// A scalar status, e.g. `Connected: user@db`.
    Status(String),
    /// The last statement's rows.
    Rows(ResultSet),
    /// The last statement's rows as a columnar frame.
    Frame(Frame),
}

/// Output plus the advisory messages printed along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub output: RunOutput,
    /// Feedback and warnings (rows affected, commit unsupported, ...).
    pub notices: Vec<String>,
}

impl Execution {
    fn status(message: String) -> Self {
        Self {
            output: RunOutput::Status(message),
            notices: Vec::new(),
        }
    }
}

/// Runs SQL payloads against one client under the configured policy.
pub struct QueryExecutor<'a> {
    client: &'a dyn DatabaseClient,
    settings: &'a Settings,
    connection_name: &'a str,
    meta: Option<&'a dyn MetaCommandHandler>,
}

struct RunState {
    stage: Stage,
    notices: Vec<String>,
    manual_commit: Option<bool>,
}

impl RunState {
    fn enter(&mut self, next: Stage) {
        debug!("Executor stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    fn notice(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.notices.push(message);
    }
}

impl<'a> QueryExecutor<'a> {
    pub fn new(
        client: &'a dyn DatabaseClient,
        settings: &'a Settings,
        connection_name: &'a str,
    ) -> Self {
        Self {
            client,
            settings,
            connection_name,
            meta: None,
        }
    }

    /// Attaches the handler for backslash meta-commands.
    pub fn with_meta_handler(mut self, handler: &'a dyn MetaCommandHandler) -> Self {
        self.meta = Some(handler);
        self
    }

    /// Runs every statement of `sql`; only the last statement's result is returned.
    ///
    /// Driver errors propagate unchanged. Commit failures are reported as notices.
    pub async fn run(&self, sql: &str) -> Result<Execution> {
        let mut state = RunState {
            stage: Stage::Idle,
            notices: Vec::new(),
            manual_commit: None,
        };

        if sql.trim().is_empty() {
            return Ok(Execution::status(format!("Connected: {}", self.connection_name)));
        }

        state.enter(Stage::Splitting);
        let statements = split_statements(sql);
        if statements.is_empty() {
            return Ok(Execution::status(format!("Connected: {}", self.connection_name)));
        }
        if statements.iter().any(|s| is_transaction_start(s)) {
            state.enter(Stage::TransactionRejected);
            return Err(CellError::runtime("db-cell does not support transactions"));
        }

        let dialect = self.client.dialect();
        if self.settings.autoframe && dialect.caps.native_frames {
            return self.run_native(&statements, state).await;
        }

        let fetch_limit = self.settings.fetch_limit();
        let mut last: Option<RawResult> = None;

        for statement in &statements {
            let result = if is_meta_command(statement) && dialect.caps.meta_commands {
                state.enter(Stage::MetaCommand);
                let handler = self.meta.ok_or_else(|| {
                    CellError::missing_package("pgspecial-compatible meta-command handler not installed")
                })?;
                handler.execute(self.client, statement).await?
            } else {
                self.decide_autocommit(&mut state).await;
                state.enter(Stage::Executing);
                let result = self.client.execute(statement, fetch_limit).await?;
                self.commit(&mut state).await;

                if self.settings.feedback && !result.returns_rows {
                    state.notice(interpret_rowcount(result.rows_affected));
                }
                result
            };
            last = Some(result);
        }

        state.enter(Stage::Materializing);
        let rows = ResultSet::new(last.unwrap_or_default(), fetch_limit);
        let output = if self.settings.autoframe {
            RunOutput::Frame(rows.to_frame())
        } else {
            RunOutput::Rows(rows)
        };

        state.enter(Stage::Done);
        Ok(Execution {
            output,
            notices: state.notices,
        })
    }

    /// Decides once per run whether statements must be committed by hand.
    async fn decide_autocommit(&self, state: &mut RunState) {
        if state.manual_commit.is_some() {
            return;
        }

        let dialect = self.client.dialect();
        let manual = if dialect.caps.disables_autocommit {
            let driver = dialect.driver.as_deref().unwrap_or(dialect.name.as_str());
            let message =
                format!("Autocommit is not supported for {driver}, thus is automatically disabled");
            warn!("{}", message);
            state.notices.push(message);
            false
        } else if self.settings.autocommit {
            match self.client.set_autocommit(true).await {
                Ok(()) => false,
                Err(e) => {
                    debug!(
                        "The database driver doesn't support the AUTOCOMMIT option, \
                         falling back to manual COMMIT: {}",
                        e
                    );
                    true
                }
            }
        } else {
            false
        };
        state.manual_commit = Some(manual);
    }

    async fn commit(&self, state: &mut RunState) {
        let should_commit = self.settings.autocommit
            && !self.client.dialect().caps.rejects_explicit_commit
            && state.manual_commit == Some(true);
        if !should_commit {
            return;
        }

        state.enter(Stage::Committing);
        if let Err(e) = self.client.commit().await {
            debug!("COMMIT failed: {}", e);
            let message = "The database does not support the COMMIT command";
            warn!("{}", message);
            state.notices.push(message.to_string());
        }
    }

    /// Native frame path: a dedicated raw session runs every statement and
    /// materializes the last one directly, then is closed.
    async fn run_native(&self, statements: &[String], mut state: RunState) -> Result<Execution> {
        state.enter(Stage::Executing);
        let mut session = self.client.open_raw_session().await?;

        let outcome = run_on_raw_session(session.as_mut(), statements, &mut state).await;
        let closed = session.close().await;
        let frame = outcome?;
        closed?;

        state.enter(Stage::Done);
        Ok(Execution {
            output: RunOutput::Frame(frame),
            notices: state.notices,
        })
    }
}

async fn run_on_raw_session(
    session: &mut dyn RawSession,
    statements: &[String],
    state: &mut RunState,
) -> Result<Frame> {
    for statement in statements {
        session.execute(statement).await?;
    }
    state.enter(Stage::Materializing);
    session.fetch_frame().await
}

/// Feedback line for a statement that returned no rows.
pub fn interpret_rowcount(rows_affected: Option<u64>) -> String {
    match rows_affected {
        Some(count) => format!("{count} rows affected."),
        None => "Done.".to_string(),
    }
}
