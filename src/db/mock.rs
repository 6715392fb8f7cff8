//! Mock database client for testing.
//!
//! Records every call made through the facade and answers statements from a
//! table of canned responses.

use super::{DatabaseClient, Dialect, RawResult, RawSession, Value};
use crate::error::{CellError, Result};
use crate::result::Frame;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    executed: Vec<String>,
    autocommit_calls: Vec<bool>,
    raw_executed: Vec<String>,
}

/// A mock database client that returns predefined results.
#[derive(Debug)]
pub struct MockDatabaseClient {
    dialect: Dialect,
    url: String,
    responses: HashMap<String, std::result::Result<RawResult, String>>,
    fail_autocommit: bool,
    commit_error: Option<String>,
    state: Arc<Mutex<MockState>>,
    commits: AtomicUsize,
    closed: AtomicBool,
    raw_sessions_closed: Arc<AtomicUsize>,
}

fn normalize(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim().to_string()
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDatabaseClient {
    /// Creates a mock client speaking the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            url: format!("mock://{dialect}"),
            dialect,
            responses: HashMap::new(),
            fail_autocommit: false,
            commit_error: None,
            state: Arc::new(Mutex::new(MockState::default())),
            commits: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            raw_sessions_closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a mock client from a `mock://<dialect>[+driver]` URL.
    pub fn from_url(url: &str) -> Self {
        let rest = url.strip_prefix("mock://").unwrap_or("");
        let scheme = rest.split(['/', '?']).next().unwrap_or("");
        let scheme = if scheme.is_empty() { "mock" } else { scheme };
        let mut client = Self::new(Dialect::from_scheme(scheme));
        client.url = url.to_string();
        client
    }

    /// Answers `sql` with the given result.
    pub fn with_response(mut self, sql: &str, result: RawResult) -> Self {
        self.responses.insert(normalize(sql), Ok(result));
        self
    }

    /// Answers `sql` with a driver error.
    pub fn with_error(mut self, sql: &str, message: &str) -> Self {
        self.responses
            .insert(normalize(sql), Err(message.to_string()));
        self
    }

    /// Makes `set_autocommit` fail, as drivers without the option do.
    pub fn failing_autocommit(mut self) -> Self {
        self.fail_autocommit = true;
        self
    }

    /// Makes `commit` fail with the given driver message.
    pub fn failing_commit(mut self, message: &str) -> Self {
        self.commit_error = Some(message.to_string());
        self
    }

    /// Statements executed through the facade, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    /// Statements executed through raw sessions, in order.
    pub fn raw_executed(&self) -> Vec<String> {
        lock(&self.state).raw_executed.clone()
    }

    /// Arguments of every `set_autocommit` call.
    pub fn autocommit_calls(&self) -> Vec<bool> {
        lock(&self.state).autocommit_calls.clone()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of raw sessions that were closed.
    pub fn raw_sessions_closed(&self) -> usize {
        self.raw_sessions_closed.load(Ordering::SeqCst)
    }

    fn respond(&self, sql: &str) -> Result<RawResult> {
        if let Some(response) = self.responses.get(&normalize(sql)) {
            return response.clone().map_err(CellError::driver);
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            Ok(RawResult::with_rows(
                vec!["result".to_string()],
                vec![vec![Value::String(format!("Mock result for: {}", sql.trim()))]],
            ))
        } else {
            Ok(RawResult::affected(0))
        }
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new(Dialect::detect("sqlite", None))
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn execute(&self, sql: &str, fetch_limit: Option<usize>) -> Result<RawResult> {
        lock(&self.state).executed.push(sql.to_string());
        let mut result = self.respond(sql)?;
        result.truncate(fetch_limit);
        Ok(result)
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        lock(&self.state).autocommit_calls.push(enabled);
        if self.fail_autocommit {
            return Err(CellError::driver(
                "driver does not support the AUTOCOMMIT execution option",
            ));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if let Some(message) = &self.commit_error {
            return Err(CellError::driver(message.clone()));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn open_raw_session(&self) -> Result<Box<dyn RawSession>> {
        if !self.dialect.caps.native_frames {
            return Err(CellError::missing_package(format!(
                "native frame materialization is not available for {}",
                self.dialect
            )));
        }
        Ok(Box::new(MockRawSession {
            responses: self.responses.clone(),
            state: Arc::clone(&self.state),
            closed: Arc::clone(&self.raw_sessions_closed),
            last: None,
        }))
    }
}

/// Raw session handed out by the mock for the native frame path.
pub struct MockRawSession {
    responses: HashMap<String, std::result::Result<RawResult, String>>,
    state: Arc<Mutex<MockState>>,
    closed: Arc<AtomicUsize>,
    last: Option<RawResult>,
}

#[async_trait]
impl RawSession for MockRawSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        lock(&self.state).raw_executed.push(sql.to_string());
        let result = match self.responses.get(&normalize(sql)) {
            Some(response) => response.clone().map_err(CellError::driver)?,
            None => RawResult::affected(0),
        };
        self.last = Some(result);
        Ok(())
    }

    async fn fetch_frame(&mut self) -> Result<Frame> {
        let raw = self.last.take().unwrap_or_default();
        Ok(Frame::from_rows(raw.columns, raw.rows))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_select() {
        let client = MockDatabaseClient::default();
        let result = client.execute("SELECT 1", None).await.unwrap();
        assert!(result.returns_rows);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(client.executed(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_insert() {
        let client = MockDatabaseClient::default();
        let result = client
            .execute("INSERT INTO test VALUES (1)", None)
            .await
            .unwrap();
        assert!(!result.returns_rows);
        assert_eq!(result.rows_affected, Some(0));
    }

    #[tokio::test]
    async fn test_canned_response_honors_fetch_limit() {
        let rows = (0..5).map(|i| vec![Value::Int(i)]).collect();
        let client = MockDatabaseClient::default()
            .with_response("SELECT x FROM t;", RawResult::with_rows(vec!["x".into()], rows));
        let result = client.execute("SELECT x FROM t", Some(3)).await.unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[tokio::test]
    async fn test_canned_error() {
        let client = MockDatabaseClient::default().with_error("SELECT nope", "no such column: nope");
        let err = client.execute("SELECT nope", None).await.unwrap_err();
        assert_eq!(err, CellError::driver("no such column: nope"));
    }

    #[test]
    fn test_from_url_detects_dialect() {
        let client = MockDatabaseClient::from_url("mock://mssql+pytds");
        assert!(client.dialect().caps.disables_autocommit);
        assert_eq!(client.url(), "mock://mssql+pytds");
    }

    #[tokio::test]
    async fn test_raw_session_requires_native_frames() {
        let client = MockDatabaseClient::default();
        assert!(client.open_raw_session().await.is_err());

        let client = MockDatabaseClient::from_url("mock://duckdb");
        let mut session = client.open_raw_session().await.unwrap();
        session.execute("SELECT 1").await.unwrap();
        session.close().await.unwrap();
        assert_eq!(client.raw_sessions_closed(), 1);
        assert_eq!(client.raw_executed(), vec!["SELECT 1".to_string()]);
    }
}
