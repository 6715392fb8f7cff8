//! Database abstraction layer for db-cell.
//!
//! Provides a trait-based facade over live database sessions, allowing
//! different backends to be used interchangeably by the executor.

mod dialect;
mod mock;
mod postgres;
mod sqlite;
mod types;

pub use dialect::{Capabilities, Dialect, DialectFamily, IdentifierQuoting};
pub use mock::{MockDatabaseClient, MockRawSession};
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{RawResult, Row, Value};

use crate::error::{CellError, Result};
use crate::result::Frame;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A client shared between the registry, variables and the executor.
pub type SharedClient = Arc<dyn DatabaseClient>;

/// Drivers that are recognised but not bundled, with the package that provides them.
const UNBUNDLED_DRIVERS: &[(&str, &str)] = &[
    ("mysql", "sqlx-mysql"),
    ("mariadb", "sqlx-mysql"),
    ("duckdb", "duckdb"),
    ("mssql", "tiberius"),
    ("oracle", "oracle"),
    ("clickhouse", "clickhouse"),
    ("snowflake", "snowflake-connector"),
    ("bigquery", "gcp-bigquery-client"),
    ("redshift", "sqlx-postgres"),
];

/// Schemes with a bundled client.
const BUNDLED_SCHEMES: &[&str] = &["sqlite", "postgres", "postgresql", "mock"];

/// Extra options applied when opening a connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    /// Driver arguments, appended to the URL as query parameters.
    pub connect_args: serde_json::Map<String, serde_json::Value>,
}

impl ConnectOptions {
    /// Returns the URL with the connect arguments appended as encoded query parameters.
    ///
    /// Opaque URLs such as `sqlite::memory:` are rewritten with an explicit
    /// path (`sqlite:///:memory:`) so they can carry a query string.
    pub fn apply(&self, url: &str) -> Result<String> {
        if self.connect_args.is_empty() {
            return Ok(url.to_string());
        }

        let mut parsed = Url::parse(url)
            .map_err(|e| CellError::connection(format!("'{}' is not a valid connection string: {e}", mask_password(url))))?;
        if parsed.cannot_be_a_base() {
            let hierarchical = format!("{}:///{}", parsed.scheme(), parsed.path());
            parsed = Url::parse(&hierarchical)
                .map_err(|e| CellError::connection(format!("Cannot add connection arguments to '{url}': {e}")))?;
        }

        {
            let mut pairs = parsed.query_pairs_mut();
            for (key, value) in &self.connect_args {
                match value {
                    serde_json::Value::String(s) => pairs.append_pair(key, s),
                    other => pairs.append_pair(key, &other.to_string()),
                };
            }
        }
        Ok(parsed.into())
    }
}

/// Opens a client for the given connection string.
///
/// This is the central factory function for database connections.
pub async fn connect(url: &str, options: &ConnectOptions) -> Result<SharedClient> {
    let scheme = url_scheme(url)
        .ok_or_else(|| CellError::connection(format!("'{url}' is not a valid connection string")))?;
    let dialect = Dialect::from_scheme(&scheme);
    let full_url = options.apply(url)?;

    debug!("Opening {} connection", dialect);

    match dialect.name.as_str() {
        "sqlite" => Ok(Arc::new(SqliteClient::connect(&full_url, dialect).await?)),
        "postgres" | "postgresql" => {
            Ok(Arc::new(PostgresClient::connect(&full_url, dialect).await?))
        }
        "mock" => Ok(Arc::new(MockDatabaseClient::from_url(&full_url))),
        other => Err(missing_driver(other)),
    }
}

/// Extracts the scheme (`dialect[+driver]`) from a connection string.
pub fn url_scheme(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    Some(scheme.to_lowercase())
}

/// Builds the missing-package error for a dialect without a bundled client.
fn missing_driver(name: &str) -> CellError {
    if let Some((_, package)) = UNBUNDLED_DRIVERS.iter().find(|(driver, _)| *driver == name) {
        return CellError::missing_package(format!(
            "No driver for dialect '{name}' in this build. To fix it, try to install package: {package}"
        ));
    }

    let known = UNBUNDLED_DRIVERS
        .iter()
        .map(|(driver, _)| *driver)
        .chain(BUNDLED_SCHEMES.iter().copied());
    match closest_match(name, known) {
        Some(close) => CellError::missing_package(format!(
            "No driver for dialect '{name}'. Perhaps you meant to use driver the dialect: \"{close}\""
        )),
        None => CellError::missing_package(format!(
            "No driver for dialect '{name}'. To fix it, make sure you are using a correct driver name (one of: {})",
            BUNDLED_SCHEMES.join(", ")
        )),
    }
}

/// Returns the candidate closest to `name` by normalized edit distance, if close enough.
pub fn closest_match<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    const SIMILARITY_THRESHOLD: f64 = 0.6;

    let mut best: Option<(f64, &'a str)> = None;
    for candidate in candidates {
        let score = strsim::normalized_levenshtein(name, candidate);
        if score >= SIMILARITY_THRESHOLD && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

/// Replaces the password in a connection string with `***`.
pub fn mask_password(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}

/// Trait defining the facade over one live database session.
///
/// All calls are awaited one at a time by the executor; implementations do not
/// need to support concurrent statements on one session.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the dialect detected when the connection was opened.
    fn dialect(&self) -> &Dialect;

    /// Returns the connection string with the password masked.
    fn url(&self) -> &str;

    /// Executes one statement, fetching at most `fetch_limit` rows.
    async fn execute(&self, sql: &str, fetch_limit: Option<usize>) -> Result<RawResult>;

    /// Switches the session's autocommit mode.
    async fn set_autocommit(&self, enabled: bool) -> Result<()>;

    /// Commits the current transaction.
    async fn commit(&self) -> Result<()>;

    /// Closes the session.
    async fn close(&self) -> Result<()>;

    /// Opens a dedicated raw session able to materialize frames natively.
    async fn open_raw_session(&self) -> Result<Box<dyn RawSession>> {
        Err(CellError::missing_package(format!(
            "native frame materialization is not available for {}",
            self.dialect()
        )))
    }
}

/// A dedicated driver session used by the native frame path.
#[async_trait]
pub trait RawSession: Send {
    /// Executes a statement on the raw session.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Materializes the last statement's result as a frame.
    async fn fetch_frame(&mut self) -> Result<Frame>;

    /// Closes the raw session.
    async fn close(&mut self) -> Result<()>;
}
