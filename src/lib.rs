//! db-cell: SQL cells run against live database connections.
//!
//! A cell is a header line (connection, flags) plus a body of SQL. Cells can
//! save their query as a named snippet and compose saved snippets into CTE
//! chains. This library exposes the core modules for the binary and for
//! integration tests.

pub mod command;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod result;
pub mod script;
pub mod session;
pub mod snippets;
pub mod variables;

pub use error::{CellError, Result};
pub use session::{Outcome, Reply, Session};
