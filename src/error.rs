//! Error types for db-cell.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for db-cell operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Malformed command, unknown or invalid snippet name, missing required flag.
    #[error("Usage error: {0}")]
    Usage(String),

    /// An optional collaborator or driver package is not available.
    #[error("Missing package: {0}")]
    MissingPackage(String),

    /// Unsupported runtime request (explicit transactions, unknown connection to close).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Error raised by the database driver while executing a statement.
    ///
    /// Displayed verbatim: the driver's diagnostic is the useful part.
    #[error("{0}")]
    Driver(String),

    /// Database connection errors (bad connect string, host unreachable, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result-set lookup by leftmost-column value failed.
    #[error("Key error: {0}")]
    Key(String),

    /// File include or export failures.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CellError {
    /// Creates a usage error with the given message.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates a missing-package error with the given message.
    pub fn missing_package(msg: impl Into<String>) -> Self {
        Self::MissingPackage(msg.into())
    }

    /// Creates a runtime error with the given message.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a driver error with the given message.
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a key error with the given message.
    pub fn key(msg: impl Into<String>) -> Self {
        Self::Key(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Usage(_) => "Usage Error",
            Self::MissingPackage(_) => "Missing Package",
            Self::Runtime(_) => "Runtime Error",
            Self::Driver(_) => "Database Error",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Key(_) => "Key Error",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<std::io::Error> for CellError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type alias using CellError.
pub type Result<T> = std::result::Result<T, CellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_usage() {
        let err = CellError::usage("No saved SQL");
        assert_eq!(err.to_string(), "Usage error: No saved SQL");
        assert_eq!(err.category(), "Usage Error");
    }

    #[test]
    fn test_error_display_missing_package() {
        let err = CellError::missing_package("pgspecial-compatible meta-command handler not installed");
        assert_eq!(
            err.to_string(),
            "Missing package: pgspecial-compatible meta-command handler not installed"
        );
        assert_eq!(err.category(), "Missing Package");
    }

    #[test]
    fn test_driver_error_is_verbatim() {
        let err = CellError::driver("no such table: nope");
        assert_eq!(err.to_string(), "no such table: nope");
        assert_eq!(err.category(), "Database Error");
    }

    #[test]
    fn test_error_display_runtime() {
        let err = CellError::runtime("transactions are not supported");
        assert_eq!(
            err.to_string(),
            "Runtime error: transactions are not supported"
        );
        assert_eq!(err.category(), "Runtime Error");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.sql");
        let err: CellError = io.into();
        assert_eq!(err.category(), "I/O Error");
        assert!(err.to_string().contains("missing.sql"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CellError>();
    }
}
