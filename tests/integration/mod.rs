//! Integration tests for db-cell.

pub mod postgres_test;
pub mod script_test;
pub mod session_test;
pub mod snippet_test;
