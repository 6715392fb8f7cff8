//! Query execution for db-cell.
//!
//! Splits payloads into statements, dispatches them to the facade or the
//! meta-command handler, applies the commit policy and materializes the
//! last result.

pub mod error_message;
pub mod executor;
pub mod meta;
pub mod splitter;

pub use executor::{interpret_rowcount, Execution, QueryExecutor, RunOutput, Stage};
pub use meta::{MetaCommandHandler, PgMetaCommands};
pub use splitter::{first_keyword, is_meta_command, is_transaction_start, split_statements};
