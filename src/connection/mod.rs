//! Connection management for db-cell.
//!
//! Tracks every open connection, the current one, and aliases.

pub mod registry;

pub use registry::{Connection, ConnectionRegistry, Descriptor, OpenOptions};
