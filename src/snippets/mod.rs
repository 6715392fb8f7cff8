//! Snippet storage and CTE composition.

mod store;

pub use store::{Snippet, SnippetStore};
