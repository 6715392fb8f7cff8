//! The calling scope: named values visible to commands.
//!
//! Commands read bindings for `{{name}}` templates and connection handles,
//! and write results back through the shovel operator or `column_local_vars`.

use crate::db::{SharedClient, Value};
use crate::result::{Frame, ResultSet};
use indexmap::IndexMap;
use std::fmt;

/// A value bound to a name in the calling scope.
#[derive(Clone)]
pub enum Binding {
    /// A scalar value.
    Value(Value),
    /// A live connection handle, usable as an inline connection reference.
    Connection(SharedClient),
    /// A materialized result set.
    Rows(ResultSet),
    /// A columnar frame.
    Frame(Frame),
    /// One column's values.
    Column(Vec<Value>),
}

impl Binding {
    /// Returns the connection handle if this binding holds one.
    pub fn as_connection(&self) -> Option<&SharedClient> {
        match self {
            Binding::Connection(client) => Some(client),
            _ => None,
        }
    }

    /// Text substituted for `{{name}}` in templates.
    pub fn as_text(&self) -> String {
        match self {
            Binding::Value(value) => value.to_display_string(),
            Binding::Connection(client) => client.url().to_string(),
            Binding::Rows(rows) => rows.render_table(0),
            Binding::Frame(frame) => ResultSet::from_frame(frame).render_table(0),
            Binding::Column(values) => {
                let items: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
                format!("({})", items.join(", "))
            }
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Binding::Connection(client) => f.debug_tuple("Connection").field(&client.url()).finish(),
            Binding::Rows(rows) => f.debug_tuple("Rows").field(rows).finish(),
            Binding::Frame(frame) => f.debug_tuple("Frame").field(frame).finish(),
            Binding::Column(values) => f.debug_tuple("Column").field(values).finish(),
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Value(Value::Int(value))
    }
}

impl From<ResultSet> for Binding {
    fn from(rows: ResultSet) -> Self {
        Binding::Rows(rows)
    }
}

impl From<Frame> for Binding {
    fn from(frame: Frame) -> Self {
        Binding::Frame(frame)
    }
}

/// Named bindings, in the order they were first set.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    bindings: IndexMap<String, Binding>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing any previous binding.
    pub fn set(&mut self, name: impl Into<String>, binding: impl Into<Binding>) {
        self.bindings.insert(name.into(), binding.into());
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.bindings.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns the connection handle bound to `name`, if any.
    pub fn connection(&self, name: &str) -> Option<&SharedClient> {
        self.get(name).and_then(Binding::as_connection)
    }

    /// Template text for `name`.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(Binding::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockDatabaseClient, RawResult};
    use std::sync::Arc;

    #[test]
    fn test_set_get_replace() {
        let mut vars = Variables::new();
        vars.set("limit", 10i64);
        vars.set("name", "Brecht");
        assert_eq!(vars.text("limit").as_deref(), Some("10"));

        vars.set("limit", 20i64);
        assert_eq!(vars.text("limit").as_deref(), Some("20"));
        assert_eq!(vars.names().collect::<Vec<_>>(), vec!["limit", "name"]);

        assert!(vars.remove("name").is_some());
        assert!(!vars.contains("name"));
    }

    #[test]
    fn test_connection_binding() {
        let mut vars = Variables::new();
        let client: SharedClient = Arc::new(MockDatabaseClient::from_url("mock://duckdb"));
        vars.set("conn", Binding::Connection(client));
        vars.set("other", 1i64);

        assert!(vars.connection("conn").is_some());
        assert!(vars.connection("other").is_none());
        assert!(format!("{:?}", vars.get("conn").unwrap()).contains("mock://duckdb"));
    }

    #[test]
    fn test_column_text_is_sql_list() {
        let binding = Binding::Column(vec![Value::Int(1), Value::from("a'b")]);
        assert_eq!(binding.as_text(), "(1, 'a''b')");
    }

    #[test]
    fn test_rows_text_is_table() {
        let rows = ResultSet::new(
            RawResult::with_rows(vec!["x".into()], vec![vec![Value::Int(1)]]),
            None,
        );
        assert!(Binding::from(rows).as_text().contains("| x |"));
    }
}
