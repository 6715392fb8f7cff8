//! Columnar result representation.

use crate::db::{Row, Value};
use serde::Serialize;

/// A columnar table: one vector of values per named column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub names: Vec<String>,
    pub columns: Vec<Vec<Value>>,
}

impl Frame {
    /// Pivots row-major data into columns.
    ///
    /// Rows shorter than `names` are padded with NULL.
    pub fn from_rows(names: Vec<String>, rows: Vec<Row>) -> Self {
        let mut columns: Vec<Vec<Value>> = names
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for row in rows {
            let mut values = row.into_iter();
            for column in columns.iter_mut() {
                column.push(values.next().unwrap_or(Value::Null));
            }
        }

        Self { names, columns }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the values of the named column.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Returns row `index` rebuilt from the columns.
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index].clone()).collect())
    }

    /// Iterates over the rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}
