//! Materialized statement results.

use crate::db::{RawResult, Row, Value};
use crate::error::{CellError, Result};
use crate::result::csv_export::{self, CsvOptions, CsvResultDescriptor};
use crate::result::Frame;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// Rows and column names of one executed statement.
///
/// Rows are bounded by the fetch-time limit when the set is built and are never
/// re-queried; every accessor reads the same materialized data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    keys: Vec<String>,
    rows: Vec<Row>,
    rows_affected: Option<u64>,
    returns_rows: bool,
    row_limit: Option<usize>,
}

impl ResultSet {
    /// Builds a result set, keeping at most `row_limit` rows.
    pub fn new(raw: RawResult, row_limit: Option<usize>) -> Self {
        let mut rows = raw.rows;
        if let Some(limit) = row_limit {
            rows.truncate(limit);
        }

        Self {
            keys: unduplicate_field_names(&raw.columns),
            rows,
            rows_affected: raw.rows_affected,
            returns_rows: raw.returns_rows,
            row_limit,
        }
    }

    /// Column names, with duplicates suffixed `_1`, `_2`, ...
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// The fetch-time bound this set was built with.
    pub fn row_limit(&self) -> Option<usize> {
        self.row_limit
    }

    /// Rows affected by a DML statement, if the driver reported it.
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// Whether the statement produced rows (as opposed to DDL/DML).
    pub fn returns_rows(&self) -> bool {
        self.returns_rows
    }

    /// Row at position `index`.
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Looks up the unique row whose leftmost column equals `key`.
    pub fn by_key(&self, key: &str) -> Result<&Row> {
        let mut matches = self
            .rows
            .iter()
            .filter(|row| row.first().is_some_and(|v| v.matches_key(key)));

        let first = matches
            .next()
            .ok_or_else(|| CellError::key(format!("'{key}' not found")))?;

        let others = matches.count();
        if others > 0 {
            return Err(CellError::key(format!(
                "{} results for \"{key}\"",
                others + 1
            )));
        }
        Ok(first)
    }

    /// Column name to the tuple of its values.
    pub fn to_dict(&self) -> IndexMap<String, Vec<Value>> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let values = self
                    .rows
                    .iter()
                    .map(|row| row.get(i).cloned().unwrap_or_default())
                    .collect();
                (key.clone(), values)
            })
            .collect()
    }

    /// One mapping per row.
    pub fn to_dicts(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.keys
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Rebuilds a result set from a frame, e.g. for rendering.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::new(RawResult::with_rows(frame.names.clone(), frame.rows().collect()), None)
    }

    /// Converts to a columnar frame.
    pub fn to_frame(&self) -> Frame {
        Frame::from_rows(self.keys.clone(), self.rows.clone())
    }

    /// JSON array of row objects.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .keys
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// CSV text, or `None` when the statement produced no columns.
    pub fn to_csv_string(&self, options: &CsvOptions) -> Result<Option<String>> {
        if self.keys.is_empty() {
            return Ok(None);
        }
        csv_export::to_string(&self.keys, &self.rows, options.delimiter).map(Some)
    }

    /// Streams the rows to a CSV file at `path`.
    pub fn write_csv(&self, path: &Path, options: &CsvOptions) -> Result<CsvResultDescriptor> {
        if self.keys.is_empty() {
            return Err(CellError::usage("the statement returned no columns to write"));
        }
        csv_export::to_file(path, &self.keys, &self.rows, options)
    }

    /// Plain-text table of at most `displaylimit` rows (0 means all).
    pub fn render_table(&self, displaylimit: usize) -> String {
        let shown = if displaylimit == 0 {
            self.rows.len()
        } else {
            self.rows.len().min(displaylimit)
        };

        let cells: Vec<Vec<String>> = self.rows[..shown]
            .iter()
            .map(|row| row.iter().map(Value::to_display_string).collect())
            .collect();

        let mut widths: Vec<usize> = self.keys.iter().map(|k| k.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let separator = format!(
            "+{}+",
            widths
                .iter()
                .map(|w| "-".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("+")
        );
        let format_line = |values: &[String]| {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let value = values.get(i).map(String::as_str).unwrap_or("");
                    format!(" {value:<w$} ")
                })
                .collect();
            format!("|{}|", padded.join("|"))
        };

        let mut lines = vec![separator.clone(), format_line(&self.keys), separator.clone()];
        lines.extend(cells.iter().map(|row| format_line(row)));
        lines.push(separator);

        if shown < self.rows.len() {
            lines.push(format!(
                "{} rows, truncated to displaylimit of {}",
                self.rows.len(),
                displaylimit
            ));
        }
        lines.join("\n")
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_table(0))
    }
}

/// Suffixes repeated column names with `_1`, `_2`, ... in order of appearance.
fn unduplicate_field_names(names: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while result.contains(&candidate) {
            candidate = format!("{name}_{suffix}");
            suffix += 1;
        }
        result.push(candidate);
    }
    result
}
