//! Splits a script file into cells.
//!
//! A line starting with `%%sql` opens a cell: the rest of that line is the
//! header and the following lines, up to the next marker, are the body. A
//! `%sql` line is a complete one-line cell. Text before the first marker forms
//! a cell with an empty header.

/// One command of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub header: String,
    pub body: String,
    /// 1-based line of the cell's first line.
    pub line: usize,
}

impl Cell {
    fn new(header: &str, line: usize) -> Self {
        Self {
            header: header.trim().to_string(),
            body: String::new(),
            line,
        }
    }

    fn is_blank(&self) -> bool {
        self.header.is_empty() && self.body.trim().is_empty()
    }
}

pub fn split_cells(script: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut current: Option<Cell> = None;

    for (index, line) in script.lines().enumerate() {
        let number = index + 1;
        if let Some(header) = line.strip_prefix("%%sql") {
            cells.extend(current.take());
            current = Some(Cell::new(header, number));
        } else if let Some(header) = line.strip_prefix("%sql") {
            cells.extend(current.take());
            cells.push(Cell::new(header, number));
        } else {
            let cell = current.get_or_insert_with(|| Cell::new("", number));
            if !cell.body.is_empty() {
                cell.body.push('\n');
            }
            cell.body.push_str(line);
        }
    }
    cells.extend(current);

    cells.retain(|cell| !cell.is_blank());
    for cell in &mut cells {
        cell.body = cell.body.trim_end().to_string();
    }
    cells
}
