//! Text rendering of cell grids.

use std::fmt;

use serde_json::Value;

use crate::a1::{column_index_to_letter, CellRef};

/// Render a single cell value as display text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A grid of cell values positioned at a start cell.
///
/// Renders as a table headed by column letters with 1-based row numbers
/// down the left edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTable {
    start: CellRef,
    rows: Vec<Vec<String>>,
}

impl CellTable {
    pub fn new(start: CellRef, values: &[Vec<Value>]) -> Self {
        let rows = values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Self { start, rows }
    }

    /// Pad with empty rows up to `count`. The API omits trailing blank rows.
    pub fn pad_rows(mut self, count: usize) -> Self {
        while self.rows.len() < count {
            self.rows.push(Vec::new());
        }
        self
    }

    /// Pad every row with empty cells up to `count` columns.
    pub fn pad_columns(mut self, count: usize) -> Self {
        for row in &mut self.rows {
            while row.len() < count {
                row.push(String::new());
            }
        }
        self
    }

    pub fn start(&self) -> CellRef {
        self.start
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

impl fmt::Display for CellTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.column_count();

        write!(f, "| Row |")?;
        for offset in 0..columns {
            let column = self.start.column.saturating_add(offset as u32);
            write!(f, " {} |", column_index_to_letter(column))?;
        }
        writeln!(f)?;

        write!(f, "|-----|")?;
        for _ in 0..columns {
            write!(f, "---|")?;
        }
        writeln!(f)?;

        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "| {} |", self.start.row as usize + i)?;
            for c in 0..columns {
                let text = row.get(c).map(String::as_str).unwrap_or("");
                write!(f, " {} |", text.replace('|', "\\|").replace('\n', " "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
