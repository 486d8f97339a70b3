use std::fmt;

use serde::{Deserialize, Serialize};

/// Positional context of a row being processed.
///
/// `line_number` counts physical lines (a quoted value may span several),
/// `row_number` counts records including the header. Both are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RowContext {
    pub line_number: usize,
    pub row_number: usize,
    /// 1-based column currently processed; 0 before any column.
    pub column_number: usize,
}

impl RowContext {
    pub fn new(line_number: usize, row_number: usize) -> Self {
        Self {
            line_number,
            row_number,
            column_number: 0,
        }
    }

    #[must_use]
    pub fn at_column(mut self, column_number: usize) -> Self {
        self.column_number = column_number;
        self
    }
}

impl fmt::Display for RowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, row {}", self.line_number, self.row_number)?;
        if self.column_number > 0 {
            write!(f, ", column {}", self.column_number)?;
        }
        Ok(())
    }
}
