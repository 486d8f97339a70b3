//! Row-level reader and writer interfaces.
//!
//! Tokenizing and file handling live behind these traits; the core only
//! sees one ordered sequence of raw tokens per record.

use std::error::Error as StdError;

use rowbind_model::RowContext;

/// Raw tokens of one record plus where they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub tokens: Vec<String>,
    pub context: RowContext,
}

impl RawRow {
    pub fn new(tokens: Vec<String>, context: RowContext) -> Self {
        Self { tokens, context }
    }
}

/// Produces raw rows in file order.
pub trait RowSource {
    type Error: StdError + Send + Sync + 'static;

    /// The next row, or `None` at the end of input.
    fn next_row(&mut self) -> Option<Result<RawRow, Self::Error>>;
}

/// Consumes rendered rows.
pub trait RowSink {
    type Error: StdError + Send + Sync + 'static;

    fn write_row(&mut self, tokens: &[String]) -> Result<(), Self::Error>;
}

/// What to do with the first row of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// Every row is data.
    #[default]
    None,
    /// Drop the first row unchecked.
    Skip,
    /// Compare the first row with the compiled header labels.
    Validate,
    /// Bind columns by matching the first row against the header labels,
    /// in any order.
    Map,
}

/// Rows held in memory, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    rows: std::vec::IntoIter<RawRow>,
}

impl VecSource {
    /// Rows numbered from line 1, one line per row.
    pub fn from_tokens<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<RawRow> = rows
            .into_iter()
            .enumerate()
            .map(|(idx, tokens)| {
                RawRow::new(
                    tokens.into_iter().map(Into::into).collect(),
                    RowContext::new(idx + 1, idx + 1),
                )
            })
            .collect();
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for VecSource {
    type Error = std::convert::Infallible;

    fn next_row(&mut self) -> Option<Result<RawRow, Self::Error>> {
        self.rows.next().map(Ok)
    }
}

/// Collects rendered rows in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub rows: Vec<Vec<String>>,
}

impl RowSink for VecSink {
    type Error = std::convert::Infallible;

    fn write_row(&mut self, tokens: &[String]) -> Result<(), Self::Error> {
        self.rows.push(tokens.to_vec());
        Ok(())
    }
}
