use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use rowbind_core::{RawRow, RowSource};
use rowbind_model::RowContext;
use tracing::debug;

use crate::error::IngestError;
use crate::options::CsvOptions;

/// Yields CSV records as raw rows.
///
/// The line number is the physical line a record starts on, so quoted
/// fields spanning lines do not shift later rows. The row number counts
/// records from 1, header included. Blank lines are skipped by the
/// tokenizer and count toward lines only.
pub struct CsvRowReader<R> {
    inner: csv::Reader<R>,
    record: StringRecord,
    rows: usize,
    done: bool,
}

impl CsvRowReader<File> {
    pub fn from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let inner = options
            .reader_builder()
            .from_path(path)
            .map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "opened csv source");
        Ok(Self::wrap(inner))
    }
}

impl<R: Read> CsvRowReader<R> {
    pub fn from_reader(reader: R, options: &CsvOptions) -> Self {
        Self::wrap(options.reader_builder().from_reader(reader))
    }

    fn wrap(inner: csv::Reader<R>) -> Self {
        Self {
            inner,
            record: StringRecord::new(),
            rows: 0,
            done: false,
        }
    }

    /// Records yielded so far.
    pub fn rows_read(&self) -> usize {
        self.rows
    }
}

impl<R: Read> RowSource for CsvRowReader<R> {
    type Error = IngestError;

    fn next_row(&mut self) -> Option<Result<RawRow, Self::Error>> {
        if self.done {
            return None;
        }
        match self.inner.read_record(&mut self.record) {
            Ok(true) => {
                self.rows += 1;
                let line = self
                    .record
                    .position()
                    .map_or(self.rows, |pos| usize::try_from(pos.line()).unwrap_or(usize::MAX));
                let tokens = self.record.iter().map(str::to_string).collect();
                Some(Ok(RawRow::new(tokens, RowContext::new(line, self.rows))))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(source) => {
                self.done = true;
                let line = source
                    .position()
                    .map_or_else(|| self.inner.position().line(), csv::Position::line);
                Some(Err(IngestError::Malformed { line, source }))
            }
        }
    }
}

impl<R> std::fmt::Debug for CsvRowReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRowReader")
            .field("rows", &self.rows)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<RawRow> {
        let mut reader = CsvRowReader::from_reader(input.as_bytes(), &CsvOptions::default());
        std::iter::from_fn(|| reader.next_row())
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn tracks_lines_across_quoted_newlines() {
        let rows = collect("a,b\n\"multi\nline\",x\nlast,y\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].tokens, ["multi\nline", "x"]);
        assert_eq!(rows[1].context, RowContext::new(2, 2));
        assert_eq!(rows[2].context, RowContext::new(4, 3));
    }

    #[test]
    fn keeps_ragged_rows() {
        let rows = collect("1,2,3\n4\n");
        assert_eq!(rows[1].tokens, ["4"]);
    }
}
