use std::fs::File;
use std::io::Write;
use std::path::Path;

use rowbind_core::RowSink;

use crate::error::IngestError;
use crate::options::CsvOptions;

/// Writes rendered rows as CSV records.
pub struct CsvRowWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: usize,
}

impl CsvRowWriter<File> {
    pub fn from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let inner = options
            .writer_builder()
            .from_path(path)
            .map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { inner, rows: 0 })
    }
}

impl<W: Write> CsvRowWriter<W> {
    pub fn from_writer(writer: W, options: &CsvOptions) -> Self {
        Self {
            inner: options.writer_builder().from_writer(writer),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<(), IngestError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, IngestError> {
        self.inner
            .into_inner()
            .map_err(|err| IngestError::Io(err.into_error()))
    }
}

impl<W: Write> RowSink for CsvRowWriter<W> {
    type Error = IngestError;

    fn write_row(&mut self, tokens: &[String]) -> Result<(), Self::Error> {
        self.inner.write_record(tokens)?;
        self.rows += 1;
        Ok(())
    }
}

impl<W: Write> std::fmt::Debug for CsvRowWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRowWriter")
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}
