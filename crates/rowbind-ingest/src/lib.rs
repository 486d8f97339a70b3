//! CSV adapters for the rowbind row interfaces.
//!
//! Tokenizing is left to the `csv` crate. [`CsvRowReader`] tracks line and
//! row numbers for every record it yields; [`CsvRowWriter`] writes rendered
//! rows back out with the same dialect.

pub mod error;
pub mod options;
pub mod reader;
pub mod writer;

pub use error::IngestError;
pub use options::CsvOptions;
pub use reader::CsvRowReader;
pub use writer::CsvRowWriter;
