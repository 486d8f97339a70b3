//! Validate a CSV file against a compiled mapping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rowbind_core::{
    BindConfig, BindError, CompiledMapping, ErrorConverter, HeaderMode, ReadReport, RowException,
    Session,
};
use rowbind_ingest::{CsvOptions, CsvRowReader, CsvRowWriter};
use rowbind_message::MessageResolver;
use rowbind_model::RecordDeclaration;
use tracing::{info, info_span};

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub header: HeaderMode,
    pub csv: CsvOptions,
    /// Re-render accepted records into this file.
    pub output: Option<PathBuf>,
}

/// One rendered error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub line: usize,
    /// 0 for row-level errors.
    pub column: usize,
    /// Most generic message code of the error.
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub record: String,
    /// Data rows read, header excluded.
    pub rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Rows written to the output file.
    pub written: usize,
    pub issues: Vec<Issue>,
    /// The read stopped at the first rejected row.
    pub aborted: bool,
}

impl ValidationOutcome {
    /// Any rejected row or header problem.
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }
}

pub fn validate_file(
    declaration: &RecordDeclaration,
    config: &BindConfig,
    messages: &dyn MessageResolver,
    input: &Path,
    options: &ValidateOptions,
) -> Result<ValidationOutcome> {
    let span = info_span!("validate", record = %declaration.name, input = %input.display());
    let _guard = span.enter();

    let mapping = CompiledMapping::compile(declaration, config)
        .with_context(|| format!("compile schema '{}'", declaration.name))?;
    let mut session = Session::new(Arc::new(mapping));
    let mut reader = CsvRowReader::from_path(input, &options.csv)?;

    let (report, aborted) = match session.read_all(&mut reader, options.header) {
        Ok(report) => (report, false),
        Err(BindError::Row(exception)) => {
            let report = ReadReport {
                records: Vec::new(),
                exceptions: vec![*exception],
            };
            (report, true)
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", input.display())),
    };

    let header_rows = usize::from(options.header != HeaderMode::None && reader.rows_read() > 0);
    let rows = reader.rows_read() - header_rows;
    let rejected = report.exceptions.iter().filter(|e| e.context.row_number > header_rows).count();
    let accepted = if aborted {
        rows.saturating_sub(rejected)
    } else {
        report.records.len()
    };

    let converter = ErrorConverter::new();
    let issues = report
        .exceptions
        .iter()
        .flat_map(|exception| issues(&converter, exception, messages))
        .collect();

    let written = match &options.output {
        Some(path) if !aborted => write_records(&mut session, &report, path, &options.csv)?,
        _ => 0,
    };

    info!(rows, accepted, rejected, written, "validation finished");
    Ok(ValidationOutcome {
        record: declaration.name.clone(),
        rows,
        accepted,
        rejected,
        written,
        issues,
        aborted,
    })
}

fn issues(
    converter: &ErrorConverter,
    exception: &RowException,
    messages: &dyn MessageResolver,
) -> Vec<Issue> {
    converter
        .to_errors(exception)
        .iter()
        .map(|error| Issue {
            line: error.context.line_number,
            column: error.context.column_number,
            code: error.generic_code().to_string(),
            message: converter.render(error, messages),
        })
        .collect()
}

fn write_records(
    session: &mut Session,
    report: &ReadReport,
    path: &Path,
    options: &CsvOptions,
) -> Result<usize> {
    let mut writer = CsvRowWriter::from_path(path, options)?;
    session.write_header(&mut writer)?;
    let written = session
        .write_all(&report.records, &mut writer)
        .with_context(|| format!("write {}", path.display()))?
        .written;
    writer.flush()?;
    Ok(written)
}

/// Header labels of a schema, in column order.
pub fn schema_headers(declaration: &RecordDeclaration, config: &BindConfig) -> Result<Vec<String>> {
    let mapping = CompiledMapping::compile(declaration, config)
        .with_context(|| format!("compile schema '{}'", declaration.name))?;
    Ok(mapping.headers().to_vec())
}
