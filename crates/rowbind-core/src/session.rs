//! Row processing sessions.
//!
//! A [`Session`] owns fresh copies of a compiled mapping's pipelines, so
//! session-scoped stage state (seen values for `unique`) lives exactly as
//! long as the session. Rows are processed strictly one after another.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowbind_model::{Direction, FieldDescriptor, RowContext, Value, Variables};
use tracing::{Level, debug, trace};

use crate::config::ErrorPolicy;
use crate::errors::{
    BindError, BindingError, BindingErrorKind, BindingErrors, FieldFailure, RULE_TYPE_MISMATCH_CODE,
    RowError, RowException,
};
use crate::io::{HeaderMode, RowSink, RowSource};
use crate::logging::redact_value;
use crate::mapping::CompiledMapping;
use crate::stage::{Pipeline, StepFailure};

/// Typed field values of one record, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Cross-field check run after every field pipeline of a row.
///
/// Validators see the partially bound record: fields that failed are absent.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, record: &Record, errors: &mut BindingErrors, context: &RowContext);
}

impl<F> RecordValidator for F
where
    F: Fn(&Record, &mut BindingErrors, &RowContext) + Send + Sync,
{
    fn validate(&self, record: &Record, errors: &mut BindingErrors, context: &RowContext) {
        self(record, errors, context);
    }
}

/// Adjusts a record right before it is rendered.
///
/// Hooks run in registration order on a copy; the caller's record is left
/// untouched.
pub trait PreWriteHook: Send + Sync {
    fn before_write(&self, record: &mut Record, context: &RowContext);
}

impl<F> PreWriteHook for F
where
    F: Fn(&mut Record, &RowContext) + Send + Sync,
{
    fn before_write(&self, record: &mut Record, context: &RowContext) {
        self(record, context);
    }
}

/// Result of processing or rendering one row.
///
/// `output` is filled as far as processing got, even when `exception` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome<T> {
    pub output: T,
    pub exception: Option<RowException>,
}

impl<T> RowOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.exception.is_none()
    }

    pub fn into_result(self) -> Result<T, RowException> {
        match self.exception {
            None => Ok(self.output),
            Some(exception) => Err(exception),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadReport {
    pub records: Vec<Record>,
    pub exceptions: Vec<RowException>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub written: usize,
    pub exceptions: Vec<RowException>,
}

pub struct Session {
    mapping: Arc<CompiledMapping>,
    read: Vec<Pipeline>,
    write: Vec<Pipeline>,
    validators: Vec<Box<dyn RecordValidator>>,
    pre_write: Vec<Box<dyn PreWriteHook>>,
    /// Source column of each field once a header row was mapped.
    columns: Option<Vec<usize>>,
    /// Raw tokens of the row being processed, reused across rows.
    buffer: Vec<String>,
}

impl Session {
    pub fn new(mapping: Arc<CompiledMapping>) -> Self {
        let fresh = |direction: Direction| -> Vec<Pipeline> {
            mapping
                .fields()
                .iter()
                .map(|field| field.pipeline(direction).fresh())
                .collect()
        };
        let read = fresh(Direction::Read);
        let write = fresh(Direction::Write);
        Self {
            buffer: Vec::with_capacity(mapping.column_count()),
            mapping,
            read,
            write,
            validators: Vec::new(),
            pre_write: Vec::new(),
            columns: None,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[must_use]
    pub fn with_pre_write(mut self, hook: impl PreWriteHook + 'static) -> Self {
        self.pre_write.push(Box::new(hook));
        self
    }

    pub fn mapping(&self) -> &CompiledMapping {
        &self.mapping
    }

    /// Zero-based source column per field, set by [`Session::map_header`]
    /// when the header order differs from the declared positions.
    pub fn column_order(&self) -> Option<&[usize]> {
        self.columns.as_deref()
    }

    /// Bind one row of raw tokens to a record.
    ///
    /// A column count mismatch is reported on its own, before any field
    /// runs. Otherwise every field is attempted; a failing field stops at
    /// its first failing stage without affecting its siblings.
    pub fn process_row(&mut self, tokens: &[String], context: RowContext) -> RowOutcome<Record> {
        if let Some(exception) = self.column_count_mismatch(tokens, context) {
            return RowOutcome {
                output: Record::new(),
                exception: Some(exception),
            };
        }

        self.buffer.clear();
        self.buffer.extend_from_slice(tokens);
        let empty_as_null = self.mapping.config().empty_as_null;
        let mut record = Record::new();
        let mut errors = BindingErrors::new();
        for (idx, (field, pipeline)) in self
            .mapping
            .fields()
            .iter()
            .zip(self.read.iter_mut())
            .enumerate()
        {
            let descriptor = field.descriptor();
            if descriptor.partial {
                continue;
            }
            let source = self.columns.as_ref().map_or(idx, |columns| columns[idx]);
            let column = source + 1;
            let token = &self.buffer[source];
            let input = if token.is_empty() && empty_as_null {
                Value::Null
            } else {
                Value::text(token.as_str())
            };
            match pipeline.execute(input, &context.at_column(column)) {
                Ok(value) => record.set(descriptor.name.as_str(), value),
                Err(failure) => errors.push(binding_error(descriptor, column, failure)),
            }
        }
        for validator in &self.validators {
            validator.validate(&record, &mut errors, &context);
        }

        if tracing::enabled!(Level::TRACE) {
            trace!(
                record = %self.mapping.record_name(),
                line = context.line_number,
                row = context.row_number,
                tokens = %redact_value(&self.buffer.join(",")),
                errors = errors.len(),
                "processed row"
            );
        }
        let exception = errors.has_errors().then(|| RowException {
            record: self.mapping.record_name().to_string(),
            context,
            errors: errors.into_vec(),
            raw_values: self.buffer.clone(),
        });
        RowOutcome {
            output: record,
            exception,
        }
    }

    /// Render a record to raw tokens in column order.
    ///
    /// Null and missing values render as empty tokens, as do pass-through
    /// columns. Pre-write hooks see the record first.
    pub fn render_row(&mut self, record: &Record, context: RowContext) -> RowOutcome<Vec<String>> {
        let prepared;
        let record = if self.pre_write.is_empty() {
            record
        } else {
            let mut copy = record.clone();
            for hook in &self.pre_write {
                hook.before_write(&mut copy, &context);
            }
            prepared = copy;
            &prepared
        };
        let mut tokens = Vec::with_capacity(self.write.len());
        let mut errors = BindingErrors::new();
        for (idx, (field, pipeline)) in self
            .mapping
            .fields()
            .iter()
            .zip(self.write.iter_mut())
            .enumerate()
        {
            let descriptor = field.descriptor();
            if descriptor.partial {
                tokens.push(String::new());
                continue;
            }
            let column = idx + 1;
            let value = record.get(&descriptor.name).cloned().unwrap_or_default();
            match pipeline.execute(value, &context.at_column(column)) {
                Ok(value) => tokens.push(value.to_string()),
                Err(failure) => {
                    tokens.push(String::new());
                    errors.push(binding_error(descriptor, column, failure));
                }
            }
        }
        if !self.mapping.config().skip_validation_on_write {
            for validator in &self.validators {
                validator.validate(record, &mut errors, &context);
            }
        }

        let exception = errors.has_errors().then(|| RowException {
            record: self.mapping.record_name().to_string(),
            context,
            errors: errors.into_vec(),
            raw_values: tokens.clone(),
        });
        RowOutcome {
            output: tokens,
            exception,
        }
    }

    /// Compare a header row with the compiled labels.
    ///
    /// Pass-through columns without a configured label accept any header.
    pub fn validate_header(&self, tokens: &[String], context: RowContext) -> Result<(), RowException> {
        if let Some(exception) = self.column_count_mismatch(tokens, context) {
            return Err(exception);
        }
        let matches = self
            .mapping
            .fields()
            .iter()
            .zip(tokens)
            .all(|(field, token)| {
                let descriptor = field.descriptor();
                (descriptor.partial && descriptor.label.is_none())
                    || descriptor.header_label() == token.trim()
            });
        if matches {
            return Ok(());
        }
        Err(self.header_mismatch(tokens, context))
    }

    /// Bind fields to columns by header label instead of position.
    ///
    /// Each labelled field claims the first unclaimed column whose trimmed
    /// header equals its label. Pass-through columns without a label take
    /// the remaining columns in order. Rows processed afterwards read every
    /// field from its mapped column; rendering keeps the declared order.
    pub fn map_header(&mut self, tokens: &[String], context: RowContext) -> Result<(), RowException> {
        if let Some(exception) = self.column_count_mismatch(tokens, context) {
            return Err(exception);
        }
        let mut claimed = vec![false; tokens.len()];
        let mut located = Vec::with_capacity(tokens.len());
        for field in self.mapping.fields() {
            let descriptor = field.descriptor();
            if descriptor.partial && descriptor.label.is_none() {
                located.push(None);
                continue;
            }
            let label = descriptor.header_label();
            let found = tokens
                .iter()
                .enumerate()
                .find(|(col, token)| !claimed[*col] && token.trim() == label)
                .map(|(col, _)| col);
            let Some(col) = found else {
                return Err(self.header_mismatch(tokens, context));
            };
            claimed[col] = true;
            located.push(Some(col));
        }
        let mut leftover = (0..tokens.len()).filter(|col| !claimed[*col]);
        let columns: Vec<usize> = located
            .into_iter()
            .map(|col| col.or_else(|| leftover.next()))
            .collect::<Option<_>>()
            .ok_or_else(|| self.header_mismatch(tokens, context))?;

        let reordered = columns.iter().enumerate().any(|(idx, col)| idx != *col);
        debug!(record = %self.mapping.record_name(), reordered, "mapped header");
        self.columns = reordered.then_some(columns);
        Ok(())
    }

    /// Read every row of `source`.
    ///
    /// Rejected rows end the read under [`ErrorPolicy::AbortOnFirst`] and are
    /// collected in the report otherwise. Source errors always end the read.
    pub fn read_all<S: RowSource>(
        &mut self,
        source: &mut S,
        header: HeaderMode,
    ) -> Result<ReadReport, BindError> {
        let mut report = ReadReport::default();
        let mut first = true;
        while let Some(row) = source.next_row() {
            let row = row.map_err(|e| BindError::Source(Box::new(e)))?;
            if std::mem::take(&mut first) {
                match header {
                    HeaderMode::None => {}
                    HeaderMode::Skip => continue,
                    HeaderMode::Validate => {
                        if let Err(exception) = self.validate_header(&row.tokens, row.context) {
                            self.reject(exception, &mut report.exceptions)?;
                        }
                        continue;
                    }
                    HeaderMode::Map => {
                        if let Err(exception) = self.map_header(&row.tokens, row.context) {
                            self.reject(exception, &mut report.exceptions)?;
                        }
                        continue;
                    }
                }
            }
            let outcome = self.process_row(&row.tokens, row.context);
            match outcome.exception {
                None => report.records.push(outcome.output),
                Some(exception) => self.reject(exception, &mut report.exceptions)?,
            }
        }
        debug!(
            record = %self.mapping.record_name(),
            records = report.records.len(),
            rejected = report.exceptions.len(),
            "read finished"
        );
        Ok(report)
    }

    /// Render and write every record; rejected records are not written.
    pub fn write_all<'r, I, K>(&mut self, records: I, sink: &mut K) -> Result<WriteReport, BindError>
    where
        I: IntoIterator<Item = &'r Record>,
        K: RowSink,
    {
        let mut report = WriteReport::default();
        for (idx, record) in records.into_iter().enumerate() {
            let outcome = self.render_row(record, RowContext::new(idx + 1, idx + 1));
            match outcome.exception {
                None => {
                    sink.write_row(&outcome.output)
                        .map_err(|e| BindError::Sink(Box::new(e)))?;
                    report.written += 1;
                }
                Some(exception) => self.reject(exception, &mut report.exceptions)?,
            }
        }
        debug!(
            record = %self.mapping.record_name(),
            written = report.written,
            rejected = report.exceptions.len(),
            "write finished"
        );
        Ok(report)
    }

    /// Write the compiled header labels.
    pub fn write_header<K: RowSink>(&self, sink: &mut K) -> Result<(), BindError> {
        sink.write_row(self.mapping.headers())
            .map_err(|e| BindError::Sink(Box::new(e)))
    }

    fn reject(&self, exception: RowException, collected: &mut Vec<RowException>) -> Result<(), BindError> {
        match self.mapping.config().error_policy {
            ErrorPolicy::AbortOnFirst => Err(exception.into()),
            ErrorPolicy::CollectAndContinue => {
                collected.push(exception);
                Ok(())
            }
        }
    }

    fn header_mismatch(&self, tokens: &[String], context: RowContext) -> RowException {
        RowException {
            record: self.mapping.record_name().to_string(),
            context,
            errors: vec![RowError::HeaderMismatch {
                expected: self.mapping.headers().to_vec(),
                actual: tokens.iter().map(|t| t.trim().to_string()).collect(),
            }],
            raw_values: tokens.to_vec(),
        }
    }

    fn column_count_mismatch(&self, tokens: &[String], context: RowContext) -> Option<RowException> {
        let expected = self.mapping.column_count();
        (tokens.len() != expected).then(|| RowException {
            record: self.mapping.record_name().to_string(),
            context,
            errors: vec![RowError::ColumnCountMismatch {
                expected,
                actual: tokens.len(),
            }],
            raw_values: tokens.to_vec(),
        })
    }
}

fn binding_error(descriptor: &FieldDescriptor, column: usize, step: StepFailure) -> BindingError {
    let StepFailure {
        rule,
        attributes,
        message,
        rejected,
        failure,
    } = step;
    let (kind, code, stage_variables) = match failure {
        FieldFailure::Validation { code, variables } => (BindingErrorKind::Validation, code, variables),
        FieldFailure::Conversion { code, variables } => (BindingErrorKind::Conversion, code, variables),
        FieldFailure::TypeMismatch { expected, actual } => {
            let mut variables = Variables::new();
            variables.insert("rule".to_string(), Value::text(rule.as_str()));
            variables.insert("expectedType".to_string(), Value::text(expected.as_str()));
            variables.insert("actualType".to_string(), Value::text(actual.as_str()));
            (
                BindingErrorKind::TypeMismatch,
                RULE_TYPE_MISMATCH_CODE.to_string(),
                variables,
            )
        }
    };
    let mut variables = attributes;
    variables.extend(stage_variables);
    BindingError {
        field: descriptor.name.clone(),
        label: descriptor.header_label().to_string(),
        field_type: descriptor.field_type,
        column,
        rule,
        kind,
        code,
        variables,
        rejected_value: rejected,
        message,
    }
}
