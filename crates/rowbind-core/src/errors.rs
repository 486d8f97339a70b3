//! Field failures, their per-row aggregation and the crate error type.

use std::error::Error as StdError;

use rowbind_model::{ConfigError, FieldType, RowContext, Value, ValueKind, Variables};
use thiserror::Error;

/// Message code for a value whose kind does not match a rule's bound kind.
pub const RULE_TYPE_MISMATCH_CODE: &str = "ruleTypeMismatch";

/// Why a single stage rejected a value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFailure {
    /// A constraint rejected the value.
    Validation { code: String, variables: Variables },
    /// The value could not be converted between text and its typed form.
    Conversion { code: String, variables: Variables },
    /// The value reached a rule comparing against a bound of another kind.
    TypeMismatch { expected: ValueKind, actual: ValueKind },
}

impl FieldFailure {
    pub fn validation(code: impl Into<String>) -> Self {
        FieldFailure::Validation {
            code: code.into(),
            variables: Variables::new(),
        }
    }

    pub fn conversion(code: impl Into<String>) -> Self {
        FieldFailure::Conversion {
            code: code.into(),
            variables: Variables::new(),
        }
    }

    pub fn type_mismatch(expected: ValueKind, actual: ValueKind) -> Self {
        FieldFailure::TypeMismatch { expected, actual }
    }

    /// Attach a message variable. Type mismatches carry fixed variables.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let FieldFailure::Validation { variables, .. } | FieldFailure::Conversion { variables, .. } =
            &mut self
        {
            variables.insert(name.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn with_vars(mut self, extra: Variables) -> Self {
        if let FieldFailure::Validation { variables, .. } | FieldFailure::Conversion { variables, .. } =
            &mut self
        {
            variables.extend(extra);
        }
        self
    }

    pub fn code(&self) -> &str {
        match self {
            FieldFailure::Validation { code, .. } | FieldFailure::Conversion { code, .. } => code,
            FieldFailure::TypeMismatch { .. } => RULE_TYPE_MISMATCH_CODE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingErrorKind {
    Validation,
    Conversion,
    TypeMismatch,
}

/// One field-level failure for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingError {
    pub field: String,
    pub label: String,
    pub field_type: FieldType,
    /// 1-based column of the field.
    pub column: usize,
    /// Kind of the rule (or `parse`/`print` base stage) that failed.
    pub rule: String,
    pub kind: BindingErrorKind,
    pub code: String,
    /// Rule attributes overlaid with the stage's own variables.
    pub variables: Variables,
    pub rejected_value: Value,
    /// Explicit template declared on the failing rule.
    pub message: Option<String>,
}

/// A failure raised by a record validator, optionally tied to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    pub field: Option<String>,
    pub code: String,
    pub variables: Variables,
    pub message: Option<String>,
}

impl RecordError {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            field: None,
            code: code.into(),
            variables: Variables::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn for_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Everything that can be wrong with one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    Field(BindingError),
    Record(RecordError),
    /// Raised before any field runs; no field context exists.
    ColumnCountMismatch { expected: usize, actual: usize },
    HeaderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Collects the failures of one record while its fields are processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingErrors {
    errors: Vec<RowError>,
}

impl BindingErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: BindingError) {
        self.errors.push(RowError::Field(error));
    }

    pub fn push_record(&mut self, error: RecordError) {
        self.errors.push(RowError::Record(error));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether `field` already failed, in its pipeline or in a validator.
    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.iter().any(|error| match error {
            RowError::Field(e) => e.field == field,
            RowError::Record(e) => e.field.as_deref() == Some(field),
            _ => false,
        })
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<RowError> {
        self.errors
    }
}

/// The failures of one record plus where they happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record '{record}' rejected at {context} with {} error(s)", .errors.len())]
pub struct RowException {
    pub record: String,
    pub context: RowContext,
    pub errors: Vec<RowError>,
    /// Copy of the row's raw tokens taken when the failure was captured.
    pub raw_values: Vec<String>,
}

impl RowException {
    pub fn binding_errors(&self) -> impl Iterator<Item = &BindingError> {
        self.errors.iter().filter_map(|error| match error {
            RowError::Field(e) => Some(e),
            _ => None,
        })
    }

    /// True for column-count and header failures.
    pub fn is_row_shape(&self) -> bool {
        self.errors.iter().any(|error| {
            matches!(
                error,
                RowError::ColumnCountMismatch { .. } | RowError::HeaderMismatch { .. }
            )
        })
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Row(Box<RowException>),

    #[error("failed to read row: {0}")]
    Source(#[source] Box<dyn StdError + Send + Sync>),

    #[error("failed to write row: {0}")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),
}

impl From<RowException> for BindError {
    fn from(exception: RowException) -> Self {
        BindError::Row(Box::new(exception))
    }
}

pub type Result<T> = std::result::Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_var_ignores_type_mismatch() {
        let failure = FieldFailure::type_mismatch(ValueKind::Integer, ValueKind::Text)
            .with_var("min", 3_i64);
        assert_eq!(failure.code(), RULE_TYPE_MISMATCH_CODE);
        assert_eq!(
            failure,
            FieldFailure::TypeMismatch {
                expected: ValueKind::Integer,
                actual: ValueKind::Text
            }
        );
    }

    #[test]
    fn has_field_errors_sees_validator_errors() {
        let mut errors = BindingErrors::new();
        errors.push_record(RecordError::new("mismatch").for_field("end"));
        errors.push_record(RecordError::new("whole_row"));
        assert!(errors.has_field_errors("end"));
        assert!(!errors.has_field_errors("start"));
        assert_eq!(errors.len(), 2);
    }
}
