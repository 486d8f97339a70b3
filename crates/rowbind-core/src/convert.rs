//! Row exceptions to display messages.
//!
//! Each error becomes a code chain plus variables. Rendering picks, in
//! order: the failing rule's explicit message, the first code the resolver
//! knows, or a plain fallback naming the row context and the generic code.

use rowbind_message::{MessageCodeGenerator, MessageInterpolator, MessageResolver};
use rowbind_model::{RowContext, Value, Variables};

use crate::errors::{BindingError, BindingErrorKind, RecordError, RowError, RowException};

const COLUMN_COUNT_CODE: &str = "rowError.columnCountMismatch";
const HEADER_CODE: &str = "rowError.headerMismatch";
const ROW_ERROR_CODE: &str = "rowError";

/// One error ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// Message codes, most specific first.
    pub codes: Vec<String>,
    pub variables: Variables,
    /// Explicit template that takes precedence over the codes.
    pub template: Option<String>,
    pub context: RowContext,
}

impl ErrorMessage {
    /// The least specific code of the chain.
    pub fn generic_code(&self) -> &str {
        self.codes.last().map_or(ROW_ERROR_CODE, String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorConverter {
    interpolator: MessageInterpolator,
    codes: MessageCodeGenerator,
}

impl ErrorConverter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_interpolator(mut self, interpolator: MessageInterpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    #[must_use]
    pub fn with_code_generator(mut self, codes: MessageCodeGenerator) -> Self {
        self.codes = codes;
        self
    }

    pub fn to_errors(&self, exception: &RowException) -> Vec<ErrorMessage> {
        exception
            .errors
            .iter()
            .map(|error| match error {
                RowError::Field(error) => self.field_error(&exception.record, exception.context, error),
                RowError::Record(error) => self.record_error(&exception.record, exception.context, error),
                RowError::ColumnCountMismatch { expected, actual } => {
                    let mut variables = row_variables(exception.context);
                    variables.insert("expectedSize".to_string(), Value::from(*expected));
                    variables.insert("actualSize".to_string(), Value::from(*actual));
                    ErrorMessage {
                        codes: vec![COLUMN_COUNT_CODE.to_string(), ROW_ERROR_CODE.to_string()],
                        variables,
                        template: None,
                        context: exception.context,
                    }
                }
                RowError::HeaderMismatch { expected, actual } => {
                    let mut variables = row_variables(exception.context);
                    variables.insert("expectedHeaders".to_string(), Value::text_list(expected.clone()));
                    variables.insert("actualHeaders".to_string(), Value::text_list(actual.clone()));
                    variables.insert("joinedExpectedHeaders".to_string(), Value::text(expected.join(", ")));
                    variables.insert("joinedActualHeaders".to_string(), Value::text(actual.join(", ")));
                    ErrorMessage {
                        codes: vec![HEADER_CODE.to_string(), ROW_ERROR_CODE.to_string()],
                        variables,
                        template: None,
                        context: exception.context,
                    }
                }
            })
            .collect()
    }

    /// Render every error of `exception`, in the order they were raised.
    pub fn to_messages(&self, exception: &RowException, resolver: &dyn MessageResolver) -> Vec<String> {
        self.to_errors(exception)
            .iter()
            .map(|error| self.render(error, resolver))
            .collect()
    }

    pub fn render(&self, error: &ErrorMessage, resolver: &dyn MessageResolver) -> String {
        let template = error.template.as_deref().or_else(|| {
            error
                .codes
                .iter()
                .find_map(|code| resolver.message(code))
        });
        match template {
            Some(template) => {
                self.interpolator
                    .interpolate_with(template, &error.variables, true, Some(resolver))
                    .text
            }
            None => format!("{}: {}", error.context, error.generic_code()),
        }
    }

    fn field_error(&self, record: &str, context: RowContext, error: &BindingError) -> ErrorMessage {
        let type_name = error.field_type.as_str();
        let scope = (Some(record), Some(error.field.as_str()), Some(type_name));
        let mut codes = Vec::new();
        if error.kind == BindingErrorKind::Conversion {
            codes.extend(self.codes.generate_type_mismatch_codes(scope.0, scope.1, scope.2));
        }
        for code in self.codes.generate_codes(&error.code, scope.0, scope.1, scope.2) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        let context = context.at_column(error.column);
        let mut variables = row_variables(context);
        variables.insert("columnNumber".to_string(), Value::from(error.column));
        variables.insert("label".to_string(), Value::text(error.label.as_str()));
        variables.insert("validatedValue".to_string(), error.rejected_value.clone());
        variables.extend(error.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        ErrorMessage {
            codes,
            variables,
            template: error.message.clone(),
            context,
        }
    }

    fn record_error(&self, record: &str, context: RowContext, error: &RecordError) -> ErrorMessage {
        let codes = self
            .codes
            .generate_codes(&error.code, Some(record), error.field.as_deref(), None);
        let mut variables = row_variables(context);
        if let Some(field) = &error.field {
            variables.insert("label".to_string(), Value::text(field.as_str()));
        }
        variables.extend(error.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        ErrorMessage {
            codes,
            variables,
            template: error.message.clone(),
            context,
        }
    }
}

fn row_variables(context: RowContext) -> Variables {
    let mut variables = Variables::new();
    variables.insert("lineNumber".to_string(), Value::from(context.line_number));
    variables.insert("rowNumber".to_string(), Value::from(context.row_number));
    variables
}
