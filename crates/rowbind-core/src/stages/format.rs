//! Base parse and print stages for each field type.
//!
//! Format attributes on the field configure them:
//!
//! | type | attributes |
//! |------|------------|
//! | `date`, `datetime` | `pattern` (chrono strftime) |
//! | `decimal` | `scale` (digits printed after the point) |
//! | `boolean` | `true_values`, `false_values`, `ignore_case`, `lenient` |
//! | `enum` | `values`, `ignore_case` |

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use rowbind_model::{ConfigError, FieldDescriptor, FieldType, RowContext, Value, Variables};

use super::AttrReader;
use crate::errors::FieldFailure;
use crate::stage::{PipelineStep, Stage};

pub const TYPE_MISMATCH_CODE: &str = "typeMismatch";

pub const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d";
pub const DEFAULT_DATETIME_PATTERN: &str = "%Y-%m-%dT%H:%M:%S";

const DEFAULT_TRUE_VALUES: [&str; 5] = ["true", "1", "yes", "on", "y"];
const DEFAULT_FALSE_VALUES: [&str; 5] = ["false", "0", "no", "off", "n"];

#[derive(Debug, Clone, PartialEq)]
enum Codec {
    Text,
    Integer,
    Float,
    Decimal {
        scale: Option<usize>,
    },
    Boolean {
        true_values: Vec<String>,
        false_values: Vec<String>,
        ignore_case: bool,
        lenient: bool,
    },
    Date {
        pattern: String,
    },
    DateTime {
        pattern: String,
    },
    Enum {
        values: Vec<String>,
        ignore_case: bool,
    },
}

impl Codec {
    fn from_field(field: &FieldDescriptor) -> Result<Self, ConfigError> {
        let format = AttrReader::for_format(field);
        let codec = match field.field_type {
            FieldType::String => Codec::Text,
            FieldType::Integer => Codec::Integer,
            FieldType::Float => Codec::Float,
            FieldType::Decimal => Codec::Decimal {
                scale: match format.value("scale") {
                    Some(_) => Some(format.usize("scale")?),
                    None => None,
                },
            },
            FieldType::Boolean => {
                let words = |name: &str, defaults: &[&str]| {
                    let configured = format.string_list_or_empty(name);
                    if configured.is_empty() {
                        defaults.iter().map(|w| (*w).to_string()).collect()
                    } else {
                        configured
                    }
                };
                Codec::Boolean {
                    true_values: words("true_values", &DEFAULT_TRUE_VALUES),
                    false_values: words("false_values", &DEFAULT_FALSE_VALUES),
                    ignore_case: format.bool_or("ignore_case", true)?,
                    lenient: format.bool_or("lenient", false)?,
                }
            }
            FieldType::Date => Codec::Date {
                pattern: checked_pattern(&format, FieldType::Date, DEFAULT_DATE_PATTERN)?,
            },
            FieldType::DateTime => Codec::DateTime {
                pattern: checked_pattern(&format, FieldType::DateTime, DEFAULT_DATETIME_PATTERN)?,
            },
            FieldType::Enum => Codec::Enum {
                values: format.string_list("values")?,
                ignore_case: format.bool_or("ignore_case", false)?,
            },
        };
        Ok(codec)
    }

    fn parse(&self, text: &str) -> Option<Value> {
        match self {
            Codec::Text => Some(Value::text(text)),
            Codec::Integer => text.trim().parse::<i64>().ok().map(Value::Integer),
            Codec::Float => text.trim().parse::<f64>().ok().map(Value::Float),
            Codec::Decimal { .. } => {
                let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().ok().map(Value::Float)
            }
            Codec::Boolean {
                true_values,
                false_values,
                ignore_case,
                lenient,
            } => {
                let text = text.trim();
                if contains_word(true_values, text, *ignore_case) {
                    Some(Value::Bool(true))
                } else if *lenient || contains_word(false_values, text, *ignore_case) {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            Codec::Date { pattern } => NaiveDate::parse_from_str(text.trim(), pattern)
                .ok()
                .map(Value::Date),
            Codec::DateTime { pattern } => NaiveDateTime::parse_from_str(text.trim(), pattern)
                .ok()
                .map(Value::DateTime),
            Codec::Enum {
                values,
                ignore_case,
            } => canonical_word(values, text.trim(), *ignore_case).map(Value::text),
        }
    }

    fn print(&self, value: &Value) -> Option<String> {
        match (self, value) {
            (Codec::Text, value) => Some(value.to_string()),
            (Codec::Integer, Value::Integer(i)) => Some(i.to_string()),
            (Codec::Float, Value::Integer(_) | Value::Float(_)) => value.as_f64().map(|f| f.to_string()),
            (Codec::Decimal { scale }, Value::Integer(_) | Value::Float(_)) => {
                let number = value.as_f64()?;
                Some(match scale {
                    Some(scale) => format!("{number:.scale$}"),
                    None => number.to_string(),
                })
            }
            (
                Codec::Boolean {
                    true_values,
                    false_values,
                    ..
                },
                Value::Bool(flag),
            ) => {
                let words = if *flag { true_values } else { false_values };
                words.first().cloned()
            }
            (Codec::Date { pattern }, Value::Date(date)) => format_date(date, pattern),
            (Codec::DateTime { pattern }, Value::DateTime(dt)) => format_datetime(dt, pattern),
            (
                Codec::Enum {
                    values,
                    ignore_case,
                },
                Value::Text(text),
            ) => canonical_word(values, text, *ignore_case),
            _ => None,
        }
    }

    /// Variables describing what a valid value looks like.
    fn describe(&self, field_type: FieldType) -> Variables {
        let mut variables = Variables::new();
        variables.insert("type".to_string(), Value::text(field_type.as_str()));
        match self {
            Codec::Date { pattern } | Codec::DateTime { pattern } => {
                variables.insert("pattern".to_string(), Value::text(pattern));
            }
            Codec::Boolean {
                true_values,
                false_values,
                ..
            } => {
                variables.insert("trueValues".to_string(), Value::text_list(true_values.clone()));
                variables.insert("falseValues".to_string(), Value::text_list(false_values.clone()));
            }
            Codec::Enum { values, .. } => {
                variables.insert("values".to_string(), Value::text_list(values.clone()));
            }
            Codec::Text | Codec::Integer | Codec::Float | Codec::Decimal { .. } => {}
        }
        variables
    }
}

/// Reject patterns chrono cannot parse and patterns naming fields the value
/// type lacks, such as `%H` on a date.
fn checked_pattern(format: &AttrReader<'_>, field_type: FieldType, default: &str) -> Result<String, ConfigError> {
    let pattern = format.text_or("pattern", default)?;
    if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
        return Err(format.invalid("pattern", format!("'{pattern}' is not a valid date pattern")));
    }
    let sample = match field_type {
        FieldType::DateTime => format_datetime(&NaiveDateTime::default(), &pattern),
        _ => format_date(&NaiveDate::default(), &pattern),
    };
    if sample.is_none() {
        return Err(format.invalid(
            "pattern",
            format!("'{pattern}' cannot format a {} value", field_type.as_str()),
        ));
    }
    Ok(pattern)
}

// `DelayedFormat` reports unsupported specifiers through `fmt::Error`, which
// `to_string` would turn into a panic.
fn format_date(date: &NaiveDate, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).ok()?;
    Some(out)
}

fn format_datetime(datetime: &NaiveDateTime, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", datetime.format(pattern)).ok()?;
    Some(out)
}

fn contains_word(words: &[String], text: &str, ignore_case: bool) -> bool {
    canonical_word(words, text, ignore_case).is_some()
}

fn canonical_word(words: &[String], text: &str, ignore_case: bool) -> Option<String> {
    words
        .iter()
        .find(|word| {
            if ignore_case {
                word.eq_ignore_ascii_case(text)
            } else {
                word.as_str() == text
            }
        })
        .cloned()
}

/// Parse a bound written in the field's own format, e.g. a `datetime_min`
/// bound for a date field with a custom pattern.
pub(crate) fn parse_in_field_format(field: &FieldDescriptor, text: &str) -> Result<Option<Value>, ConfigError> {
    Ok(Codec::from_field(field)?.parse(text))
}

#[derive(Debug, Clone)]
struct ParseStage {
    codec: Codec,
    field_type: FieldType,
}

impl Stage for ParseStage {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let text = match value {
            Value::Null => return Ok(Value::Null),
            Value::Text(text) => text,
            typed if typed.kind() == self.field_type.value_kind() => return Ok(typed),
            other => other.to_string(),
        };
        if text.is_empty() && self.field_type != FieldType::String {
            return Ok(Value::Null);
        }
        self.codec.parse(&text).ok_or_else(|| {
            FieldFailure::conversion(TYPE_MISMATCH_CODE).with_vars(self.codec.describe(self.field_type))
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
struct PrintStage {
    codec: Codec,
    field_type: FieldType,
}

impl Stage for PrintStage {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.codec.print(&value).map(Value::Text).ok_or_else(|| {
            FieldFailure::conversion(TYPE_MISMATCH_CODE).with_vars(self.codec.describe(self.field_type))
        })
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// The read (`parse`) and write (`print`) base steps for a field.
pub fn base_steps(field: &FieldDescriptor) -> Result<(PipelineStep, PipelineStep), ConfigError> {
    let codec = Codec::from_field(field)?;
    let parse = ParseStage {
        codec: codec.clone(),
        field_type: field.field_type,
    };
    let print = PrintStage {
        codec,
        field_type: field.field_type,
    };
    Ok((
        PipelineStep::base("parse", Box::new(parse)),
        PipelineStep::base("print", Box::new(print)),
    ))
}
