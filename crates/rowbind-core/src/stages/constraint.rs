//! Built-in constraint rule kinds.
//!
//! Every constraint except `require` lets null through. Failures use the
//! rule kind as their message code.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use regex::Regex;
use rowbind_model::{
    Attributes, ConfigError, FieldDescriptor, FieldType, RowContext, RuleCategory, RuleInstance,
    Value, ValueKind,
};

use super::format::parse_in_field_format;
use super::{AttrReader, BOOL, ENTRIES, INTEGER, LENGTHS, NUMBER, TEXT, attrs};
use crate::errors::FieldFailure;
use crate::registry::{AttributeKinds, CreateStage, FnFactory, RuleRegistry};
use crate::stage::Stage;

fn constraint(kind: &'static str, defaults: fn() -> Attributes, create: CreateStage) -> FnFactory {
    FnFactory::new(kind, RuleCategory::Constraint, defaults, create)
}

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register(
        constraint(
            "require",
            || attrs([("consider_empty", Value::Bool(false)), ("consider_blank", Value::Bool(false))]),
            create_require,
        )
        .with_kinds(&[("consider_empty", BOOL), ("consider_blank", BOOL)]),
    );
    registry.register(constraint("unique", Attributes::new, |_, _| {
        Ok(Box::new(Unique::default()))
    }));
    registry.register(
        constraint("equals", || attrs([("values", Value::List(Vec::new()))]), create_equals)
            .with_kinds(&[("values", ENTRIES)]),
    );
    registry.register(
        constraint(
            "pattern",
            || attrs([("regex", Value::text("")), ("description", Value::text(""))]),
            create_pattern,
        )
        .with_kinds(&[("regex", TEXT), ("description", TEXT)]),
    );
    registry.register(
        constraint("length_min", || attrs([("min", Value::Integer(0))]), |rule, field| {
            create_length(rule, field, LengthKind::Min)
        })
        .with_kinds(&[("min", INTEGER)]),
    );
    registry.register(
        constraint("length_max", || attrs([("max", Value::Integer(0))]), |rule, field| {
            create_length(rule, field, LengthKind::Max)
        })
        .with_kinds(&[("max", INTEGER)]),
    );
    registry.register(
        constraint("length_exact", || attrs([("length", Value::List(Vec::new()))]), |rule, field| {
            create_length(rule, field, LengthKind::Exact)
        })
        .with_kinds(&[("length", LENGTHS)]),
    );
    registry.register(
        constraint(
            "length_between",
            || attrs([("min", Value::Integer(0)), ("max", Value::Integer(0))]),
            |rule, field| create_length(rule, field, LengthKind::Between),
        )
        .with_kinds(&[("min", INTEGER), ("max", INTEGER)]),
    );
    registry.register(
        constraint("number_min", || bound_defaults(&["min"]), |rule, field| {
            create_number_bound(rule, field, Sides::MIN)
        })
        .with_kinds(NUMBER_BOUNDS),
    );
    registry.register(
        constraint("number_max", || bound_defaults(&["max"]), |rule, field| {
            create_number_bound(rule, field, Sides::MAX)
        })
        .with_kinds(NUMBER_BOUNDS),
    );
    registry.register(
        constraint("number_range", || bound_defaults(&["min", "max"]), |rule, field| {
            create_number_bound(rule, field, Sides::BOTH)
        })
        .with_kinds(NUMBER_BOUNDS),
    );
    registry.register(
        constraint("datetime_min", || bound_defaults(&["min"]), |rule, field| {
            create_datetime_bound(rule, field, Sides::MIN)
        })
        .with_kinds(DATETIME_BOUNDS),
    );
    registry.register(
        constraint("datetime_max", || bound_defaults(&["max"]), |rule, field| {
            create_datetime_bound(rule, field, Sides::MAX)
        })
        .with_kinds(DATETIME_BOUNDS),
    );
    registry.register(
        constraint("word_forbid", || attrs([("words", Value::List(Vec::new()))]), |rule, field| {
            create_words(rule, field, WordMode::Forbid)
        })
        .with_kinds(&[("words", ENTRIES)]),
    );
    registry.register(
        constraint("word_require", || attrs([("words", Value::List(Vec::new()))]), |rule, field| {
            create_words(rule, field, WordMode::Require)
        })
        .with_kinds(&[("words", ENTRIES)]),
    );
}

const NUMBER_BOUNDS: AttributeKinds = &[("min", NUMBER), ("max", NUMBER), ("inclusive", BOOL)];
const DATETIME_BOUNDS: AttributeKinds = &[("min", TEXT), ("max", TEXT), ("inclusive", BOOL)];

#[derive(Clone)]
struct Require {
    consider_empty: bool,
    consider_blank: bool,
}

fn create_require(rule: &RuleInstance, field: &FieldDescriptor) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(Require {
        consider_empty: attrs.bool_or("consider_empty", false)?,
        consider_blank: attrs.bool_or("consider_blank", false)?,
    }))
}

impl Stage for Require {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        let missing = match &value {
            Value::Null => true,
            Value::Text(text) => {
                (self.consider_empty && text.is_empty())
                    || (self.consider_blank && text.trim().is_empty())
            }
            _ => false,
        };
        if missing {
            return Err(FieldFailure::validation("require"));
        }
        Ok(value)
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Remembers where each value was first seen during one session.
#[derive(Default)]
struct Unique {
    seen: HashMap<String, (usize, usize)>,
}

impl Stage for Unique {
    fn execute(&mut self, value: Value, context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(value);
        }
        match self.seen.entry(value.identity_key()) {
            Entry::Occupied(first) => {
                let (line, row) = *first.get();
                Err(FieldFailure::validation("unique")
                    .with_var("duplicatedLineNumber", line)
                    .with_var("duplicatedRowNumber", row))
            }
            Entry::Vacant(slot) => {
                slot.insert((context.line_number, context.row_number));
                Ok(value)
            }
        }
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(Unique::default())
    }
}

#[derive(Clone)]
struct Equals {
    values: Vec<String>,
}

fn create_equals(rule: &RuleInstance, field: &FieldDescriptor) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(Equals {
        values: attrs.string_list("values")?,
    }))
}

impl Stage for Equals {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(value);
        }
        let text = value.to_string();
        if self.values.iter().any(|candidate| *candidate == text) {
            Ok(value)
        } else {
            Err(FieldFailure::validation("equals"))
        }
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// The whole string form must match.
#[derive(Clone)]
struct Pattern {
    regex: Regex,
}

fn create_pattern(rule: &RuleInstance, field: &FieldDescriptor) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let source = attrs.text("regex")?;
    if source.is_empty() {
        return Err(attrs.invalid("regex", "a pattern is required"));
    }
    let regex = Regex::new(&format!("^(?:{source})$"))
        .map_err(|e| attrs.invalid("regex", e.to_string()))?;
    Ok(Box::new(Pattern { regex }))
}

impl Stage for Pattern {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() || self.regex.is_match(&value.to_string()) {
            Ok(value)
        } else {
            Err(FieldFailure::validation("pattern"))
        }
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy)]
enum LengthKind {
    Min,
    Max,
    Exact,
    Between,
}

#[derive(Clone)]
enum LengthCheck {
    Min(usize),
    Max(usize),
    Exact(Vec<usize>),
    Between(usize, usize),
}

impl LengthCheck {
    fn code(&self) -> &'static str {
        match self {
            LengthCheck::Min(_) => "length_min",
            LengthCheck::Max(_) => "length_max",
            LengthCheck::Exact(_) => "length_exact",
            LengthCheck::Between(..) => "length_between",
        }
    }

    fn accepts(&self, length: usize) -> bool {
        match self {
            LengthCheck::Min(min) => length >= *min,
            LengthCheck::Max(max) => length <= *max,
            LengthCheck::Exact(lengths) => lengths.contains(&length),
            LengthCheck::Between(min, max) => (*min..=*max).contains(&length),
        }
    }
}

fn create_length(
    rule: &RuleInstance,
    field: &FieldDescriptor,
    kind: LengthKind,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let check = match kind {
        LengthKind::Min => LengthCheck::Min(attrs.usize("min")?),
        LengthKind::Max => LengthCheck::Max(attrs.usize("max")?),
        LengthKind::Exact => LengthCheck::Exact(attrs.usize_list("length")?),
        LengthKind::Between => {
            let (min, max) = (attrs.usize("min")?, attrs.usize("max")?);
            if min > max {
                return Err(attrs.invalid("max", format!("{max} is below min {min}")));
            }
            LengthCheck::Between(min, max)
        }
    };
    Ok(Box::new(check))
}

impl Stage for LengthCheck {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(value);
        }
        let length = value.to_string().chars().count();
        if self.accepts(length) {
            Ok(value)
        } else {
            Err(FieldFailure::validation(self.code()).with_var("actualLength", length))
        }
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy)]
struct Sides {
    min: bool,
    max: bool,
}

impl Sides {
    const MIN: Sides = Sides { min: true, max: false };
    const MAX: Sides = Sides { min: false, max: true };
    const BOTH: Sides = Sides { min: true, max: true };
}

fn bound_defaults(sides: &[&str]) -> Attributes {
    let mut defaults = attrs([("inclusive", Value::Bool(true))]);
    for side in sides {
        defaults.insert((*side).to_string(), Value::Null);
    }
    defaults
}

/// Compares values against a minimum and/or maximum of one kind.
///
/// A value of any other kind is a type mismatch naming both kinds.
#[derive(Clone)]
struct Bound {
    code: String,
    kind: ValueKind,
    min: Option<Value>,
    max: Option<Value>,
    inclusive: bool,
}

impl Bound {
    fn new(
        rule: &RuleInstance,
        attrs: &AttrReader<'_>,
        min: Option<Value>,
        max: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let kind = match (&min, &max) {
            (Some(min), Some(max)) => {
                if min.kind() != max.kind() {
                    return Err(attrs.invalid(
                        "max",
                        format!("{} bound does not match {} min", max.kind(), min.kind()),
                    ));
                }
                if min.compare(max) == Some(Ordering::Greater) {
                    return Err(attrs.invalid("max", format!("{max} is below min {min}")));
                }
                min.kind()
            }
            (Some(bound), None) | (None, Some(bound)) => bound.kind(),
            (None, None) => return Err(attrs.invalid("min", "a bound is required")),
        };
        Ok(Self {
            code: rule.kind.clone(),
            kind,
            min,
            max,
            inclusive: attrs.bool_or("inclusive", true)?,
        })
    }

    fn within(&self, value: &Value) -> bool {
        let above = |bound: &Value| match value.compare(bound) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => self.inclusive,
            _ => false,
        };
        let below = |bound: &Value| match value.compare(bound) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.inclusive,
            _ => false,
        };
        self.min.as_ref().is_none_or(above) && self.max.as_ref().is_none_or(below)
    }
}

impl Stage for Bound {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(value);
        }
        if value.kind() != self.kind {
            return Err(FieldFailure::type_mismatch(self.kind, value.kind()));
        }
        if self.within(&value) {
            Ok(value)
        } else {
            Err(FieldFailure::validation(self.code.clone()))
        }
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

/// Numeric bound; integer bounds widen to float for float and decimal fields.
fn create_number_bound(
    rule: &RuleInstance,
    field: &FieldDescriptor,
    sides: Sides,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    let read = |name: &str| -> Result<Value, ConfigError> {
        let value = match attrs.required(name)? {
            number @ (Value::Integer(_) | Value::Float(_)) => number.clone(),
            other => return Err(attrs.invalid(name, format!("expected a number, got {}", other.kind()))),
        };
        Ok(match (value, field.field_type) {
            (Value::Integer(i), FieldType::Float | FieldType::Decimal) => Value::Float(i as f64),
            (value, _) => value,
        })
    };
    let min = if sides.min { Some(read("min")?) } else { None };
    let max = if sides.max { Some(read("max")?) } else { None };
    Ok(Box::new(Bound::new(rule, &attrs, min, max)?))
}

/// Date or date-time bound written in the field's own format.
fn create_datetime_bound(
    rule: &RuleInstance,
    field: &FieldDescriptor,
    sides: Sides,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    if !matches!(field.field_type, FieldType::Date | FieldType::DateTime) {
        return Err(attrs.invalid(
            if sides.min { "min" } else { "max" },
            format!("only applies to date fields, not {}", field.field_type),
        ));
    }
    let read = |name: &str| -> Result<Value, ConfigError> {
        let text = attrs.text(name)?;
        parse_in_field_format(field, &text)?
            .ok_or_else(|| attrs.invalid(name, format!("'{text}' does not match the field format")))
    };
    let min = if sides.min { Some(read("min")?) } else { None };
    let max = if sides.max { Some(read("max")?) } else { None };
    Ok(Box::new(Bound::new(rule, &attrs, min, max)?))
}

#[derive(Debug, Clone, Copy)]
enum WordMode {
    Forbid,
    Require,
}

#[derive(Clone)]
struct Words {
    mode: WordMode,
    words: Vec<String>,
}

fn create_words(
    rule: &RuleInstance,
    field: &FieldDescriptor,
    mode: WordMode,
) -> Result<Box<dyn Stage>, ConfigError> {
    let attrs = AttrReader::for_rule(rule, field);
    Ok(Box::new(Words {
        mode,
        words: attrs.string_list("words")?,
    }))
}

impl Stage for Words {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        if value.is_null() {
            return Ok(value);
        }
        let text = value.to_string();
        let (code, variable, offending): (_, _, Vec<&String>) = match self.mode {
            WordMode::Forbid => (
                "word_forbid",
                "foundWords",
                self.words.iter().filter(|w| text.contains(w.as_str())).collect(),
            ),
            WordMode::Require => (
                "word_require",
                "missingWords",
                self.words.iter().filter(|w| !text.contains(w.as_str())).collect(),
            ),
        };
        if offending.is_empty() {
            return Ok(value);
        }
        Err(FieldFailure::validation(code).with_var(variable, Value::text_list(offending.into_iter().cloned())))
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}
