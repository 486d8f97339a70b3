//! Built-in stages: field type codecs, conversions and constraints.

pub mod constraint;
pub mod conversion;
pub mod format;

use rowbind_model::{Attributes, ConfigError, FieldDescriptor, RuleInstance, Value, ValueKind};

/// Typed access to a rule's (or a field format's) attributes.
///
/// Every accessor reports problems as [`ConfigError::InvalidAttribute`], so
/// they surface while compiling, never while processing rows.
pub(crate) struct AttrReader<'a> {
    attributes: &'a Attributes,
    field: &'a str,
    kind: &'a str,
}

impl<'a> AttrReader<'a> {
    pub(crate) fn for_rule(rule: &'a RuleInstance, field: &'a FieldDescriptor) -> Self {
        Self {
            attributes: &rule.attributes,
            field: &field.name,
            kind: &rule.kind,
        }
    }

    pub(crate) fn for_format(field: &'a FieldDescriptor) -> Self {
        Self {
            attributes: &field.format,
            field: &field.name,
            kind: "format",
        }
    }

    pub(crate) fn invalid(&self, attribute: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidAttribute {
            field: self.field.to_string(),
            kind: self.kind.to_string(),
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    /// The attribute unless absent or null.
    pub(crate) fn value(&self, name: &str) -> Option<&'a Value> {
        self.attributes.get(name).filter(|value| !value.is_null())
    }

    pub(crate) fn required(&self, name: &str) -> Result<&'a Value, ConfigError> {
        self.value(name)
            .ok_or_else(|| self.invalid(name, "a value is required"))
    }

    pub(crate) fn text(&self, name: &str) -> Result<String, ConfigError> {
        match self.required(name)? {
            Value::Text(text) => Ok(text.clone()),
            other => Err(self.invalid(name, format!("expected text, got {}", other.kind()))),
        }
    }

    pub(crate) fn text_or(&self, name: &str, default: &str) -> Result<String, ConfigError> {
        match self.value(name) {
            None => Ok(default.to_string()),
            Some(Value::Text(text)) => Ok(text.clone()),
            Some(other) => Err(self.invalid(name, format!("expected text, got {}", other.kind()))),
        }
    }

    pub(crate) fn bool_or(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.value(name) {
            None => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(other) => Err(self.invalid(name, format!("expected boolean, got {}", other.kind()))),
        }
    }

    pub(crate) fn usize(&self, name: &str) -> Result<usize, ConfigError> {
        let value = self.required(name)?;
        to_usize(value).ok_or_else(|| self.invalid(name, "expected a non-negative integer"))
    }

    pub(crate) fn usize_or(&self, name: &str, default: usize) -> Result<usize, ConfigError> {
        match self.value(name) {
            None => Ok(default),
            Some(_) => self.usize(name),
        }
    }

    /// Integers from a single integer or a list of integers.
    pub(crate) fn usize_list(&self, name: &str) -> Result<Vec<usize>, ConfigError> {
        let value = self.required(name)?;
        let items = match value {
            Value::List(items) => items.iter().map(to_usize).collect::<Option<Vec<_>>>(),
            single => to_usize(single).map(|n| vec![n]),
        };
        match items {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(self.invalid(name, "expected one or more non-negative integers")),
        }
    }

    /// String forms of a list, or of a single scalar.
    pub(crate) fn string_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let list = self.required(name)?.to_string_list();
        if list.is_empty() {
            return Err(self.invalid(name, "expected at least one entry"));
        }
        Ok(list)
    }

    pub(crate) fn string_list_or_empty(&self, name: &str) -> Vec<String> {
        self.value(name)
            .map(Value::to_string_list)
            .unwrap_or_default()
    }
}

fn to_usize(value: &Value) -> Option<usize> {
    value.as_i64().and_then(|n| usize::try_from(n).ok())
}

// Accepted kinds shared by the built-in factories' attribute declarations.
pub(crate) const BOOL: &[ValueKind] = &[ValueKind::Bool];
pub(crate) const TEXT: &[ValueKind] = &[ValueKind::Text];
pub(crate) const INTEGER: &[ValueKind] = &[ValueKind::Integer];
pub(crate) const NUMBER: &[ValueKind] = &[ValueKind::Integer, ValueKind::Float];
pub(crate) const LENGTHS: &[ValueKind] = &[ValueKind::Integer, ValueKind::List];
/// Anything [`Value::to_string_list`] turns into entries.
pub(crate) const ENTRIES: &[ValueKind] = &[
    ValueKind::List,
    ValueKind::Text,
    ValueKind::Integer,
    ValueKind::Float,
    ValueKind::Bool,
];

/// Attribute map literal used by factories' defaults.
pub(crate) fn attrs<const N: usize>(entries: [(&str, Value); N]) -> Attributes {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
