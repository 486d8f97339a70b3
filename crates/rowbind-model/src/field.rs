//! Field and record declarations, and their resolved descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rule::{ComposedRuleSet, RuleDecl, RuleInstance};
use crate::value::{Attributes, Value, ValueKind};

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    /// Numeric text that may use `,` grouping, read as a float.
    Decimal,
    Boolean,
    Date,
    DateTime,
    /// One of a fixed set of names given by the `values` format attribute.
    Enum,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Enum => "enum",
        }
    }

    /// Kind of the typed value produced by the read pipeline.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::String | FieldType::Enum => ValueKind::Text,
            FieldType::Integer => ValueKind::Integer,
            FieldType::Float | FieldType::Decimal => ValueKind::Float,
            FieldType::Boolean => ValueKind::Bool,
            FieldType::Date => ValueKind::Date,
            FieldType::DateTime => ValueKind::DateTime,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Float | FieldType::Decimal
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(FieldType::String),
            "integer" | "int" => Ok(FieldType::Integer),
            "float" | "double" => Ok(FieldType::Float),
            "decimal" => Ok(FieldType::Decimal),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "enum" => Ok(FieldType::Enum),
            other => Err(format!("unknown field type '{other}'")),
        }
    }
}

/// A field as declared by a metadata provider, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// 1-based column position.
    pub position: u32,
    #[serde(default)]
    pub label: Option<String>,
    /// Attributes for the base parse/print stage (patterns, boolean words...).
    #[serde(default)]
    pub format: Attributes,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, field_type: FieldType, position: u32) -> Self {
        Self {
            name: name.into(),
            field_type,
            position,
            label: None,
            format: Attributes::new(),
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn format(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.format.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: impl Into<RuleDecl>) -> Self {
        self.rules.push(rule.into());
        self
    }
}

/// A field after rule resolution: bundles expanded, overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub position: u32,
    pub label: Option<String>,
    pub format: Attributes,
    /// Resolved rules in declaration order.
    pub rules: Vec<RuleInstance>,
    /// Pass-through column added in partial-mapping mode.
    pub partial: bool,
}

impl FieldDescriptor {
    /// Header label: explicit label, else the field name.
    pub fn header_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn format_attr(&self, name: &str) -> Option<&Value> {
        self.format.get(name)
    }
}

/// Everything a metadata provider declares for one record type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordDeclaration {
    pub name: String,
    pub fields: Vec<FieldDeclaration>,
    /// Bundle library referenced by [`crate::BundleUse`] declarations.
    #[serde(default)]
    pub bundles: BTreeMap<String, ComposedRuleSet>,
}

impl RecordDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            bundles: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn bundle(mut self, bundle: ComposedRuleSet) -> Self {
        self.bundles.insert(bundle.name.clone(), bundle);
        self
    }
}

/// Source of record declarations.
///
/// How declarations are discovered (derive macros, JSON files, hand-written
/// tables) is up to the implementor; the resolver only sees the result.
pub trait MetadataProvider {
    fn record_declaration(&self) -> RecordDeclaration;
}

impl MetadataProvider for RecordDeclaration {
    fn record_declaration(&self) -> RecordDeclaration {
        self.clone()
    }
}
