use thiserror::Error;

use crate::value::ValueKind;

/// Fields sharing one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionConflict {
    pub position: u32,
    pub fields: Vec<String>,
}

/// Invalid record metadata or rule composition.
///
/// Always raised while compiling a mapping, never during row processing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("record '{record}' declares no fields")]
    NoFields { record: String },

    #[error("record '{record}': field '{field}' has invalid position {position} (positions start at 1)")]
    InvalidPosition {
        record: String,
        field: String,
        position: u32,
    },

    #[error("record '{record}' declares duplicate positions: {}", format_conflicts(.conflicts))]
    DuplicatePositions {
        record: String,
        conflicts: Vec<PositionConflict>,
    },

    #[error(
        "record '{record}' leaves positions {} unmapped before fields {}",
        join_numbers(.missing),
        .fields.join(", ")
    )]
    PositionGap {
        record: String,
        missing: Vec<u32>,
        fields: Vec<String>,
    },

    #[error("record '{record}' declares position {declared_max} but the configured column count is {column_count}")]
    ColumnCountConflict {
        record: String,
        declared_max: u32,
        column_count: usize,
    },

    #[error("field '{field}' references undefined bundle '{bundle}'")]
    UnknownBundle { field: String, bundle: String },

    #[error("field '{field}': bundle '{bundle}' uses itself")]
    RecursiveBundle { field: String, bundle: String },

    #[error("bundle '{bundle}' overrides '{kind}.{attribute}'{} but no such target exists", format_index(.index))]
    DanglingOverride {
        bundle: String,
        kind: String,
        attribute: String,
        index: Option<usize>,
    },

    #[error("bundle '{bundle}' has no attribute '{attribute}' to override from")]
    MissingOverrideSource { bundle: String, attribute: String },

    #[error(
        "bundle '{bundle}' overrides '{kind}.{attribute}' with a {source_kind} value but the target accepts {}",
        join_kinds(.expected)
    )]
    OverrideKindMismatch {
        bundle: String,
        kind: String,
        attribute: String,
        source_kind: ValueKind,
        expected: Vec<ValueKind>,
    },

    #[error("field '{field}' uses unregistered rule kind '{kind}'")]
    UnregisteredRule { field: String, kind: String },

    #[error("field '{field}': rule '{kind}' has invalid attribute '{attribute}': {reason}")]
    InvalidAttribute {
        field: String,
        kind: String,
        attribute: String,
        reason: String,
    },
}

fn format_conflicts(conflicts: &[PositionConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} ({})", c.position, c.fields.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_kinds(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

fn format_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ConfigError>;
