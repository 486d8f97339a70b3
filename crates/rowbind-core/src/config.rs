//! Binding configuration: active groups, column layout and error policies.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// What to do with a rule whose kind has no registered factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRulePolicy {
    /// Fail compilation with [`rowbind_model::ConfigError::UnregisteredRule`].
    #[default]
    Fail,
    /// Log a warning and leave the rule out of the pipeline.
    WarnAndSkip,
}

/// How batch reads react to a rejected row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    AbortOnFirst,
    #[default]
    CollectAndContinue,
}

/// Options that shape a compiled mapping. Part of the mapping cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub active_groups: BTreeSet<String>,
    /// Total column count of the tabular data, when known.
    pub column_count: Option<usize>,
    /// Allow unmapped columns; they become pass-through columns.
    pub partial: bool,
    /// Header labels for pass-through columns, by position.
    pub partial_headers: BTreeMap<u32, String>,
    pub unknown_rule_policy: UnknownRulePolicy,
    pub error_policy: ErrorPolicy,
    /// Leave constraint stages out of write pipelines.
    pub skip_validation_on_write: bool,
    /// Read empty tokens as null before any stage runs.
    pub empty_as_null: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            active_groups: BTreeSet::new(),
            column_count: None,
            partial: false,
            partial_headers: BTreeMap::new(),
            unknown_rule_policy: UnknownRulePolicy::default(),
            error_policy: ErrorPolicy::default(),
            skip_validation_on_write: false,
            empty_as_null: true,
        }
    }
}

impl BindConfig {
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.active_groups.insert(group.into());
        self
    }

    #[must_use]
    pub fn with_column_count(mut self, column_count: usize) -> Self {
        self.column_count = Some(column_count);
        self
    }

    #[must_use]
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    #[must_use]
    pub fn with_partial_header(mut self, position: u32, label: impl Into<String>) -> Self {
        self.partial_headers.insert(position, label.into());
        self
    }

    #[must_use]
    pub fn with_unknown_rule_policy(mut self, policy: UnknownRulePolicy) -> Self {
        self.unknown_rule_policy = policy;
        self
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_skip_validation_on_write(mut self, skip: bool) -> Self {
        self.skip_validation_on_write = skip;
        self
    }

    #[must_use]
    pub fn with_empty_as_null(mut self, empty_as_null: bool) -> Self {
        self.empty_as_null = empty_as_null;
        self
    }
}
