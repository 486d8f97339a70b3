//! Declared rules, composed bundles and override directives.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::{Attributes, Value};

/// Processing direction of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Raw tokens to typed record values.
    Read,
    /// Typed record values to raw tokens.
    Write,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Read, Direction::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Direction::Read),
            "write" => Ok(Direction::Write),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Whether a rule kind transforms values or checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    Conversion,
    Constraint,
}

/// One declared conversion or validation unit attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInstance {
    /// Kind tag used to look up the stage factory.
    pub kind: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// Directions the rule applies to; empty means all.
    #[serde(default)]
    pub directions: BTreeSet<Direction>,
    /// Activation groups; empty means always active.
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Explicit message template for failures of this rule.
    #[serde(default)]
    pub message: Option<String>,
    /// Declaration rank within the owning field, assigned during resolution.
    #[serde(skip)]
    pub order: usize,
    /// Position among same-kind siblings when the kind repeats in one scope.
    #[serde(skip)]
    pub index: Option<usize>,
}

impl RuleInstance {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Attributes::new(),
            directions: BTreeSet::new(),
            groups: BTreeSet::new(),
            message: None,
            order: 0,
            index: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn for_direction(mut self, direction: Direction) -> Self {
        self.directions.insert(direction);
        self
    }

    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Whether the rule takes part in a pipeline for `direction` when the
    /// given groups are active.
    pub fn applies_to(&self, direction: Direction, active_groups: &BTreeSet<String>) -> bool {
        let direction_ok = self.directions.is_empty() || self.directions.contains(&direction);
        let group_ok =
            self.groups.is_empty() || self.groups.iter().any(|g| active_groups.contains(g));
        direction_ok && group_ok
    }

    /// Explicit message, ignoring empty templates.
    pub fn explicit_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

/// Copies a bundle attribute into a nested rule instance during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDirective {
    /// Attribute of the bundle that supplies the value.
    pub source: String,
    /// Kind of the nested rule instance(s) to update.
    pub target_kind: String,
    /// Attribute to overwrite; defaults to `source`.
    #[serde(default)]
    pub target_attribute: Option<String>,
    /// Same-kind index to target; `None` targets every instance of the kind.
    #[serde(default)]
    pub target_index: Option<usize>,
}

impl OverrideDirective {
    pub fn new(source: impl Into<String>, target_kind: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target_kind: target_kind.into(),
            target_attribute: None,
            target_index: None,
        }
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.target_attribute = Some(name.into());
        self
    }

    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.target_index = Some(index);
        self
    }

    pub fn target_attribute_name(&self) -> &str {
        self.target_attribute.as_deref().unwrap_or(&self.source)
    }
}

/// A named bundle aggregating rules plus override directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedRuleSet {
    pub name: String,
    /// The bundle's own attributes, used as override sources.
    #[serde(default)]
    pub attributes: Attributes,
    pub rules: Vec<RuleDecl>,
    #[serde(default)]
    pub overrides: Vec<OverrideDirective>,
    #[serde(default)]
    pub directions: BTreeSet<Direction>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ComposedRuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            rules: Vec::new(),
            overrides: Vec::new(),
            directions: BTreeSet::new(),
            groups: BTreeSet::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<RuleDecl>) -> Self {
        self.rules.push(rule.into());
        self
    }

    #[must_use]
    pub fn with_override(mut self, directive: OverrideDirective) -> Self {
        self.overrides.push(directive);
        self
    }

    #[must_use]
    pub fn for_direction(mut self, direction: Direction) -> Self {
        self.directions.insert(direction);
        self
    }

    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Reference to a bundle defined once in the record's bundle library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleUse {
    #[serde(rename = "use")]
    pub bundle: String,
    /// Per-use attributes, merged over the library definition's attributes.
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub directions: BTreeSet<Direction>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A declared rule on a field or inside a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleDecl {
    Rule(RuleInstance),
    Bundle(ComposedRuleSet),
    Use(BundleUse),
}

impl From<RuleInstance> for RuleDecl {
    fn from(rule: RuleInstance) -> Self {
        RuleDecl::Rule(rule)
    }
}

impl From<ComposedRuleSet> for RuleDecl {
    fn from(bundle: ComposedRuleSet) -> Self {
        RuleDecl::Bundle(bundle)
    }
}

impl From<BundleUse> for RuleDecl {
    fn from(bundle_use: BundleUse) -> Self {
        RuleDecl::Use(bundle_use)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_to_respects_directions_and_groups() {
        let groups: BTreeSet<String> = ["admin".to_string()].into_iter().collect();
        let rule = RuleInstance::new("trim");
        assert!(rule.applies_to(Direction::Read, &BTreeSet::new()));

        let read_only = RuleInstance::new("trim").for_direction(Direction::Read);
        assert!(read_only.applies_to(Direction::Read, &groups));
        assert!(!read_only.applies_to(Direction::Write, &groups));

        let grouped = RuleInstance::new("require").in_group("admin");
        assert!(grouped.applies_to(Direction::Read, &groups));
        assert!(!grouped.applies_to(Direction::Read, &BTreeSet::new()));
    }

    #[test]
    fn untagged_rule_declarations() {
        let decls: Vec<RuleDecl> = serde_json::from_str(
            r#"[
                {"kind": "trim"},
                {"use": "zip", "attributes": {"size": 7}},
                {"name": "code", "rules": [{"kind": "upper"}]}
            ]"#,
        )
        .unwrap();
        assert!(matches!(decls[0], RuleDecl::Rule(_)));
        assert!(matches!(decls[1], RuleDecl::Use(_)));
        assert!(matches!(decls[2], RuleDecl::Bundle(_)));
    }

    #[test]
    fn override_target_defaults_to_source() {
        let directive = OverrideDirective::new("max", "length_max");
        assert_eq!(directive.target_attribute_name(), "max");
        let renamed = directive.attribute("limit");
        assert_eq!(renamed.target_attribute_name(), "limit");
    }
}
