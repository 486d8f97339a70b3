//! Rule resolution: record declarations to field descriptors.
//!
//! Resolution runs in two phases per bundle. Nested rules are first
//! materialized with their factory's default attributes, then the bundle's
//! override directives copy its own attributes into them. Every problem is
//! reported here as a [`ConfigError`], never later while rows are processed.

use std::collections::{BTreeMap, HashMap};

use rowbind_model::{
    BundleUse, ComposedRuleSet, ConfigError, FieldDeclaration, FieldDescriptor, FieldType,
    OverrideDirective, PositionConflict, RecordDeclaration, RuleDecl, RuleInstance, Value,
    ValueKind,
};
use tracing::{debug, warn};

use crate::config::{BindConfig, UnknownRulePolicy};
use crate::registry::RuleRegistry;

pub struct MetadataResolver<'a> {
    registry: &'a RuleRegistry,
    config: &'a BindConfig,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(registry: &'a RuleRegistry, config: &'a BindConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve every field of `record`, sorted by position.
    ///
    /// In partial mode, unmapped positions up to the configured column
    /// count are filled with pass-through string fields.
    pub fn resolve(&self, record: &RecordDeclaration) -> Result<Vec<FieldDescriptor>, ConfigError> {
        if record.fields.is_empty() {
            return Err(ConfigError::NoFields {
                record: record.name.clone(),
            });
        }
        let fields = record
            .fields
            .iter()
            .map(|field| self.resolve_field(record, field))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = self.check_positions(&record.name, fields)?;
        debug!(
            record = %record.name,
            fields = fields.len(),
            "resolved record declaration"
        );
        Ok(fields)
    }

    fn resolve_field(
        &self,
        record: &RecordDeclaration,
        field: &FieldDeclaration,
    ) -> Result<FieldDescriptor, ConfigError> {
        let mut stack = Vec::new();
        let mut rules = Vec::new();
        for decl in &field.rules {
            rules.extend(self.expand(record, &field.name, decl, &mut stack)?);
        }
        assign_indices(&mut rules);
        for (order, rule) in rules.iter_mut().enumerate() {
            rule.order = order;
        }
        Ok(FieldDescriptor {
            name: field.name.clone(),
            field_type: field.field_type,
            position: field.position,
            label: field.label.clone(),
            format: field.format.clone(),
            rules,
            partial: false,
        })
    }

    fn expand(
        &self,
        record: &RecordDeclaration,
        field: &str,
        decl: &RuleDecl,
        stack: &mut Vec<String>,
    ) -> Result<Vec<RuleInstance>, ConfigError> {
        match decl {
            RuleDecl::Rule(rule) => Ok(self.materialize(field, rule)?.into_iter().collect()),
            RuleDecl::Bundle(bundle) => self.expand_bundle(record, field, bundle, stack),
            RuleDecl::Use(usage) => {
                if stack.contains(&usage.bundle) {
                    return Err(ConfigError::RecursiveBundle {
                        field: field.to_string(),
                        bundle: usage.bundle.clone(),
                    });
                }
                let definition =
                    record
                        .bundles
                        .get(&usage.bundle)
                        .ok_or_else(|| ConfigError::UnknownBundle {
                            field: field.to_string(),
                            bundle: usage.bundle.clone(),
                        })?;
                let bundle = apply_use(definition, usage);
                stack.push(usage.bundle.clone());
                let expanded = self.expand_bundle(record, field, &bundle, stack);
                stack.pop();
                expanded
            }
        }
    }

    /// A copy of `rule` with the factory's default attributes filled in.
    ///
    /// `None` when the kind is unregistered and the policy skips it.
    fn materialize(&self, field: &str, rule: &RuleInstance) -> Result<Option<RuleInstance>, ConfigError> {
        let Some(factory) = self.registry.get(&rule.kind) else {
            return match self.config.unknown_rule_policy {
                UnknownRulePolicy::Fail => Err(ConfigError::UnregisteredRule {
                    field: field.to_string(),
                    kind: rule.kind.clone(),
                }),
                UnknownRulePolicy::WarnAndSkip => {
                    warn!(field, kind = %rule.kind, "skipping unregistered rule");
                    Ok(None)
                }
            };
        };
        for (attribute, value) in &rule.attributes {
            if let Some(kinds) = factory.accepted_kinds(attribute)
                && !accepts(kinds, value)
            {
                return Err(ConfigError::InvalidAttribute {
                    field: field.to_string(),
                    kind: rule.kind.clone(),
                    attribute: attribute.clone(),
                    reason: format!("expected {}, got {}", join_kinds(kinds), value.kind()),
                });
            }
        }
        let mut rule = rule.clone();
        for (name, value) in factory.default_attributes() {
            rule.attributes.entry(name).or_insert(value);
        }
        Ok(Some(rule))
    }

    fn expand_bundle(
        &self,
        record: &RecordDeclaration,
        field: &str,
        bundle: &ComposedRuleSet,
        stack: &mut Vec<String>,
    ) -> Result<Vec<RuleInstance>, ConfigError> {
        let mut children = Vec::new();
        for decl in &bundle.rules {
            children.extend(self.expand(record, field, decl, stack)?);
        }
        assign_indices(&mut children);
        for directive in &bundle.overrides {
            let accepted = self
                .registry
                .get(&directive.target_kind)
                .and_then(|factory| factory.accepted_kinds(directive.target_attribute_name()));
            apply_override(bundle, directive, accepted, &mut children)?;
        }
        for child in &mut children {
            propagate(bundle, child);
        }
        Ok(children)
    }

    fn check_positions(
        &self,
        record: &str,
        mut fields: Vec<FieldDescriptor>,
    ) -> Result<Vec<FieldDescriptor>, ConfigError> {
        if let Some(field) = fields.iter().find(|f| f.position == 0) {
            return Err(ConfigError::InvalidPosition {
                record: record.to_string(),
                field: field.name.clone(),
                position: field.position,
            });
        }

        let mut by_position: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for field in &fields {
            by_position
                .entry(field.position)
                .or_default()
                .push(field.name.clone());
        }
        let conflicts: Vec<PositionConflict> = by_position
            .iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(position, names)| PositionConflict {
                position: *position,
                fields: names.clone(),
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(ConfigError::DuplicatePositions {
                record: record.to_string(),
                conflicts,
            });
        }

        let declared_max = by_position.keys().next_back().copied().unwrap_or(0);
        if let Some(column_count) = self.config.column_count {
            let exceeds = declared_max as usize > column_count;
            let differs = !self.config.partial && declared_max as usize != column_count;
            if exceeds || differs {
                return Err(ConfigError::ColumnCountConflict {
                    record: record.to_string(),
                    declared_max,
                    column_count,
                });
            }
        }

        let total = match (self.config.partial, self.config.column_count) {
            (true, Some(column_count)) => u32::try_from(column_count).unwrap_or(declared_max),
            _ => declared_max,
        };
        let missing: Vec<u32> = (1..=total)
            .filter(|position| !by_position.contains_key(position))
            .collect();
        if let Some(&first_gap) = missing.first() {
            if !self.config.partial {
                let fields = fields
                    .iter()
                    .filter(|f| f.position > first_gap)
                    .map(|f| f.name.clone())
                    .collect();
                return Err(ConfigError::PositionGap {
                    record: record.to_string(),
                    missing,
                    fields,
                });
            }
            fields.extend(missing.into_iter().map(|position| self.pass_through(position)));
        }

        fields.sort_by_key(|f| f.position);
        Ok(fields)
    }

    fn pass_through(&self, position: u32) -> FieldDescriptor {
        FieldDescriptor {
            name: format!("column{position}"),
            field_type: FieldType::String,
            position,
            label: self.config.partial_headers.get(&position).cloned(),
            format: Default::default(),
            rules: Vec::new(),
            partial: true,
        }
    }
}

/// The library bundle with one use's attributes merged over its own.
///
/// Directions, groups and message given on the use replace the library's.
fn apply_use(definition: &ComposedRuleSet, usage: &BundleUse) -> ComposedRuleSet {
    let mut bundle = definition.clone();
    bundle
        .attributes
        .extend(usage.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    if !usage.directions.is_empty() {
        bundle.directions = usage.directions.clone();
    }
    if !usage.groups.is_empty() {
        bundle.groups = usage.groups.clone();
    }
    if usage.message.is_some() {
        bundle.message = usage.message.clone();
    }
    bundle
}

/// Number repeated kinds 0, 1, ... in declaration order; single kinds get `None`.
fn assign_indices(rules: &mut [RuleInstance]) {
    let mut totals: HashMap<String, usize> = HashMap::new();
    for rule in rules.iter() {
        *totals.entry(rule.kind.clone()).or_default() += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    for rule in rules.iter_mut() {
        if totals.get(&rule.kind).copied().unwrap_or(0) > 1 {
            let next = seen.entry(rule.kind.clone()).or_default();
            rule.index = Some(*next);
            *next += 1;
        } else {
            rule.index = None;
        }
    }
}

/// Copy a bundle attribute into the targeted children.
///
/// The source must be one of the target's declared kinds. Without a
/// declaration it must match the kind already in place, null matching any.
fn apply_override(
    bundle: &ComposedRuleSet,
    directive: &OverrideDirective,
    accepted: Option<&[ValueKind]>,
    children: &mut [RuleInstance],
) -> Result<(), ConfigError> {
    let attribute = directive.target_attribute_name();
    let dangling = || ConfigError::DanglingOverride {
        bundle: bundle.name.clone(),
        kind: directive.target_kind.clone(),
        attribute: attribute.to_string(),
        index: directive.target_index,
    };
    let source = bundle
        .attributes
        .get(&directive.source)
        .ok_or_else(|| ConfigError::MissingOverrideSource {
            bundle: bundle.name.clone(),
            attribute: directive.source.clone(),
        })?;

    let mut matched = false;
    let targets = children.iter_mut().filter(|child| {
        child.kind == directive.target_kind
            && directive
                .target_index
                .is_none_or(|index| child.index.unwrap_or(0) == index)
    });
    for child in targets {
        let target = child.attributes.get_mut(attribute).ok_or_else(dangling)?;
        let expected = match accepted {
            Some(kinds) if !accepts(kinds, source) => Some(kinds.to_vec()),
            Some(_) => None,
            None if !source.is_null() && !target.is_null() && source.kind() != target.kind() => {
                Some(vec![target.kind()])
            }
            None => None,
        };
        if let Some(expected) = expected {
            return Err(ConfigError::OverrideKindMismatch {
                bundle: bundle.name.clone(),
                kind: directive.target_kind.clone(),
                attribute: attribute.to_string(),
                source_kind: source.kind(),
                expected,
            });
        }
        *target = source.clone();
        matched = true;
    }
    if matched { Ok(()) } else { Err(dangling()) }
}

/// Null leaves a declared attribute unset, so it is always accepted.
fn accepts(kinds: &[ValueKind], value: &Value) -> bool {
    value.is_null() || kinds.contains(&value.kind())
}

fn join_kinds(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(ValueKind::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Copy the bundle's directions, groups and message into a nested rule
/// that left them at their defaults.
fn propagate(bundle: &ComposedRuleSet, child: &mut RuleInstance) {
    if child.directions.is_empty() {
        child.directions = bundle.directions.clone();
    }
    if child.groups.is_empty() {
        child.groups = bundle.groups.clone();
    }
    if child.explicit_message().is_none() && bundle.message.is_some() {
        child.message = bundle.message.clone();
    }
}
