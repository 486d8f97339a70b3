//! Pipeline stages and the builder that orders them.
//!
//! A [`Pipeline`] is an ordered list of stages run front to back. The first
//! failing stage ends the run for that field. Pipelines are built once per
//! (field, direction) and reused for every row of a session; stages that keep
//! session state hand out empty copies through [`Stage::fresh`].

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use rowbind_model::{
    Attributes, ConfigError, Direction, FieldDescriptor, RowContext, RuleCategory, RuleInstance,
    Value,
};
use tracing::warn;

use crate::config::{BindConfig, UnknownRulePolicy};
use crate::errors::FieldFailure;
use crate::registry::RuleRegistry;

/// One value transformer or check.
pub trait Stage: Send + Sync {
    fn execute(&mut self, value: Value, context: &RowContext) -> Result<Value, FieldFailure>;

    /// A copy of this stage with no session state.
    fn fresh(&self) -> Box<dyn Stage>;
}

/// A stage plus the rule it was created from.
pub struct PipelineStep {
    rule: String,
    category: Option<RuleCategory>,
    attributes: Attributes,
    message: Option<String>,
    stage: Box<dyn Stage>,
}

impl PipelineStep {
    fn from_rule(rule: &RuleInstance, category: RuleCategory, stage: Box<dyn Stage>) -> Self {
        Self {
            rule: rule.kind.clone(),
            category: Some(category),
            attributes: rule.attributes.clone(),
            message: rule.explicit_message().map(str::to_string),
            stage,
        }
    }

    /// The field type's own parse or print stage.
    pub fn base(name: impl Into<String>, stage: Box<dyn Stage>) -> Self {
        Self {
            rule: name.into(),
            category: None,
            attributes: Attributes::new(),
            message: None,
            stage,
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// `None` for the base stage.
    pub fn category(&self) -> Option<RuleCategory> {
        self.category
    }

    fn fresh(&self) -> Self {
        Self {
            rule: self.rule.clone(),
            category: self.category,
            attributes: self.attributes.clone(),
            message: self.message.clone(),
            stage: self.stage.fresh(),
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("rule", &self.rule)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// A failed step, with what the error converter needs to know about its rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub rule: String,
    pub attributes: Attributes,
    pub message: Option<String>,
    /// Value the failing stage received.
    pub rejected: Value,
    pub failure: FieldFailure,
}

#[derive(Debug)]
pub struct Pipeline {
    direction: Direction,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(direction: Direction, steps: Vec<PipelineStep>) -> Self {
        Self { direction, steps }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Rule kinds in execution order.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(PipelineStep::rule)
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn execute(&mut self, value: Value, context: &RowContext) -> Result<Value, StepFailure> {
        self.steps.iter_mut().try_fold(value, |value, step| {
            let rejected = value.clone();
            step.stage
                .execute(value, context)
                .map_err(|failure| StepFailure {
                    rule: step.rule.clone(),
                    attributes: step.attributes.clone(),
                    message: step.message.clone(),
                    rejected,
                    failure,
                })
        })
    }

    /// Same steps, empty session state.
    pub fn fresh(&self) -> Pipeline {
        Pipeline {
            direction: self.direction,
            steps: self.steps.iter().map(PipelineStep::fresh).collect(),
        }
    }
}

/// Filters, orders and folds a field's rules into a [`Pipeline`].
pub struct PipelineBuilder<'a> {
    registry: &'a RuleRegistry,
    config: &'a BindConfig,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a RuleRegistry, config: &'a BindConfig) -> Self {
        Self { registry, config }
    }

    /// Build the pipeline for one field and direction.
    ///
    /// Read runs conversions, then `base`, then constraints. Write runs
    /// constraints, then `base`, then conversions. Within each group rules
    /// run in declaration order.
    pub fn build(
        &self,
        field: &FieldDescriptor,
        direction: Direction,
        active_groups: &BTreeSet<String>,
        base: PipelineStep,
    ) -> Result<Pipeline, ConfigError> {
        let mut conversions = Vec::new();
        let mut constraints = Vec::new();
        for rule in field
            .rules
            .iter()
            .filter(|rule| rule.applies_to(direction, active_groups))
        {
            let Some(factory) = self.registry.get(&rule.kind) else {
                match self.config.unknown_rule_policy {
                    UnknownRulePolicy::Fail => {
                        return Err(ConfigError::UnregisteredRule {
                            field: field.name.clone(),
                            kind: rule.kind.clone(),
                        });
                    }
                    UnknownRulePolicy::WarnAndSkip => {
                        warn!(field = %field.name, kind = %rule.kind, "skipping unregistered rule");
                        continue;
                    }
                }
            };
            match factory.category() {
                RuleCategory::Conversion => conversions.push(rule),
                RuleCategory::Constraint
                    if direction == Direction::Write && self.config.skip_validation_on_write => {}
                RuleCategory::Constraint => constraints.push(rule),
            }
        }

        let steps = match direction {
            Direction::Read => {
                let mut chain = self.fold_outward(VecDeque::new(), &constraints, field)?;
                chain.push_front(base);
                self.fold_outward(chain, &conversions, field)?
            }
            Direction::Write => {
                let mut chain = self.fold_outward(VecDeque::new(), &conversions, field)?;
                chain.push_front(base);
                self.fold_outward(chain, &constraints, field)?
            }
        };
        Ok(Pipeline::new(direction, steps.into()))
    }

    /// Prepend one step per rule, walking the rules in reverse so the first
    /// declared rule ends up first.
    fn fold_outward(
        &self,
        chain: VecDeque<PipelineStep>,
        rules: &[&RuleInstance],
        field: &FieldDescriptor,
    ) -> Result<VecDeque<PipelineStep>, ConfigError> {
        rules.iter().rev().try_fold(chain, |mut chain, rule| {
            let factory = self
                .registry
                .get(&rule.kind)
                .ok_or_else(|| ConfigError::UnregisteredRule {
                    field: field.name.clone(),
                    kind: rule.kind.clone(),
                })?;
            let stage = factory.create(rule, field)?;
            chain.push_front(PipelineStep::from_rule(rule, factory.category(), stage));
            Ok(chain)
        })
    }
}
