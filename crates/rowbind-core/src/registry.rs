//! Rule kind registry.
//!
//! Maps a rule kind tag to the [`StageFactory`] that builds its stage.
//! Applications register their own factories on top of the built-ins.
//!
//! ```ignore
//! use rowbind_core::registry::{build_default_registry, StageFactory};
//!
//! let mut registry = build_default_registry();
//! registry.register(MyChecksumFactory);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rowbind_model::{
    Attributes, ConfigError, FieldDescriptor, RuleCategory, RuleInstance, ValueKind,
};

use crate::stage::Stage;
use crate::stages;

/// Builds one pipeline stage from a resolved rule instance.
pub trait StageFactory: Send + Sync {
    /// Rule kind tag this factory handles.
    fn kind(&self) -> &str;

    fn category(&self) -> RuleCategory;

    /// Attributes materialized on every instance before overrides apply.
    ///
    /// Bundles can only override attributes that exist after this step.
    fn default_attributes(&self) -> Attributes {
        Attributes::new()
    }

    /// Value kinds `attribute` may hold, when the factory declares them.
    ///
    /// Declared attributes are checked when written directly on a rule and
    /// when a bundle override targets them. `None` leaves the attribute
    /// unchecked until [`StageFactory::create`] reads it.
    fn accepted_kinds(&self, _attribute: &str) -> Option<&[ValueKind]> {
        None
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAttribute`] when an attribute is missing
    /// or malformed.
    fn create(
        &self,
        rule: &RuleInstance,
        field: &FieldDescriptor,
    ) -> Result<Box<dyn Stage>, ConfigError>;
}

/// Registry of stage factories indexed by rule kind.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: HashMap<String, Arc<dyn StageFactory>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory for the same kind.
    pub fn register(&mut self, factory: impl StageFactory + 'static) {
        self.factories
            .insert(factory.kind().to_string(), Arc::new(factory));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn StageFactory> {
        self.factories.get(kind).map(|factory| factory.as_ref())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

static DEFAULT_REGISTRY: OnceLock<RuleRegistry> = OnceLock::new();

/// The registry with every built-in rule kind, built on first access.
pub fn default_registry() -> &'static RuleRegistry {
    DEFAULT_REGISTRY.get_or_init(build_default_registry)
}

/// A new registry holding the built-in conversions and constraints.
pub fn build_default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    stages::conversion::register(&mut registry);
    stages::constraint::register(&mut registry);
    registry
}

/// Stage constructor used by [`FnFactory`].
pub type CreateStage = fn(&RuleInstance, &FieldDescriptor) -> Result<Box<dyn Stage>, ConfigError>;

/// Accepted value kinds per attribute name.
pub type AttributeKinds = &'static [(&'static str, &'static [ValueKind])];

/// Adapts plain functions to [`StageFactory`].
pub struct FnFactory {
    kind: &'static str,
    category: RuleCategory,
    defaults: fn() -> Attributes,
    create: CreateStage,
    kinds: AttributeKinds,
}

impl FnFactory {
    pub fn new(
        kind: &'static str,
        category: RuleCategory,
        defaults: fn() -> Attributes,
        create: CreateStage,
    ) -> Self {
        Self {
            kind,
            category,
            defaults,
            create,
            kinds: &[],
        }
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: AttributeKinds) -> Self {
        self.kinds = kinds;
        self
    }
}

impl StageFactory for FnFactory {
    fn kind(&self) -> &str {
        self.kind
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn default_attributes(&self) -> Attributes {
        (self.defaults)()
    }

    fn accepted_kinds(&self, attribute: &str) -> Option<&[ValueKind]> {
        self.kinds
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, kinds)| *kinds)
    }

    fn create(
        &self,
        rule: &RuleInstance,
        field: &FieldDescriptor,
    ) -> Result<Box<dyn Stage>, ConfigError> {
        (self.create)(rule, field)
    }
}
