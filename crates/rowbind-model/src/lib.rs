//! Data model for rowbind.
//!
//! - **value**: the [`Value`] tagged union shared by cells, rule attributes and
//!   message variables
//! - **rule**: rule instances, composed bundles and override directives
//! - **field**: field/record declarations and resolved field descriptors
//! - **context**: positional row context
//! - **error**: configuration errors raised while compiling a mapping

pub mod context;
pub mod error;
pub mod field;
pub mod rule;
pub mod value;

pub use context::RowContext;
pub use error::{ConfigError, PositionConflict, Result};
pub use field::{
    FieldDeclaration, FieldDescriptor, FieldType, MetadataProvider, RecordDeclaration,
};
pub use rule::{
    BundleUse, ComposedRuleSet, Direction, OverrideDirective, RuleCategory, RuleDecl,
    RuleInstance,
};
pub use value::{Attributes, Value, ValueKind, Variables};
