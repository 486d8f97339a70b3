//! Row binding core for rowbind.
//!
//! - **resolve**: record declarations to field descriptors (bundles,
//!   overrides, position checks)
//! - **registry**: rule kind to stage factory lookup, with the built-in kinds
//! - **stage**: pipeline stages and the builder that orders them
//! - **mapping**: compiled per-field pipelines and the shared mapping cache
//! - **session**: row processing and rendering, header checks, batch reads
//! - **convert**: row exceptions to rendered messages
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rowbind_core::{BindConfig, CompiledMapping, Session};
//!
//! let mapping = Arc::new(CompiledMapping::compile(&declaration, &BindConfig::default())?);
//! let mut session = Session::new(mapping);
//! let outcome = session.process_row(&tokens, context);
//! ```

pub mod config;
pub mod convert;
pub mod errors;
pub mod io;
pub mod logging;
pub mod mapping;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod stage;
pub mod stages;

pub use config::{BindConfig, ErrorPolicy, UnknownRulePolicy};
pub use convert::{ErrorConverter, ErrorMessage};
pub use errors::{
    BindError, BindingError, BindingErrorKind, BindingErrors, FieldFailure, RecordError, Result,
    RowError, RowException,
};
pub use io::{HeaderMode, RawRow, RowSink, RowSource, VecSink, VecSource};
pub use mapping::{CompiledMapping, FieldMapping, MappingCache};
pub use registry::{
    AttributeKinds, FnFactory, RuleRegistry, StageFactory, build_default_registry, default_registry,
};
pub use resolve::MetadataResolver;
pub use session::{
    PreWriteHook, ReadReport, Record, RecordValidator, RowOutcome, Session, WriteReport,
};
pub use stage::{Pipeline, PipelineBuilder, PipelineStep, Stage, StepFailure};
