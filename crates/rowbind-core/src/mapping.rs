//! Compiled mappings and the process-wide mapping cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rowbind_model::{
    ConfigError, Direction, FieldDescriptor, MetadataProvider, RecordDeclaration,
};
use tracing::debug;

use crate::config::BindConfig;
use crate::registry::{RuleRegistry, build_default_registry, default_registry};
use crate::resolve::MetadataResolver;
use crate::stage::{Pipeline, PipelineBuilder};
use crate::stages::format::base_steps;

/// One resolved field plus its read and write pipelines.
#[derive(Debug)]
pub struct FieldMapping {
    descriptor: FieldDescriptor,
    read: Pipeline,
    write: Pipeline,
}

impl FieldMapping {
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn pipeline(&self, direction: Direction) -> &Pipeline {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }
}

/// Per-field pipelines for both directions plus ordered header labels.
///
/// Immutable once built. Sessions take fresh copies of the pipelines so
/// that stateful stages never leak between sessions.
#[derive(Debug)]
pub struct CompiledMapping {
    record: String,
    fields: Vec<FieldMapping>,
    headers: Vec<String>,
    config: BindConfig,
}

impl CompiledMapping {
    /// Compile with the built-in rule kinds.
    pub fn compile(
        provider: &impl MetadataProvider,
        config: &BindConfig,
    ) -> Result<Self, ConfigError> {
        Self::compile_with(provider, config, default_registry())
    }

    pub fn compile_with(
        provider: &impl MetadataProvider,
        config: &BindConfig,
        registry: &RuleRegistry,
    ) -> Result<Self, ConfigError> {
        Self::compile_declaration(&provider.record_declaration(), config, registry)
    }

    fn compile_declaration(
        declaration: &RecordDeclaration,
        config: &BindConfig,
        registry: &RuleRegistry,
    ) -> Result<Self, ConfigError> {
        let descriptors = MetadataResolver::new(registry, config).resolve(declaration)?;
        let builder = PipelineBuilder::new(registry, config);
        let mut fields = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let (parse, print) = base_steps(&descriptor)?;
            let read = builder.build(&descriptor, Direction::Read, &config.active_groups, parse)?;
            let write = builder.build(&descriptor, Direction::Write, &config.active_groups, print)?;
            fields.push(FieldMapping {
                descriptor,
                read,
                write,
            });
        }
        let headers = fields
            .iter()
            .map(|field| field.descriptor.header_label().to_string())
            .collect();
        debug!(
            record = %declaration.name,
            fields = fields.len(),
            groups = ?config.active_groups,
            "compiled mapping"
        );
        Ok(Self {
            record: declaration.name.clone(),
            fields,
            headers,
            config: config.clone(),
        })
    }

    pub fn record_name(&self) -> &str {
        &self.record
    }

    /// Header labels in position order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|field| field.descriptor.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }
}

type MappingSlot = Arc<OnceLock<Result<Arc<CompiledMapping>, ConfigError>>>;

/// Slots for every distinct declaration seen under one record name.
type MappingBucket = Vec<(RecordDeclaration, MappingSlot)>;

/// Compiles each (record declaration, configuration) pair once per process.
///
/// Entries are keyed on the declaration's content, so two providers that
/// share a record name but declare different fields get separate mappings.
/// Concurrent first requests for the same key block on a single
/// compilation and share its result, errors included.
#[derive(Debug)]
pub struct MappingCache {
    registry: RuleRegistry,
    entries: Mutex<HashMap<(String, BindConfig), MappingBucket>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::with_registry(build_default_registry())
    }

    pub fn with_registry(registry: RuleRegistry) -> Self {
        Self {
            registry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn get_or_compile(
        &self,
        provider: &impl MetadataProvider,
        config: &BindConfig,
    ) -> Result<Arc<CompiledMapping>, ConfigError> {
        let declaration = provider.record_declaration();
        let key = (declaration.name.clone(), config.clone());
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let bucket = entries.entry(key).or_default();
            match bucket.iter().find(|(cached, _)| *cached == declaration) {
                Some((_, slot)) => {
                    debug!(record = %declaration.name, "mapping cache hit");
                    Arc::clone(slot)
                }
                None => {
                    debug!(record = %declaration.name, "mapping cache miss");
                    let slot = MappingSlot::default();
                    bucket.push((declaration.clone(), Arc::clone(&slot)));
                    slot
                }
            }
        };
        slot.get_or_init(|| {
            CompiledMapping::compile_declaration(&declaration, config, &self.registry).map(Arc::new)
        })
        .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MappingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use rowbind_model::{FieldDeclaration, FieldType, RuleInstance};

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl MetadataProvider for CountingProvider {
        fn record_declaration(&self) -> RecordDeclaration {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RecordDeclaration::new("person")
                .field(FieldDeclaration::new("name", FieldType::String, 1).rule(RuleInstance::new("trim")))
                .field(FieldDeclaration::new("age", FieldType::Integer, 2).label("Age"))
        }
    }

    #[test]
    fn headers_follow_positions() {
        let record = RecordDeclaration::new("r")
            .field(FieldDeclaration::new("b", FieldType::String, 2))
            .field(FieldDeclaration::new("a", FieldType::String, 1).label("A"));
        let mapping = CompiledMapping::compile(&record, &BindConfig::default()).unwrap();
        assert_eq!(mapping.headers(), ["A", "b"]);
        let read: Vec<_> = mapping.fields()[0].pipeline(Direction::Read).rules().collect();
        assert_eq!(read, vec!["parse"]);
    }

    #[test]
    fn cache_shares_one_compilation() {
        let cache = Arc::new(MappingCache::new());
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    cache
                        .get_or_compile(provider.as_ref(), &BindConfig::default())
                        .unwrap()
                })
            })
            .collect();
        let mappings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(mappings.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);

        let other = cache
            .get_or_compile(provider.as_ref(), &BindConfig::default().with_group("strict"))
            .unwrap();
        assert!(!Arc::ptr_eq(&other, &mappings[0]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn same_name_declarations_compile_separately() {
        let cache = MappingCache::new();
        let short =
            RecordDeclaration::new("person").field(FieldDeclaration::new("name", FieldType::String, 1));
        let long = RecordDeclaration::new("person")
            .field(FieldDeclaration::new("id", FieldType::Integer, 1))
            .field(FieldDeclaration::new("email", FieldType::String, 2));
        let config = BindConfig::default();

        let first = cache.get_or_compile(&short, &config).unwrap();
        let second = cache.get_or_compile(&long, &config).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.headers(), ["name"]);
        assert_eq!(second.headers(), ["id", "email"]);
        assert_eq!(cache.len(), 2);

        let again = cache.get_or_compile(&short, &config).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 2);
    }
}
