//! Compilation context and lazily compiled shared schemas.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::compiler::{self, CompiledSchema};
use crate::config::CompilerConfig;
use crate::convert::ConverterRegistry;
use crate::error::Error;
use crate::model::ModelDecl;
use crate::storage::{generic_types, StorageTypeRegistry};

/// Configuration and registries shared by every compilation.
///
/// Both registries are read-only during a compilation run. The converter
/// registry still caches synthesized converters, so one context can serve
/// concurrent compilations.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    config: CompilerConfig,
    converters: Arc<ConverterRegistry>,
    storage_types: Arc<StorageTypeRegistry>,
}

impl CompilationContext {
    /// Create a context with the built-in converters and generic storage types.
    pub fn new(config: CompilerConfig) -> Result<Self, Error> {
        Ok(Self {
            config,
            converters: Arc::new(ConverterRegistry::new()),
            storage_types: Arc::new(generic_types()?),
        })
    }

    /// Replace the storage type registry.
    pub fn with_storage_types(mut self, storage_types: StorageTypeRegistry) -> Self {
        self.storage_types = Arc::new(storage_types);
        self
    }

    /// Replace the converter registry.
    pub fn with_converters(mut self, converters: Arc<ConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    /// Compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Converter registry.
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Storage type registry.
    pub fn storage_types(&self) -> &StorageTypeRegistry {
        &self.storage_types
    }

    /// Compile a model declaration.
    pub fn compile(&self, decl: &ModelDecl) -> Result<CompiledSchema, Error> {
        compiler::compile(self, decl)
    }
}

/// A model declaration compiled at most once, on first use.
///
/// Concurrent callers block until the first compilation finishes and then
/// share its result. A failed compilation is not cached; the next call tries
/// again.
#[derive(Debug)]
pub struct SharedSchema {
    context: Arc<CompilationContext>,
    decl: ModelDecl,
    cell: Mutex<Option<Arc<CompiledSchema>>>,
}

impl SharedSchema {
    /// Create an uncompiled shared schema.
    pub fn new(context: Arc<CompilationContext>, decl: ModelDecl) -> Self {
        Self {
            context,
            decl,
            cell: Mutex::new(None),
        }
    }

    /// The compiled schema, compiling it first if needed.
    pub fn get_or_compile(&self) -> Result<Arc<CompiledSchema>, Error> {
        let mut cell = self.cell.lock();
        if let Some(schema) = cell.as_ref() {
            return Ok(Arc::clone(schema));
        }

        debug!(model = %self.decl.name, "Compiling shared schema");
        let schema = Arc::new(self.context.compile(&self.decl)?);
        *cell = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// The compiled schema if compilation already succeeded.
    pub fn get(&self) -> Option<Arc<CompiledSchema>> {
        self.cell.lock().clone()
    }

    /// Drop the compiled schema so the next access recompiles.
    pub fn reset(&self) {
        *self.cell.lock() = None;
    }

    /// The model declaration.
    pub fn decl(&self) -> &ModelDecl {
        &self.decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityDecl, MemberDecl};
    use crate::storage::StorageTypeDescriptor;
    use ormdb_types::{DbType, ScalarType};

    fn decl() -> ModelDecl {
        ModelDecl::new("m").with_entity(
            EntityDecl::new("Tag")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(MemberDecl::column("Label", ScalarType::String)),
        )
    }

    fn context() -> Arc<CompilationContext> {
        Arc::new(CompilationContext::new(CompilerConfig::default()).unwrap())
    }

    #[test]
    fn test_compiles_once() {
        let shared = SharedSchema::new(context(), decl());
        assert!(shared.get().is_none());

        let first = shared.get_or_compile().unwrap();
        let second = shared.get_or_compile().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        shared.reset();
        assert!(shared.get().is_none());
        let third = shared.get_or_compile().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let bad = ModelDecl::new("bad")
            .with_entity(EntityDecl::new("Tag").with_member(MemberDecl::column("Label", ScalarType::String)));
        let shared = SharedSchema::new(context(), bad);

        assert!(shared.get_or_compile().is_err());
        assert!(shared.get().is_none());
        assert!(shared.get_or_compile().is_err());
    }

    #[test]
    fn test_concurrent_callers_share_result() {
        let shared = Arc::new(SharedSchema::new(context(), decl()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.get_or_compile().unwrap())
            })
            .collect();
        let schemas: Vec<Arc<CompiledSchema>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(schemas.iter().all(|s| Arc::ptr_eq(s, &schemas[0])));
    }

    #[test]
    fn test_custom_storage_types() {
        let mut types = StorageTypeRegistry::new();
        types
            .add_type_def(
                StorageTypeDescriptor::new("integer", DbType::Int32, ScalarType::Int32)
                    .as_default(),
            )
            .unwrap();
        types
            .add_type_def(
                StorageTypeDescriptor::new("clob", DbType::String, ScalarType::String)
                    .as_default()
                    .unlimited(),
            )
            .unwrap();
        let ctx = CompilationContext::new(CompilerConfig::default())
            .unwrap()
            .with_storage_types(types);

        let decl = ModelDecl::new("m").with_entity(
            EntityDecl::new("Tag")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(MemberDecl::column("Label", ScalarType::String).unlimited()),
        );
        let schema = ctx.compile(&decl).unwrap();
        let tag = schema.table("Tag").unwrap();
        assert_eq!(tag.column("Id").unwrap().type_spec, "integer");
        assert_eq!(tag.column("Label").unwrap().type_spec, "clob");
    }
}
