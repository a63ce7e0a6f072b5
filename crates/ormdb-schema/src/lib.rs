//! ORMDB Schema - Entity model compiler.
//!
//! Turns declarative entity models into a relational schema: tables, typed
//! columns, keys, foreign key constraints, delete ordering, and the value
//! converters that move data between host and storage representations.
//!
//! ```ignore
//! let context = CompilationContext::new(CompilerConfig::default())?;
//! let schema = context.compile(&model)?;
//! for table in schema.delete_order() {
//!     println!("{}", table.name);
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod context;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod expand;
pub mod graph;
pub mod model;
pub mod storage;

pub use compiler::{
    compile, CompiledColumn, CompiledForeignKey, CompiledKey, CompiledSchema, CompiledTable,
    KeyColumn, SchemaSnapshot,
};
pub use config::{CompilerConfig, DriverProfile};
pub use context::{CompilationContext, SharedSchema};
pub use convert::{Converter, ConverterRegistry};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::Error;
pub use expand::{expand_keys, KeyExpander};
pub use graph::{analyze, DependencyGraph, DependencyOrder};
pub use model::{
    ComputedColumn, EntityDecl, EntityKind, EntityModel, KeyDecl, KeyType, MemberDecl, ModelDecl,
};
pub use storage::{StorageTypeDescriptor, StorageTypeRegistry, TypeSpec};

/// Re-export value types.
pub use ormdb_types as types;
