//! Provider storage types and column type resolution.

mod descriptor;
mod profiles;
mod registry;
mod type_spec;

pub use descriptor::{
    format_literal, ArgsTemplate, LiteralFormatter, StorageTypeDescriptor, TypeDefFlags, UNLIMITED_SIZE,
};
pub use profiles::generic_types;
pub use registry::{ColumnTypeInfo, StorageTypeRegistry};
pub use type_spec::{SpecArgs, TypeSpec};
