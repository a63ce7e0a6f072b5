//! Built-in storage type tables.

use ormdb_types::{DbType, ScalarType};

use super::descriptor::{ArgsTemplate, StorageTypeDescriptor};
use super::registry::StorageTypeRegistry;
use crate::error::Error;

/// Provider-neutral type table covering every host scalar.
///
/// Host types without a descriptor of their own (`i8`, `u16`, `u32`, `u64`,
/// `char`, `binary`) are stored in a wider compatible type through a
/// converter.
pub fn generic_types() -> Result<StorageTypeRegistry, Error> {
    let mut registry = StorageTypeRegistry::new();
    for descriptor in generic_descriptors() {
        registry.add_type_def(descriptor)?;
    }
    Ok(registry)
}

fn generic_descriptors() -> Vec<StorageTypeDescriptor> {
    use ScalarType as S;

    vec![
        StorageTypeDescriptor::new("boolean", DbType::Boolean, S::Bool)
            .as_default()
            .with_alias("bool")
            .with_default_init("FALSE"),
        StorageTypeDescriptor::new("tinyint", DbType::Byte, S::UInt8).as_default(),
        StorageTypeDescriptor::new("smallint", DbType::Int16, S::Int16)
            .as_default()
            .compatible_with([S::Int8])
            .with_alias("int2"),
        StorageTypeDescriptor::new("int", DbType::Int32, S::Int32)
            .as_default()
            .compatible_with([S::UInt16])
            .with_alias("integer")
            .with_alias("int4"),
        StorageTypeDescriptor::new("bigint", DbType::Int64, S::Int64)
            .as_default()
            .compatible_with([S::UInt32, S::UInt64])
            .with_alias("int8"),
        StorageTypeDescriptor::new("real", DbType::Single, S::Float32)
            .as_default()
            .with_alias("float4"),
        StorageTypeDescriptor::new("double precision", DbType::Double, S::Float64)
            .as_default()
            .with_alias("double")
            .with_alias("float8"),
        StorageTypeDescriptor::new("float", DbType::Double, S::Float64).with_args(ArgsTemplate::Precision),
        StorageTypeDescriptor::new("decimal", DbType::Decimal, S::Decimal)
            .as_default()
            .with_args(ArgsTemplate::PrecisionScale)
            .with_alias("numeric"),
        StorageTypeDescriptor::new("money", DbType::Currency, S::Decimal),
        StorageTypeDescriptor::new("nchar", DbType::StringFixedLength, S::String)
            .with_args(ArgsTemplate::Size)
            .compatible_with([S::Char]),
        StorageTypeDescriptor::new("char", DbType::AnsiStringFixedLength, S::String)
            .with_args(ArgsTemplate::Size)
            .compatible_with([S::Char]),
        StorageTypeDescriptor::new("nvarchar", DbType::String, S::String)
            .as_default()
            .with_args(ArgsTemplate::Size)
            .compatible_with([S::Char])
            .with_alias("national varchar"),
        StorageTypeDescriptor::new("varchar", DbType::AnsiString, S::String)
            .with_args(ArgsTemplate::Size)
            .compatible_with([S::Char]),
        StorageTypeDescriptor::new("text", DbType::String, S::String)
            .as_default()
            .unlimited()
            .with_alias("ntext")
            .with_alias("clob"),
        StorageTypeDescriptor::new("varbinary", DbType::Binary, S::Bytes)
            .as_default()
            .with_args(ArgsTemplate::Size)
            .compatible_with([S::Binary]),
        StorageTypeDescriptor::new("blob", DbType::Binary, S::Bytes)
            .as_default()
            .unlimited()
            .compatible_with([S::Binary])
            .with_alias("image")
            .with_alias("bytea"),
        StorageTypeDescriptor::new("uuid", DbType::Guid, S::Guid)
            .as_default()
            .with_alias("uniqueidentifier"),
        StorageTypeDescriptor::new("timestamp", DbType::DateTime, S::DateTime)
            .as_default()
            .with_alias("datetime")
            .with_default_init("CURRENT_TIMESTAMP"),
        StorageTypeDescriptor::new("date", DbType::Date, S::DateTime),
        StorageTypeDescriptor::new("time", DbType::Time, S::Time).as_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormdb_types::ValueType;
    use ScalarType as S;

    #[test]
    fn test_every_scalar_resolves() {
        let registry = generic_types().unwrap();
        let scalars = [
            S::Bool,
            S::Int8,
            S::UInt8,
            S::Int16,
            S::UInt16,
            S::Int32,
            S::UInt32,
            S::Int64,
            S::UInt64,
            S::Float32,
            S::Float64,
            S::Decimal,
            S::Char,
            S::String,
            S::Bytes,
            S::Binary,
            S::Guid,
            S::DateTime,
            S::Time,
        ];

        for scalar in scalars {
            assert!(
                registry.find_storage_type(&ValueType::Scalar(scalar), false).is_some(),
                "{scalar} has no storage type"
            );
        }
    }
}
