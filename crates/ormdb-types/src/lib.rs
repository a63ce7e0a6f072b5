//! ORMDB value vocabulary.
//!
//! This crate defines the types shared between the schema compiler and the
//! layers that consume its output.
//!
//! # Modules
//!
//! - [`value`] - Runtime values on the host and provider side of a converter
//! - [`types`] - Host and storage type identities, provider type tags
//! - [`error`] - Conversion error type
//!
//! # Serialization
//!
//! Type identities derive `rkyv::Archive`, `rkyv::Serialize`, and
//! `rkyv::Deserialize` so entity declarations that embed them can be
//! snapshotted to bytes.

pub mod error;
pub mod types;
pub mod value;

pub use error::ConversionError;
pub use types::{DbType, EnumType, EnumVariant, ScalarType, ValueType, INTEGER_TYPES, NUMERIC_TYPES};
pub use value::{format_guid, EnumValue, Value};

/// Exact decimal carried by [`Value::Decimal`].
pub use rust_decimal::Decimal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_roundtrip() {
        let t = ValueType::NullableEnum(EnumType::new("Color", &["Red", "Green"]));
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&t).unwrap();
        let archived =
            rkyv::access::<types::ArchivedValueType, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: ValueType =
            rkyv::deserialize::<ValueType, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(t, deserialized);
    }
}
