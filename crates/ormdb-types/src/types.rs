//! Host and storage type identities.
//!
//! A [`ValueType`] names the type a value has on one side of a mapping: the
//! application (host) side of an entity member, or the provider side of a
//! storage type descriptor. Converters are keyed by pairs of these.

use rkyv::{Archive, Deserialize, Serialize};
use rust_decimal::Decimal;
use std::fmt;

use crate::value::{EnumValue, Value};

/// Scalar value types understood by the schema compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 8-bit unsigned integer.
    UInt8,
    /// 16-bit signed integer.
    Int16,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit unsigned integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal,
    /// Single character.
    Char,
    /// UTF-8 string.
    String,
    /// Raw byte sequence.
    Bytes,
    /// Opaque binary wrapper around a byte sequence.
    Binary,
    /// 128-bit unique identifier.
    Guid,
    /// Timestamp (microseconds since Unix epoch).
    DateTime,
    /// Time of day or duration (microseconds).
    Time,
}

/// All integer scalar types, narrowest first.
pub const INTEGER_TYPES: [ScalarType; 8] = [
    ScalarType::Int8,
    ScalarType::UInt8,
    ScalarType::Int16,
    ScalarType::UInt16,
    ScalarType::Int32,
    ScalarType::UInt32,
    ScalarType::Int64,
    ScalarType::UInt64,
];

/// All numeric scalar types.
pub const NUMERIC_TYPES: [ScalarType; 11] = [
    ScalarType::Int8,
    ScalarType::UInt8,
    ScalarType::Int16,
    ScalarType::UInt16,
    ScalarType::Int32,
    ScalarType::UInt32,
    ScalarType::Int64,
    ScalarType::UInt64,
    ScalarType::Float32,
    ScalarType::Float64,
    ScalarType::Decimal,
];

impl ScalarType {
    /// Check if this type is an integer type.
    pub fn is_integer(&self) -> bool {
        INTEGER_TYPES.contains(self)
    }

    /// Check if this type is a floating point or decimal type.
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            ScalarType::Float32 | ScalarType::Float64 | ScalarType::Decimal
        )
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bytes of an integer type.
    pub fn integer_width(&self) -> Option<u8> {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => Some(1),
            ScalarType::Int16 | ScalarType::UInt16 => Some(2),
            ScalarType::Int32 | ScalarType::UInt32 => Some(4),
            ScalarType::Int64 | ScalarType::UInt64 => Some(8),
            _ => None,
        }
    }

    /// Check if values of this type can be limited in size.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            ScalarType::String | ScalarType::Bytes | ScalarType::Binary
        )
    }

    /// Type name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "i8",
            ScalarType::UInt8 => "u8",
            ScalarType::Int16 => "i16",
            ScalarType::UInt16 => "u16",
            ScalarType::Int32 => "i32",
            ScalarType::UInt32 => "u32",
            ScalarType::Int64 => "i64",
            ScalarType::UInt64 => "u64",
            ScalarType::Float32 => "f32",
            ScalarType::Float64 => "f64",
            ScalarType::Decimal => "decimal",
            ScalarType::Char => "char",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Binary => "binary",
            ScalarType::Guid => "guid",
            ScalarType::DateTime => "datetime",
            ScalarType::Time => "time",
        }
    }

    /// The zero value of this type, used as a column initializer.
    pub fn zero_value(&self) -> Value {
        match self {
            ScalarType::Bool => Value::Bool(false),
            ScalarType::Int8 => Value::Int8(0),
            ScalarType::UInt8 => Value::UInt8(0),
            ScalarType::Int16 => Value::Int16(0),
            ScalarType::UInt16 => Value::UInt16(0),
            ScalarType::Int32 => Value::Int32(0),
            ScalarType::UInt32 => Value::UInt32(0),
            ScalarType::Int64 => Value::Int64(0),
            ScalarType::UInt64 => Value::UInt64(0),
            ScalarType::Float32 => Value::Float32(0.0),
            ScalarType::Float64 => Value::Float64(0.0),
            ScalarType::Decimal => Value::Decimal(Decimal::ZERO),
            ScalarType::Char => Value::Char(' '),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
            ScalarType::Binary => Value::Binary(Vec::new()),
            ScalarType::Guid => Value::Guid([0u8; 16]),
            ScalarType::DateTime => Value::DateTime(0),
            ScalarType::Time => Value::Time(0),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct EnumVariant {
    /// Variant name.
    pub name: String,
    /// Discriminant value.
    pub value: i64,
}

/// An enumeration host type stored as its underlying integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct EnumType {
    /// Name of the enum type.
    pub name: String,
    /// Integer representation of the discriminants.
    pub underlying: ScalarType,
    /// Declared variants in declaration order.
    pub variants: Vec<EnumVariant>,
    /// Whether variants combine as bit flags.
    pub flags: bool,
}

impl EnumType {
    /// Create an enum type with `i32` discriminants numbered from zero.
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Self {
        Self {
            name: name.into(),
            underlying: ScalarType::Int32,
            variants: variants
                .iter()
                .enumerate()
                .map(|(i, v)| EnumVariant {
                    name: (*v).to_string(),
                    value: i as i64,
                })
                .collect(),
            flags: false,
        }
    }

    /// Set the underlying integer representation.
    pub fn with_underlying(mut self, underlying: ScalarType) -> Self {
        self.underlying = underlying;
        self
    }

    /// Add a variant with an explicit discriminant.
    pub fn with_variant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variants.push(EnumVariant {
            name: name.into(),
            value,
        });
        self
    }

    /// Mark the enum as a bit-flag set.
    pub fn as_flags(mut self) -> Self {
        self.flags = true;
        self
    }

    /// Host value of the named variant.
    pub fn value_of(&self, variant: &str) -> Option<Value> {
        self.variants
            .iter()
            .find(|v| v.name == variant)
            .map(|v| self.value_from_discriminant(v.value))
    }

    /// Wrap a raw discriminant as a host value of this enum.
    pub fn value_from_discriminant(&self, discriminant: i64) -> Value {
        Value::Enum(EnumValue {
            type_name: self.name.clone(),
            discriminant,
        })
    }

    /// Name of the variant with the given discriminant.
    pub fn variant_name(&self, discriminant: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.value == discriminant)
            .map(|v| v.name.as_str())
    }
}

/// A host or storage value type.
///
/// Flat representation without recursion: nullability is a separate variant
/// rather than a wrapper around another `ValueType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ValueType {
    /// A non-nullable scalar.
    Scalar(ScalarType),
    /// A nullable scalar.
    Nullable(ScalarType),
    /// A non-nullable enumeration.
    Enum(EnumType),
    /// A nullable enumeration.
    NullableEnum(EnumType),
}

impl ValueType {
    /// Create a scalar value type.
    pub fn scalar(scalar: ScalarType) -> Self {
        ValueType::Scalar(scalar)
    }

    /// Create a nullable scalar value type.
    pub fn nullable(scalar: ScalarType) -> Self {
        ValueType::Nullable(scalar)
    }

    /// Create an enum value type.
    pub fn enumeration(enum_type: EnumType) -> Self {
        ValueType::Enum(enum_type)
    }

    /// Check if this type is a nullable wrapper.
    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::Nullable(_) | ValueType::NullableEnum(_))
    }

    /// The type with any nullable wrapper removed.
    pub fn non_nullable(&self) -> ValueType {
        match self {
            ValueType::Nullable(s) => ValueType::Scalar(*s),
            ValueType::NullableEnum(e) => ValueType::Enum(e.clone()),
            other => other.clone(),
        }
    }

    /// The nullable form of this type.
    pub fn to_nullable(&self) -> ValueType {
        match self {
            ValueType::Scalar(s) => ValueType::Nullable(*s),
            ValueType::Enum(e) => ValueType::NullableEnum(e.clone()),
            other => other.clone(),
        }
    }

    /// The enum type, if this is an enumeration (nullable or not).
    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            ValueType::Enum(e) | ValueType::NullableEnum(e) => Some(e),
            _ => None,
        }
    }

    /// The scalar the value is physically stored as: nullable unwrapped,
    /// enum reduced to its integer representation.
    pub fn storage_scalar(&self) -> ScalarType {
        match self {
            ValueType::Scalar(s) | ValueType::Nullable(s) => *s,
            ValueType::Enum(e) | ValueType::NullableEnum(e) => e.underlying,
        }
    }

    /// The zero value of the non-nullable form of this type.
    pub fn zero_value(&self) -> Value {
        match self {
            ValueType::Scalar(s) | ValueType::Nullable(s) => s.zero_value(),
            ValueType::Enum(e) | ValueType::NullableEnum(e) => {
                let first = e.variants.first().map(|v| v.value).unwrap_or(0);
                e.value_from_discriminant(first)
            }
        }
    }
}

impl From<ScalarType> for ValueType {
    fn from(scalar: ScalarType) -> Self {
        ValueType::Scalar(scalar)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(s) => write!(f, "{s}"),
            ValueType::Nullable(s) => write!(f, "{s}?"),
            ValueType::Enum(e) => write!(f, "{}", e.name),
            ValueType::NullableEnum(e) => write!(f, "{}?", e.name),
        }
    }
}

/// Provider-neutral database type tags, used for attribute-declared overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum DbType {
    /// Boolean or bit.
    Boolean,
    /// Unsigned byte.
    Byte,
    /// Signed byte.
    SByte,
    /// 16-bit integer.
    Int16,
    /// 32-bit integer.
    Int32,
    /// 64-bit integer.
    Int64,
    /// Single precision float.
    Single,
    /// Double precision float.
    Double,
    /// Exact numeric.
    Decimal,
    /// Currency amount.
    Currency,
    /// Variable length non-Unicode string.
    AnsiString,
    /// Fixed length non-Unicode string.
    AnsiStringFixedLength,
    /// Variable length Unicode string.
    String,
    /// Fixed length Unicode string.
    StringFixedLength,
    /// Variable length binary.
    Binary,
    /// Unique identifier.
    Guid,
    /// Date only.
    Date,
    /// Date and time.
    DateTime,
    /// Time of day.
    Time,
    /// Opaque provider-specific type.
    Object,
}
