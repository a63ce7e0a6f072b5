//! Runtime values moving between host members and provider columns.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::ScalarType;

/// A host-side enumeration value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Name of the enum type.
    pub type_name: String,
    /// Raw discriminant.
    pub discriminant: i64,
}

/// A runtime value on either side of a converter.
///
/// `Null` is the host's absent value; `DbNull` is the provider's null
/// sentinel. Converters map one to the other consistently in both directions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Host null.
    Null,
    /// Provider null sentinel.
    DbNull,
    /// Boolean value.
    Bool(bool),
    /// 8-bit signed integer.
    Int8(i8),
    /// 8-bit unsigned integer.
    UInt8(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// Exact decimal.
    Decimal(Decimal),
    /// Single character.
    Char(char),
    /// UTF-8 string.
    String(String),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// Opaque binary wrapper.
    Binary(Vec<u8>),
    /// Unique identifier as 16 bytes.
    Guid([u8; 16]),
    /// Timestamp as microseconds since Unix epoch.
    DateTime(i64),
    /// Time as microseconds.
    Time(i64),
    /// Enumeration member.
    Enum(EnumValue),
}

impl Value {
    /// Check if this value is either the host null or the provider null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::DbNull)
    }

    /// The scalar type of this value, if it has one.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        Some(match self {
            Value::Null | Value::DbNull | Value::Enum(_) => return None,
            Value::Bool(_) => ScalarType::Bool,
            Value::Int8(_) => ScalarType::Int8,
            Value::UInt8(_) => ScalarType::UInt8,
            Value::Int16(_) => ScalarType::Int16,
            Value::UInt16(_) => ScalarType::UInt16,
            Value::Int32(_) => ScalarType::Int32,
            Value::UInt32(_) => ScalarType::UInt32,
            Value::Int64(_) => ScalarType::Int64,
            Value::UInt64(_) => ScalarType::UInt64,
            Value::Float32(_) => ScalarType::Float32,
            Value::Float64(_) => ScalarType::Float64,
            Value::Decimal(_) => ScalarType::Decimal,
            Value::Char(_) => ScalarType::Char,
            Value::String(_) => ScalarType::String,
            Value::Bytes(_) => ScalarType::Bytes,
            Value::Binary(_) => ScalarType::Binary,
            Value::Guid(_) => ScalarType::Guid,
            Value::DateTime(_) => ScalarType::DateTime,
            Value::Time(_) => ScalarType::Time,
        })
    }

    /// Integer payload widened to i128.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int8(v) => Some(i128::from(*v)),
            Value::UInt8(v) => Some(i128::from(*v)),
            Value::Int16(v) => Some(i128::from(*v)),
            Value::UInt16(v) => Some(i128::from(*v)),
            Value::Int32(v) => Some(i128::from(*v)),
            Value::UInt32(v) => Some(i128::from(*v)),
            Value::Int64(v) => Some(i128::from(*v)),
            Value::UInt64(v) => Some(i128::from(*v)),
            Value::Enum(e) => Some(i128::from(e.discriminant)),
            _ => None,
        }
    }

    /// Numeric payload as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            other => other.as_i128().map(|i| i as f64),
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference (raw or wrapped).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) | Value::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::DbNull => f.write_str("DBNULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) | Value::Binary(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Guid(g) => f.write_str(&format_guid(g)),
            Value::DateTime(t) | Value::Time(t) => write!(f, "{t}"),
            Value::Enum(e) => write!(f, "{}({})", e.type_name, e.discriminant),
        }
    }
}

/// Format 16 bytes in the canonical 8-4-4-4-12 hyphenated layout.
pub fn format_guid(bytes: &[u8; 16]) -> String {
    Uuid::from_bytes(*bytes).hyphenated().to_string()
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::DbNull.is_null());
        assert!(!Value::Bool(false).is_null());

        assert_eq!(Value::UInt16(7).as_i128(), Some(7));
        assert_eq!(Value::Int32(3).as_f64(), Some(3.0));
        assert_eq!(Value::Binary(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Value::String("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Int64(1).scalar_type(), Some(ScalarType::Int64));
        assert_eq!(Value::DbNull.scalar_type(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(Value::DbNull.to_string(), "DBNULL");
        assert_eq!(
            Value::Guid([0x11; 16]).to_string(),
            "11111111-1111-1111-1111-111111111111"
        );

        let mut g = [0u8; 16];
        g[0] = 0xde;
        g[15] = 0x0f;
        assert_eq!(
            Value::Guid(g).to_string(),
            "de000000-0000-0000-0000-00000000000f"
        );
        assert_eq!(Value::Decimal(Decimal::new(12345, 2)).to_string(), "123.45");
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = 42i32.into();
        assert_eq!(v, Value::Int32(42));

        let v: Value = Option::<i64>::None.into();
        assert_eq!(v, Value::Null);

        let v: Value = Decimal::new(5, 1).into();
        assert_eq!(v.as_f64(), Some(0.5));
    }
}
