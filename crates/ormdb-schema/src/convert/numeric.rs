//! Built-in scalar converters, dispatched by type category.

use ormdb_types::{ConversionError, Decimal, ScalarType, Value, ValueType};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use super::converter::Converter;

/// Coarse grouping of scalars used to pick a converter factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Integer, float, or decimal.
    Numeric,
    /// Raw byte sequence.
    Bytes,
    /// Opaque binary wrapper.
    Binary,
    /// Unique identifier.
    Guid,
    /// String.
    String,
    /// Single character.
    Char,
    /// Anything else.
    Other,
}

impl Category {
    /// Category of a scalar type.
    pub fn of(scalar: ScalarType) -> Self {
        match scalar {
            s if s.is_numeric() => Category::Numeric,
            ScalarType::Bytes => Category::Bytes,
            ScalarType::Binary => Category::Binary,
            ScalarType::Guid => Category::Guid,
            ScalarType::String => Category::String,
            ScalarType::Char => Category::Char,
            _ => Category::Other,
        }
    }
}

/// Builds a converter for a `(storage, host)` scalar pair.
pub type ConverterFactory = fn(ScalarType, ScalarType) -> Converter;

/// Factory table keyed by `(storage category, host category)`.
pub const FACTORIES: &[(Category, Category, ConverterFactory)] = &[
    (Category::Numeric, Category::Numeric, numeric_converter),
    (Category::Bytes, Category::Binary, bytes_binary_converter),
    (Category::Bytes, Category::Guid, bytes_guid_converter),
    (Category::String, Category::Char, string_char_converter),
];

/// Look up the factory for a scalar pair.
pub fn factory_for(storage: ScalarType, host: ScalarType) -> Option<ConverterFactory> {
    let key = (Category::of(storage), Category::of(host));
    FACTORIES
        .iter()
        .find(|(s, h, _)| (*s, *h) == key)
        .map(|(_, _, f)| *f)
}

/// Cast a numeric value to another numeric scalar, failing on overflow.
///
/// Integer and decimal pairs convert exactly; only float endpoints go
/// through `f64`.
pub fn cast(value: &Value, target: ScalarType) -> Result<Value, ConversionError> {
    if target.is_integer() {
        let wide = match value {
            Value::Decimal(d) => d
                .trunc()
                .to_i128()
                .ok_or_else(|| ConversionError::new(format!("{d} is out of range for {target}")))?,
            other => match other.as_i128() {
                Some(i) => i,
                None => {
                    let f = other
                        .as_f64()
                        .ok_or_else(|| ConversionError::new("expected a numeric value"))?;
                    if !f.is_finite() {
                        return Err(ConversionError::new("non-finite value cannot become an integer"));
                    }
                    f.trunc() as i128
                }
            },
        };
        return integer_from_i128(wide, target);
    }

    if target == ScalarType::Decimal {
        return to_decimal(value).map(Value::Decimal);
    }

    let f = value
        .as_f64()
        .ok_or_else(|| ConversionError::new("expected a numeric value"))?;
    match target {
        ScalarType::Float32 => Ok(Value::Float32(f as f32)),
        ScalarType::Float64 => Ok(Value::Float64(f)),
        other => Err(ConversionError::new(format!("{other} is not numeric"))),
    }
}

fn to_decimal(value: &Value) -> Result<Decimal, ConversionError> {
    if let Value::Decimal(d) = value {
        return Ok(*d);
    }
    if let Some(i) = value.as_i128() {
        return Decimal::from_i128(i)
            .ok_or_else(|| ConversionError::new(format!("{i} is out of range for decimal")));
    }
    let f = value
        .as_f64()
        .ok_or_else(|| ConversionError::new("expected a numeric value"))?;
    Decimal::from_f64(f)
        .ok_or_else(|| ConversionError::new(format!("{f} cannot be represented as a decimal")))
}

/// Build an integer value of the target width, failing on overflow.
pub fn integer_from_i128(wide: i128, target: ScalarType) -> Result<Value, ConversionError> {
    let overflow = |_| ConversionError::new(format!("{wide} is out of range for {target}"));
    match target {
        ScalarType::Int8 => i8::try_from(wide).map(Value::Int8).map_err(overflow),
        ScalarType::UInt8 => u8::try_from(wide).map(Value::UInt8).map_err(overflow),
        ScalarType::Int16 => i16::try_from(wide).map(Value::Int16).map_err(overflow),
        ScalarType::UInt16 => u16::try_from(wide).map(Value::UInt16).map_err(overflow),
        ScalarType::Int32 => i32::try_from(wide).map(Value::Int32).map_err(overflow),
        ScalarType::UInt32 => u32::try_from(wide).map(Value::UInt32).map_err(overflow),
        ScalarType::Int64 => i64::try_from(wide).map(Value::Int64).map_err(overflow),
        ScalarType::UInt64 => u64::try_from(wide).map(Value::UInt64).map_err(overflow),
        other => Err(ConversionError::new(format!("{other} is not an integer type"))),
    }
}

fn numeric_converter(storage: ScalarType, host: ScalarType) -> Converter {
    Converter::new(
        ValueType::Scalar(storage),
        ValueType::Scalar(host),
        move |v| cast(v, host),
        move |v| cast(v, storage),
    )
}

fn bytes_binary_converter(storage: ScalarType, host: ScalarType) -> Converter {
    Converter::new(
        ValueType::Scalar(storage),
        ValueType::Scalar(host),
        |v| match v {
            Value::Bytes(b) | Value::Binary(b) => Ok(Value::Binary(b.clone())),
            _ => Err(ConversionError::new("expected a byte sequence")),
        },
        |v| match v {
            Value::Binary(b) | Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
            _ => Err(ConversionError::new("expected a binary value")),
        },
    )
}

fn bytes_guid_converter(storage: ScalarType, host: ScalarType) -> Converter {
    Converter::new(
        ValueType::Scalar(storage),
        ValueType::Scalar(host),
        |v| {
            let bytes = v
                .as_bytes()
                .ok_or_else(|| ConversionError::new("expected a byte sequence"))?;
            let guid: [u8; 16] = bytes.try_into().map_err(|_| {
                ConversionError::new(format!("expected 16 bytes, got {}", bytes.len()))
            })?;
            Ok(Value::Guid(guid))
        },
        |v| match v {
            Value::Guid(g) => Ok(Value::Bytes(g.to_vec())),
            _ => Err(ConversionError::new("expected a unique identifier")),
        },
    )
}

fn string_char_converter(storage: ScalarType, host: ScalarType) -> Converter {
    Converter::new(
        ValueType::Scalar(storage),
        ValueType::Scalar(host),
        |v| {
            let s = v
                .as_str()
                .ok_or_else(|| ConversionError::new("expected a string"))?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                (None, _) => Ok(Value::Char(' ')),
                _ => Err(ConversionError::new("string longer than one character")),
            }
        },
        |v| match v {
            Value::Char(c) => Ok(Value::String(c.to_string())),
            _ => Err(ConversionError::new("expected a character")),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_widening_and_narrowing() {
        assert_eq!(cast(&Value::Int16(7), ScalarType::Int64).unwrap(), Value::Int64(7));
        assert_eq!(cast(&Value::Int64(200), ScalarType::UInt8).unwrap(), Value::UInt8(200));
        assert!(cast(&Value::Int64(300), ScalarType::UInt8).is_err());
        assert!(cast(&Value::Int32(-1), ScalarType::UInt32).is_err());
        assert_eq!(cast(&Value::Float64(2.9), ScalarType::Int32).unwrap(), Value::Int32(2));
        assert_eq!(cast(&Value::Int32(3), ScalarType::Float64).unwrap(), Value::Float64(3.0));
        assert_eq!(
            cast(&Value::Float32(1.5), ScalarType::Decimal).unwrap(),
            Value::Decimal(Decimal::new(15, 1))
        );
        assert!(cast(&Value::String("1".into()), ScalarType::Int32).is_err());
        assert!(cast(&Value::Float64(f64::NAN), ScalarType::Int32).is_err());
    }

    #[test]
    fn test_decimal_integer_exact() {
        let big = 9_007_199_254_740_993i64;
        let stored = cast(&Value::Int64(big), ScalarType::Decimal).unwrap();
        assert_eq!(stored, Value::Decimal(Decimal::from(big)));
        assert_eq!(cast(&stored, ScalarType::Int64).unwrap(), Value::Int64(big));

        let c = numeric_converter(ScalarType::Decimal, ScalarType::Int64);
        let host = c.to_host(&c.to_storage(&Value::Int64(big)).unwrap()).unwrap();
        assert_eq!(host, Value::Int64(big));

        assert_eq!(
            cast(&Value::Decimal(Decimal::new(-279, 1)), ScalarType::Int32).unwrap(),
            Value::Int32(-27)
        );
        assert!(cast(&Value::Decimal(Decimal::from(300)), ScalarType::UInt8).is_err());
        assert_eq!(
            cast(&Value::UInt64(u64::MAX), ScalarType::Decimal).unwrap(),
            Value::Decimal(Decimal::from(u64::MAX))
        );
        assert!(cast(&Value::Float64(f64::INFINITY), ScalarType::Decimal).is_err());
    }

    #[test]
    fn test_factory_dispatch() {
        assert!(factory_for(ScalarType::Int32, ScalarType::Float64).is_some());
        assert!(factory_for(ScalarType::Bytes, ScalarType::Guid).is_some());
        assert!(factory_for(ScalarType::Guid, ScalarType::Bytes).is_none());
        assert!(factory_for(ScalarType::String, ScalarType::Int32).is_none());
    }

    #[test]
    fn test_bytes_guid() {
        let c = bytes_guid_converter(ScalarType::Bytes, ScalarType::Guid);
        let g = [7u8; 16];

        assert_eq!(c.to_host(&Value::Bytes(g.to_vec())).unwrap(), Value::Guid(g));
        assert_eq!(c.to_storage(&Value::Guid(g)).unwrap(), Value::Bytes(g.to_vec()));
        assert!(c.to_host(&Value::Bytes(vec![1, 2])).is_err());
    }

    #[test]
    fn test_string_char() {
        let c = string_char_converter(ScalarType::String, ScalarType::Char);

        assert_eq!(c.to_host(&Value::String("x".into())).unwrap(), Value::Char('x'));
        assert_eq!(c.to_storage(&Value::Char('y')).unwrap(), Value::String("y".into()));
        assert!(c.to_host(&Value::String("xy".into())).is_err());
    }
}
