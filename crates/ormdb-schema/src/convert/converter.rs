//! Null-safe, context-attaching converter pairs.

use std::fmt;
use std::sync::Arc;

use ormdb_types::{ConversionError, Value, ValueType};

/// One direction of a conversion.
pub type ConvertFn = Arc<dyn Fn(&Value) -> Result<Value, ConversionError> + Send + Sync>;

/// A pair of functions translating values between a storage type and a host type.
///
/// Nulls never reach the wrapped functions: storage nulls (either [`Value::DbNull`]
/// or [`Value::Null`]) become [`Value::Null`] on the host side, and host nulls
/// become [`Value::DbNull`] on the storage side. Failures are re-raised with the
/// offending value, both type names, and the direction attached.
#[derive(Clone)]
pub struct Converter {
    storage_type: ValueType,
    host_type: ValueType,
    to_host: ConvertFn,
    to_storage: ConvertFn,
    identity: bool,
}

impl Converter {
    /// Create a converter from a pair of functions.
    pub fn new<H, S>(storage_type: ValueType, host_type: ValueType, to_host: H, to_storage: S) -> Self
    where
        H: Fn(&Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
        S: Fn(&Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Self {
            storage_type,
            host_type,
            to_host: Arc::new(to_host),
            to_storage: Arc::new(to_storage),
            identity: false,
        }
    }

    /// A converter that passes values through unchanged.
    pub fn identity(value_type: ValueType) -> Self {
        let pass: ConvertFn =
            Arc::new(|v: &Value| -> Result<Value, ConversionError> { Ok(v.clone()) });
        Self {
            storage_type: value_type.clone(),
            host_type: value_type,
            to_host: pass.clone(),
            to_storage: pass,
            identity: true,
        }
    }

    /// Wrap a converter for `T` so it serves the nullable form of `T`.
    pub fn nullable(storage_type: ValueType, host_type: ValueType, inner: Arc<Converter>) -> Self {
        let to_host_inner = inner.clone();
        Self::new(
            storage_type,
            host_type,
            move |v| to_host_inner.to_host(v),
            move |v| inner.to_storage(v),
        )
    }

    /// Storage side type.
    pub fn storage_type(&self) -> &ValueType {
        &self.storage_type
    }

    /// Host side type.
    pub fn host_type(&self) -> &ValueType {
        &self.host_type
    }

    /// Check if this converter passes values through unchanged.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Convert a provider value to the host type.
    pub fn to_host(&self, value: &Value) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        (self.to_host)(value).map_err(|e| {
            e.with_context(value, &self.storage_type, &self.host_type, "storage to host")
        })
    }

    /// Convert a host value to the storage type.
    pub fn to_storage(&self, value: &Value) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::DbNull);
        }
        (self.to_storage)(value).map_err(|e| {
            e.with_context(value, &self.host_type, &self.storage_type, "host to storage")
        })
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("storage_type", &self.storage_type)
            .field("host_type", &self.host_type)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormdb_types::ScalarType;

    #[test]
    fn test_identity_maps_nulls() {
        let c = Converter::identity(ValueType::scalar(ScalarType::Int32));

        assert!(c.is_identity());
        assert_eq!(c.to_storage(&Value::Int32(5)).unwrap(), Value::Int32(5));
        assert_eq!(c.to_storage(&Value::Null).unwrap(), Value::DbNull);
        assert_eq!(c.to_host(&Value::DbNull).unwrap(), Value::Null);
    }

    #[test]
    fn test_error_context_attached() {
        let c = Converter::new(
            ValueType::scalar(ScalarType::String),
            ValueType::scalar(ScalarType::Char),
            |_| Err(ConversionError::new("too long")),
            |v| Ok(v.clone()),
        );

        let err = c.to_host(&Value::String("abc".into())).unwrap_err();
        assert_eq!(err.value, "abc");
        assert_eq!(err.from_type, "string");
        assert_eq!(err.to_type, "char");
        assert_eq!(err.context, "storage to host");
        assert_eq!(err.reason, "too long");
    }
}
