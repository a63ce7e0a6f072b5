//! Converter registry with lazy synthesis.
//!
//! Converters are cached per exact `(storage type, host type)` pair. Pairs not
//! registered up front are synthesized on first lookup: nullable host types
//! wrap the converter of their non-nullable form, enumerations project to
//! their underlying integer, and scalar pairs dispatch through the category
//! factory table. Synthesis runs without holding any map lock, and the result
//! is published with insert-if-absent so racing lookups converge on one
//! instance.

use std::sync::Arc;

use dashmap::DashMap;
use ormdb_types::{ConversionError, EnumType, ScalarType, Value, ValueType, NUMERIC_TYPES};
use tracing::debug;

use super::converter::Converter;
use super::numeric::{factory_for, integer_from_i128};

type PairKey = (ValueType, ValueType);

/// Registry of converters between storage and host value types.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    cache: DashMap<PairKey, Arc<Converter>>,
}

impl ConverterRegistry {
    /// Create a registry with the built-in scalar converters registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    fn register_builtins(&self) {
        let mut pairs: Vec<(ScalarType, ScalarType)> = Vec::new();
        for storage in NUMERIC_TYPES {
            for host in NUMERIC_TYPES {
                if storage != host {
                    pairs.push((storage, host));
                }
            }
        }
        pairs.extend([
            (ScalarType::Bytes, ScalarType::Binary),
            (ScalarType::Bytes, ScalarType::Guid),
            (ScalarType::String, ScalarType::Char),
        ]);

        for (storage, host) in pairs {
            if let Some(factory) = factory_for(storage, host) {
                self.register(factory(storage, host));
            }
        }
        debug!(converters = self.cache.len(), "Built-in converters registered");
    }

    /// Register a converter, replacing any previous one for the same pair.
    pub fn register(&self, converter: Converter) -> Arc<Converter> {
        let key = (
            converter.storage_type().clone(),
            converter.host_type().clone(),
        );
        let converter = Arc::new(converter);
        self.cache.insert(key, converter.clone());
        converter
    }

    /// Get the converter for a pair, synthesizing and caching it if needed.
    ///
    /// Returns `None` when no rule applies.
    pub fn get_converter(&self, storage: &ValueType, host: &ValueType) -> Option<Arc<Converter>> {
        let key = (storage.clone(), host.clone());
        let cached = self.cache.get(&key).map(|c| c.value().clone());
        if cached.is_some() {
            return cached;
        }

        let converter = if storage == host {
            Converter::identity(host.clone())
        } else {
            let synthesized = self.synthesize(storage, host)?;
            debug!(storage = %storage, host = %host, "Converter synthesized");
            synthesized
        };

        Some(
            self.cache
                .entry(key)
                .or_insert_with(|| Arc::new(converter))
                .value()
                .clone(),
        )
    }

    /// Check if a pair is already cached.
    pub fn contains(&self, storage: &ValueType, host: &ValueType) -> bool {
        self.cache.contains_key(&(storage.clone(), host.clone()))
    }

    /// Number of cached converters.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn synthesize(&self, storage: &ValueType, host: &ValueType) -> Option<Converter> {
        if host.is_nullable() {
            let inner = self.get_converter(&storage.non_nullable(), &host.non_nullable())?;
            return Some(Converter::nullable(storage.clone(), host.clone(), inner));
        }
        if storage.is_nullable() {
            let inner = self.get_converter(&storage.non_nullable(), host)?;
            return Some(Converter::nullable(storage.clone(), host.clone(), inner));
        }
        match (storage, host) {
            (ValueType::Scalar(s), ValueType::Enum(e)) => self.enum_converter(*s, e),
            (ValueType::Scalar(s), ValueType::Scalar(h)) => {
                factory_for(*s, *h).map(|factory| factory(*s, *h))
            }
            _ => None,
        }
    }

    fn enum_converter(&self, storage: ScalarType, enum_type: &EnumType) -> Option<Converter> {
        let underlying = enum_type.underlying;
        let width = if storage == underlying {
            None
        } else {
            Some(self.get_converter(
                &ValueType::Scalar(storage),
                &ValueType::Scalar(underlying),
            )?)
        };

        let host_enum = enum_type.clone();
        let storage_enum = enum_type.clone();
        let host_width = width.clone();
        Some(Converter::new(
            ValueType::Scalar(storage),
            ValueType::Enum(enum_type.clone()),
            move |v| {
                let raw = match &host_width {
                    Some(w) => w.to_host(v)?,
                    None => v.clone(),
                };
                let discriminant = raw
                    .as_i128()
                    .and_then(|i| i64::try_from(i).ok())
                    .ok_or_else(|| ConversionError::new("expected an integer discriminant"))?;
                Ok(host_enum.value_from_discriminant(discriminant))
            },
            move |v| {
                let Value::Enum(e) = v else {
                    return Err(ConversionError::new("expected an enum value"));
                };
                if e.type_name != storage_enum.name {
                    return Err(ConversionError::new(format!(
                        "expected a {} value, got {}",
                        storage_enum.name, e.type_name
                    )));
                }
                let raw = integer_from_i128(i128::from(e.discriminant), underlying)?;
                match &width {
                    Some(w) => w.to_storage(&raw),
                    None => Ok(raw),
                }
            },
        ))
    }
}
