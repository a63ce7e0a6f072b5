//! Storage type registry and column type resolution.

use std::collections::HashMap;
use std::sync::Arc;

use ormdb_types::{DbType, ScalarType, ValueType};
use tracing::debug;

use super::descriptor::{ArgsTemplate, StorageTypeDescriptor, UNLIMITED_SIZE};
use super::type_spec::TypeSpec;
use crate::config::CompilerConfig;
use crate::convert::{Converter, ConverterRegistry};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::Error;
use crate::model::MemberInfo;

/// Resolved storage type of a column.
#[derive(Debug, Clone)]
pub struct ColumnTypeInfo {
    /// Descriptor the column is stored as.
    pub descriptor: Arc<StorageTypeDescriptor>,
    /// Formatted type spec, e.g. `varchar(50)`.
    pub type_spec: String,
    /// Column allows nulls.
    pub nullable: bool,
    /// Effective size.
    pub size: Option<i32>,
    /// Effective precision.
    pub precision: Option<u8>,
    /// Effective scale.
    pub scale: Option<u8>,
    /// Converter between the descriptor's host type and the member type, when they differ.
    pub converter: Option<Arc<Converter>>,
}

/// Registry of provider storage types.
///
/// Populated once while a compilation context is configured, then shared
/// read-only.
#[derive(Debug, Default)]
pub struct StorageTypeRegistry {
    types: Vec<Arc<StorageTypeDescriptor>>,
    defaults: HashMap<(ScalarType, bool), Arc<StorageTypeDescriptor>>,
}

impl StorageTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails if the descriptor is a default and its `(host type, unlimited)`
    /// bucket already has one.
    pub fn add_type_def(
        &mut self,
        descriptor: StorageTypeDescriptor,
    ) -> Result<Arc<StorageTypeDescriptor>, Error> {
        let name = descriptor.name.trim();
        if name.is_empty() || name.contains(['(', ')', ',']) {
            return Err(Error::InvalidTypeDef {
                name: descriptor.name.clone(),
                reason: "type names must be non-empty and carry no arguments".to_string(),
            });
        }
        if descriptor.flags.unlimited && descriptor.args == ArgsTemplate::Precision {
            return Err(Error::InvalidTypeDef {
                name: descriptor.name.clone(),
                reason: "unlimited types cannot take a precision".to_string(),
            });
        }

        let descriptor = Arc::new(descriptor);
        if descriptor.flags.default {
            let bucket = (descriptor.host_type, descriptor.flags.unlimited);
            if let Some(existing) = self.defaults.get(&bucket) {
                return Err(Error::DuplicateDefaultType {
                    host_type: descriptor.host_value_type(),
                    unlimited: descriptor.flags.unlimited,
                    existing: existing.name.clone(),
                    added: descriptor.name.clone(),
                });
            }
            self.defaults.insert(bucket, descriptor.clone());
        }
        debug!(name = %descriptor.name, host = %descriptor.host_type, "Storage type registered");
        self.types.push(descriptor.clone());
        Ok(descriptor)
    }

    /// All registered descriptors in registration order.
    pub fn types(&self) -> &[Arc<StorageTypeDescriptor>] {
        &self.types
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Default descriptor for a host type.
    ///
    /// The host type is reduced to its storage scalar first. The unlimited
    /// bucket falls back to the limited one; a host type without a default of
    /// its own falls back to the first default declaring it compatible.
    pub fn find_storage_type(&self, host: &ValueType, unlimited: bool) -> Option<Arc<StorageTypeDescriptor>> {
        let scalar = host.storage_scalar();
        self.default_for(scalar, unlimited)
            .or_else(|| {
                self.types
                    .iter()
                    .filter(|t| t.flags.default && t.compatible_host_types.contains(&scalar))
                    .find(|t| t.flags.unlimited == unlimited)
                    .or_else(|| {
                        self.types.iter().find(|t| {
                            t.flags.default && !t.flags.unlimited && t.compatible_host_types.contains(&scalar)
                        })
                    })
                    .cloned()
            })
    }

    fn default_for(&self, scalar: ScalarType, unlimited: bool) -> Option<Arc<StorageTypeDescriptor>> {
        self.defaults
            .get(&(scalar, unlimited))
            .or_else(|| unlimited.then(|| self.defaults.get(&(scalar, false))).flatten())
            .cloned()
    }

    /// Find a descriptor by name or alias, ignoring case.
    ///
    /// When several match, the one whose unlimited flag agrees wins, then the
    /// first registered.
    pub fn find_by_name(&self, name: &str, unlimited: bool) -> Option<Arc<StorageTypeDescriptor>> {
        let name = name.trim();
        let mut matches = self.types.iter().filter(|t| t.matches_name(name));
        let first = matches.next()?;
        if first.flags.unlimited == unlimited {
            return Some(first.clone());
        }
        Some(matches.find(|t| t.flags.unlimited == unlimited).unwrap_or(first).clone())
    }

    /// Find a descriptor by provider type tag.
    ///
    /// Among descriptors with the requested unlimited flag (or all, if none
    /// has it), the first whose compatible host types contain `host` wins,
    /// else the first match.
    pub fn find_by_db_type(
        &self,
        db_type: DbType,
        host: &ValueType,
        unlimited: bool,
    ) -> Option<Arc<StorageTypeDescriptor>> {
        let tagged: Vec<&Arc<StorageTypeDescriptor>> =
            self.types.iter().filter(|t| t.db_type == db_type).collect();
        let sized: Vec<&Arc<StorageTypeDescriptor>> = tagged
            .iter()
            .copied()
            .filter(|t| t.flags.unlimited == unlimited)
            .collect();
        let candidates = if sized.is_empty() { tagged } else { sized };

        let scalar = host.storage_scalar();
        candidates
            .iter()
            .find(|t| t.is_compatible(scalar))
            .or_else(|| candidates.first())
            .map(|t| (*t).clone())
    }

    /// Resolve the storage type of a column member.
    ///
    /// Resolution order: explicit type spec, explicit provider type tag,
    /// default for the host type. Problems are logged to `diags` and yield
    /// `None`.
    pub fn column_type_info(
        &self,
        entity: &str,
        member: &MemberInfo,
        converters: &ConverterRegistry,
        config: &CompilerConfig,
        diags: &mut Diagnostics,
    ) -> Option<ColumnTypeInfo> {
        let Some(host) = member.value_type.as_ref() else {
            diags.error(
                DiagnosticKind::TypeMapping,
                Some(entity),
                format!("member '{}' is not a column", member.name),
            );
            return None;
        };

        let mut size = member.size;
        let mut precision = member.precision;
        let mut scale = member.scale;
        let mut unlimited = member.flags.unlimited || size == Some(UNLIMITED_SIZE);

        let descriptor = if let Some(spec) = &member.type_spec {
            let parsed = match TypeSpec::parse(spec) {
                Ok(parsed) => parsed,
                Err(e) => {
                    diags.error(DiagnosticKind::Validation, Some(entity), format!("member '{}': {e}", member.name));
                    return None;
                }
            };
            unlimited |= parsed.is_unlimited();
            let found = self.find_by_name(&parsed.name, unlimited);
            if let Some(descriptor) = &found {
                match parsed.apply(descriptor.args) {
                    Ok(args) => {
                        size = args.size.or(size);
                        precision = args.precision.or(precision);
                        scale = args.scale.or(scale);
                    }
                    Err(e) => {
                        diags.error(DiagnosticKind::Validation, Some(entity), format!("member '{}': {e}", member.name));
                        return None;
                    }
                }
            }
            found
        } else if let Some(db_type) = member.db_type {
            self.find_by_db_type(db_type, host, unlimited)
        } else {
            self.find_storage_type(host, unlimited)
        };

        let Some(descriptor) = descriptor else {
            diags.error(
                DiagnosticKind::TypeMapping,
                Some(entity),
                format!("no storage type for member '{}' of type {host}", member.name),
            );
            return None;
        };

        if descriptor.flags.unlimited || (unlimited && descriptor.args == ArgsTemplate::Size) {
            size = Some(UNLIMITED_SIZE);
        } else if descriptor.args == ArgsTemplate::Size && size.is_none() {
            size = Some(config.default_string_size);
        }

        let storage = descriptor.host_value_type();
        let converter = if &storage == host {
            None
        } else {
            match converters.get_converter(&storage, host) {
                Some(c) => Some(c),
                None => {
                    diags.error(
                        DiagnosticKind::TypeMapping,
                        Some(entity),
                        format!(
                            "no converter between {storage} ({}) and {host} for member '{}'",
                            descriptor.name, member.name
                        ),
                    );
                    return None;
                }
            }
        };

        Some(ColumnTypeInfo {
            type_spec: descriptor.format_type(size, precision, scale),
            descriptor,
            nullable: member.nullable,
            size,
            precision,
            scale,
            converter,
        })
    }
}
