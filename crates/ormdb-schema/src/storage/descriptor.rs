//! Storage type descriptors.

use std::fmt;
use std::sync::Arc;

use ormdb_types::{format_guid, DbType, ScalarType, Value, ValueType};

/// Size sentinel for unlimited-length types. Always formatted as the bare name.
pub const UNLIMITED_SIZE: i32 = -1;

/// Formats a storage value as an SQL literal.
pub type LiteralFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Which arguments a type name takes, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgsTemplate {
    /// Bare name.
    #[default]
    None,
    /// `name(size)`.
    Size,
    /// `name(precision)`.
    Precision,
    /// `name(precision, scale)`.
    PrecisionScale,
}

/// Registration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeDefFlags {
    /// Default descriptor for its host type.
    pub default: bool,
    /// Unlimited-size variant.
    pub unlimited: bool,
}

/// A provider type definition such as `varchar(50)` or `decimal(18, 4)`.
#[derive(Clone)]
pub struct StorageTypeDescriptor {
    /// Type name without arguments.
    pub name: String,
    /// Provider type tag.
    pub db_type: DbType,
    /// Host type values of this type are read as.
    pub host_type: ScalarType,
    /// Registration flags.
    pub flags: TypeDefFlags,
    /// Argument template.
    pub args: ArgsTemplate,
    /// Other host types this type can store through a converter.
    pub compatible_host_types: Vec<ScalarType>,
    /// Alternative names accepted in explicit type specs.
    pub aliases: Vec<String>,
    /// Default initializer SQL for non-nullable columns.
    pub default_init: Option<String>,
    /// Custom literal formatter.
    pub literal_formatter: Option<LiteralFormatter>,
}

impl StorageTypeDescriptor {
    /// Create a descriptor with no arguments and no flags.
    pub fn new(name: impl Into<String>, db_type: DbType, host_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            db_type,
            host_type,
            flags: TypeDefFlags::default(),
            args: ArgsTemplate::None,
            compatible_host_types: Vec::new(),
            aliases: Vec::new(),
            default_init: None,
            literal_formatter: None,
        }
    }

    /// Mark as the default for its host type.
    pub fn as_default(mut self) -> Self {
        self.flags.default = true;
        self
    }

    /// Mark as the unlimited-size variant.
    pub fn unlimited(mut self) -> Self {
        self.flags.unlimited = true;
        self
    }

    /// Set the argument template.
    pub fn with_args(mut self, args: ArgsTemplate) -> Self {
        self.args = args;
        self
    }

    /// Add compatible host types.
    pub fn compatible_with(mut self, types: impl IntoIterator<Item = ScalarType>) -> Self {
        self.compatible_host_types.extend(types);
        self
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set the default initializer.
    pub fn with_default_init(mut self, sql: impl Into<String>) -> Self {
        self.default_init = Some(sql.into());
        self
    }

    /// Set a custom literal formatter.
    pub fn with_literal_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.literal_formatter = Some(Arc::new(formatter));
        self
    }

    /// Host type as a value type.
    pub fn host_value_type(&self) -> ValueType {
        ValueType::Scalar(self.host_type)
    }

    /// Check if the name or an alias matches, ignoring case.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Check if values of `host` can be stored in this type.
    pub fn is_compatible(&self, host: ScalarType) -> bool {
        self.host_type == host || self.compatible_host_types.contains(&host)
    }

    /// Format the full type spec by applying the argument template.
    pub fn format_type(&self, size: Option<i32>, precision: Option<u8>, scale: Option<u8>) -> String {
        match self.args {
            ArgsTemplate::None => self.name.clone(),
            ArgsTemplate::Size => match size {
                _ if self.flags.unlimited => self.name.clone(),
                Some(UNLIMITED_SIZE) | None => self.name.clone(),
                Some(size) => format!("{}({size})", self.name),
            },
            ArgsTemplate::Precision => match precision {
                Some(p) => format!("{}({p})", self.name),
                None => self.name.clone(),
            },
            ArgsTemplate::PrecisionScale => match (precision, scale) {
                (Some(p), Some(s)) => format!("{}({p}, {s})", self.name),
                (Some(p), None) => format!("{}({p})", self.name),
                _ => self.name.clone(),
            },
        }
    }

    /// Format a storage value as a literal of this type.
    pub fn format_literal(&self, value: &Value) -> String {
        match &self.literal_formatter {
            Some(f) if !value.is_null() => f(value),
            _ => format_literal(value),
        }
    }
}

impl fmt::Debug for StorageTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageTypeDescriptor")
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .field("host_type", &self.host_type)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Default SQL literal formatting.
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::Null | Value::DbNull => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Char(c) => quote(&c.to_string()),
        Value::String(s) => quote(s),
        Value::Guid(g) => quote(&format_guid(g)),
        Value::Enum(e) => e.discriminant.to_string(),
        other => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
