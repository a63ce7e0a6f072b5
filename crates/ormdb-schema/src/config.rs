//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default size for sized columns declared without one.
pub const DEFAULT_STRING_SIZE: i32 = 50;

/// Default precision for decimal members declared without one.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 18;

/// Default scale for decimal members declared without one.
pub const DEFAULT_DECIMAL_SCALE: u8 = 4;

/// Identifier length limit when the driver profile does not state one.
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 128;

/// What the target database does on its own, as far as schema naming and
/// indexing are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverProfile {
    /// Profile name, for logs.
    pub name: String,
    /// Longest identifier the database accepts.
    pub max_identifier_length: usize,
    /// The database creates an index for every foreign key by itself.
    pub indexes_foreign_keys: bool,
    /// Clustered indexes can be declared.
    pub supports_clustered_indexes: bool,
    /// Indexes can carry non-key include columns.
    pub supports_include_columns: bool,
    /// Indexes can carry a filter predicate.
    pub supports_filtered_indexes: bool,
    /// Foreign key constraints can be declared.
    pub supports_ref_constraints: bool,
}

impl DriverProfile {
    /// A conservative profile for an unspecified SQL database.
    pub fn generic() -> Self {
        Self {
            name: "generic".to_string(),
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            indexes_foreign_keys: false,
            supports_clustered_indexes: false,
            supports_include_columns: false,
            supports_filtered_indexes: false,
            supports_ref_constraints: true,
        }
    }

    /// Microsoft SQL Server.
    pub fn sql_server() -> Self {
        Self {
            name: "mssql".to_string(),
            max_identifier_length: 128,
            supports_clustered_indexes: true,
            supports_include_columns: true,
            supports_filtered_indexes: true,
            ..Self::generic()
        }
    }

    /// PostgreSQL.
    pub fn postgres() -> Self {
        Self {
            name: "postgres".to_string(),
            max_identifier_length: 63,
            supports_include_columns: true,
            supports_filtered_indexes: true,
            ..Self::generic()
        }
    }

    /// MySQL; InnoDB indexes foreign keys automatically.
    pub fn mysql() -> Self {
        Self {
            name: "mysql".to_string(),
            max_identifier_length: 64,
            indexes_foreign_keys: true,
            ..Self::generic()
        }
    }

    /// SQLite.
    pub fn sqlite() -> Self {
        Self {
            name: "sqlite".to_string(),
            supports_filtered_indexes: true,
            ..Self::generic()
        }
    }

    /// Set the identifier length limit.
    pub fn with_max_identifier_length(mut self, max: usize) -> Self {
        self.max_identifier_length = max.max(1);
        self
    }

    /// Set whether the database indexes foreign keys by itself.
    pub fn with_indexes_foreign_keys(mut self, indexes: bool) -> Self {
        self.indexes_foreign_keys = indexes;
        self
    }
}

impl Default for DriverProfile {
    fn default() -> Self {
        Self::generic()
    }
}

/// Configuration for a schema compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Target database profile.
    pub driver: DriverProfile,
    /// Create supporting indexes for foreign keys the database does not index.
    pub auto_index_foreign_keys: bool,
    /// Size used for sized columns declared without one.
    pub default_string_size: i32,
    /// Precision for decimal members declared without one.
    pub default_decimal_precision: u8,
    /// Scale for decimal members declared without one.
    pub default_decimal_scale: u8,
}

impl CompilerConfig {
    /// Create a configuration for the given driver profile.
    pub fn new(driver: DriverProfile) -> Self {
        Self {
            driver,
            auto_index_foreign_keys: true,
            default_string_size: DEFAULT_STRING_SIZE,
            default_decimal_precision: DEFAULT_DECIMAL_PRECISION,
            default_decimal_scale: DEFAULT_DECIMAL_SCALE,
        }
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the driver profile.
    pub fn with_driver(mut self, driver: DriverProfile) -> Self {
        self.driver = driver;
        self
    }

    /// Enable or disable supporting indexes for foreign keys.
    pub fn with_auto_index_foreign_keys(mut self, enabled: bool) -> Self {
        self.auto_index_foreign_keys = enabled;
        self
    }

    /// Set the default size for sized columns.
    pub fn with_default_string_size(mut self, size: i32) -> Self {
        self.default_string_size = size;
        self
    }

    /// Set the default decimal precision and scale.
    pub fn with_decimal_defaults(mut self, precision: u8, scale: u8) -> Self {
        self.default_decimal_precision = precision;
        self.default_decimal_scale = scale;
        self
    }

    /// Check if supporting indexes should be created for foreign keys.
    pub fn creates_foreign_key_indexes(&self) -> bool {
        self.auto_index_foreign_keys && !self.driver.indexes_foreign_keys
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new(DriverProfile::generic())
    }
}
