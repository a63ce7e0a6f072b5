//! Compiled relational schema.
//!
//! Produced once by the compiler and read-only afterwards. Columns carry the
//! converter chosen for them, so the schema is shared behind an `Arc` with
//! query-execution threads.

use std::sync::Arc;

use ormdb_types::{DbType, ValueType};
use serde::{Deserialize, Serialize};

use crate::convert::Converter;
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::model::{ComputedColumn, EntityKind, KeyType};

/// A column of a compiled table.
#[derive(Debug, Clone)]
pub struct CompiledColumn {
    /// Column name.
    pub name: String,
    /// Member the column stores.
    pub member: String,
    /// Formatted storage type, e.g. `nvarchar(50)`.
    pub type_spec: String,
    /// Storage descriptor name.
    pub storage_type: String,
    /// Provider type tag.
    pub db_type: DbType,
    /// Host type of the member.
    pub host_type: ValueType,
    /// Allows nulls.
    pub nullable: bool,
    /// Size; -1 for unlimited.
    pub size: Option<i32>,
    /// Precision.
    pub precision: Option<u8>,
    /// Scale.
    pub scale: Option<u8>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Part of a foreign key.
    pub foreign_key: bool,
    /// Database identity.
    pub identity: bool,
    /// Row version stamp.
    pub row_version: bool,
    /// Excluded from inserts.
    pub no_insert: bool,
    /// Excluded from updates.
    pub no_update: bool,
    /// Default initializer SQL.
    pub default_sql: Option<String>,
    /// Database-computed definition.
    pub computed: Option<ComputedColumn>,
    /// Converter between storage and host values, when they differ.
    pub converter: Option<Arc<Converter>>,
}

/// A column of a key with its sort direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    /// Column name.
    pub column: String,
    /// Descending order.
    pub desc: bool,
}

/// A primary key, unique key or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledKey {
    /// Final name.
    pub name: String,
    /// Roles.
    pub key_type: KeyType,
    /// Key columns in order.
    pub columns: Vec<KeyColumn>,
    /// Covering columns.
    pub include: Vec<String>,
    /// Filter predicate SQL.
    pub filter: Option<String>,
    /// Created to support a foreign key rather than declared.
    pub synthesized: bool,
    /// Name was declared explicitly.
    pub(crate) explicit_name: bool,
}

impl CompiledKey {
    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    /// Check if this key's leading columns are exactly `columns`.
    pub fn starts_with(&self, columns: &[String]) -> bool {
        self.columns.len() >= columns.len()
            && self.columns.iter().zip(columns).all(|(k, c)| &k.column == c)
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledForeignKey {
    /// Final name.
    pub name: String,
    /// Reference member the constraint enforces.
    pub member: String,
    /// Child columns.
    pub columns: Vec<String>,
    /// Parent table.
    pub referenced_table: String,
    /// Parent primary key columns.
    pub referenced_columns: Vec<String>,
    /// Deleting the parent row deletes the child row.
    pub cascade_delete: bool,
}

/// A compiled table or view.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    /// Table name.
    pub name: String,
    /// Entity the table maps.
    pub entity: String,
    /// Table or view.
    pub kind: EntityKind,
    /// Columns in member order.
    pub columns: Vec<CompiledColumn>,
    /// Primary key, unique keys and indexes.
    pub keys: Vec<CompiledKey>,
    /// Foreign key constraints.
    pub foreign_keys: Vec<CompiledForeignKey>,
    /// Position in delete order; referencing tables come first.
    pub delete_order: usize,
    /// Member of a reference cycle with other tables.
    pub non_trivial_group: bool,
    /// Has an identity column.
    pub has_identity: bool,
    /// Has a column copying another table's identity.
    pub references_identity: bool,
    /// Columns written on insert.
    pub insert_columns: Vec<String>,
    /// Columns written on update.
    pub update_columns: Vec<String>,
}

impl CompiledTable {
    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&CompiledColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a column by name, mutably.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut CompiledColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// The primary key.
    pub fn primary_key(&self) -> Option<&CompiledKey> {
        self.keys.iter().find(|k| k.key_type.is_primary_key())
    }

    /// Keys other than the primary key.
    pub fn indexes(&self) -> impl Iterator<Item = &CompiledKey> {
        self.keys.iter().filter(|k| !k.key_type.is_primary_key())
    }

    /// Find a key or foreign key name.
    pub fn has_object_named(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k.name == name) || self.foreign_keys.iter().any(|f| f.name == name)
    }
}

/// The compiled schema.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    /// Model name.
    pub name: String,
    /// Model version.
    pub version: u64,
    pub(crate) tables: Vec<CompiledTable>,
    pub(crate) warnings: Diagnostics,
}

impl CompiledSchema {
    /// All tables in entity declaration order.
    pub fn tables(&self) -> &[CompiledTable] {
        &self.tables
    }

    /// Find a table by name.
    pub fn table(&self, name: &str) -> Option<&CompiledTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Find the table mapping an entity.
    pub fn table_for_entity(&self, entity: &str) -> Option<&CompiledTable> {
        self.tables.iter().find(|t| t.entity == entity)
    }

    /// Tables in the order rows can be deleted.
    pub fn delete_order(&self) -> Vec<&CompiledTable> {
        let mut tables: Vec<&CompiledTable> = self.tables.iter().collect();
        tables.sort_by_key(|t| t.delete_order);
        tables
    }

    /// Converter assigned to a column.
    pub fn converter(&self, table: &str, column: &str) -> Option<Arc<Converter>> {
        self.table(table)?.column(column)?.converter.clone()
    }

    /// Non-fatal diagnostics from compilation, such as resolved name collisions.
    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    /// Total number of columns.
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    /// Total number of foreign key constraints.
    pub fn foreign_key_count(&self) -> usize {
        self.tables.iter().map(|t| t.foreign_keys.len()).sum()
    }

    /// Serializable description of the schema.
    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            name: self.name.clone(),
            version: self.version,
            tables: self.tables.iter().map(TableSnapshot::from).collect(),
        }
    }

    /// Hex-encoded BLAKE3 hash of the snapshot's JSON form.
    pub fn fingerprint(&self) -> Result<String, Error> {
        let json = serde_json::to_vec(&self.snapshot()).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(blake3::hash(&json).as_bytes()))
    }
}

/// Serializable schema description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Model name.
    pub name: String,
    /// Model version.
    pub version: u64,
    /// Tables.
    pub tables: Vec<TableSnapshot>,
}

/// Serializable table description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table name.
    pub name: String,
    /// Entity kind (`Table`, `View`, ...).
    pub kind: String,
    /// Position in delete order; referencing tables come first.
    pub delete_order: usize,
    /// Member of a reference cycle with other tables.
    pub non_trivial_group: bool,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSnapshot>,
    /// Primary key, unique keys and indexes.
    pub keys: Vec<KeySnapshot>,
    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKeySnapshot>,
}

/// Serializable column description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// Column name.
    pub name: String,
    /// Provider type spec, e.g. `nvarchar(100)`.
    pub type_spec: String,
    /// Whether the column accepts nulls.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Part of a foreign key.
    pub foreign_key: bool,
    /// Left out of insert statements.
    pub no_insert: bool,
    /// Left out of update statements.
    pub no_update: bool,
    /// Default value expression.
    pub default_sql: Option<String>,
    /// Whether values pass through a converter.
    pub converted: bool,
}

/// Serializable key description. Descending columns carry a ` DESC` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySnapshot {
    /// Key name.
    pub name: String,
    /// Key type flags.
    pub key_type: String,
    /// Key columns in order.
    pub columns: Vec<String>,
    /// Included non-key columns.
    pub include: Vec<String>,
    /// Filter predicate for partial indexes.
    pub filter: Option<String>,
}

/// Serializable foreign key description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub referenced_table: String,
    /// Referenced key columns.
    pub referenced_columns: Vec<String>,
    /// Whether deletes cascade to referencing rows.
    pub cascade_delete: bool,
}

impl From<&CompiledTable> for TableSnapshot {
    fn from(table: &CompiledTable) -> Self {
        Self {
            name: table.name.clone(),
            kind: format!("{:?}", table.kind),
            delete_order: table.delete_order,
            non_trivial_group: table.non_trivial_group,
            columns: table
                .columns
                .iter()
                .map(|c| ColumnSnapshot {
                    name: c.name.clone(),
                    type_spec: c.type_spec.clone(),
                    nullable: c.nullable,
                    primary_key: c.primary_key,
                    foreign_key: c.foreign_key,
                    no_insert: c.no_insert,
                    no_update: c.no_update,
                    default_sql: c.default_sql.clone(),
                    converted: c.converter.is_some(),
                })
                .collect(),
            keys: table
                .keys
                .iter()
                .map(|k| KeySnapshot {
                    name: k.name.clone(),
                    key_type: k.key_type.to_string(),
                    columns: k
                        .columns
                        .iter()
                        .map(|c| {
                            if c.desc {
                                format!("{} DESC", c.column)
                            } else {
                                c.column.clone()
                            }
                        })
                        .collect(),
                    include: k.include.clone(),
                    filter: k.filter.clone(),
                })
                .collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|f| ForeignKeySnapshot {
                    name: f.name.clone(),
                    columns: f.columns.clone(),
                    referenced_table: f.referenced_table.clone(),
                    referenced_columns: f.referenced_columns.clone(),
                    cascade_delete: f.cascade_delete,
                })
                .collect(),
        }
    }
}
