//! Member declarations and their compiled-model counterparts.

use ormdb_types::{DbType, ScalarType, ValueType};
use rkyv::{Archive, Deserialize, Serialize};

use super::model::{EntityId, MemberId};
use super::reference::{ListInfo, ReferenceInfo};

/// Declared shape of a member.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum MemberTypeDecl {
    /// A scalar column.
    Column(ValueType),
    /// A reference to another entity, stored as foreign key columns.
    Reference {
        /// Target entity name.
        target: String,
    },
    /// A collection of entities referencing this one.
    List {
        /// Target entity name.
        target: String,
        /// Name of the reference member on the target pointing back here.
        inverse: Option<String>,
    },
    /// Not persisted.
    Transient,
}

/// How a database-computed column uses its SQL snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ComputedKind {
    /// Evaluated per row against its table; the SQL holds one `{table}` placeholder.
    Expression,
    /// Computed by the database from its own row; the SQL holds no placeholder.
    Computed,
}

/// A database-computed column definition.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ComputedColumn {
    /// Placeholder shape of the SQL.
    pub kind: ComputedKind,
    /// Raw SQL snippet.
    pub sql: String,
}

/// Placeholder replaced by the table name in expression columns.
pub const TABLE_PLACEHOLDER: &str = "{table}";

impl ComputedColumn {
    /// Create a per-row expression column.
    pub fn expression(sql: impl Into<String>) -> Self {
        Self {
            kind: ComputedKind::Expression,
            sql: sql.into(),
        }
    }

    /// Create a plain computed column.
    pub fn computed(sql: impl Into<String>) -> Self {
        Self {
            kind: ComputedKind::Computed,
            sql: sql.into(),
        }
    }

    /// Check the placeholder count against the kind.
    pub fn placeholder_error(&self) -> Option<String> {
        let count = self.sql.matches(TABLE_PLACEHOLDER).count();
        match self.kind {
            ComputedKind::Expression if count != 1 => Some(format!(
                "expression column SQL must contain exactly one {TABLE_PLACEHOLDER} placeholder, found {count}"
            )),
            ComputedKind::Computed if count != 0 => Some(format!(
                "computed column SQL must not contain a {TABLE_PLACEHOLDER} placeholder, found {count}"
            )),
            _ => None,
        }
    }
}

/// A member declaration within an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct MemberDecl {
    /// Member name.
    pub name: String,
    /// Declared shape.
    pub member_type: MemberTypeDecl,
    /// Whether the column or reference may be null.
    pub nullable: bool,
    /// Size of sized types; -1 for unlimited.
    pub size: Option<i32>,
    /// Numeric precision.
    pub precision: Option<u8>,
    /// Numeric scale.
    pub scale: Option<u8>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Database-generated identity value.
    pub identity: bool,
    /// Row version stamp.
    pub row_version: bool,
    /// Deleting the referenced row deletes this one.
    pub cascade_delete: bool,
    /// Unlimited size.
    pub unlimited: bool,
    /// Column is never written on insert.
    pub no_insert: bool,
    /// Column is never written on update.
    pub no_update: bool,
    /// Explicit column name.
    pub column_name: Option<String>,
    /// Explicit foreign key column names for a reference.
    pub column_names: Vec<String>,
    /// Explicit type spec, e.g. `varchar(200)`.
    pub type_spec: Option<String>,
    /// Explicit provider type tag.
    pub db_type: Option<DbType>,
    /// Explicit default SQL.
    pub default_sql: Option<String>,
    /// Database-computed column.
    pub computed: Option<ComputedColumn>,
}

impl MemberDecl {
    fn with_type(name: impl Into<String>, member_type: MemberTypeDecl, nullable: bool) -> Self {
        Self {
            name: name.into(),
            member_type,
            nullable,
            size: None,
            precision: None,
            scale: None,
            primary_key: false,
            identity: false,
            row_version: false,
            cascade_delete: false,
            unlimited: false,
            no_insert: false,
            no_update: false,
            column_name: None,
            column_names: Vec::new(),
            type_spec: None,
            db_type: None,
            default_sql: None,
            computed: None,
        }
    }

    /// Create a column member. Nullable if the value type is.
    pub fn column(name: impl Into<String>, value_type: impl Into<ValueType>) -> Self {
        let value_type = value_type.into();
        let nullable = value_type.is_nullable();
        Self::with_type(name, MemberTypeDecl::Column(value_type), nullable)
    }

    /// Create a nullable scalar column.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::with_type(
            name,
            MemberTypeDecl::Column(ValueType::Nullable(scalar)),
            true,
        )
    }

    /// Create a required reference to another entity.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_type(
            name,
            MemberTypeDecl::Reference {
                target: target.into(),
            },
            false,
        )
    }

    /// Create a list of entities referencing this one.
    pub fn list(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_type(
            name,
            MemberTypeDecl::List {
                target: target.into(),
                inverse: None,
            },
            false,
        )
    }

    /// Create a transient member.
    pub fn transient(name: impl Into<String>) -> Self {
        Self::with_type(name, MemberTypeDecl::Transient, true)
    }

    /// Allow nulls.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as a database identity.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Mark as a row version stamp.
    pub fn row_version(mut self) -> Self {
        self.row_version = true;
        self
    }

    /// Cascade deletes from the referenced entity.
    pub fn cascade_delete(mut self) -> Self {
        self.cascade_delete = true;
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: i32) -> Self {
        self.size = Some(size);
        self
    }

    /// Mark as unlimited size.
    pub fn unlimited(mut self) -> Self {
        self.unlimited = true;
        self
    }

    /// Set precision and scale.
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Never write on insert.
    pub fn no_insert(mut self) -> Self {
        self.no_insert = true;
        self
    }

    /// Never write on update.
    pub fn no_update(mut self) -> Self {
        self.no_update = true;
        self
    }

    /// Set the column name.
    pub fn with_column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Set the foreign key column names of a reference.
    pub fn with_column_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.column_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set an explicit type spec.
    pub fn with_type_spec(mut self, spec: impl Into<String>) -> Self {
        self.type_spec = Some(spec.into());
        self
    }

    /// Set an explicit provider type tag.
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    /// Set the default SQL.
    pub fn with_default(mut self, sql: impl Into<String>) -> Self {
        self.default_sql = Some(sql.into());
        self
    }

    /// Make this a database-computed column.
    pub fn computed(mut self, computed: ComputedColumn) -> Self {
        self.computed = Some(computed);
        self
    }

    /// Set the inverse reference name of a list.
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        if let MemberTypeDecl::List { inverse: slot, .. } = &mut self.member_type {
            *slot = Some(inverse.into());
        }
        self
    }
}

/// Kind of a compiled-model member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Scalar column.
    Column,
    /// Reference to another entity.
    EntityReference,
    /// Collection of referencing entities.
    EntityList,
    /// Not persisted.
    Transient,
}

/// Member flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberFlags {
    /// Part of the primary key.
    pub primary_key: bool,
    /// Foreign key column, or the reference that owns them.
    pub foreign_key: bool,
    /// Database identity.
    pub identity: bool,
    /// Row version stamp.
    pub row_version: bool,
    /// Cascade delete from the referenced entity.
    pub cascade_delete: bool,
    /// Unlimited size.
    pub unlimited: bool,
    /// Never written on insert.
    pub no_insert: bool,
    /// Never written on update.
    pub no_update: bool,
    /// Holds a copy of a value the database generates in another table.
    pub references_auto_value: bool,
    /// Created during key expansion rather than declared.
    pub synthesized: bool,
}

/// A member in the compiled entity model.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Member id.
    pub id: MemberId,
    /// Owning entity.
    pub entity: EntityId,
    /// Member name.
    pub name: String,
    /// Column name (for Column members).
    pub column_name: String,
    /// Kind.
    pub kind: MemberKind,
    /// Declared host type (Column members only).
    pub value_type: Option<ValueType>,
    /// Nullability.
    pub nullable: bool,
    /// Size; -1 for unlimited.
    pub size: Option<i32>,
    /// Numeric precision.
    pub precision: Option<u8>,
    /// Numeric scale.
    pub scale: Option<u8>,
    /// Flags.
    pub flags: MemberFlags,
    /// Reference details for EntityReference members.
    pub reference: Option<ReferenceInfo>,
    /// List details for EntityList members.
    pub list: Option<ListInfo>,
    /// Explicit foreign key column names.
    pub column_names: Vec<String>,
    /// Explicit type spec.
    pub type_spec: Option<String>,
    /// Explicit provider type tag.
    pub db_type: Option<DbType>,
    /// Explicit default SQL.
    pub default_sql: Option<String>,
    /// Database-computed column.
    pub computed: Option<ComputedColumn>,
}

impl MemberInfo {
    /// Check if this member is a scalar column.
    pub fn is_column(&self) -> bool {
        self.kind == MemberKind::Column
    }

    /// Check if this member is an entity reference.
    pub fn is_reference(&self) -> bool {
        self.kind == MemberKind::EntityReference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_decl_builder() {
        let member = MemberDecl::column("Id", ScalarType::Int32)
            .primary_key()
            .identity();

        assert_eq!(member.name, "Id");
        assert!(member.primary_key);
        assert!(member.identity);
        assert!(!member.nullable);
    }

    #[test]
    fn test_optional_member() {
        let member = MemberDecl::optional("Notes", ScalarType::String).unlimited();

        assert!(member.nullable);
        assert!(member.unlimited);
        assert_eq!(
            member.member_type,
            MemberTypeDecl::Column(ValueType::Nullable(ScalarType::String))
        );
    }

    #[test]
    fn test_list_inverse() {
        let member = MemberDecl::list("Books", "Book").with_inverse("Publisher");
        assert_eq!(
            member.member_type,
            MemberTypeDecl::List {
                target: "Book".into(),
                inverse: Some("Publisher".into())
            }
        );
    }

    #[test]
    fn test_computed_placeholders() {
        assert!(ComputedColumn::expression("SELECT COUNT(*) FROM {table}")
            .placeholder_error()
            .is_none());
        assert!(ComputedColumn::expression("Price * Qty")
            .placeholder_error()
            .is_some());
        assert!(ComputedColumn::computed("Price * Qty").placeholder_error().is_none());
        assert!(ComputedColumn::computed("{table}.Price")
            .placeholder_error()
            .is_some());
    }
}
