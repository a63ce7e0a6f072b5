//! Entity declarations and their compiled-model counterparts.

use rkyv::{Archive, Deserialize, Serialize};

use super::key::KeyDecl;
use super::member::MemberDecl;
use super::model::{EntityId, KeyId, MemberId};

/// Whether an entity maps to a table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum EntityKind {
    /// Base table.
    Table,
    /// Read-only view.
    View,
}

/// An entity declaration.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct EntityDecl {
    /// Entity name (unique within the model).
    pub name: String,
    /// Table or view.
    pub kind: EntityKind,
    /// Explicit table name.
    pub table_name: Option<String>,
    /// Member declarations.
    pub members: Vec<MemberDecl>,
    /// Key declarations.
    pub keys: Vec<KeyDecl>,
    /// Referenced here but compiled into another schema.
    pub external: bool,
}

impl EntityDecl {
    /// Create a table entity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Table,
            table_name: None,
            members: Vec::new(),
            keys: Vec::new(),
            external: false,
        }
    }

    /// Create a view entity.
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::View,
            ..Self::new(name)
        }
    }

    /// Add a member.
    pub fn with_member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }

    /// Add multiple members.
    pub fn with_members(mut self, members: impl IntoIterator<Item = MemberDecl>) -> Self {
        self.members.extend(members);
        self
    }

    /// Add a key.
    pub fn with_key(mut self, key: KeyDecl) -> Self {
        self.keys.push(key);
        self
    }

    /// Set the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Mark the entity as compiled elsewhere.
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    /// Get a member by name.
    pub fn get_member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Entity flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityFlags {
    /// Has a database identity column.
    pub has_identity: bool,
    /// Has a clustered key.
    pub has_clustered_index: bool,
    /// Stores a copy of an identity generated in another table.
    pub references_identity: bool,
    /// Belongs to a reference cycle with other entities.
    pub non_trivial_group: bool,
}

/// An entity in the compiled model.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    /// Entity id.
    pub id: EntityId,
    /// Entity name.
    pub name: String,
    /// Table or view.
    pub kind: EntityKind,
    /// Table name.
    pub table_name: String,
    /// Members in declaration order, synthesized columns appended.
    pub members: Vec<MemberId>,
    /// Keys; primary key first when present.
    pub keys: Vec<KeyId>,
    /// Primary key.
    pub primary_key: Option<KeyId>,
    /// Flags.
    pub flags: EntityFlags,
    /// Position in delete order; lower deletes first.
    pub delete_order: usize,
    /// Compiled into another schema.
    pub external: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyDecl;
    use ormdb_types::ScalarType;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDecl::new("Book")
            .with_member(MemberDecl::column("Id", ScalarType::Guid).primary_key())
            .with_member(MemberDecl::column("Title", ScalarType::String).with_size(200))
            .with_member(MemberDecl::reference("Publisher", "Publisher"))
            .with_key(KeyDecl::index(["Title"]))
            .with_table_name("books");

        assert_eq!(entity.name, "Book");
        assert_eq!(entity.kind, EntityKind::Table);
        assert_eq!(entity.members.len(), 3);
        assert_eq!(entity.keys.len(), 1);
        assert_eq!(entity.table_name.as_deref(), Some("books"));
        assert!(!entity.external);
    }

    #[test]
    fn test_get_member() {
        let entity = EntityDecl::view("BookSummary")
            .with_member(MemberDecl::column("Title", ScalarType::String));

        assert_eq!(entity.kind, EntityKind::View);
        assert!(entity.get_member("Title").is_some());
        assert!(entity.get_member("Nope").is_none());
    }
}
