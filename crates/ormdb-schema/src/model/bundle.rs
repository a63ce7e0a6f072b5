//! Model declaration bundle - the full input of one compilation.

use rkyv::{Archive, Deserialize, Serialize};

use super::EntityDecl;
use crate::error::Error;

/// All entity declarations of one application configuration.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ModelDecl {
    /// Model name, for logs.
    pub name: String,
    /// Declaration version (monotonically increasing).
    pub version: u64,
    /// Entity declarations in declaration order.
    pub entities: Vec<EntityDecl>,
}

impl ModelDecl {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            entities: Vec::new(),
        }
    }

    /// Set the version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add an entity.
    pub fn with_entity(mut self, entity: EntityDecl) -> Self {
        self.entities.push(entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Serialize the declarations to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize declarations from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComputedColumn, KeyDecl, MemberDecl};
    use ormdb_types::{DbType, EnumType, ScalarType, ValueType};

    fn sample_model() -> ModelDecl {
        let publisher = EntityDecl::new("Publisher")
            .with_member(MemberDecl::column("Id", ScalarType::Guid).primary_key())
            .with_member(MemberDecl::column("Name", ScalarType::String).with_size(100))
            .with_member(MemberDecl::list("Books", "Book"));

        let book = EntityDecl::new("Book")
            .with_member(MemberDecl::column("Id", ScalarType::Guid).primary_key())
            .with_member(MemberDecl::column("Title", ScalarType::String))
            .with_member(MemberDecl::column(
                "Category",
                ValueType::Enum(EnumType::new("Category", &["Fiction", "Science"])),
            ))
            .with_member(MemberDecl::column("Price", ScalarType::Decimal).with_db_type(DbType::Currency))
            .with_member(
                MemberDecl::column("Label", ScalarType::String)
                    .computed(ComputedColumn::computed("Title + ' '")),
            )
            .with_member(MemberDecl::reference("Publisher", "Publisher").cascade_delete())
            .with_key(KeyDecl::parse(crate::model::KeyType::INDEX, "Title, Category:DESC"));

        ModelDecl::new("books")
            .with_version(3)
            .with_entity(publisher)
            .with_entity(book)
    }

    #[test]
    fn test_model_builder() {
        let model = sample_model();

        assert_eq!(model.version, 3);
        assert_eq!(model.entity_names(), vec!["Publisher", "Book"]);
        assert!(model.get_entity("Book").is_some());
        assert!(model.get_entity("Author").is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let model = sample_model();
        let bytes = model.to_bytes().unwrap();
        let decoded = ModelDecl::from_bytes(&bytes).unwrap();

        assert_eq!(model, decoded);
    }

    #[test]
    fn test_deserialize_garbage() {
        assert!(matches!(
            ModelDecl::from_bytes(&[1, 2, 3]),
            Err(Error::Deserialization(_))
        ));
    }
}
