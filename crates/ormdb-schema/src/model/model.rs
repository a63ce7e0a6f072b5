//! The entity model: an arena of entities, members, and keys addressed by id.
//!
//! Built once from a [`ModelDecl`], mutated by key expansion and dependency
//! analysis, then read by the schema compiler.

use std::collections::HashMap;

use ormdb_types::{ScalarType, ValueType};
use tracing::debug;

use super::entity::{EntityFlags, EntityInfo, EntityKind};
use super::key::{parse_order_spec, KeyDecl, KeyInfo, KeyMember, KeyType};
use super::member::{MemberDecl, MemberFlags, MemberInfo, MemberKind, MemberTypeDecl};
use super::reference::{ListInfo, ReferenceInfo};
use super::{EntityDecl, ModelDecl};
use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Index of an entity in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

/// Index of a member in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub usize);

/// Index of a key in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub usize);

/// A reference whose foreign key exists but whose target key is not yet known.
struct PendingReference {
    member: MemberId,
    target: EntityId,
    from_key: KeyId,
    cascade_delete: bool,
}

/// Arena of entities, members, and keys.
#[derive(Debug, Clone, Default)]
pub struct EntityModel {
    entities: Vec<EntityInfo>,
    members: Vec<MemberInfo>,
    keys: Vec<KeyInfo>,
    by_name: HashMap<String, EntityId>,
}

impl EntityModel {
    /// Build the model from declarations, reporting every problem found.
    pub fn build(bundle: &ModelDecl, config: &CompilerConfig, diags: &mut Diagnostics) -> Self {
        let mut model = EntityModel::default();

        let mut declared = Vec::with_capacity(bundle.entities.len());
        for decl in &bundle.entities {
            if model.by_name.contains_key(&decl.name) {
                diags.error(
                    DiagnosticKind::Validation,
                    Some(decl.name.as_str()),
                    "duplicate entity name",
                );
                continue;
            }
            let id = model.add_entity(decl);
            for member in &decl.members {
                model.add_declared_member(id, member, config, diags);
            }
            declared.push((id, decl));
        }

        let mut pending = Vec::new();
        for (id, decl) in &declared {
            model.build_keys(*id, decl, &mut pending, diags);
        }
        model.resolve_references(pending, diags);
        model.resolve_lists(&declared, diags);

        debug!(
            entities = model.entities.len(),
            members = model.members.len(),
            keys = model.keys.len(),
            "Entity model built"
        );
        model
    }

    fn add_entity(&mut self, decl: &EntityDecl) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(EntityInfo {
            id,
            name: decl.name.clone(),
            kind: decl.kind,
            table_name: decl.table_name.clone().unwrap_or_else(|| decl.name.clone()),
            members: Vec::new(),
            keys: Vec::new(),
            primary_key: None,
            flags: EntityFlags::default(),
            delete_order: 0,
            external: decl.external,
        });
        self.by_name.insert(decl.name.clone(), id);
        id
    }

    fn add_declared_member(
        &mut self,
        entity: EntityId,
        decl: &MemberDecl,
        config: &CompilerConfig,
        diags: &mut Diagnostics,
    ) {
        if self.find_member(entity, &decl.name).is_some() {
            let owner = self.entities[entity.0].name.clone();
            diags.error(
                DiagnosticKind::Validation,
                Some(owner.as_str()),
                format!("duplicate member name '{}'", decl.name),
            );
            return;
        }

        let (kind, value_type) = match &decl.member_type {
            MemberTypeDecl::Column(t) => (MemberKind::Column, Some(t.clone())),
            MemberTypeDecl::Reference { .. } => (MemberKind::EntityReference, None),
            MemberTypeDecl::List { .. } => (MemberKind::EntityList, None),
            MemberTypeDecl::Transient => (MemberKind::Transient, None),
        };

        let computed = decl.computed.is_some();
        let flags = MemberFlags {
            primary_key: decl.primary_key,
            foreign_key: kind == MemberKind::EntityReference,
            identity: decl.identity,
            row_version: decl.row_version,
            cascade_delete: decl.cascade_delete,
            unlimited: decl.unlimited,
            no_insert: decl.no_insert || decl.identity || decl.row_version || computed,
            no_update: decl.no_update || decl.identity || decl.row_version || computed,
            ..MemberFlags::default()
        };

        let (mut precision, mut scale) = (decl.precision, decl.scale);
        let is_decimal = value_type
            .as_ref()
            .is_some_and(|t| t.storage_scalar() == ScalarType::Decimal);
        if is_decimal {
            precision.get_or_insert(config.default_decimal_precision);
            scale.get_or_insert(config.default_decimal_scale);
        }

        let nullable = decl.nullable || value_type.as_ref().is_some_and(ValueType::is_nullable);
        let id = self.add_member(
            entity,
            MemberInfo {
                id: MemberId(0),
                entity,
                name: decl.name.clone(),
                column_name: decl.column_name.clone().unwrap_or_else(|| decl.name.clone()),
                kind,
                value_type,
                nullable,
                size: decl.size,
                precision,
                scale,
                flags,
                reference: None,
                list: None,
                column_names: decl.column_names.clone(),
                type_spec: decl.type_spec.clone(),
                db_type: decl.db_type,
                default_sql: decl.default_sql.clone(),
                computed: decl.computed.clone(),
            },
        );

        if decl.identity {
            self.entities[entity.0].flags.has_identity = true;
        }
        debug!(member = %self.qualified_name(id), kind = ?kind, "Member added");
    }

    fn build_keys(
        &mut self,
        entity: EntityId,
        decl: &EntityDecl,
        pending: &mut Vec<PendingReference>,
        diags: &mut Diagnostics,
    ) {
        let name = decl.name.clone();

        let pk_decls: Vec<&KeyDecl> = decl
            .keys
            .iter()
            .filter(|k| k.key_type.is_primary_key())
            .collect();
        if pk_decls.len() > 1 {
            diags.error(
                DiagnosticKind::Validation,
                Some(name.as_str()),
                format!("{} primary keys declared, expected one", pk_decls.len()),
            );
        }

        let pk = match pk_decls.first() {
            Some(pk_decl) => self.add_declared_key(entity, pk_decl, diags),
            None => {
                let flagged: Vec<KeyMember> = self.entities[entity.0]
                    .members
                    .iter()
                    .filter(|m| self.members[m.0].flags.primary_key)
                    .map(|m| KeyMember::asc(*m))
                    .collect();
                if flagged.is_empty() {
                    None
                } else {
                    Some(self.add_key(KeyInfo::new(
                        KeyId(0),
                        entity,
                        KeyType::PRIMARY_KEY,
                        flagged,
                    )))
                }
            }
        };

        match pk {
            Some(pk) => {
                let pk_members: Vec<MemberId> =
                    self.keys[pk.0].members.iter().map(|km| km.member).collect();
                for m in pk_members {
                    self.members[m.0].flags.primary_key = true;
                }
                self.entities[entity.0].primary_key = Some(pk);
            }
            None if decl.kind == EntityKind::Table => {
                diags.error(DiagnosticKind::Validation, Some(name.as_str()), "entity has no primary key");
            }
            None => {}
        }

        for key_decl in decl.keys.iter().filter(|k| !k.key_type.is_primary_key()) {
            self.add_declared_key(entity, key_decl, diags);
        }

        let references: Vec<MemberId> = self.entities[entity.0]
            .members
            .iter()
            .copied()
            .filter(|m| self.members[m.0].is_reference())
            .collect();
        for member in references {
            let member_name = self.members[member.0].name.clone();
            let target_name = match decl.get_member(&member_name).map(|m| &m.member_type) {
                Some(MemberTypeDecl::Reference { target }) => target.clone(),
                _ => continue,
            };
            let Some(target) = self.find_entity(&target_name) else {
                diags.error(
                    DiagnosticKind::Validation,
                    Some(name.as_str()),
                    format!("reference '{member_name}' targets unknown entity '{target_name}'"),
                );
                continue;
            };

            let mut fk = KeyInfo::new(
                KeyId(0),
                entity,
                KeyType::FOREIGN_KEY,
                vec![KeyMember::asc(member)],
            );
            fk.owner_member = Some(member);
            let from_key = self.add_key(fk);
            pending.push(PendingReference {
                member,
                target,
                from_key,
                cascade_delete: self.members[member.0].flags.cascade_delete,
            });
        }

        let clustered = self.entities[entity.0]
            .keys
            .iter()
            .filter(|k| self.keys[k.0].key_type.is_clustered())
            .count();
        if clustered > 1 {
            diags.error(
                DiagnosticKind::Validation,
                Some(name.as_str()),
                format!("{clustered} clustered keys declared, at most one allowed"),
            );
        }
        self.entities[entity.0].flags.has_clustered_index = clustered > 0;
    }

    fn add_declared_key(
        &mut self,
        entity: EntityId,
        decl: &KeyDecl,
        diags: &mut Diagnostics,
    ) -> Option<KeyId> {
        let owner = self.entities[entity.0].name.clone();
        if decl.members.is_empty() {
            diags.error(
                DiagnosticKind::Validation,
                Some(owner.as_str()),
                format!("{} key declares no members", decl.key_type),
            );
            return None;
        }

        let mut members = Vec::with_capacity(decl.members.len());
        let mut valid = true;
        for spec in &decl.members {
            let (name, desc) = match parse_order_spec(spec) {
                Ok(parsed) => parsed,
                Err(e) => {
                    diags.error(DiagnosticKind::Validation, Some(owner.as_str()), e);
                    valid = false;
                    continue;
                }
            };
            match self.keyable_member(entity, &name) {
                Ok(member) => members.push(KeyMember { member, desc }),
                Err(e) => {
                    diags.error(DiagnosticKind::Validation, Some(owner.as_str()), e);
                    valid = false;
                }
            }
        }

        let mut include = Vec::with_capacity(decl.include.len());
        for name in &decl.include {
            match self.keyable_member(entity, name) {
                Ok(member) => include.push(member),
                Err(e) => {
                    diags.error(DiagnosticKind::Validation, Some(owner.as_str()), e);
                    valid = false;
                }
            }
        }

        if !valid {
            return None;
        }

        let mut key = KeyInfo::new(KeyId(0), entity, decl.key_type, members);
        key.name = decl.name.clone();
        key.include = include;
        key.filter = decl.filter.clone();
        Some(self.add_key(key))
    }

    fn keyable_member(&self, entity: EntityId, name: &str) -> Result<MemberId, String> {
        let member = self
            .find_member(entity, name)
            .ok_or_else(|| format!("key references unknown member '{name}'"))?;
        match self.members[member.0].kind {
            MemberKind::Column | MemberKind::EntityReference => Ok(member),
            kind => Err(format!(
                "member '{name}' of kind {kind:?} cannot be part of a key"
            )),
        }
    }

    fn resolve_references(&mut self, pending: Vec<PendingReference>, diags: &mut Diagnostics) {
        for p in pending {
            match self.entities[p.target.0].primary_key {
                Some(to_key) => {
                    self.members[p.member.0].reference = Some(ReferenceInfo {
                        target: p.target,
                        from_key: p.from_key,
                        to_key,
                        cascade_delete: p.cascade_delete,
                    });
                }
                None => {
                    let owner = self.entities[self.members[p.member.0].entity.0].name.clone();
                    diags.error(
                        DiagnosticKind::Validation,
                        Some(owner.as_str()),
                        format!(
                            "reference '{}' targets entity '{}' which has no primary key",
                            self.members[p.member.0].name, self.entities[p.target.0].name
                        ),
                    );
                }
            }
        }
    }

    fn resolve_lists(&mut self, declared: &[(EntityId, &EntityDecl)], diags: &mut Diagnostics) {
        for (entity, decl) in declared {
            for member_decl in &decl.members {
                let MemberTypeDecl::List { target, inverse } = &member_decl.member_type else {
                    continue;
                };
                let Some(member) = self.find_member(*entity, &member_decl.name) else {
                    continue;
                };
                let Some(target_id) = self.find_entity(target) else {
                    diags.error(
                        DiagnosticKind::Validation,
                        Some(decl.name.as_str()),
                        format!("list '{}' targets unknown entity '{target}'", member_decl.name),
                    );
                    continue;
                };

                let points_back = |m: &MemberInfo| {
                    m.reference.is_some_and(|r| r.target == *entity)
                };
                let found = match inverse {
                    Some(name) => self
                        .find_member(target_id, name)
                        .filter(|m| points_back(&self.members[m.0])),
                    None => self.entities[target_id.0]
                        .members
                        .iter()
                        .copied()
                        .find(|m| points_back(&self.members[m.0])),
                };

                match found {
                    Some(inverse) => {
                        self.members[member.0].list = Some(ListInfo {
                            target: target_id,
                            inverse,
                        });
                    }
                    None => diags.error(
                        DiagnosticKind::Validation,
                        Some(decl.name.as_str()),
                        format!(
                            "list '{}' has no inverse reference on '{target}'",
                            member_decl.name
                        ),
                    ),
                }
            }
        }
    }

    fn add_key(&mut self, mut key: KeyInfo) -> KeyId {
        let id = KeyId(self.keys.len());
        key.id = id;
        let entity = key.entity;
        self.keys.push(key);
        self.entities[entity.0].keys.push(id);
        id
    }

    /// Append a member to an entity and return its id.
    pub fn add_member(&mut self, entity: EntityId, mut member: MemberInfo) -> MemberId {
        let id = MemberId(self.members.len());
        member.id = id;
        member.entity = entity;
        self.members.push(member);
        self.entities[entity.0].members.push(id);
        id
    }

    /// A member name not yet used in the entity, derived from `base`.
    pub fn unique_member_name(&self, entity: EntityId, base: &str) -> String {
        if self.find_member(entity, base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| self.find_member(entity, candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// All entities.
    pub fn entities(&self) -> &[EntityInfo] {
        &self.entities
    }

    /// All members.
    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    /// All keys.
    pub fn keys(&self) -> &[KeyInfo] {
        &self.keys
    }

    /// Get an entity.
    pub fn entity(&self, id: EntityId) -> &EntityInfo {
        &self.entities[id.0]
    }

    /// Get an entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> &mut EntityInfo {
        &mut self.entities[id.0]
    }

    /// Get a member.
    pub fn member(&self, id: MemberId) -> &MemberInfo {
        &self.members[id.0]
    }

    /// Get a member mutably.
    pub fn member_mut(&mut self, id: MemberId) -> &mut MemberInfo {
        &mut self.members[id.0]
    }

    /// Get a key.
    pub fn key(&self, id: KeyId) -> &KeyInfo {
        &self.keys[id.0]
    }

    /// Get a key mutably.
    pub fn key_mut(&mut self, id: KeyId) -> &mut KeyInfo {
        &mut self.keys[id.0]
    }

    /// Find an entity by name.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Find a member of an entity by name.
    pub fn find_member(&self, entity: EntityId, name: &str) -> Option<MemberId> {
        self.entities[entity.0]
            .members
            .iter()
            .copied()
            .find(|m| self.members[m.0].name == name)
    }

    /// Iterate over the members of an entity.
    pub fn entity_members(&self, entity: EntityId) -> impl Iterator<Item = &MemberInfo> {
        self.entities[entity.0]
            .members
            .iter()
            .map(|m| &self.members[m.0])
    }

    /// `Entity.Member`, for diagnostics.
    pub fn qualified_name(&self, member: MemberId) -> String {
        let m = &self.members[member.0];
        format!("{}.{}", self.entities[m.entity.0].name, m.name)
    }

    /// Entities in the order rows can be deleted without violating references.
    pub fn delete_order(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.iter().map(|e| e.id).collect();
        ids.sort_by_key(|id| (self.entities[id.0].delete_order, *id));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityDecl, KeyDecl, MemberDecl};

    fn build(model: &ModelDecl) -> (EntityModel, Diagnostics) {
        let mut diags = Diagnostics::new();
        let built = EntityModel::build(model, &CompilerConfig::default(), &mut diags);
        (built, diags)
    }

    fn library() -> ModelDecl {
        ModelDecl::new("library")
            .with_entity(
                EntityDecl::new("Publisher")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key().identity())
                    .with_member(MemberDecl::column("Name", ScalarType::String))
                    .with_member(MemberDecl::list("Books", "Book")),
            )
            .with_entity(
                EntityDecl::new("Book")
                    .with_member(MemberDecl::column("Id", ScalarType::Guid).primary_key())
                    .with_member(MemberDecl::column("Price", ScalarType::Decimal))
                    .with_member(MemberDecl::reference("Publisher", "Publisher").cascade_delete())
                    .with_key(KeyDecl::parse(KeyType::INDEX, "Publisher, Price:desc")),
            )
    }

    #[test]
    fn test_build_library() {
        let (model, diags) = build(&library());
        assert!(!diags.has_errors(), "{diags}");

        let publisher = model.find_entity("Publisher").unwrap();
        let book = model.find_entity("Book").unwrap();
        assert!(model.entity(publisher).flags.has_identity);

        let reference = model.find_member(book, "Publisher").unwrap();
        let info = model.member(reference).reference.unwrap();
        assert_eq!(info.target, publisher);
        assert_eq!(Some(info.to_key), model.entity(publisher).primary_key);
        assert!(info.cascade_delete);
        assert!(model.key(info.from_key).key_type.is_foreign_key());

        let books = model.find_member(publisher, "Books").unwrap();
        assert_eq!(model.member(books).list.map(|l| l.inverse), Some(reference));

        let index = model
            .entity(book)
            .keys
            .iter()
            .map(|k| model.key(*k))
            .find(|k| k.key_type == KeyType::INDEX)
            .unwrap();
        assert_eq!(index.members.len(), 2);
        assert!(index.members[1].desc);
    }

    #[test]
    fn test_decimal_defaults_applied() {
        let (model, _) = build(&library());
        let book = model.find_entity("Book").unwrap();
        let price = model.member(model.find_member(book, "Price").unwrap());

        assert_eq!(price.precision, Some(18));
        assert_eq!(price.scale, Some(4));
    }

    #[test]
    fn test_identity_is_not_written() {
        let (model, _) = build(&library());
        let publisher = model.find_entity("Publisher").unwrap();
        let id = model.member(model.find_member(publisher, "Id").unwrap());

        assert!(id.flags.no_insert);
        assert!(id.flags.no_update);
        assert!(id.flags.primary_key);
    }

    #[test]
    fn test_missing_primary_key() {
        let bundle = ModelDecl::new("m")
            .with_entity(EntityDecl::new("Log").with_member(MemberDecl::column("Text", ScalarType::String)))
            .with_entity(EntityDecl::view("LogView").with_member(MemberDecl::column("Text", ScalarType::String)));
        let (_, diags) = build(&bundle);

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.errors().next().unwrap().entity.as_deref(), Some("Log"));
    }

    #[test]
    fn test_invalid_declarations_accumulate() {
        let bundle = ModelDecl::new("m").with_entity(
            EntityDecl::new("Book")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(MemberDecl::column("Id", ScalarType::Int64))
                .with_member(MemberDecl::transient("Cache"))
                .with_member(MemberDecl::reference("Shelf", "Shelf"))
                .with_key(KeyDecl::index(["Cache"]))
                .with_key(KeyDecl::index(["Title:upward"]))
                .with_key(KeyDecl::index(["Missing"])),
        );
        let (_, diags) = build(&bundle);

        // duplicate member, transient key member, bad direction, unknown member, unknown target
        assert_eq!(diags.error_count(), 5, "{diags}");
    }

    #[test]
    fn test_multiple_clustered_keys() {
        let bundle = ModelDecl::new("m").with_entity(
            EntityDecl::new("Book")
                .with_member(MemberDecl::column("Id", ScalarType::Int32))
                .with_member(MemberDecl::column("Title", ScalarType::String))
                .with_key(KeyDecl::primary_key(["Id"]).clustered())
                .with_key(KeyDecl::index(["Title"]).clustered()),
        );
        let (model, diags) = build(&bundle);

        assert_eq!(diags.error_count(), 1);
        assert!(model.entity(EntityId(0)).flags.has_clustered_index);
    }

    #[test]
    fn test_list_without_inverse() {
        let bundle = ModelDecl::new("m")
            .with_entity(
                EntityDecl::new("Author")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                    .with_member(MemberDecl::list("Books", "Book")),
            )
            .with_entity(
                EntityDecl::new("Book")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key()),
            );
        let (_, diags) = build(&bundle);

        assert_eq!(diags.error_count(), 1);
        assert!(diags.to_string().contains("no inverse reference"));
    }

    #[test]
    fn test_unique_member_name() {
        let (model, _) = build(&library());
        let book = model.find_entity("Book").unwrap();

        assert_eq!(model.unique_member_name(book, "Title"), "Title");
        assert_eq!(model.unique_member_name(book, "Price"), "Price1");
    }
}
