//! Key expansion.
//!
//! Rewrites every key so its member list names only scalar columns. A regular
//! key substitutes each entity reference with the columns of that reference's
//! foreign key. A foreign key expands the referenced primary key first, then
//! creates (or reuses) one column in the referencing entity per referenced
//! column. A stack of keys currently being expanded detects cycles.

use tracing::debug;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{
    EntityModel, ExpansionState, KeyId, KeyMember, MemberFlags, MemberId, MemberInfo, MemberKind,
};

/// Expands keys of an entity model in place.
pub struct KeyExpander<'a> {
    model: &'a mut EntityModel,
    diags: &'a mut Diagnostics,
    in_progress: Vec<KeyId>,
}

impl<'a> KeyExpander<'a> {
    /// Create an expander over a model.
    pub fn new(model: &'a mut EntityModel, diags: &'a mut Diagnostics) -> Self {
        Self {
            model,
            diags,
            in_progress: Vec::new(),
        }
    }

    /// Expand every key. Returns the number of keys expanded successfully.
    pub fn expand_all(&mut self) -> usize {
        let ids: Vec<KeyId> = self.model.keys().iter().map(|k| k.id).collect();
        let expanded = ids.into_iter().filter(|id| self.expand(*id)).count();
        debug!(keys = expanded, "Keys expanded");
        expanded
    }

    /// Expand one key, expanding whatever it depends on first.
    pub fn expand(&mut self, key: KeyId) -> bool {
        match self.model.key(key).state {
            ExpansionState::Expanded => return true,
            ExpansionState::Failed => return false,
            ExpansionState::Unexpanded | ExpansionState::Expanding => {}
        }

        if let Some(pos) = self.in_progress.iter().position(|k| *k == key) {
            let cycle: Vec<String> = self.in_progress[pos..]
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| self.key_label(*k))
                .collect();
            let entity = self.entity_name(key);
            self.diags.error(
                DiagnosticKind::CircularReference,
                Some(entity.as_str()),
                format!("circular key reference: {}", cycle.join(" -> ")),
            );
            return false;
        }

        self.in_progress.push(key);
        self.model.key_mut(key).state = ExpansionState::Expanding;

        let info = self.model.key(key);
        let foreign_owner = info.owner_member.filter(|_| info.key_type.is_foreign_key());
        let ok = match foreign_owner {
            Some(owner) => self.expand_foreign(key, owner),
            None => self.expand_regular(key),
        };
        let ok = ok && self.check_closure(key);

        self.in_progress.pop();
        self.model.key_mut(key).state = if ok {
            ExpansionState::Expanded
        } else {
            ExpansionState::Failed
        };
        ok
    }

    fn expand_regular(&mut self, key: KeyId) -> bool {
        let members = self.model.key(key).members.clone();
        let include = self.model.key(key).include.clone();

        let referenced = members
            .iter()
            .map(|km| km.member)
            .chain(include.iter().copied())
            .filter(|m| self.model.member(*m).is_reference())
            .collect::<Vec<_>>();
        for member in referenced {
            let Some(from_key) = self.from_key(member) else {
                return false;
            };
            if !self.expand(from_key) {
                return false;
            }
        }

        let mut expanded: Vec<KeyMember> = Vec::with_capacity(members.len());
        for km in &members {
            for column in self.columns_of(km.member) {
                if !expanded.iter().any(|e| e.member == column) {
                    expanded.push(KeyMember {
                        member: column,
                        desc: km.desc,
                    });
                }
            }
        }

        let mut expanded_include: Vec<MemberId> = Vec::with_capacity(include.len());
        for member in &include {
            for column in self.columns_of(*member) {
                let in_key = expanded.iter().any(|e| e.member == column);
                if !in_key && !expanded_include.contains(&column) {
                    expanded_include.push(column);
                }
            }
        }

        let info = self.model.key_mut(key);
        info.expanded = expanded;
        info.expanded_include = expanded_include;
        true
    }

    fn expand_foreign(&mut self, key: KeyId, owner: MemberId) -> bool {
        let Some(reference) = self.model.member(owner).reference else {
            let entity = self.entity_name(key);
            let name = self.model.member(owner).name.clone();
            self.diags.error(
                DiagnosticKind::Validation,
                Some(entity.as_str()),
                format!("reference '{name}' is unresolved"),
            );
            return false;
        };
        if !self.expand(reference.to_key) {
            return false;
        }

        let target_columns: Vec<MemberId> = self
            .model
            .key(reference.to_key)
            .expanded
            .iter()
            .map(|km| km.member)
            .collect();
        let owner_info = self.model.member(owner).clone();

        if !owner_info.column_names.is_empty() && owner_info.column_names.len() != target_columns.len() {
            let entity_name = self.entity_name(key);
            self.diags.error(
                DiagnosticKind::Validation,
                Some(entity_name.as_str()),
                format!(
                    "reference '{}' names {} column(s) but '{}' has {} key column(s)",
                    owner_info.name,
                    owner_info.column_names.len(),
                    self.model.entity(reference.target).name,
                    target_columns.len()
                ),
            );
            return false;
        }

        let mut expanded = Vec::with_capacity(target_columns.len());
        for (i, target) in target_columns.into_iter().enumerate() {
            let target = self.model.member(target).clone();
            let explicit = owner_info.column_names.get(i).cloned();
            let column = match explicit {
                Some(name) => self.explicit_foreign_column(&owner_info, &target, name),
                None => {
                    let name = format!("{}_{}", owner_info.name, target.name);
                    Some(self.foreign_column(&owner_info, &target, name))
                }
            };
            let Some(column) = column else {
                return false;
            };
            expanded.push(KeyMember::asc(column));
        }

        self.model.key_mut(key).expanded = expanded;
        true
    }

    /// Column for an explicitly named foreign key column. A declared member
    /// holding that name must be a column of the referenced type; it is never
    /// renamed around.
    fn explicit_foreign_column(
        &mut self,
        owner: &MemberInfo,
        target: &MemberInfo,
        name: String,
    ) -> Option<MemberId> {
        if let Some(existing) = self.model.find_member(owner.entity, &name) {
            let member = self.model.member(existing);
            let target_type = target.value_type.as_ref().map(|t| t.non_nullable());
            let compatible =
                member.is_column() && member.value_type.as_ref().map(|t| t.non_nullable()) == target_type;
            if !compatible {
                let entity = self.model.entity(owner.entity).name.clone();
                let found = match &member.value_type {
                    Some(t) if member.is_column() => format!("column of type {t}"),
                    _ => "non-column member".to_string(),
                };
                let expected = target_type.map(|t| t.to_string()).unwrap_or_default();
                self.diags.error(
                    DiagnosticKind::Validation,
                    Some(entity.as_str()),
                    format!(
                        "reference '{}' names column '{name}', but '{name}' is a {found}, expected {expected}",
                        owner.name
                    ),
                );
                return None;
            }
        }
        Some(self.foreign_column(owner, target, name))
    }

    /// Find or create the column in the referencing entity that mirrors `target`.
    fn foreign_column(&mut self, owner: &MemberInfo, target: &MemberInfo, name: String) -> MemberId {
        let entity = owner.entity;
        let target_type = target.value_type.as_ref().map(|t| t.non_nullable());
        let value_type = if owner.nullable {
            target_type.as_ref().map(|t| t.to_nullable())
        } else {
            target_type.clone()
        };
        let auto_value = target.flags.identity || target.flags.references_auto_value;

        let existing = self.model.find_member(entity, &name).filter(|m| {
            let m = self.model.member(*m);
            m.is_column() && m.value_type.as_ref().map(|t| t.non_nullable()) == target_type
        });

        let id = match existing {
            Some(id) => {
                let member = self.model.member_mut(id);
                if owner.nullable {
                    member.nullable = true;
                    member.value_type = member.value_type.as_ref().map(|t| t.to_nullable());
                }
                if member.size.is_none() && !member.flags.unlimited {
                    member.size = target.size;
                    member.flags.unlimited = target.flags.unlimited;
                }
                member.precision = member.precision.or(target.precision);
                member.scale = member.scale.or(target.scale);
                member.flags.foreign_key = true;
                member.flags.primary_key |= owner.flags.primary_key;
                member.flags.references_auto_value |= auto_value;
                id
            }
            None => {
                let name = self.model.unique_member_name(entity, &name);
                let column = MemberInfo {
                    id: MemberId(0),
                    entity,
                    column_name: name.clone(),
                    name,
                    kind: MemberKind::Column,
                    value_type,
                    nullable: owner.nullable,
                    size: target.size,
                    precision: target.precision,
                    scale: target.scale,
                    flags: MemberFlags {
                        primary_key: owner.flags.primary_key,
                        foreign_key: true,
                        unlimited: target.flags.unlimited,
                        references_auto_value: auto_value,
                        synthesized: true,
                        ..MemberFlags::default()
                    },
                    reference: None,
                    list: None,
                    column_names: Vec::new(),
                    type_spec: target.type_spec.clone(),
                    db_type: target.db_type,
                    default_sql: None,
                    computed: None,
                };
                let id = self.model.add_member(entity, column);
                debug!(column = %self.model.qualified_name(id), "Foreign key column synthesized");
                id
            }
        };

        if auto_value {
            self.model.entity_mut(entity).flags.references_identity = true;
        }
        id
    }

    fn check_closure(&mut self, key: KeyId) -> bool {
        let info = self.model.key(key);
        let stray = info
            .expanded
            .iter()
            .map(|km| km.member)
            .chain(info.expanded_include.iter().copied())
            .find(|m| !self.model.member(*m).is_column());
        match stray {
            None => true,
            Some(member) => {
                let entity = self.entity_name(key);
                let name = self.model.qualified_name(member);
                self.diags.error(
                    DiagnosticKind::Validation,
                    Some(entity.as_str()),
                    format!("key member '{name}' did not expand to a column"),
                );
                false
            }
        }
    }

    /// Columns a member stands for: itself, or its foreign key's expansion.
    fn columns_of(&self, member: MemberId) -> Vec<MemberId> {
        let info = self.model.member(member);
        match info.reference {
            Some(r) if info.is_reference() => self
                .model
                .key(r.from_key)
                .expanded
                .iter()
                .map(|km| km.member)
                .collect(),
            _ => vec![member],
        }
    }

    fn from_key(&mut self, member: MemberId) -> Option<KeyId> {
        let info = self.model.member(member);
        if let Some(r) = info.reference {
            return Some(r.from_key);
        }
        let entity = self.model.entity(info.entity).name.clone();
        let name = info.name.clone();
        self.diags.error(
            DiagnosticKind::Validation,
            Some(entity.as_str()),
            format!("reference '{name}' is unresolved"),
        );
        None
    }

    fn entity_name(&self, key: KeyId) -> String {
        self.model.entity(self.model.key(key).entity).name.clone()
    }

    fn key_label(&self, key: KeyId) -> String {
        let info = self.model.key(key);
        let members: Vec<&str> = info
            .members
            .iter()
            .map(|km| self.model.member(km.member).name.as_str())
            .collect();
        format!(
            "{}.{}({})",
            self.model.entity(info.entity).name,
            info.key_type,
            members.join(", ")
        )
    }
}

/// Expand every key of a model.
pub fn expand_keys(model: &mut EntityModel, diags: &mut Diagnostics) -> usize {
    KeyExpander::new(model, diags).expand_all()
}
