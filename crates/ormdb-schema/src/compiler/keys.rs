//! Table keys, supporting indexes and foreign key constraints.

use tracing::debug;

use super::schema::{CompiledForeignKey, CompiledKey, KeyColumn};
use super::tables::TableSet;
use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{EntityKind, EntityModel, KeyId, KeyInfo, KeyType};

/// Materialize primary keys, unique keys and indexes, then add an index for
/// each foreign key that lacks one.
///
/// A foreign key gets a supporting index only when the referenced entity has
/// a list member backed by it and no key of the table already starts with the
/// foreign key's columns.
pub(crate) fn create_table_keys(
    model: &EntityModel,
    set: &mut TableSet,
    config: &CompilerConfig,
    diags: &mut Diagnostics,
) -> usize {
    let mut synthesized = 0;
    for entity in model.entities() {
        let Some(ti) = set.index_of(entity.id) else {
            continue;
        };
        let table = &mut set.tables[ti];

        let mut keys: Vec<CompiledKey> = Vec::new();
        for key in entity.keys.iter().map(|k| model.key(*k)) {
            if !key.key_type.is_index() {
                continue;
            }
            let mut compiled = declared_key(model, key);
            if !compiled.include.is_empty() && !config.driver.supports_include_columns {
                diags.warning(
                    DiagnosticKind::Validation,
                    Some(entity.name.as_str()),
                    format!("driver '{}' has no include columns; ignored", config.driver.name),
                );
                compiled.include.clear();
            }
            if compiled.key_type.is_clustered() && !config.driver.supports_clustered_indexes {
                compiled.key_type = compiled.key_type.without(KeyType::CLUSTERED);
            }
            if compiled.filter.is_some() && !config.driver.supports_filtered_indexes {
                diags.warning(
                    DiagnosticKind::Validation,
                    Some(entity.name.as_str()),
                    format!("driver '{}' has no filtered indexes; filter ignored", config.driver.name),
                );
                compiled.filter = None;
            }

            if key.key_type.is_primary_key() {
                for c in &compiled.columns {
                    if let Some(column) = table.column_mut(&c.column) {
                        column.primary_key = true;
                        column.no_update = true;
                    }
                }
            }
            keys.push(compiled);
        }

        if config.creates_foreign_key_indexes() {
            for key in entity.keys.iter().map(|k| model.key(*k)) {
                let Some(owner) = key.owner_member.filter(|_| key.key_type.is_foreign_key()) else {
                    continue;
                };
                let Some(reference) = model.member(owner).reference else {
                    continue;
                };
                let has_inverse = model
                    .entity_members(reference.target)
                    .any(|m| m.list.is_some_and(|l| l.inverse == owner));
                if !has_inverse {
                    continue;
                }

                let columns = expanded_columns(model, key.id);
                if keys.iter().any(|k| k.starts_with(&columns)) {
                    continue;
                }
                debug!(table = %table.name, columns = ?columns, "Foreign key index added");
                keys.push(CompiledKey {
                    name: String::new(),
                    key_type: KeyType::INDEX,
                    columns: columns
                        .into_iter()
                        .map(|column| KeyColumn { column, desc: false })
                        .collect(),
                    include: Vec::new(),
                    filter: None,
                    synthesized: true,
                    explicit_name: false,
                });
                synthesized += 1;
            }
        }

        table.keys = keys;
    }
    synthesized
}

fn declared_key(model: &EntityModel, key: &KeyInfo) -> CompiledKey {
    CompiledKey {
        name: key.name.clone().unwrap_or_default(),
        key_type: key.key_type,
        columns: key
            .expanded
            .iter()
            .map(|km| KeyColumn {
                column: model.member(km.member).column_name.clone(),
                desc: km.desc,
            })
            .collect(),
        include: key
            .expanded_include
            .iter()
            .map(|m| model.member(*m).column_name.clone())
            .collect(),
        filter: key.filter.clone(),
        synthesized: false,
        explicit_name: key.name.is_some(),
    }
}

fn expanded_columns(model: &EntityModel, key: KeyId) -> Vec<String> {
    model
        .key(key)
        .expanded
        .iter()
        .map(|km| model.member(km.member).column_name.clone())
        .collect()
}

/// Create a foreign key constraint for every reference between two tables
/// compiled here. Views and external entities get none.
pub(crate) fn build_ref_constraints(model: &EntityModel, set: &mut TableSet, config: &CompilerConfig) -> usize {
    if !config.driver.supports_ref_constraints {
        return 0;
    }

    let mut count = 0;
    for entity in model.entities().iter().filter(|e| e.kind == EntityKind::Table) {
        let Some(ti) = set.index_of(entity.id) else {
            continue;
        };
        for member in model.entity_members(entity.id).filter(|m| m.is_reference()) {
            let Some(reference) = member.reference else {
                continue;
            };
            let Some(target) = set.index_of(reference.target) else {
                continue;
            };
            if set.tables[target].kind != EntityKind::Table {
                continue;
            }

            let constraint = CompiledForeignKey {
                name: String::new(),
                member: member.name.clone(),
                columns: expanded_columns(model, reference.from_key),
                referenced_table: set.tables[target].name.clone(),
                referenced_columns: expanded_columns(model, reference.to_key),
                cascade_delete: reference.cascade_delete,
            };
            set.tables[ti].foreign_keys.push(constraint);
            count += 1;
        }
    }
    count
}
