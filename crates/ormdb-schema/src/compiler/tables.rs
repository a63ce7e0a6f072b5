//! Table construction and final column lists.

use ormdb_types::Value;
use tracing::debug;

use super::schema::{CompiledColumn, CompiledTable};
use crate::config::CompilerConfig;
use crate::convert::ConverterRegistry;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{EntityId, EntityModel, MemberInfo};
use crate::storage::{ColumnTypeInfo, StorageTypeRegistry};

/// Tables under construction, with the entity each one maps.
#[derive(Debug, Default)]
pub(crate) struct TableSet {
    pub tables: Vec<CompiledTable>,
    by_entity: Vec<Option<usize>>,
}

impl TableSet {
    /// Table index of an entity; `None` for external entities.
    pub fn index_of(&self, entity: EntityId) -> Option<usize> {
        self.by_entity.get(entity.0).copied().flatten()
    }
}

/// Create a table for every entity compiled here, resolving each column's
/// storage type, converter and default.
pub(crate) fn build_tables(
    model: &EntityModel,
    storage: &StorageTypeRegistry,
    converters: &ConverterRegistry,
    config: &CompilerConfig,
    diags: &mut Diagnostics,
) -> TableSet {
    let mut set = TableSet::default();
    for entity in model.entities() {
        if entity.external {
            set.by_entity.push(None);
            continue;
        }

        let columns = model
            .entity_members(entity.id)
            .filter(|m| m.is_column())
            .filter_map(|m| build_column(&entity.name, m, storage, converters, config, diags))
            .collect();

        set.by_entity.push(Some(set.tables.len()));
        set.tables.push(CompiledTable {
            name: entity.table_name.clone(),
            entity: entity.name.clone(),
            kind: entity.kind,
            columns,
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            delete_order: entity.delete_order,
            non_trivial_group: entity.flags.non_trivial_group,
            has_identity: entity.flags.has_identity,
            references_identity: entity.flags.references_identity,
            insert_columns: Vec::new(),
            update_columns: Vec::new(),
        });
    }

    debug!(
        tables = set.tables.len(),
        columns = set.tables.iter().map(|t| t.columns.len()).sum::<usize>(),
        "Tables built"
    );
    set
}

fn build_column(
    entity: &str,
    member: &MemberInfo,
    storage: &StorageTypeRegistry,
    converters: &ConverterRegistry,
    config: &CompilerConfig,
    diags: &mut Diagnostics,
) -> Option<CompiledColumn> {
    if let Some(error) = member.computed.as_ref().and_then(|c| c.placeholder_error()) {
        diags.error(
            DiagnosticKind::Validation,
            Some(entity),
            format!("member '{}': {error}", member.name),
        );
    }

    let info = storage.column_type_info(entity, member, converters, config, diags)?;
    let host_type = member.value_type.clone()?;
    let default_sql = default_expression(entity, member, &info, diags);

    Some(CompiledColumn {
        name: member.column_name.clone(),
        member: member.name.clone(),
        type_spec: info.type_spec,
        storage_type: info.descriptor.name.clone(),
        db_type: info.descriptor.db_type,
        host_type,
        nullable: info.nullable,
        size: info.size,
        precision: info.precision,
        scale: info.scale,
        primary_key: member.flags.primary_key,
        foreign_key: member.flags.foreign_key,
        identity: member.flags.identity,
        row_version: member.flags.row_version,
        no_insert: member.flags.no_insert,
        no_update: member.flags.no_update,
        default_sql,
        computed: member.computed.clone(),
        converter: info.converter,
    })
}

/// Initializer for a non-nullable written column: the explicit default, else
/// the storage type's, else the storage literal of the host type's zero value.
fn default_expression(
    entity: &str,
    member: &MemberInfo,
    info: &ColumnTypeInfo,
    diags: &mut Diagnostics,
) -> Option<String> {
    let generated = member.flags.identity || member.flags.row_version || member.computed.is_some();
    if member.nullable || generated {
        return None;
    }
    if let Some(sql) = &member.default_sql {
        return Some(sql.clone());
    }
    if let Some(sql) = &info.descriptor.default_init {
        return Some(sql.clone());
    }

    let zero = member.value_type.as_ref()?.zero_value();
    let stored: Result<Value, _> = match &info.converter {
        Some(c) => c.to_storage(&zero),
        None => Ok(zero),
    };
    match stored {
        Ok(value) => Some(info.descriptor.format_literal(&value)),
        Err(e) => {
            diags.error(
                DiagnosticKind::TypeMapping,
                Some(entity),
                format!("member '{}': no default literal: {e}", member.name),
            );
            None
        }
    }
}

/// Derive insertable and updatable column lists.
pub(crate) fn complete_tables_setup(tables: &mut [CompiledTable]) {
    for table in tables {
        table.insert_columns = table
            .columns
            .iter()
            .filter(|c| !c.no_insert)
            .map(|c| c.name.clone())
            .collect();
        table.update_columns = table
            .columns
            .iter()
            .filter(|c| !c.no_update)
            .map(|c| c.name.clone())
            .collect();
    }
}
