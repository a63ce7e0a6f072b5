//! Deterministic object names for keys and constraints.
//!
//! Primary keys are `PK_<table>`, foreign keys `FK_<table>_<target>`, indexes
//! `IX[C][U]_<table>_<columns>`. Names are cut to the provider's identifier
//! limit; a name already used within the table gets a numeric suffix, with the
//! base shortened so the suffixed name still fits.

use std::collections::HashSet;

use tracing::warn;

use super::schema::{CompiledKey, CompiledTable};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Generated name of a key.
pub fn key_name(table: &str, key: &CompiledKey) -> String {
    if key.key_type.is_primary_key() {
        return format!("PK_{table}");
    }
    let mut prefix = String::from("IX");
    if key.key_type.is_clustered() {
        prefix.push('C');
    }
    if key.key_type.is_unique() {
        prefix.push('U');
    }
    format!("{prefix}_{table}_{}", key.column_names().join("_"))
}

/// Generated name of a foreign key.
pub fn foreign_key_name(table: &str, target: &str) -> String {
    format!("FK_{table}_{target}")
}

/// Cut a name to at most `max` characters.
pub fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// Assigns names within one table.
struct TableNamer<'a> {
    table: &'a str,
    max: usize,
    used: HashSet<String>,
    diags: &'a mut Diagnostics,
    entity: &'a str,
}

impl TableNamer<'_> {
    fn assign(&mut self, candidate: &str) -> String {
        let base = truncate(candidate, self.max);
        if self.used.insert(base.to_lowercase()) {
            return base;
        }

        let mut n = 1usize;
        let name = loop {
            let suffix = n.to_string();
            let room = self.max.saturating_sub(suffix.len());
            let name = format!("{}{suffix}", truncate(&base, room));
            if self.used.insert(name.to_lowercase()) {
                break name;
            }
            n += 1;
        };

        warn!(table = self.table, name = %base, resolved = %name, "Object name collision resolved");
        self.diags.warning(
            DiagnosticKind::NamingCollision,
            Some(self.entity),
            format!("name '{base}' already used in table '{}', renamed to '{name}'", self.table),
        );
        name
    }
}

/// Name every key and foreign key of every table.
///
/// Explicit key names are kept unless they collide. Within a table the
/// primary key is named first, then other keys in order, then foreign keys.
pub fn finalize_object_names(tables: &mut [CompiledTable], max_identifier_length: usize, diags: &mut Diagnostics) {
    for table in tables.iter_mut() {
        let CompiledTable {
            name,
            entity,
            keys,
            foreign_keys,
            ..
        } = table;
        let mut namer = TableNamer {
            table: name.as_str(),
            max: max_identifier_length,
            used: HashSet::new(),
            diags: &mut *diags,
            entity: entity.as_str(),
        };

        keys.sort_by_key(|k| !k.key_type.is_primary_key());
        for key in keys.iter_mut() {
            let candidate = if key.explicit_name {
                key.name.clone()
            } else {
                key_name(namer.table, key)
            };
            key.name = namer.assign(&candidate);
        }
        for fk in foreign_keys.iter_mut() {
            let candidate = foreign_key_name(namer.table, &fk.referenced_table);
            fk.name = namer.assign(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::schema::{CompiledForeignKey, KeyColumn};
    use crate::model::{EntityKind, KeyType};

    fn key(key_type: KeyType, columns: &[&str]) -> CompiledKey {
        CompiledKey {
            name: String::new(),
            key_type,
            columns: columns
                .iter()
                .map(|c| KeyColumn {
                    column: (*c).to_string(),
                    desc: false,
                })
                .collect(),
            include: Vec::new(),
            filter: None,
            synthesized: false,
            explicit_name: false,
        }
    }

    fn fk(target: &str) -> CompiledForeignKey {
        CompiledForeignKey {
            name: String::new(),
            member: target.to_string(),
            columns: vec![format!("{target}_Id")],
            referenced_table: target.to_string(),
            referenced_columns: vec!["Id".to_string()],
            cascade_delete: false,
        }
    }

    fn table(name: &str, keys: Vec<CompiledKey>, foreign_keys: Vec<CompiledForeignKey>) -> CompiledTable {
        CompiledTable {
            name: name.to_string(),
            entity: name.to_string(),
            kind: EntityKind::Table,
            columns: Vec::new(),
            keys,
            foreign_keys,
            delete_order: 0,
            non_trivial_group: false,
            has_identity: false,
            references_identity: false,
            insert_columns: Vec::new(),
            update_columns: Vec::new(),
        }
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name("Book", &key(KeyType::PRIMARY_KEY, &["Id"])), "PK_Book");
        assert_eq!(key_name("Book", &key(KeyType::INDEX, &["Title", "Year"])), "IX_Book_Title_Year");
        assert_eq!(key_name("Book", &key(KeyType::UNIQUE_INDEX, &["Isbn"])), "IXU_Book_Isbn");
        assert_eq!(
            key_name("Book", &key(KeyType::CLUSTERED_INDEX | KeyType::UNIQUE, &["Isbn"])),
            "IXCU_Book_Isbn"
        );
        assert_eq!(foreign_key_name("Book", "Publisher"), "FK_Book_Publisher");
    }

    #[test]
    fn test_collisions_get_suffix() {
        let mut tables = vec![table(
            "Order",
            vec![key(KeyType::INDEX, &["Customer_Id"]), key(KeyType::PRIMARY_KEY, &["Id"])],
            vec![fk("Customer"), fk("Customer"), fk("Customer")],
        )];
        let mut diags = Diagnostics::new();
        finalize_object_names(&mut tables, 128, &mut diags);

        let t = &tables[0];
        assert_eq!(t.keys[0].name, "PK_Order");
        assert_eq!(t.keys[1].name, "IX_Order_Customer_Id");
        let fks: Vec<&str> = t.foreign_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fks, vec!["FK_Order_Customer", "FK_Order_Customer1", "FK_Order_Customer2"]);
        assert_eq!(diags.of_kind(DiagnosticKind::NamingCollision).count(), 2);
        assert!(!diags.has_errors());
    }

    #[test]
    fn test_truncation_keeps_suffix_within_limit() {
        let mut tables = vec![table(
            "Invoice",
            vec![
                key(KeyType::INDEX, &["CustomerReference", "A"]),
                key(KeyType::INDEX, &["CustomerReference", "B"]),
            ],
            Vec::new(),
        )];
        let mut diags = Diagnostics::new();
        finalize_object_names(&mut tables, 16, &mut diags);

        let names: Vec<&str> = tables[0].keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["IX_Invoice_Custo", "IX_Invoice_Cust1"]);
        assert!(names.iter().all(|n| n.len() <= 16));
    }

    #[test]
    fn test_explicit_name_kept() {
        let mut named = key(KeyType::UNIQUE_INDEX, &["Isbn"]);
        named.name = "UQ_Isbn".to_string();
        named.explicit_name = true;
        let mut tables = vec![table("Book", vec![named], Vec::new())];
        let mut diags = Diagnostics::new();
        finalize_object_names(&mut tables, 128, &mut diags);

        assert_eq!(tables[0].keys[0].name, "UQ_Isbn");
        assert!(diags.is_empty());
    }
}
