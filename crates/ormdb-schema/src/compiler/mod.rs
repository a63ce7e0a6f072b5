//! Relational schema compiler.
//!
//! Runs the whole pipeline over a model declaration:
//!
//! 1. Build the entity model
//! 2. Expand keys to columns
//! 3. Compute delete order
//! 4. Build tables, resolving column types, converters and defaults
//! 5. Create keys and foreign key support indexes
//! 6. Build foreign key constraints
//! 7. Name keys and constraints
//! 8. Derive insert and update column lists
//!
//! Every problem is collected into one [`Diagnostics`] log. The run stops
//! after model construction, key expansion and table building if any error
//! has been recorded, so later stages never see a broken model. A failed run
//! returns the full log and no schema.

mod keys;
mod naming;
mod schema;
mod tables;

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::context::CompilationContext;
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::expand::expand_keys;
use crate::graph;
use crate::model::{EntityModel, ModelDecl};

pub use naming::{foreign_key_name, key_name, truncate};
pub use schema::{
    ColumnSnapshot, CompiledColumn, CompiledForeignKey, CompiledKey, CompiledSchema, CompiledTable,
    ForeignKeySnapshot, KeyColumn, KeySnapshot, SchemaSnapshot, TableSnapshot,
};

fn gate(diags: &mut Diagnostics, stage: &str) -> Result<(), Error> {
    if diags.has_errors() {
        debug!(stage, errors = diags.error_count(), "Compilation stopped");
        return Err(Error::Compilation(std::mem::take(diags)));
    }
    Ok(())
}

/// Compile a model declaration into a relational schema.
#[instrument(skip_all, fields(model = %decl.name))]
pub fn compile(context: &CompilationContext, decl: &ModelDecl) -> Result<CompiledSchema, Error> {
    let start = Instant::now();
    let config = context.config();
    let mut diags = Diagnostics::new();

    let mut model = EntityModel::build(decl, config, &mut diags);
    gate(&mut diags, "model")?;

    expand_keys(&mut model, &mut diags);
    gate(&mut diags, "expand")?;

    graph::analyze(&mut model);

    let mut set = tables::build_tables(
        &model,
        context.storage_types(),
        context.converters(),
        config,
        &mut diags,
    );
    gate(&mut diags, "tables")?;

    let indexes = keys::create_table_keys(&model, &mut set, config, &mut diags);
    let constraints = keys::build_ref_constraints(&model, &mut set, config);
    debug!(indexes, constraints, "Keys and constraints created");

    naming::finalize_object_names(&mut set.tables, config.driver.max_identifier_length, &mut diags);
    tables::complete_tables_setup(&mut set.tables);
    gate(&mut diags, "finalize")?;

    let schema = CompiledSchema {
        name: decl.name.clone(),
        version: decl.version,
        tables: set.tables,
        warnings: diags,
    };
    info!(
        tables = schema.tables().len(),
        columns = schema.column_count(),
        constraints = schema.foreign_key_count(),
        duration_us = start.elapsed().as_micros() as u64,
        "Schema compiled"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompilerConfig, DriverProfile};
    use crate::diagnostics::DiagnosticKind;
    use crate::model::{ComputedColumn, EntityDecl, KeyDecl, KeyType, MemberDecl};
    use ormdb_types::{EnumType, ScalarType, Value, ValueType};

    fn format_enum() -> EnumType {
        EnumType::new("Format", &["Hardcover", "Paperback"])
    }

    fn context() -> CompilationContext {
        CompilationContext::new(CompilerConfig::default()).unwrap()
    }

    fn publishing() -> ModelDecl {
        ModelDecl::new("publishing")
            .with_entity(
                EntityDecl::new("Publisher")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key().identity())
                    .with_member(MemberDecl::column("Name", ScalarType::String).with_size(200))
                    .with_member(MemberDecl::list("Books", "Book")),
            )
            .with_entity(
                EntityDecl::new("Book")
                    .with_table_name("Books")
                    .with_member(MemberDecl::column("Id", ScalarType::Guid).primary_key())
                    .with_member(MemberDecl::column("Title", ScalarType::String))
                    .with_member(MemberDecl::column("Price", ScalarType::Decimal))
                    .with_member(
                        MemberDecl::column("Format", ValueType::enumeration(format_enum()))
                            .with_default("1"),
                    )
                    .with_member(MemberDecl::column("Stamp", ScalarType::Bytes).row_version())
                    .with_member(MemberDecl::reference("Publisher", "Publisher"))
                    .with_key(KeyDecl::unique(["Title"])),
            )
    }

    #[test]
    fn test_compile_publishing() {
        let schema = compile(&context(), &publishing()).unwrap();

        let books = schema.table("Books").unwrap();
        assert_eq!(books.entity, "Book");
        assert_eq!(books.column("Title").unwrap().type_spec, "nvarchar(50)");
        assert_eq!(books.column("Price").unwrap().type_spec, "decimal(18, 4)");
        assert_eq!(books.column("Publisher_Id").unwrap().type_spec, "int");
        assert_eq!(books.primary_key().unwrap().name, "PK_Books");
        assert_eq!(books.foreign_keys[0].name, "FK_Books_Publisher");
        assert_eq!(books.foreign_keys[0].referenced_columns, vec!["Id"]);

        let names: Vec<&str> = books.indexes().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["IXU_Books_Title", "IX_Books_Publisher_Id"]);
        assert!(books.indexes().nth(1).unwrap().synthesized);
    }

    #[test]
    fn test_column_defaults() {
        let schema = compile(&context(), &publishing()).unwrap();
        let books = schema.table("Books").unwrap();

        assert_eq!(books.column("Title").unwrap().default_sql.as_deref(), Some("''"));
        assert_eq!(books.column("Price").unwrap().default_sql.as_deref(), Some("0"));
        assert_eq!(books.column("Format").unwrap().default_sql.as_deref(), Some("1"));
        assert_eq!(books.column("Stamp").unwrap().default_sql, None);

        let publisher = schema.table("Publisher").unwrap();
        assert_eq!(publisher.column("Id").unwrap().default_sql, None);
    }

    #[test]
    fn test_insert_and_update_columns() {
        let schema = compile(&context(), &publishing()).unwrap();

        let publisher = schema.table("Publisher").unwrap();
        assert_eq!(publisher.insert_columns, vec!["Name"]);
        assert_eq!(publisher.update_columns, vec!["Name"]);

        let books = schema.table("Books").unwrap();
        assert!(!books.insert_columns.contains(&"Stamp".to_string()));
        assert!(books.insert_columns.contains(&"Id".to_string()));
        assert!(!books.update_columns.contains(&"Id".to_string()));
        assert!(books.update_columns.contains(&"Publisher_Id".to_string()));
    }

    #[test]
    fn test_enum_column_converter() {
        let schema = compile(&context(), &publishing()).unwrap();
        let converter = schema.converter("Books", "Format").unwrap();
        let paperback = format_enum().value_of("Paperback").unwrap();

        assert_eq!(converter.to_storage(&paperback).unwrap(), Value::Int32(1));
    }

    #[test]
    fn test_computed_placeholder_mismatch() {
        let decl = ModelDecl::new("m").with_entity(
            EntityDecl::new("Order")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(
                    MemberDecl::column("Total", ScalarType::Decimal)
                        .computed(ComputedColumn::expression("(SELECT SUM(Amount) FROM Lines)")),
                )
                .with_member(
                    MemberDecl::column("Tax", ScalarType::Decimal)
                        .computed(ComputedColumn::computed("{table}.Total * 0.2")),
                )
                .with_member(
                    MemberDecl::column("Net", ScalarType::Decimal)
                        .computed(ComputedColumn::expression("{table}.Total - {table}.Tax")),
                ),
        );
        let err = compile(&context(), &decl).unwrap_err();
        let diags = err.diagnostics().unwrap();

        assert_eq!(diags.of_kind(DiagnosticKind::Validation).count(), 3, "{diags}");
    }

    #[test]
    fn test_computed_column_not_written() {
        let decl = ModelDecl::new("m").with_entity(
            EntityDecl::new("Order")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(MemberDecl::column("Total", ScalarType::Decimal))
                .with_member(
                    MemberDecl::column("Tax", ScalarType::Decimal).computed(ComputedColumn::computed("Total * 0.2")),
                ),
        );
        let schema = compile(&context(), &decl).unwrap();
        let order = schema.table("Order").unwrap();

        assert_eq!(order.insert_columns, vec!["Id", "Total"]);
        assert_eq!(order.column("Tax").unwrap().default_sql, None);
    }

    #[test]
    fn test_type_mapping_failure_stops_compilation() {
        let decl = ModelDecl::new("m").with_entity(
            EntityDecl::new("Shape")
                .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                .with_member(MemberDecl::column("Outline", ScalarType::Bytes).with_type_spec("geometry"))
                .with_member(MemberDecl::column("Area", ScalarType::Float64).with_type_spec("polygon")),
        );
        let err = compile(&context(), &decl).unwrap_err();

        assert_eq!(err.diagnostics().unwrap().of_kind(DiagnosticKind::TypeMapping).count(), 2);
    }

    #[test]
    fn test_external_entity_gets_no_table_or_constraint() {
        let decl = ModelDecl::new("m")
            .with_entity(
                EntityDecl::new("User")
                    .external()
                    .with_member(MemberDecl::column("Id", ScalarType::Int64).primary_key()),
            )
            .with_entity(
                EntityDecl::new("Post")
                    .with_member(MemberDecl::column("Id", ScalarType::Int64).primary_key())
                    .with_member(MemberDecl::reference("Author", "User")),
            );
        let schema = compile(&context(), &decl).unwrap();

        assert!(schema.table("User").is_none());
        let post = schema.table("Post").unwrap();
        assert!(post.column("Author_Id").is_some());
        assert!(post.foreign_keys.is_empty());
    }

    #[test]
    fn test_view_has_no_constraints() {
        let decl = ModelDecl::new("m")
            .with_entity(
                EntityDecl::new("Customer").with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key()),
            )
            .with_entity(
                EntityDecl::view("TopCustomer")
                    .with_member(MemberDecl::column("Rank", ScalarType::Int32))
                    .with_member(MemberDecl::reference("Customer", "Customer")),
            );
        let schema = compile(&context(), &decl).unwrap();

        let view = schema.table("TopCustomer").unwrap();
        assert!(view.primary_key().is_none());
        assert!(view.foreign_keys.is_empty());
        assert!(view.column("Customer_Id").is_some());
    }

    #[test]
    fn test_driver_capabilities() {
        let decl = ModelDecl::new("m").with_entity(
            EntityDecl::new("Event")
                .with_member(MemberDecl::column("Id", ScalarType::Int64).primary_key())
                .with_member(MemberDecl::column("At", ScalarType::DateTime))
                .with_member(MemberDecl::column("Kind", ScalarType::Int16))
                .with_key(
                    KeyDecl::index(["At"])
                        .clustered()
                        .with_include(["Kind"])
                        .with_filter("Kind > 0"),
                ),
        );

        let generic = compile(&context(), &decl).unwrap();
        let index = generic.table("Event").unwrap().indexes().next().unwrap().clone();
        assert_eq!(index.key_type, KeyType::INDEX);
        assert!(index.include.is_empty());
        assert_eq!(index.filter, None);
        assert_eq!(generic.warnings().len(), 2);

        let mssql = CompilationContext::new(CompilerConfig::new(DriverProfile::sql_server())).unwrap();
        let schema = compile(&mssql, &decl).unwrap();
        let index = schema.table("Event").unwrap().indexes().next().unwrap().clone();
        assert_eq!(index.name, "IXC_Event_At");
        assert_eq!(index.include, vec!["Kind"]);
        assert_eq!(index.filter.as_deref(), Some("Kind > 0"));
        assert!(schema.warnings().is_empty());
    }

    #[test]
    fn test_foreign_key_index_needs_inverse_list() {
        let decl = ModelDecl::new("m")
            .with_entity(
                EntityDecl::new("Customer").with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key()),
            )
            .with_entity(
                EntityDecl::new("Order")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                    .with_member(MemberDecl::reference("Customer", "Customer")),
            );
        let schema = compile(&context(), &decl).unwrap();

        assert_eq!(schema.table("Order").unwrap().indexes().count(), 0);
    }

    #[test]
    fn test_mysql_skips_foreign_key_indexes() {
        let ctx = CompilationContext::new(CompilerConfig::new(DriverProfile::mysql())).unwrap();
        let schema = compile(&ctx, &publishing()).unwrap();

        let books = schema.table("Books").unwrap();
        assert!(books.indexes().all(|k| !k.synthesized));
    }

    #[test]
    fn test_duplicate_reference_targets_are_renamed() {
        let decl = ModelDecl::new("m")
            .with_entity(
                EntityDecl::new("Account").with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key()),
            )
            .with_entity(
                EntityDecl::new("Transfer")
                    .with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
                    .with_member(MemberDecl::reference("From", "Account"))
                    .with_member(MemberDecl::reference("To", "Account")),
            );
        let schema = compile(&context(), &decl).unwrap();

        let names: Vec<&str> = schema
            .table("Transfer")
            .unwrap()
            .foreign_keys
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["FK_Transfer_Account", "FK_Transfer_Account1"]);
        assert_eq!(schema.warnings().of_kind(DiagnosticKind::NamingCollision).count(), 1);
    }
}
