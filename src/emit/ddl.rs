//! DDL statement builders shared by script and direct-execution output

use sqlparser::ast::Statement;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

use super::literal::n_string;
use super::{EmitOptions, ForeignKeyPolicy, PkNaming};
use crate::error::SheetValidationError;
use crate::mapping::map_type;
use crate::model::{ColumnSpec, TableInfo};

/// Bracket-quote an identifier, doubling any `]`
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[table]`
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// `[name] <type>` for every column, in source order
pub fn column_definitions(columns: &[ColumnSpec]) -> Vec<String> {
    columns
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), map_type(column)))
        .collect()
}

fn column_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name of the primary-key constraint for a table
pub fn primary_key_name(table: &str, info: &TableInfo, naming: PkNaming) -> String {
    match naming {
        PkNaming::TableCode if !info.code.trim().is_empty() => format!("PK_{}", info.code.trim()),
        _ => format!("PK_{}", table),
    }
}

fn constraint_definitions(table: &str, info: &TableInfo, options: &EmitOptions) -> Vec<String> {
    let mut constraints = Vec::new();

    if !info.primary_keys.is_empty() {
        constraints.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote_identifier(&primary_key_name(table, info, options.pk_naming)),
            column_list(&info.primary_keys)
        ));
    }

    if let ForeignKeyPolicy::Placeholder { table: referenced } = &options.foreign_keys {
        for column in &info.foreign_keys {
            let quoted = quote_identifier(column);
            constraints.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_identifier(&format!("FK_{}_{}", table, column)),
                quoted,
                qualified_name(&options.schema, referenced),
                quoted
            ));
        }
    }

    constraints
}

/// `CREATE TABLE` with column definitions and key constraints, no terminator
pub fn create_table_statement(
    table: &str,
    columns: &[ColumnSpec],
    info: &TableInfo,
    options: &EmitOptions,
) -> String {
    let mut lines = column_definitions(columns);
    lines.extend(constraint_definitions(table, info, options));

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualified_name(&options.schema, table),
        lines.join(",\n    ")
    )
}

pub fn drop_table_statement(table: &str, options: &EmitOptions) -> String {
    format!(
        "DROP TABLE IF EXISTS {}",
        qualified_name(&options.schema, table)
    )
}

/// `INSERT INTO ... VALUES (...)` with pre-rendered values.
///
/// Values are literals in script mode and placeholders for direct execution.
pub fn insert_statement(
    table: &str,
    columns: &[String],
    values: &[String],
    options: &EmitOptions,
) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_name(&options.schema, table),
        column_list(columns),
        values.join(", ")
    )
}

fn description_property(schema: &str, table: &str, column: Option<&str>, value: &str) -> String {
    let mut sql = format!(
        "EXEC sp_addextendedproperty @name = N'MS_Description', @value = {}, \
         @level0type = N'SCHEMA', @level0name = {}, \
         @level1type = N'TABLE', @level1name = {}",
        n_string(value),
        n_string(schema),
        n_string(table)
    );
    if let Some(column) = column {
        sql.push_str(&format!(
            ", @level2type = N'COLUMN', @level2name = {}",
            n_string(column)
        ));
    }
    sql
}

/// `MS_Description` properties for the table and each described column
pub fn extended_property_statements(
    table: &str,
    columns: &[ColumnSpec],
    info: &TableInfo,
    options: &EmitOptions,
) -> Vec<String> {
    let mut statements = Vec::new();

    if !info.description.trim().is_empty() {
        statements.push(description_property(
            &options.schema,
            table,
            None,
            info.description.trim(),
        ));
    }

    for column in columns {
        if let Some(description) = column.description.as_deref().filter(|d| !d.is_empty()) {
            statements.push(description_property(
                &options.schema,
                table,
                Some(&column.name),
                description,
            ));
        }
    }

    statements
}

/// Parse a generated `CREATE TABLE` with the SQL Server dialect
pub fn verify_create_table(sql: &str) -> Result<(), SheetValidationError> {
    let statements =
        Parser::parse_sql(&MsSqlDialect {}, sql).map_err(|e| SheetValidationError::InvalidDdl {
            message: e.to_string(),
        })?;

    match statements.as_slice() {
        [Statement::CreateTable(_)] => Ok(()),
        other => Err(SheetValidationError::InvalidDdl {
            message: format!(
                "expected a single CREATE TABLE statement, found {} statement(s)",
                other.len()
            ),
        }),
    }
}
