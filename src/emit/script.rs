//! Script mode output

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::ddl::{
    create_table_statement, drop_table_statement, extended_property_statements, insert_statement,
    qualified_name, quote_identifier,
};
use super::literal::sql_literal;
use super::{EmitOptions, ForeignKeyPolicy};
use crate::error::SheetSchemaError;
use crate::model::{ColumnSpec, DataRows, TableInfo};
use crate::util::file_safe_name;

const BATCH_SEPARATOR: &str = "GO";

fn comment(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the T-SQL script for one table.
///
/// Pure and deterministic: the same inputs always give the same text.
/// Statements are separated by `GO` batches.
pub fn generate_script(
    table_name: &str,
    columns: &[ColumnSpec],
    table_info: &TableInfo,
    data: Option<&DataRows>,
    options: &EmitOptions,
) -> String {
    let qualified = qualified_name(&options.schema, table_name);
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("-- Table: {}", qualified));
    if !table_info.description.trim().is_empty() {
        lines.push(format!("-- Description: {}", comment(&table_info.description)));
    }
    if !table_info.note.trim().is_empty() {
        lines.push(format!("-- Note: {}", comment(&table_info.note)));
    }
    for column in columns {
        if let Some(note) = column.note.as_deref() {
            lines.push(format!(
                "-- Column {}: {}",
                quote_identifier(&column.name),
                comment(note)
            ));
        }
    }
    lines.push(String::new());

    lines.push(format!("{};", drop_table_statement(table_name, options)));
    lines.push(BATCH_SEPARATOR.to_string());
    lines.push(String::new());

    if options.foreign_keys == ForeignKeyPolicy::Omit {
        for column in &table_info.foreign_keys {
            lines.push(format!(
                "-- FK column {} has no referenced table; constraint omitted",
                quote_identifier(column)
            ));
        }
    }
    lines.push(format!(
        "{};",
        create_table_statement(table_name, columns, table_info, options)
    ));
    lines.push(BATCH_SEPARATOR.to_string());
    lines.push(String::new());

    let properties = extended_property_statements(table_name, columns, table_info, options);
    if !properties.is_empty() {
        lines.extend(properties.into_iter().map(|p| format!("{};", p)));
        lines.push(BATCH_SEPARATOR.to_string());
        lines.push(String::new());
    }

    if let Some(data) = data.filter(|d| options.include_data && !d.is_empty()) {
        lines.push(format!("-- Data: {}", qualified));
        for row in &data.rows {
            let values: Vec<String> = row.iter().map(sql_literal).collect();
            lines.push(format!(
                "{};",
                insert_statement(table_name, &data.columns, &values, options)
            ));
        }
        lines.push(BATCH_SEPARATOR.to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Where generated scripts go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutput {
    /// All tables in one file
    File(PathBuf),
    /// One `<sheet>.sql` per table
    Directory(PathBuf),
    Stdout,
}

/// Writes generated scripts with a provenance header
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    output: ScriptOutput,
    source_name: String,
}

impl ScriptWriter {
    pub fn new(output: ScriptOutput, source_name: impl Into<String>) -> Self {
        Self {
            output,
            source_name: source_name.into(),
        }
    }

    fn header(&self) -> String {
        format!(
            "-- Generated by {} {} from {}\n-- {}\n\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.source_name,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    }

    /// Write `(sheet name, script)` pairs, returning the files created
    pub fn write(&self, scripts: &[(String, String)]) -> Result<Vec<PathBuf>, SheetSchemaError> {
        match &self.output {
            ScriptOutput::File(path) => {
                let mut content = self.header();
                content.push_str(
                    &scripts
                        .iter()
                        .map(|(_, script)| script.as_str())
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                write_file(path, &content)?;
                Ok(vec![path.clone()])
            }
            ScriptOutput::Directory(dir) => {
                fs::create_dir_all(dir).map_err(|source| SheetSchemaError::ScriptWrite {
                    path: dir.clone(),
                    source,
                })?;
                let mut written = Vec::with_capacity(scripts.len());
                for (sheet, script) in scripts {
                    let path = dir.join(format!("{}.sql", file_safe_name(sheet)));
                    write_file(&path, &format!("{}{}", self.header(), script))?;
                    written.push(path);
                }
                Ok(written)
            }
            ScriptOutput::Stdout => {
                let mut out = io::stdout().lock();
                let body = scripts
                    .iter()
                    .map(|(_, script)| script.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                write!(out, "{}{}", self.header(), body)
                    .and_then(|_| out.flush())
                    .map_err(|source| SheetSchemaError::ScriptWrite {
                        path: PathBuf::from("-"),
                        source,
                    })?;
                Ok(Vec::new())
            }
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), SheetSchemaError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SheetSchemaError::ScriptWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| SheetSchemaError::ScriptWrite {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = content.len(), "Script written");
    Ok(())
}
