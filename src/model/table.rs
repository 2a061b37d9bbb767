//! Table-level metadata extraction

use tracing::{debug, warn};

use super::{ColumnSpec, KeyRole};

/// Table metadata cells carried by every definition row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCells {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
}

/// A normalized sheet row: one column plus the table cells it carries
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionRow {
    /// 1-based worksheet row the column came from
    pub source_row: usize,
    pub column: ColumnSpec,
    pub table: TableCells,
}

/// Table-level metadata for one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableInfo {
    /// Short identifier used in generated constraint names
    pub code: String,
    pub name: String,
    pub description: String,
    pub note: String,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<String>,
}

/// Collect table metadata and key columns from normalized rows.
///
/// The first row carrying both a table name and a table code seeds the name,
/// code, description and note. Key lists come from every row, in row order.
pub fn extract_table_info(rows: &[DefinitionRow]) -> TableInfo {
    let seed = rows
        .iter()
        .find(|row| row.table.name.is_some() && row.table.code.is_some());

    let mut info = match seed {
        Some(row) => TableInfo {
            code: row.table.code.clone().unwrap_or_default(),
            name: row.table.name.clone().unwrap_or_default(),
            description: row.table.description.clone().unwrap_or_default(),
            note: row.table.note.clone().unwrap_or_default(),
            ..TableInfo::default()
        },
        None => {
            warn!("No row carries both a table name and a table code; sheet name will be used");
            TableInfo::default()
        }
    };

    info.primary_keys = names_with_role(rows, KeyRole::PrimaryKey);
    info.foreign_keys = names_with_role(rows, KeyRole::ForeignKey);

    debug!(
        table = %info.name,
        code = %info.code,
        primary_keys = ?info.primary_keys,
        foreign_keys = ?info.foreign_keys,
        "Extracted table info"
    );
    info
}

fn names_with_role(rows: &[DefinitionRow], role: KeyRole) -> Vec<String> {
    rows.iter()
        .filter(|row| row.column.key_role == role)
        .map(|row| row.column.name.clone())
        .collect()
}

/// The table name to emit: the metadata name, else the sheet name with
/// spaces replaced by underscores. May be empty; callers reject that.
pub fn resolve_table_name(info: &TableInfo, sheet_name: &str) -> String {
    let name = info.name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    sheet_name.trim().replace(' ', "_")
}
