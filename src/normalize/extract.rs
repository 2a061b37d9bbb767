//! Field-by-field extraction of definition rows

use std::fmt;

use tracing::{debug, warn};

use super::layout::{Field, Layout};
use super::sanitize::sanitize_identifier;
use crate::model::{nullable_from_marker, ColumnSpec, DefinitionRow, KeyRole, TableCells};
use crate::source::{CellValue, RawRow};

/// A problem with one worksheet row. The row may still have been kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// 1-based worksheet row
    pub row: usize,
    pub message: String,
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Reads canonical fields out of a raw row for one layout
pub(crate) struct RowReader<'a> {
    layout: Layout,
    row: &'a RawRow,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(layout: Layout, row: &'a RawRow) -> Self {
        Self { layout, row }
    }

    fn cell(&self, field: Field) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.layout
            .position(field)
            .and_then(|pos| self.row.cells.get(pos))
            .unwrap_or(&EMPTY)
    }

    fn text(&self, field: Field) -> Option<String> {
        self.cell(field).as_text()
    }

    pub(crate) fn has_name(&self) -> bool {
        !self.cell(Field::Name).is_empty()
    }
}

/// Build a [`DefinitionRow`] from one raw row.
///
/// Returns `None` (plus a warning) when the name sanitizes to nothing.
/// Unparseable numbers are warned about and defaulted. Primary-key columns
/// are always `NOT NULL`.
pub(crate) fn extract_row(
    sheet_name: &str,
    reader: &RowReader<'_>,
    warnings: &mut Vec<RowWarning>,
) -> Option<DefinitionRow> {
    let row_number = reader.row.number;
    let mut push = |message: String| {
        warn!(sheet = %sheet_name, row = row_number, "{}", message);
        warnings.push(RowWarning {
            row: row_number,
            message,
        });
    };

    let raw_name = reader.text(Field::Name).unwrap_or_default();
    let name = sanitize_identifier(&raw_name);
    if name.is_empty() {
        push(format!(
            "column name '{}' has no identifier characters; row dropped",
            raw_name
        ));
        return None;
    }

    // Unknown or missing types are reported by the type mapper
    let raw_type = reader
        .text(Field::Type)
        .map(|t| t.to_lowercase())
        .unwrap_or_default();

    let length = match reader.cell(Field::Len) {
        cell if cell.is_empty() => None,
        cell => match cell.as_integer() {
            Some(n) => Some(n),
            None => {
                push(format!(
                    "column '{}' length '{}' is not an integer; ignored",
                    name, cell
                ));
                None
            }
        },
    };

    let decimal_places = match reader.cell(Field::Dec) {
        cell if cell.is_empty() => None,
        cell => match cell.as_integer().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                push(format!(
                    "column '{}' decimal places '{}' is not a non-negative integer; ignored",
                    name, cell
                ));
                None
            }
        },
    };

    let key_marker = reader.text(Field::Key);
    let key_role = KeyRole::from_marker(key_marker.as_deref());
    if key_role == KeyRole::None {
        if let Some(marker) = &key_marker {
            debug!(sheet = %sheet_name, row = row_number, marker = %marker, "Ignoring key marker");
        }
    }

    let mut nullable = nullable_from_marker(reader.text(Field::Nul).as_deref());
    if key_role == KeyRole::PrimaryKey && nullable {
        push(format!(
            "primary key column '{}' is marked nullable; NOT NULL will be used",
            name
        ));
        nullable = false;
    }

    let column = ColumnSpec {
        name,
        raw_type,
        length,
        decimal_places,
        nullable,
        key_role,
        default_value: reader.text(Field::Def),
        description: reader.text(Field::Desc),
        note: reader.text(Field::Note),
    };

    let table = TableCells {
        code: reader.text(Field::TableCode),
        name: reader.text(Field::TableName),
        description: reader.text(Field::TableDesc),
        note: reader.text(Field::TableNote),
    };

    Some(DefinitionRow {
        source_row: row_number,
        column,
        table,
    })
}
