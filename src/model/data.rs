//! Data rows loaded into a generated table

use tracing::warn;

use super::ColumnSpec;
use crate::normalize::sanitize_identifier;
use crate::source::{CellValue, RawSheet};

/// Rows projected onto a table's column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DataRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Project a data sheet onto `columns`.
    ///
    /// Headers are sanitized and matched case-insensitively to column names.
    /// Columns without a matching header load as NULL. Rows whose projected
    /// cells are all empty are skipped. Returns the rows plus one warning per
    /// header that matched no column.
    pub fn from_sheet(sheet: &RawSheet, columns: &[ColumnSpec]) -> (Self, Vec<String>) {
        let headers: Vec<String> = sheet
            .headers
            .iter()
            .map(|h| sanitize_identifier(h))
            .collect();

        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| !h.is_empty() && h.eq_ignore_ascii_case(&column.name))
            })
            .collect();

        let mut warnings = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            if header.is_empty() || positions.contains(&Some(index)) {
                continue;
            }
            let message = format!(
                "data sheet '{}' header '{}' matches no column and is ignored",
                sheet.name, sheet.headers[index]
            );
            warn!(sheet = %sheet.name, header = %sheet.headers[index], "Unmatched data header");
            warnings.push(message);
        }

        let rows = sheet
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| row.cells.get(i))
                            .cloned()
                            .unwrap_or(CellValue::Empty)
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
            .collect();

        let names = columns.iter().map(|c| c.name.clone()).collect();
        (DataRows::new(names, rows), warnings)
    }
}
