//! Row normalization
//!
//! Turns a raw definition sheet into validated [`DefinitionRow`]s: the column
//! count and header order are checked against a [`Layout`], rows without a
//! name are dropped, and every remaining row is extracted field by field.

mod extract;
pub mod layout;
mod sanitize;
pub mod validation;

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{SheetSchemaError, SheetValidationError};
use crate::model::DefinitionRow;
use crate::source::RawSheet;

pub use extract::RowWarning;
pub use layout::{Field, Layout};
pub use sanitize::sanitize_identifier;
pub use validation::{validate_column_order, ColumnOrderViolation};

use extract::{extract_row, RowReader};

/// Options for normalizing definition sheets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub layout: Layout,
    /// Validate the sheet's own header text instead of renaming by position
    pub strict_headers: bool,
}

/// A definition sheet that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSheet {
    pub sheet_name: String,
    /// Surviving rows in source order
    pub rows: Vec<DefinitionRow>,
    pub warnings: Vec<RowWarning>,
    /// Data rows in the raw sheet before filtering
    pub source_row_count: usize,
}

/// Validate and normalize one raw sheet
pub fn normalize(
    sheet: &RawSheet,
    options: &NormalizeOptions,
) -> Result<NormalizedSheet, SheetValidationError> {
    let layout = options.layout;
    let expected = layout.raw_headers();

    if sheet.width() != layout.width() {
        return Err(SheetValidationError::ColumnCount {
            expected: layout.width(),
            actual: sheet.width(),
        });
    }

    // Without strict headers the sheet's columns are renamed to the template
    // by position, so only the raw header text can disagree with it.
    let headers: Vec<String> = if options.strict_headers {
        sheet.headers.clone()
    } else {
        expected.iter().map(|h| h.to_string()).collect()
    };
    let violations = validate_column_order(&headers, &expected);
    if !violations.is_empty() {
        return Err(SheetValidationError::ColumnOrder(violations));
    }

    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for raw_row in &sheet.rows {
        let reader = RowReader::new(layout, raw_row);
        if !reader.has_name() {
            continue;
        }
        let Some(row) = extract_row(&sheet.name, &reader, &mut warnings) else {
            continue;
        };
        if !seen.insert(row.column.name.to_ascii_lowercase()) {
            let message = format!("duplicate column '{}' dropped", row.column.name);
            warn!(sheet = %sheet.name, row = row.source_row, "{}", message);
            warnings.push(RowWarning {
                row: row.source_row,
                message,
            });
            continue;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(SheetValidationError::NoRows);
    }

    info!(
        sheet = %sheet.name,
        columns = rows.len(),
        source_rows = sheet.rows.len(),
        "Sheet normalized"
    );

    Ok(NormalizedSheet {
        sheet_name: sheet.name.clone(),
        rows,
        warnings,
        source_row_count: sheet.rows.len(),
    })
}

/// A selected sheet that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSheet {
    pub sheet_name: String,
    pub error: SheetValidationError,
}

/// Outcome of normalizing every selected sheet of a workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookNormalization {
    pub sheets: Vec<NormalizedSheet>,
    pub rejected: Vec<RejectedSheet>,
    /// Selection entries that matched no sheet
    pub unmatched: Vec<String>,
}

/// Pick sheets by exact name or glob pattern, in selection order.
///
/// An empty selection picks every sheet in workbook order. A sheet matched
/// by several entries is returned once.
pub fn select_sheets<'a>(
    sheets: &'a [RawSheet],
    selection: &[String],
) -> (Vec<&'a RawSheet>, Vec<String>) {
    if selection.is_empty() {
        return (sheets.iter().collect(), Vec::new());
    }

    let mut picked: Vec<&RawSheet> = Vec::new();
    let mut unmatched = Vec::new();

    for entry in selection {
        let pattern = glob::Pattern::new(entry).ok();
        let matches: Vec<&RawSheet> = sheets
            .iter()
            .filter(|sheet| {
                sheet.name == *entry || pattern.as_ref().is_some_and(|p| p.matches(&sheet.name))
            })
            .collect();

        if matches.is_empty() {
            unmatched.push(entry.clone());
        }
        for sheet in matches {
            if !picked.iter().any(|p| p.name == sheet.name) {
                picked.push(sheet);
            }
        }
    }

    (picked, unmatched)
}

/// Normalize every selected sheet, skipping the ones that fail validation.
///
/// Fails only when no selected sheet validates.
pub fn normalize_workbook(
    source_name: &str,
    sheets: &[RawSheet],
    selection: &[String],
    options: &NormalizeOptions,
) -> Result<WorkbookNormalization, SheetSchemaError> {
    let (selected, unmatched) = select_sheets(sheets, selection);
    for entry in &unmatched {
        warn!(selection = %entry, "Selected sheet not found in workbook");
    }

    let mut result = WorkbookNormalization {
        unmatched,
        ..WorkbookNormalization::default()
    };

    for sheet in selected {
        match normalize(sheet, options) {
            Ok(normalized) => result.sheets.push(normalized),
            Err(error) => {
                warn!(sheet = %sheet.name, "Skipping sheet: {}", error);
                result.rejected.push(RejectedSheet {
                    sheet_name: sheet.name.clone(),
                    error,
                });
            }
        }
    }

    if result.sheets.is_empty() {
        return Err(SheetSchemaError::NoValidSheets {
            source_name: source_name.to_string(),
        });
    }
    Ok(result)
}
