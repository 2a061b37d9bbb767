//! Definition sheet normalization tests

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use rust_sheetschema::model::{KeyRole, TableCells};
use rust_sheetschema::normalize::{
    normalize, normalize_workbook, sanitize_identifier, select_sheets, ColumnOrderViolation, Layout,
    NormalizeOptions,
};
use rust_sheetschema::{CellValue, RawSheet, SheetSchemaError, SheetValidationError};

use crate::common::{customer_defs, definition_grid, definition_sheet, Def};

fn full() -> NormalizeOptions {
    NormalizeOptions::default()
}

fn names(sheet: &rust_sheetschema::normalize::NormalizedSheet) -> Vec<&str> {
    sheet.rows.iter().map(|r| r.column.name.as_str()).collect()
}

#[test]
fn test_full_layout_extracts_every_field() {
    let sheet = definition_sheet("Customer", Layout::Full, &customer_defs());
    let normalized = normalize(&sheet, &full()).unwrap();

    assert_eq!(
        names(&normalized),
        vec!["CustomerId", "Name", "Email", "Balance", "Active"]
    );
    let id = &normalized.rows[0];
    assert_eq!(id.source_row, 2);
    assert_eq!(id.column.key_role, KeyRole::PrimaryKey);
    assert!(!id.column.nullable);
    assert_eq!(id.column.description.as_deref(), Some("Surrogate key"));
    assert_eq!(id.table.code.as_deref(), Some("CUS"));
    assert_eq!(id.table.name.as_deref(), Some("Customer"));

    let balance = &normalized.rows[3].column;
    assert_eq!(balance.raw_type, "decimal");
    assert_eq!(balance.length, Some(12));
    assert_eq!(balance.decimal_places, Some(2));
    assert_eq!(balance.default_value.as_deref(), Some("0"));
    assert!(normalized.warnings.is_empty());
}

#[test]
fn test_compact_layout_has_no_table_cells() {
    let defs = [Def::column("Id", "int").pk(), Def::column("Label", "nvarchar").len("20")];
    let sheet = definition_sheet("Lookup", Layout::Compact, &defs);
    let options = NormalizeOptions {
        layout: Layout::Compact,
        strict_headers: false,
    };

    let normalized = normalize(&sheet, &options).unwrap();
    assert_eq!(names(&normalized), vec!["Id", "Label"]);
    assert_eq!(normalized.rows[0].table, TableCells::default());
}

#[test]
fn test_wrong_column_count_rejects_sheet() {
    let sheet = definition_sheet("Lookup", Layout::Compact, &customer_defs());
    let err = normalize(&sheet, &full()).unwrap_err();
    assert_eq!(
        err,
        SheetValidationError::ColumnCount {
            expected: 16,
            actual: 8
        }
    );
}

#[test]
fn test_strict_headers_reports_misordered_columns() {
    let mut grid = definition_grid(Layout::Full, &customer_defs());
    grid[0].swap(4, 5);
    let sheet = RawSheet::from_grid("Customer", grid);

    // Renamed by position, so the header text does not matter
    assert!(normalize(&sheet, &full()).is_ok());

    let strict = NormalizeOptions {
        strict_headers: true,
        ..full()
    };
    match normalize(&sheet, &strict).unwrap_err() {
        SheetValidationError::ColumnOrder(violations) => {
            assert_eq!(
                violations[0],
                ColumnOrderViolation::Misordered {
                    index: 4,
                    expected: "Nul".to_string(),
                    actual: "Type".to_string()
                }
            );
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_row_problems_become_warnings() {
    let defs = [
        Def::column("Id", "int").pk(),
        Def::column("Id", "int"),
        Def::column("$$$", "int"),
        Def::column("Amount", "decimal").len("abc"),
        Def::column("Blob", "geometry"),
    ];
    let sheet = definition_sheet("T", Layout::Full, &defs);
    let normalized = normalize(&sheet, &full()).unwrap();

    assert_eq!(names(&normalized), vec!["Id", "Amount", "Blob"]);
    let rows: Vec<usize> = normalized.warnings.iter().map(|w| w.row).collect();
    // Nullable key, duplicate, no identifier, bad length. Unknown types are
    // reported by the mapper.
    assert_eq!(rows, vec![2, 3, 4, 5]);
    assert!(!normalized.rows[0].column.nullable);
    assert_eq!(normalized.rows[1].column.length, None);
    assert_eq!(normalized.rows[2].column.raw_type, "geometry");
}

#[test]
fn test_sheet_without_named_rows_is_rejected() {
    let defs = [Def::column("", "int"), Def::column("", "nvarchar")];
    let sheet = definition_sheet("Empty", Layout::Full, &defs);
    assert_eq!(
        normalize(&sheet, &full()).unwrap_err(),
        SheetValidationError::NoRows
    );
}

#[test]
fn test_workbook_skips_invalid_sheets() {
    let good = definition_sheet("Customer", Layout::Full, &customer_defs());
    let bad = RawSheet::from_grid("Notes", vec![vec![CellValue::text("Remarks")]]);
    let sheets = vec![bad, good];

    let result = normalize_workbook("book.xlsx", &sheets, &[], &full()).unwrap();
    assert_eq!(result.sheets.len(), 1);
    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.rejected[0].sheet_name, "Notes");

    let err = normalize_workbook("book.xlsx", &sheets[..1], &[], &full()).unwrap_err();
    assert!(matches!(err, SheetSchemaError::NoValidSheets { .. }));
}

#[test]
fn test_selection_by_name_and_pattern() {
    let sheets: Vec<RawSheet> = ["tbl_a", "Customer", "tbl_b", "Notes"]
        .iter()
        .map(|name| RawSheet::new(*name, Vec::new()))
        .collect();
    let selection = vec![
        "Customer".to_string(),
        "tbl_*".to_string(),
        "tbl_a".to_string(),
        "Missing".to_string(),
    ];

    let (picked, unmatched) = select_sheets(&sheets, &selection);
    let picked: Vec<&str> = picked.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(picked, vec!["Customer", "tbl_a", "tbl_b"]);
    assert_eq!(unmatched, vec!["Missing"]);
}

proptest! {
    #[test]
    fn prop_sanitize_is_idempotent(raw in ".{0,40}") {
        let once = sanitize_identifier(&raw);
        prop_assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        prop_assert_eq!(sanitize_identifier(&once), once);
    }

    #[test]
    fn prop_filtering_keeps_named_rows_in_order(mask in proptest::collection::vec(any::<bool>(), 1..30)) {
        prop_assume!(mask.iter().any(|keep| *keep));
        let mut grid = definition_grid(Layout::Compact, &[]);
        let mut expected = Vec::new();
        for (i, keep) in mask.iter().enumerate() {
            let mut row = vec![CellValue::Empty; Layout::Compact.width()];
            row[3] = CellValue::text("int");
            if *keep {
                let name = format!("col{}", i);
                row[1] = CellValue::text(name.clone());
                expected.push(name);
            }
            grid.push(row);
        }
        let sheet = RawSheet::from_grid("P", grid);
        let options = NormalizeOptions { layout: Layout::Compact, strict_headers: false };

        let normalized = normalize(&sheet, &options).unwrap();
        let actual: Vec<String> = normalized.rows.iter().map(|r| r.column.name.clone()).collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(normalized.source_row_count, mask.len());
    }
}
