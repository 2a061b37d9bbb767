//! Workbook reading tests

use std::fs;

use pretty_assertions::assert_eq;

use rust_sheetschema::normalize::Layout;
use rust_sheetschema::{CellValue, SheetSchemaError, SpreadsheetSource, XlsxSource};

use crate::common::{customer_defs, definition_grid, write_xlsx, TestContext};

fn assert_round_trip(shared_strings: bool) {
    let ctx = TestContext::new();
    let path = ctx.path("tables.xlsx");
    let grid = definition_grid(Layout::Full, &customer_defs());
    let notes = vec![
        vec![CellValue::text("Remarks & <notes>")],
        vec![CellValue::Bool(true)],
    ];
    write_xlsx(&path, &[("Customer", grid.clone()), ("Notes", notes)], shared_strings);

    let sheets = XlsxSource::new().read_sheets(&path).unwrap();
    assert_eq!(sheets.len(), 2);

    let customer = &sheets[0];
    assert_eq!(customer.name, "Customer");
    assert_eq!(customer.headers, Layout::Full.raw_headers());
    assert_eq!(customer.rows.len(), grid.len() - 1);
    for (row, expected) in customer.rows.iter().zip(grid.iter().skip(1)) {
        assert_eq!(&row.cells, expected);
    }
    assert_eq!(customer.rows[0].number, 2);

    let notes = &sheets[1];
    assert_eq!(notes.headers, vec!["Remarks & <notes>"]);
    assert_eq!(notes.rows[0].cells, vec![CellValue::Bool(true)]);
}

#[test]
fn test_inline_string_workbook() {
    assert_round_trip(false);
}

#[test]
fn test_shared_string_workbook() {
    assert_round_trip(true);
}

#[test]
fn test_trailing_empty_cells_are_padded() {
    let ctx = TestContext::new();
    let path = ctx.path("ragged.xlsx");
    let grid = vec![
        vec![
            CellValue::text("A"),
            CellValue::text("B"),
            CellValue::text("C"),
        ],
        vec![CellValue::Number(1.0)],
        vec![CellValue::Empty, CellValue::Empty, CellValue::Number(3.5)],
    ];
    write_xlsx(&path, &[("Ragged", grid)], false);

    let sheets = XlsxSource::new().read_sheets(&path).unwrap();
    let rows: Vec<&Vec<CellValue>> = sheets[0].rows.iter().map(|r| &r.cells).collect();
    assert_eq!(
        rows,
        vec![
            &vec![CellValue::Number(1.0), CellValue::Empty, CellValue::Empty],
            &vec![CellValue::Empty, CellValue::Empty, CellValue::Number(3.5)],
        ]
    );
}

#[test]
fn test_missing_file_is_a_read_error() {
    let ctx = TestContext::new();
    let err = XlsxSource::new()
        .read_sheets(&ctx.path("absent.xlsx"))
        .unwrap_err();
    assert!(matches!(err, SheetSchemaError::SourceRead { .. }));
}

#[test]
fn test_non_workbook_is_a_format_error() {
    let ctx = TestContext::new();
    let path = ctx.path("plain.xlsx");
    fs::write(&path, "Name,Type\nid,int\n").unwrap();

    let err = XlsxSource::new().read_sheets(&path).unwrap_err();
    assert!(matches!(err, SheetSchemaError::SourceFormat { .. }));
}
