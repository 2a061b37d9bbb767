//! Spreadsheet sources
//!
//! A source turns a workbook on disk into an ordered list of [`RawSheet`]s.
//! Row 1 of every worksheet is treated as the header row; the remaining rows
//! are padded so every sheet is rectangular.

pub mod xlsx;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SheetSchemaError;

pub use xlsx::XlsxSource;

/// A single spreadsheet cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// True for empty cells and whitespace-only text
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            CellValue::Bool(_) => false,
        }
    }

    /// Trimmed textual form, `None` when the cell is empty
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }

    /// Integer value of a whole number or of text such as `"10"` / `"10.0"`
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            CellValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite() && n.fract() == 0.0)
                        .map(|n| n as i64)
                })
            }
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(n) if n.is_finite())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Render a number the way a spreadsheet user expects: whole numbers
/// without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One data row of a raw sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based worksheet row number
    pub number: usize,
    pub cells: Vec<CellValue>,
}

/// A rectangular sheet as read from the workbook
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a sheet from a grid whose first row is the header row.
    /// Data rows are numbered from 2 like worksheet rows.
    pub fn from_grid(name: impl Into<String>, grid: Vec<Vec<CellValue>>) -> Self {
        let mut grid = grid.into_iter();
        let headers = grid
            .next()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.as_text().unwrap_or_default())
            .collect();
        let mut sheet = RawSheet::new(name, headers);
        for (index, cells) in grid.enumerate() {
            sheet.push_row(index + 2, cells);
        }
        sheet
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, number: usize, mut cells: Vec<CellValue>) {
        cells.resize(self.width(), CellValue::Empty);
        self.rows.push(RawRow { number, cells });
    }
}

/// Something that can read every sheet of a workbook
pub trait SpreadsheetSource {
    /// Read all sheets in workbook order.
    ///
    /// Fails when the file cannot be read or contains zero sheets.
    fn read_sheets(&self, path: &Path) -> Result<Vec<RawSheet>, SheetSchemaError>;
}

/// A source backed by sheets that are already in memory.
///
/// Paths registered with [`InMemorySource::with_file`] return their own
/// sheets; any other path returns the default sheets.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sheets: Vec<RawSheet>,
    files: HashMap<PathBuf, Vec<RawSheet>>,
}

impl InMemorySource {
    pub fn new(sheets: Vec<RawSheet>) -> Self {
        Self {
            sheets,
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, sheets: Vec<RawSheet>) -> Self {
        self.files.insert(path.into(), sheets);
        self
    }
}

impl SpreadsheetSource for InMemorySource {
    fn read_sheets(&self, path: &Path) -> Result<Vec<RawSheet>, SheetSchemaError> {
        let sheets = self.files.get(path).unwrap_or(&self.sheets);
        if sheets.is_empty() {
            return Err(SheetSchemaError::NoSheets {
                path: path.to_path_buf(),
            });
        }
        Ok(sheets.clone())
    }
}
