//! SQL literal rendering

use crate::mapping::escape_quotes;
use crate::source::{format_number, CellValue};

/// Unicode string literal with embedded quotes doubled
pub fn n_string(value: &str) -> String {
    format!("N'{}'", escape_quotes(value))
}

/// Literal for one data cell in an INSERT statement.
///
/// Empty cells are `NULL`, numbers are unquoted, booleans are `1`/`0` and
/// everything else is an `N'...'` string.
pub fn sql_literal(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "NULL".to_string(),
        CellValue::Number(n) if !n.is_finite() => "NULL".to_string(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(true) => "1".to_string(),
        CellValue::Bool(false) => "0".to_string(),
        CellValue::Text(s) if s.trim().is_empty() => "NULL".to_string(),
        CellValue::Text(s) => n_string(s),
    }
}
