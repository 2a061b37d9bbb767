//! Error types for rust-sheetschema

use std::path::PathBuf;
use thiserror::Error;

use crate::normalize::validation::ColumnOrderViolation;

/// Errors that abort a run (or a whole operation such as reading a workbook)
#[derive(Error, Debug)]
pub enum SheetSchemaError {
    #[error("Failed to read spreadsheet: {path}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid spreadsheet format in {path}: {message}")]
    SourceFormat { path: PathBuf, message: String },

    #[error("Spreadsheet contains no sheets: {path}")]
    NoSheets { path: PathBuf },

    #[error("No valid sheets found in {source_name}")]
    NoValidSheets { source_name: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Failed to connect to SQL Server at {server}: {message}")]
    Connection { server: String, message: String },

    #[error("Failed to write script to {path}")]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write recovery file {path}: {message}")]
    RecoveryWrite { path: PathBuf, message: String },

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Reasons a single sheet is rejected. The run skips the sheet and continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetValidationError {
    #[error("expected {expected} columns, found {actual}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("column layout mismatch: {}", join_violations(.0))]
    ColumnOrder(Vec<ColumnOrderViolation>),

    #[error("no rows with a column name remain after filtering")]
    NoRows,

    #[error("table name could not be resolved from the sheet or its metadata")]
    MissingTableName,

    #[error("generated CREATE TABLE does not parse: {message}")]
    InvalidDdl { message: String },
}

fn join_violations(violations: &[ColumnOrderViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures reported by a database connection
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Driver(String),

    #[error("connection is closed")]
    Closed,

    #[error(transparent)]
    Tiberius(#[from] tiberius::error::Error),

    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}
