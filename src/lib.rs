//! rust-sheetschema: spreadsheet table definitions to SQL Server
//!
//! Each sheet of a workbook describes one table, one row per column. This
//! library validates those sheets, maps their types to SQL Server types and
//! either writes a T-SQL script or creates the tables (and loads their rows)
//! over a live connection.

pub mod config;
pub mod db;
pub mod emit;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod source;
mod util;

use anyhow::{bail, Result};

pub use config::{DatabaseConfig, ExportMode, SelectionConfig};
pub use emit::{generate_script, EmitOptions, ForeignKeyPolicy, PkNaming};
pub use error::{DbError, SheetSchemaError, SheetValidationError};
pub use mapping::map_type;
pub use normalize::{normalize, Layout, NormalizeOptions};
pub use pipeline::{
    process_sheets, CancelToken, Issue, IssueKind, Progress, RunReport, RunStatus,
};
pub use source::{CellValue, RawSheet, SpreadsheetSource, XlsxSource};

/// Run with the `.xlsx` reader, failing if the run fails.
///
/// Runs that finish with warnings are returned as `Ok`.
pub fn run_from_config(
    config: &SelectionConfig,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
) -> Result<RunReport> {
    let report = pipeline::run(config, &XlsxSource, on_progress, cancel);
    if let RunStatus::Failed(reason) = &report.status {
        bail!("{}", reason);
    }
    Ok(report)
}
