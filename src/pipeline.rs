//! Run orchestration
//!
//! A run moves through `ReadingSource → NormalizingSheets → (Mapping →
//! EmittingOutput per sheet) → Finalizing` and ends in a [`RunStatus`]. Only
//! an unreadable source, a workbook without valid sheets or a failed
//! connection make a run fail; every other problem becomes an [`Issue`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ExportMode, SelectionConfig};
use crate::db::{self, Connection, ConnectionGuard};
use crate::emit::{
    create_table_statement, deploy_table, generate_script, verify_create_table, LoadSettings,
    RecoveryWriter, ScriptWriter,
};
use crate::error::{DbError, SheetSchemaError, SheetValidationError};
use crate::mapping::mapping_warnings;
use crate::model::{extract_table_info, resolve_table_name, DataRows, SchemaResult};
use crate::normalize::{normalize, normalize_workbook, select_sheets, NormalizedSheet};
use crate::source::{RawSheet, SpreadsheetSource};
use crate::util::eq_trimmed_ci;

/// Cooperative cancellation, checked between sheets and between batches
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress of a run, in percent
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub sheet: String,
    pub sheet_percent: f64,
    pub overall_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ReadingSource,
    NormalizingSheets,
    Mapping,
    EmittingOutput,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    SheetValidation,
    Mapping,
    Metadata,
    Data,
    Ddl,
    ExtendedProperty,
    InsertBatch,
    Selection,
    Cancelled,
}

/// A problem that did not stop the run
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub sheet: Option<String>,
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    pub fn new(sheet: Option<&str>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.map(String::from),
            kind,
            message: message.into(),
        }
    }

    fn for_sheet(sheet: &str, kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Some(sheet), kind, message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "[{:?}] sheet '{}': {}", self.kind, sheet, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings(Vec<Issue>),
    Failed(String),
}

impl RunStatus {
    fn from_issues(issues: Vec<Issue>) -> Self {
        if issues.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithWarnings(issues)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed(_))
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub status: RunStatus,
    pub tables: Vec<String>,
    /// Script files written (empty for stdout and database runs)
    pub files: Vec<PathBuf>,
    pub rows_inserted: usize,
    pub recovery_files: Vec<PathBuf>,
}

impl RunReport {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed(reason.into()),
            tables: Vec::new(),
            files: Vec::new(),
            rows_inserted: 0,
            recovery_files: Vec::new(),
        }
    }

    pub fn issues(&self) -> &[Issue] {
        match &self.status {
            RunStatus::CompletedWithWarnings(issues) => issues,
            _ => &[],
        }
    }
}

/// Validated sheets ready for emission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedWorkbook {
    pub schemas: Vec<SchemaResult>,
    pub issues: Vec<Issue>,
}

struct RunTracker {
    state: RunState,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

fn schema_from_sheet(
    sheet_name: &str,
    normalized: NormalizedSheet,
    config: &SelectionConfig,
    issues: &mut Vec<Issue>,
) -> Result<SchemaResult, SheetValidationError> {
    for warning in &normalized.warnings {
        issues.push(Issue::for_sheet(
            sheet_name,
            IssueKind::SheetValidation,
            warning.to_string(),
        ));
    }

    let mut info = extract_table_info(&normalized.rows);
    if info.name.is_empty() {
        issues.push(Issue::for_sheet(
            sheet_name,
            IssueKind::Metadata,
            "no row carries both a table name and code; using the sheet name",
        ));
    }
    let table_name = resolve_table_name(&info, sheet_name);
    if table_name.is_empty() {
        return Err(SheetValidationError::MissingTableName);
    }
    info.name = table_name;

    let columns: Vec<_> = normalized.rows.into_iter().map(|row| row.column).collect();
    for column in &columns {
        for warning in mapping_warnings(column) {
            issues.push(Issue::for_sheet(sheet_name, IssueKind::Mapping, warning));
        }
    }

    let options = config.emit_options();
    if options.verify_ddl {
        verify_create_table(&create_table_statement(
            &info.name, &columns, &info, &options,
        ))?;
    }

    Ok(SchemaResult {
        sheet_name: sheet_name.to_string(),
        table_info: info,
        columns,
        source_row_count: normalized.source_row_count,
    })
}

/// Read, validate and map every selected sheet.
///
/// Fails when the workbook cannot be read or no sheet survives.
pub fn process_sheets(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
) -> Result<ProcessedWorkbook, SheetSchemaError> {
    let mut tracker = RunTracker::new();
    process_with_tracker(config, source, &mut tracker)
}

fn process_with_tracker(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    tracker: &mut RunTracker,
) -> Result<ProcessedWorkbook, SheetSchemaError> {
    let name = source_name(&config.file_path);

    tracker.enter(RunState::ReadingSource);
    let sheets = source.read_sheets(&config.file_path)?;
    info!(source = %name, sheets = sheets.len(), "Workbook read");

    tracker.enter(RunState::NormalizingSheets);
    let normalized = normalize_workbook(
        &name,
        &sheets,
        &config.selected_sheets,
        &config.normalize_options(),
    )?;

    let mut issues: Vec<Issue> = Vec::new();
    for entry in &normalized.unmatched {
        issues.push(Issue::new(
            None,
            IssueKind::Selection,
            format!("selection '{}' matches no sheet", entry),
        ));
    }
    for rejected in &normalized.rejected {
        issues.push(Issue::for_sheet(
            &rejected.sheet_name,
            IssueKind::SheetValidation,
            rejected.error.to_string(),
        ));
    }

    tracker.enter(RunState::Mapping);
    let mut schemas = Vec::new();
    for sheet in normalized.sheets {
        let sheet_name = sheet.sheet_name.clone();
        match schema_from_sheet(&sheet_name, sheet, config, &mut issues) {
            Ok(schema) => schemas.push(schema),
            Err(error) => {
                warn!(sheet = %sheet_name, "Skipping sheet: {}", error);
                let kind = match error {
                    SheetValidationError::InvalidDdl { .. } => IssueKind::Ddl,
                    SheetValidationError::MissingTableName => IssueKind::Metadata,
                    _ => IssueKind::SheetValidation,
                };
                issues.push(Issue::for_sheet(&sheet_name, kind, error.to_string()));
            }
        }
    }

    if schemas.is_empty() {
        return Err(SheetSchemaError::NoValidSheets { source_name: name });
    }
    Ok(ProcessedWorkbook { schemas, issues })
}

/// Rows to insert per table, read from `config.data_file`.
///
/// A data sheet is matched by the definition sheet's name first, then by
/// table name, both ignoring case.
pub fn load_data(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    schemas: &[SchemaResult],
) -> Result<(HashMap<String, DataRows>, Vec<Issue>), SheetSchemaError> {
    let mut data = HashMap::new();
    let mut issues = Vec::new();

    let Some(path) = &config.data_file else {
        return Ok((data, issues));
    };
    let sheets = source.read_sheets(path)?;

    for schema in schemas {
        let found = sheets
            .iter()
            .find(|s| eq_trimmed_ci(&s.name, &schema.sheet_name))
            .or_else(|| {
                sheets
                    .iter()
                    .find(|s| eq_trimmed_ci(&s.name, schema.table_name()))
            });
        let Some(sheet) = found else {
            debug!(sheet = %schema.sheet_name, "No data sheet for table");
            continue;
        };

        let (rows, warnings) = DataRows::from_sheet(sheet, &schema.columns);
        issues.extend(
            warnings
                .into_iter()
                .map(|w| Issue::for_sheet(&schema.sheet_name, IssueKind::Data, w)),
        );
        info!(table = %schema.table_name(), rows = rows.len(), "Data rows loaded");
        data.insert(schema.sheet_name.clone(), rows);
    }

    Ok((data, issues))
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

fn script_run(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
    tracker: &mut RunTracker,
) -> Result<RunReport, SheetSchemaError> {
    let processed = process_with_tracker(config, source, tracker)?;
    let (data, data_issues) = load_data(config, source, &processed.schemas)?;
    let mut issues = processed.issues;
    issues.extend(data_issues);

    tracker.enter(RunState::EmittingOutput);
    let options = config.emit_options();
    let total = processed.schemas.len();
    let mut scripts = Vec::with_capacity(total);
    let mut tables = Vec::with_capacity(total);

    for (index, schema) in processed.schemas.iter().enumerate() {
        if cancel.is_cancelled() {
            issues.push(Issue::new(
                None,
                IssueKind::Cancelled,
                format!("cancelled before sheet '{}'", schema.sheet_name),
            ));
            break;
        }
        let script = generate_script(
            schema.table_name(),
            &schema.columns,
            &schema.table_info,
            data.get(&schema.sheet_name),
            &options,
        );
        scripts.push((schema.sheet_name.clone(), script));
        tables.push(schema.table_name().to_string());
        on_progress(Progress {
            sheet: schema.sheet_name.clone(),
            sheet_percent: 100.0,
            overall_percent: percent(index + 1, total),
        });
    }

    tracker.enter(RunState::Finalizing);
    let files = if scripts.is_empty() {
        Vec::new()
    } else {
        let writer = ScriptWriter::new(config.script_output(), source_name(&config.file_path));
        writer.write(&scripts)?
    };

    Ok(RunReport {
        status: RunStatus::from_issues(issues),
        tables,
        files,
        rows_inserted: 0,
        recovery_files: Vec::new(),
    })
}

fn database_run<C: Connection>(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    conn: C,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
    tracker: &mut RunTracker,
) -> Result<RunReport, SheetSchemaError> {
    let mut guard = ConnectionGuard::new(conn);

    let processed = process_with_tracker(config, source, tracker)?;
    let (data, data_issues) = load_data(config, source, &processed.schemas)?;
    let mut issues = processed.issues;
    issues.extend(data_issues);

    tracker.enter(RunState::EmittingOutput);
    let options = config.emit_options();
    let recovery = RecoveryWriter::new(&config.recovery_dir);
    let settings = LoadSettings {
        batch_size: config.batch_size,
        recovery: &recovery,
        cancel,
    };
    let total = processed.schemas.len();
    let mut report = RunReport {
        status: RunStatus::Completed,
        tables: Vec::new(),
        files: Vec::new(),
        rows_inserted: 0,
        recovery_files: Vec::new(),
    };

    for (index, schema) in processed.schemas.iter().enumerate() {
        if cancel.is_cancelled() {
            issues.push(Issue::new(
                None,
                IssueKind::Cancelled,
                format!("cancelled before sheet '{}'", schema.sheet_name),
            ));
            break;
        }
        let Some(conn) = guard.get() else {
            return Err(SheetSchemaError::Database(DbError::Closed));
        };

        let sheet = schema.sheet_name.clone();
        let mut on_batch = |done: usize, rows: usize| {
            let fraction = percent(done, rows) / 100.0;
            on_progress(Progress {
                sheet: sheet.clone(),
                sheet_percent: fraction * 100.0,
                overall_percent: (index as f64 + fraction) / total as f64 * 100.0,
            });
        };

        match deploy_table(
            conn,
            schema,
            data.get(&schema.sheet_name),
            &options,
            settings,
            &mut on_batch,
        ) {
            Ok(outcome) => {
                report.tables.push(outcome.table.clone());
                report.rows_inserted += outcome.load.rows_inserted;
                for failure in outcome.property_failures {
                    issues.push(Issue::for_sheet(&sheet, IssueKind::ExtendedProperty, failure));
                }
                for batch in &outcome.load.failed_batches {
                    let saved = match &batch.recovery_file {
                        Some(path) => {
                            report.recovery_files.push(path.clone());
                            format!("saved to {}", path.display())
                        }
                        None => "recovery file could not be written".to_string(),
                    };
                    issues.push(Issue::for_sheet(
                        &sheet,
                        IssueKind::InsertBatch,
                        format!(
                            "batch {} ({} rows) rolled back: {}; {}",
                            batch.batch, batch.rows, batch.error, saved
                        ),
                    ));
                }
                if outcome.load.cancelled {
                    issues.push(Issue::for_sheet(
                        &sheet,
                        IssueKind::Cancelled,
                        format!(
                            "load cancelled after {} of {} rows",
                            outcome.load.rows_inserted, outcome.load.rows_total
                        ),
                    ));
                }
            }
            Err(e) => {
                warn!(sheet = %sheet, "Table creation failed: {}", e);
                issues.push(Issue::for_sheet(&sheet, IssueKind::Ddl, e.to_string()));
            }
        }

        on_progress(Progress {
            sheet: sheet.clone(),
            sheet_percent: 100.0,
            overall_percent: percent(index + 1, total),
        });
    }

    tracker.enter(RunState::Finalizing);
    if let Err(e) = guard.close() {
        warn!("Failed to close database connection: {}", e);
    }

    report.status = RunStatus::from_issues(issues);
    Ok(report)
}

fn finish(result: Result<RunReport, SheetSchemaError>, tracker: &mut RunTracker) -> RunReport {
    tracker.enter(RunState::Done);
    match result {
        Ok(report) => {
            match &report.status {
                RunStatus::Completed => info!(tables = report.tables.len(), "Run completed"),
                RunStatus::CompletedWithWarnings(issues) => {
                    for issue in issues {
                        warn!("{}", issue);
                    }
                    warn!(
                        tables = report.tables.len(),
                        issues = issues.len(),
                        "Run completed with warnings"
                    );
                }
                RunStatus::Failed(_) => {}
            }
            report
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            RunReport::failed(e.to_string())
        }
    }
}

/// Generate scripts for every selected sheet
pub fn run_script(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
) -> RunReport {
    let mut tracker = RunTracker::new();
    let result = script_run(config, source, on_progress, cancel, &mut tracker);
    finish(result, &mut tracker)
}

/// Deploy every selected sheet through an open connection.
///
/// The connection is closed when the run ends, whatever the outcome.
pub fn run_database<C: Connection>(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    conn: C,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
) -> RunReport {
    let mut tracker = RunTracker::new();
    let result = database_run(config, source, conn, on_progress, cancel, &mut tracker);
    finish(result, &mut tracker)
}

/// Run in the configured export mode, connecting to SQL Server if needed
pub fn run(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
    on_progress: &mut dyn FnMut(Progress),
    cancel: &CancelToken,
) -> RunReport {
    if let Err(e) = config.validate() {
        return RunReport::failed(e.to_string());
    }
    match config.export_mode {
        ExportMode::Script => run_script(config, source, on_progress, cancel),
        ExportMode::Database => match db::connect(&config.database) {
            Ok(conn) => run_database(config, source, conn, on_progress, cancel),
            Err(e) => {
                tracing::error!("{}", e);
                RunReport::failed(e.to_string())
            }
        },
    }
}

/// Validation state of one workbook sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetStatus {
    pub name: String,
    pub selected: bool,
    /// Column count when valid, the rejection reason otherwise
    pub result: Result<usize, String>,
}

/// Validate every sheet without emitting anything
pub fn inspect_sheets(
    config: &SelectionConfig,
    source: &dyn SpreadsheetSource,
) -> Result<Vec<SheetStatus>, SheetSchemaError> {
    let sheets: Vec<RawSheet> = source.read_sheets(&config.file_path)?;
    let (selected, _) = select_sheets(&sheets, &config.selected_sheets);
    let options = config.normalize_options();

    Ok(sheets
        .iter()
        .map(|sheet| SheetStatus {
            name: sheet.name.clone(),
            selected: selected.iter().any(|s| s.name == sheet.name),
            result: normalize(sheet, &options)
                .map(|n| n.rows.len())
                .map_err(|e| e.to_string()),
        })
        .collect())
}
