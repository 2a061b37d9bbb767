//! Direct-execution mode

use std::path::PathBuf;

use tracing::{error, info, warn};

use super::ddl::{
    create_table_statement, drop_table_statement, extended_property_statements, insert_statement,
};
use super::recovery::RecoveryWriter;
use super::{EmitOptions, ForeignKeyPolicy};
use crate::db::Connection;
use crate::error::DbError;
use crate::model::{DataRows, SchemaResult};
use crate::pipeline::CancelToken;
use crate::source::CellValue;

/// Batch size, recovery target and cancellation for one data load
#[derive(Clone, Copy)]
pub struct LoadSettings<'a> {
    pub batch_size: usize,
    pub recovery: &'a RecoveryWriter,
    pub cancel: &'a CancelToken,
}

/// An insert batch that was rolled back
#[derive(Debug, Clone, PartialEq)]
pub struct FailedBatch {
    pub table: String,
    /// 1-based batch number
    pub batch: usize,
    pub rows: usize,
    pub error: String,
    /// `None` when the recovery file itself could not be written
    pub recovery_file: Option<PathBuf>,
}

/// Result of loading one table's rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOutcome {
    pub rows_total: usize,
    pub rows_inserted: usize,
    pub failed_batches: Vec<FailedBatch>,
    pub recovery_errors: Vec<String>,
    /// Stopped before the last batch because cancellation was requested
    pub cancelled: bool,
}

/// Result of deploying one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployOutcome {
    pub table: String,
    pub property_failures: Vec<String>,
    pub load: LoadOutcome,
}

fn insert_batch<C: Connection + ?Sized>(
    conn: &mut C,
    sql: &str,
    rows: &[Vec<CellValue>],
) -> Result<(), DbError> {
    conn.begin_transaction()?;
    for row in rows {
        conn.execute_with(sql, row)?;
    }
    conn.commit()
}

/// Insert `data` in transactional batches.
///
/// A failing batch is rolled back and saved to a recovery file; loading
/// continues with the next batch. `on_batch(rows_processed, rows_total)` is
/// called after every committed batch; rows of an earlier rolled-back batch
/// count as processed. Cancellation is checked before each batch.
pub fn load_rows<C: Connection + ?Sized>(
    conn: &mut C,
    table: &str,
    data: &DataRows,
    options: &EmitOptions,
    settings: LoadSettings<'_>,
    on_batch: &mut dyn FnMut(usize, usize),
) -> LoadOutcome {
    let total = data.len();
    let mut outcome = LoadOutcome {
        rows_total: total,
        ..LoadOutcome::default()
    };
    if total == 0 {
        return outcome;
    }

    let placeholders: Vec<String> = (1..=data.columns.len())
        .map(|i| conn.placeholder(i))
        .collect();
    let sql = insert_statement(table, &data.columns, &placeholders, options);
    let batch_size = settings.batch_size.max(1);
    let batch_count = total.div_ceil(batch_size);
    let mut processed = 0;

    for (index, rows) in data.rows.chunks(batch_size).enumerate() {
        if settings.cancel.is_cancelled() {
            info!(table = %table, batch = index + 1, "Load cancelled before batch");
            outcome.cancelled = true;
            break;
        }
        let number = index + 1;

        processed += rows.len();
        match insert_batch(conn, &sql, rows) {
            Ok(()) => {
                outcome.rows_inserted += rows.len();
                info!(table = %table, "Inserted batch {} of {}", number, batch_count);
                on_batch(processed, total);
            }
            Err(e) => {
                warn!(table = %table, batch = number, "Insert batch failed: {}", e);
                if let Err(rollback) = conn.rollback() {
                    warn!(table = %table, batch = number, "Rollback failed: {}", rollback);
                }
                let recovery_file =
                    match settings
                        .recovery
                        .write_batch(table, number, &data.columns, rows)
                    {
                        Ok(path) => Some(path),
                        Err(write_error) => {
                            error!("{}", write_error);
                            outcome.recovery_errors.push(write_error.to_string());
                            None
                        }
                    };
                outcome.failed_batches.push(FailedBatch {
                    table: table.to_string(),
                    batch: number,
                    rows: rows.len(),
                    error: e.to_string(),
                    recovery_file,
                });
            }
        }
    }

    info!(
        table = %table,
        inserted = outcome.rows_inserted,
        total,
        failed_batches = outcome.failed_batches.len(),
        "Data load finished"
    );
    outcome
}

/// Drop, create, describe and load one table.
///
/// Drop and create failures are returned; extended-property failures and
/// failed batches are reported in the outcome.
pub fn deploy_table<C: Connection + ?Sized>(
    conn: &mut C,
    schema: &SchemaResult,
    data: Option<&DataRows>,
    options: &EmitOptions,
    settings: LoadSettings<'_>,
    on_batch: &mut dyn FnMut(usize, usize),
) -> Result<DeployOutcome, DbError> {
    let table = schema.table_name();
    let info = &schema.table_info;

    conn.execute(&drop_table_statement(table, options))?;
    conn.execute(&create_table_statement(
        table,
        &schema.columns,
        info,
        options,
    ))?;
    info!(table = %table, columns = schema.columns.len(), "Table created");

    if options.foreign_keys == ForeignKeyPolicy::Omit {
        for column in &info.foreign_keys {
            info!(table = %table, column = %column, "FK constraint omitted; no referenced table");
        }
    }

    let mut outcome = DeployOutcome {
        table: table.to_string(),
        ..DeployOutcome::default()
    };

    for statement in extended_property_statements(table, &schema.columns, info, options) {
        if let Err(e) = conn.execute(&statement) {
            warn!(table = %table, "Could not add description: {}", e);
            outcome.property_failures.push(e.to_string());
        }
    }

    if let Some(data) = data {
        outcome.load = load_rows(conn, table, data, options, settings, on_batch);
    }

    Ok(outcome)
}
