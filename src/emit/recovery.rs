//! Recovery files for failed insert batches

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::error::SheetSchemaError;
use crate::source::CellValue;
use crate::util::file_safe_name;

/// Writes each failed batch to its own CSV file.
///
/// Files are named `<table>_batch<NNNN>_<run-id>.csv` so that batches from
/// different runs never overwrite each other.
#[derive(Debug, Clone)]
pub struct RecoveryWriter {
    dir: PathBuf,
    run_id: String,
}

impl RecoveryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_run_id(dir, Uuid::new_v4().simple().to_string())
    }

    pub fn with_run_id(dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, table: &str, batch: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_batch{:04}_{}.csv",
            file_safe_name(table),
            batch,
            self.run_id
        ))
    }

    /// Write one batch with a header row of column names
    pub fn write_batch(
        &self,
        table: &str,
        batch: usize,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<PathBuf, SheetSchemaError> {
        let path = self.path_for(table, batch);
        let fail = |message: String| SheetSchemaError::RecoveryWrite {
            path: path.clone(),
            message,
        };

        fs::create_dir_all(&self.dir).map_err(|e| fail(e.to_string()))?;

        let mut writer = csv::Writer::from_path(&path).map_err(|e| fail(e.to_string()))?;
        writer
            .write_record(columns)
            .map_err(|e| fail(e.to_string()))?;
        for row in rows {
            writer
                .write_record(row.iter().map(|cell| cell.to_string()))
                .map_err(|e| fail(e.to_string()))?;
        }
        writer.flush().map_err(|e| fail(e.to_string()))?;

        info!(path = %path.display(), rows = rows.len(), "Failed batch saved for recovery");
        Ok(path)
    }
}
