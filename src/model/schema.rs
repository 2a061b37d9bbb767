use super::{ColumnSpec, TableInfo};

/// Everything the emitters need to know about one validated sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaResult {
    pub sheet_name: String,
    /// `table_info.name` is always the resolved, non-empty table name
    pub table_info: TableInfo,
    pub columns: Vec<ColumnSpec>,
    /// Data rows read from the raw sheet before filtering
    pub source_row_count: usize,
}

impl SchemaResult {
    pub fn table_name(&self) -> &str {
        &self.table_info.name
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
