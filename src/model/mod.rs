//! Table-definition model shared by the normalizer, the type mapper and the
//! emitters

mod column;
mod data;
mod schema;
mod table;

pub use column::{nullable_from_marker, ColumnSpec, KeyRole};
pub use data::DataRows;
pub use schema::SchemaResult;
pub use table::{extract_table_info, resolve_table_name, DefinitionRow, TableCells, TableInfo};
