//! SQL emission
//!
//! Both output modes share the statement builders in [`ddl`], so a script
//! and a direct deployment of the same sheet create identical tables.

pub mod ddl;
pub mod deploy;
pub mod literal;
pub mod recovery;
pub mod script;

use serde::Deserialize;

pub use ddl::{
    column_definitions, create_table_statement, drop_table_statement,
    extended_property_statements, insert_statement, primary_key_name, qualified_name,
    quote_identifier, verify_create_table,
};
pub use deploy::{deploy_table, load_rows, DeployOutcome, FailedBatch, LoadOutcome, LoadSettings};
pub use literal::sql_literal;
pub use recovery::RecoveryWriter;
pub use script::{generate_script, ScriptOutput, ScriptWriter};

/// Name given to the primary-key constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PkNaming {
    /// `PK_<table name>`
    #[default]
    TableName,
    /// `PK_<table code>`, falling back to the table name without a code
    TableCode,
}

/// What to do with columns marked `FK`.
///
/// Definition sheets never name the referenced table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ForeignKeyPolicy {
    /// No constraint; script mode records the column in a comment
    #[default]
    Omit,
    /// `FOREIGN KEY ([col]) REFERENCES [table] ([col])`
    Placeholder { table: String },
}

/// Options shared by script and direct-execution output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub schema: String,
    pub pk_naming: PkNaming,
    pub foreign_keys: ForeignKeyPolicy,
    /// Emit INSERT statements for data rows in script mode
    pub include_data: bool,
    /// Parse each CREATE TABLE before it is written or executed
    pub verify_ddl: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            schema: "dbo".to_string(),
            pk_naming: PkNaming::default(),
            foreign_keys: ForeignKeyPolicy::default(),
            include_data: true,
            verify_ddl: true,
        }
    }
}
