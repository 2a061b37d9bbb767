//! Run configuration
//!
//! Values come from built-in defaults, then an optional TOML/JSON file, then
//! `SHEETSCHEMA__*` environment variables. The CLI applies its flags on top.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::emit::{EmitOptions, ForeignKeyPolicy, PkNaming, ScriptOutput};
use crate::error::SheetSchemaError;
use crate::normalize::{Layout, NormalizeOptions};

const DEFAULT_LOCATIONS: &[&str] = &["sheetschema.toml", "config/sheetschema.toml"];

/// Where the converted schema goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Database,
    Script,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// ODBC driver name, kept for configs shared with ODBC tools
    pub driver: String,
    /// `host` or `host,port`
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub port: Option<u16>,
    pub trust_cert: bool,
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "ODBC Driver 17 for SQL Server".to_string(),
            server: String::new(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            port: None,
            trust_cert: false,
            timeout_secs: 30,
        }
    }
}

/// Everything one run needs
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Workbook holding the table definitions
    pub file_path: PathBuf,
    /// Sheet names or glob patterns; empty selects every sheet
    pub selected_sheets: Vec<String>,
    pub batch_size: usize,
    pub export_mode: ExportMode,
    pub database: DatabaseConfig,
    pub layout: Layout,
    pub strict_headers: bool,
    /// Workbook holding rows to insert, one sheet per table
    pub data_file: Option<PathBuf>,
    pub include_data: bool,
    /// Script destination; stdout when unset
    pub output: Option<PathBuf>,
    /// Write one file per sheet into `output`
    pub split_output: bool,
    pub recovery_dir: PathBuf,
    pub schema: String,
    pub pk_naming: PkNaming,
    pub foreign_keys: ForeignKeyPolicy,
    pub verify_ddl: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::new(),
            selected_sheets: Vec::new(),
            batch_size: 1000,
            export_mode: ExportMode::Database,
            database: DatabaseConfig::default(),
            layout: Layout::Full,
            strict_headers: false,
            data_file: None,
            include_data: true,
            output: None,
            split_output: false,
            recovery_dir: PathBuf::from("failed_batches"),
            schema: "dbo".to_string(),
            pk_naming: PkNaming::TableName,
            foreign_keys: ForeignKeyPolicy::Omit,
            verify_ddl: true,
        }
    }
}

impl SelectionConfig {
    /// Load from `path`, or from the first default location that exists.
    ///
    /// With no file at all the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, SheetSchemaError> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(SheetSchemaError::Config {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                if let Some(location) = DEFAULT_LOCATIONS.iter().find(|l| Path::new(l).exists()) {
                    builder = builder.add_source(File::new(location, config::FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SHEETSCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize::<SelectionConfig>())
            .map_err(|e| SheetSchemaError::Config {
                message: e.to_string(),
            })
    }

    /// Check values that would only fail later in the run
    pub fn validate(&self) -> Result<(), SheetSchemaError> {
        let invalid = |message: &str| {
            Err(SheetSchemaError::Config {
                message: message.to_string(),
            })
        };

        if self.file_path.as_os_str().is_empty() {
            return invalid("no input workbook given");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive");
        }
        if self.schema.trim().is_empty() {
            return invalid("schema must not be empty");
        }
        if let ForeignKeyPolicy::Placeholder { table } = &self.foreign_keys {
            if table.trim().is_empty() {
                return invalid("foreign key placeholder table must not be empty");
            }
        }
        if self.export_mode == ExportMode::Database && self.database.server.trim().is_empty() {
            return invalid("database export needs database.server");
        }
        if self.split_output && self.output.is_none() {
            return invalid("split_output needs an output directory");
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            layout: self.layout,
            strict_headers: self.strict_headers,
        }
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            schema: self.schema.clone(),
            pk_naming: self.pk_naming,
            foreign_keys: self.foreign_keys.clone(),
            include_data: self.include_data,
            verify_ddl: self.verify_ddl,
        }
    }

    pub fn script_output(&self) -> ScriptOutput {
        match &self.output {
            None => ScriptOutput::Stdout,
            Some(path) if self.split_output => ScriptOutput::Directory(path.clone()),
            Some(path) => ScriptOutput::File(path.clone()),
        }
    }
}
