use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rust_sheetschema::logging::init_tracing;
use rust_sheetschema::pipeline::inspect_sheets;
use rust_sheetschema::{
    run_from_config, CancelToken, ExportMode, ForeignKeyPolicy, Layout, PkNaming, Progress,
    RunStatus, SelectionConfig, XlsxSource,
};

#[derive(Parser)]
#[command(name = "rust-sheetschema")]
#[command(author, version, about = "Turn spreadsheet table definitions into SQL Server tables")]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to ./sheetschema.toml if present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SheetArgs {
    /// Workbook with one table definition per sheet
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sheet name or glob pattern to process (repeatable; default all)
    #[arg(short, long = "sheet")]
    sheets: Vec<String>,

    /// Definition sheet layout
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// Check header text instead of renaming columns by position
    #[arg(long)]
    strict_headers: bool,
}

#[derive(Args)]
struct EmitArgs {
    /// Workbook with rows to insert, one sheet per table
    #[arg(long)]
    data: Option<PathBuf>,

    /// Target schema
    #[arg(long)]
    schema: Option<String>,

    /// Primary-key constraint naming
    #[arg(long, value_enum)]
    pk_naming: Option<PkNaming>,

    /// Emit FK constraints referencing this table instead of omitting them
    #[arg(long, value_name = "TABLE")]
    fk_placeholder: Option<String>,

    /// Skip parsing generated CREATE TABLE statements
    #[arg(long)]
    no_verify: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a T-SQL script
    Script {
        #[command(flatten)]
        sheets: SheetArgs,

        #[command(flatten)]
        emit: EmitArgs,

        /// Output file, or directory with --split (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write one <sheet>.sql file per table into --output
        #[arg(long)]
        split: bool,

        /// Tables only, no INSERT statements
        #[arg(long)]
        schema_only: bool,
    },
    /// Create the tables on a SQL Server and load their data
    Deploy {
        #[command(flatten)]
        sheets: SheetArgs,

        #[command(flatten)]
        emit: EmitArgs,

        /// Server as host or host,port
        #[arg(long)]
        server: Option<String>,

        #[arg(long)]
        database: Option<String>,

        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long)]
        password: Option<String>,

        /// Trust the server certificate
        #[arg(long)]
        trust_cert: bool,

        /// Rows per insert transaction
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Directory for failed batch files
        #[arg(long)]
        recovery_dir: Option<PathBuf>,
    },
    /// List workbook sheets and whether they validate
    Sheets {
        #[command(flatten)]
        sheets: SheetArgs,
    },
}

fn apply_sheet_args(config: &mut SelectionConfig, args: SheetArgs) {
    if let Some(input) = args.input {
        config.file_path = input;
    }
    if !args.sheets.is_empty() {
        config.selected_sheets = args.sheets;
    }
    if let Some(layout) = args.layout {
        config.layout = layout;
    }
    if args.strict_headers {
        config.strict_headers = true;
    }
}

fn apply_emit_args(config: &mut SelectionConfig, args: EmitArgs) {
    if let Some(data) = args.data {
        config.data_file = Some(data);
    }
    if let Some(schema) = args.schema {
        config.schema = schema;
    }
    if let Some(pk_naming) = args.pk_naming {
        config.pk_naming = pk_naming;
    }
    if let Some(table) = args.fk_placeholder {
        config.foreign_keys = ForeignKeyPolicy::Placeholder { table };
    }
    if args.no_verify {
        config.verify_ddl = false;
    }
}

fn print_summary(status: &RunStatus, tables: usize, rows: Option<usize>) {
    let done = match rows {
        Some(rows) => format!("{} table(s), {} row(s) inserted", tables, rows),
        None => format!("{} table(s)", tables),
    };
    match status {
        RunStatus::Completed => eprintln!("Completed: {}", done),
        RunStatus::CompletedWithWarnings(issues) => {
            eprintln!("Completed with {} warning(s): {}", issues.len(), done);
            for issue in issues {
                eprintln!("  {}", issue);
            }
        }
        RunStatus::Failed(reason) => eprintln!("Failed: {}", reason),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = SelectionConfig::load(cli.config.as_deref())?;

    let mut on_progress = |progress: Progress| {
        tracing::debug!(
            sheet = %progress.sheet,
            "{:.1}% of sheet, {:.1}% overall",
            progress.sheet_percent,
            progress.overall_percent
        );
    };
    let cancel = CancelToken::new();

    match cli.command {
        Commands::Script {
            sheets,
            emit,
            output,
            split,
            schema_only,
        } => {
            apply_sheet_args(&mut config, sheets);
            apply_emit_args(&mut config, emit);
            config.export_mode = ExportMode::Script;
            if output.is_some() {
                config.output = output;
            }
            if split {
                config.split_output = true;
            }
            if schema_only {
                config.include_data = false;
            }

            let report = run_from_config(&config, &mut on_progress, &cancel)?;
            for file in &report.files {
                eprintln!("Wrote {}", file.display());
            }
            print_summary(&report.status, report.tables.len(), None);
        }
        Commands::Deploy {
            sheets,
            emit,
            server,
            database,
            user,
            password,
            trust_cert,
            batch_size,
            recovery_dir,
        } => {
            apply_sheet_args(&mut config, sheets);
            apply_emit_args(&mut config, emit);
            config.export_mode = ExportMode::Database;
            if let Some(server) = server {
                config.database.server = server;
            }
            if let Some(database) = database {
                config.database.database = database;
            }
            if let Some(user) = user {
                config.database.username = user;
            }
            if let Some(password) = password {
                config.database.password = password;
            }
            if trust_cert {
                config.database.trust_cert = true;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(dir) = recovery_dir {
                config.recovery_dir = dir;
            }

            let report = run_from_config(&config, &mut on_progress, &cancel)?;
            for file in &report.recovery_files {
                eprintln!("Recovery file: {}", file.display());
            }
            print_summary(
                &report.status,
                report.tables.len(),
                Some(report.rows_inserted),
            );
        }
        Commands::Sheets { sheets } => {
            apply_sheet_args(&mut config, sheets);
            if config.file_path.as_os_str().is_empty() {
                anyhow::bail!("no input workbook given");
            }

            for status in inspect_sheets(&config, &XlsxSource)? {
                let marker = if status.selected { "*" } else { " " };
                match status.result {
                    Ok(columns) => println!("{} {}: ok, {} column(s)", marker, status.name, columns),
                    Err(reason) => println!("{} {}: skipped, {}", marker, status.name, reason),
                }
            }
        }
    }

    Ok(())
}
