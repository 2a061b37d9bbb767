//! End-to-end tests for deploying sheets to SQL Server
//!
//! Environment variables (with defaults):
//! - SQL_SERVER_HOST (default: localhost)
//! - SQL_SERVER_PORT (default: 1433)
//! - SQL_SERVER_USER (default: sa)
//! - SQL_SERVER_PASSWORD (default: Password1)

use std::sync::LazyLock;

use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use rust_sheetschema::db::{connect, Connection};
use rust_sheetschema::normalize::Layout;
use rust_sheetschema::pipeline::run_database;
use rust_sheetschema::source::InMemorySource;
use rust_sheetschema::{CancelToken, DatabaseConfig, IssueKind, Progress, SelectionConfig};

use crate::common::{customer_defs, data_sheet, definition_sheet, text_row, TestContext};

/// Load environment variables from .env file (if present)
fn load_env() {
    let _ = dotenvy::dotenv();
}

/// SQL Server connection configuration loaded from environment
static SQL_CONFIG: LazyLock<DatabaseConfig> = LazyLock::new(|| {
    load_env();
    DatabaseConfig {
        server: std::env::var("SQL_SERVER_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("SQL_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or(Some(1433)),
        username: std::env::var("SQL_SERVER_USER").unwrap_or_else(|_| "sa".to_string()),
        password: std::env::var("SQL_SERVER_PASSWORD")
            .unwrap_or_else(|_| "Password1".to_string()),
        trust_cert: true,
        ..DatabaseConfig::default()
    }
});

const TEST_DATABASE: &str = "SheetSchema_E2E";

type SqlClient = Client<Compat<TcpStream>>;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

async fn query_client(database: &str) -> SqlClient {
    let mut config = Config::new();
    config.host(&SQL_CONFIG.server);
    config.port(SQL_CONFIG.port.unwrap_or(1433));
    config.database(database);
    config.trust_cert();
    config.authentication(AuthMethod::sql_server(
        &SQL_CONFIG.username,
        &SQL_CONFIG.password,
    ));

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .expect("Failed to connect to SQL Server");
    tcp.set_nodelay(true).unwrap();
    Client::connect(config, tcp.compat_write())
        .await
        .expect("Failed to log in to SQL Server")
}

fn recreate_database() {
    let mut conn = connect(&SQL_CONFIG).expect("Failed to connect to SQL Server");
    conn.execute(&format!(
        "IF DB_ID(N'{db}') IS NOT NULL BEGIN \
         ALTER DATABASE [{db}] SET SINGLE_USER WITH ROLLBACK IMMEDIATE; \
         DROP DATABASE [{db}]; END",
        db = TEST_DATABASE
    ))
    .expect("Failed to drop test database");
    conn.execute(&format!("CREATE DATABASE [{}]", TEST_DATABASE))
        .expect("Failed to create test database");
    conn.close().unwrap();
}

fn query_strings(sql: &str) -> Vec<String> {
    runtime().block_on(async {
        let mut client = query_client(TEST_DATABASE).await;
        let rows = client
            .query(sql, &[])
            .await
            .expect("query failed")
            .into_first_result()
            .await
            .expect("Failed to read rows");
        rows.iter()
            .map(|row| row.get::<&str, _>(0).unwrap_or_default().to_string())
            .collect()
    })
}

#[test]
#[ignore = "requires SQL Server"]
fn test_deploy_creates_table_and_loads_rows() {
    recreate_database();
    let ctx = TestContext::new();

    let source = InMemorySource::new(vec![definition_sheet(
        "Customer",
        Layout::Full,
        &customer_defs(),
    )])
    .with_file(
        ctx.path("data.xlsx"),
        vec![data_sheet(
            "Customer",
            &["CustomerId", "Name", "Balance"],
            &[
                text_row(&["1", "Ann", "10.5"]),
                text_row(&["2", "Bob", ""]),
                // Duplicate key: this batch is rolled back
                text_row(&["2", "Bob again", "1"]),
            ],
        )],
    );
    let config = SelectionConfig {
        file_path: ctx.path("tables.xlsx"),
        data_file: Some(ctx.path("data.xlsx")),
        recovery_dir: ctx.path("failed"),
        batch_size: 2,
        database: DatabaseConfig {
            database: TEST_DATABASE.to_string(),
            ..SQL_CONFIG.clone()
        },
        ..SelectionConfig::default()
    };

    let conn = connect(&config.database).expect("Failed to connect to SQL Server");
    let report = run_database(
        &config,
        &source,
        conn,
        &mut |_: Progress| {},
        &CancelToken::new(),
    );

    assert_eq!(report.tables, vec!["Customer"]);
    assert_eq!(report.rows_inserted, 2);
    let kinds: Vec<IssueKind> = report.issues().iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![IssueKind::InsertBatch]);
    assert_eq!(report.recovery_files.len(), 1);

    let names = query_strings("SELECT [Name] FROM [dbo].[Customer] ORDER BY [CustomerId]");
    assert_eq!(names, vec!["Ann", "Bob"]);

    let types = query_strings(
        "SELECT DATA_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_NAME = 'Customer' ORDER BY ORDINAL_POSITION",
    );
    assert_eq!(types, vec!["int", "nvarchar", "varchar", "decimal", "bit"]);

    let descriptions = query_strings(
        "SELECT CAST(value AS NVARCHAR(400)) FROM sys.extended_properties \
         WHERE name = 'MS_Description' ORDER BY minor_id",
    );
    assert_eq!(descriptions, vec!["Customers", "Surrogate key"]);
}
