//! SQL Server connection over tiberius
//!
//! tiberius is async; [`MssqlConnection`] owns a current-thread runtime and
//! blocks on every call so the rest of the crate stays synchronous.

use std::borrow::Cow;
use std::time::Duration;

use tiberius::{AuthMethod, Client, ColumnData, Config, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::Connection;
use crate::config::DatabaseConfig;
use crate::error::{DbError, SheetSchemaError};
use crate::source::CellValue;

const DEFAULT_PORT: u16 = 1433;

type SqlClient = Client<Compat<TcpStream>>;

/// A cell bound as a tiberius parameter
pub struct SqlParam<'a>(pub &'a CellValue);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self.0 {
            CellValue::Empty => ColumnData::String(None),
            CellValue::Bool(b) => ColumnData::Bit(Some(*b)),
            CellValue::Number(n) if !n.is_finite() => ColumnData::F64(None),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                ColumnData::I64(Some(*n as i64))
            }
            CellValue::Number(n) => ColumnData::F64(Some(*n)),
            CellValue::Text(s) if s.trim().is_empty() => ColumnData::String(None),
            CellValue::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
        }
    }
}

/// Split `host` or `host,port`; an explicit port in the server wins
fn server_address(server: &str, port: Option<u16>) -> Result<(String, u16), String> {
    let server = server.trim();
    let (host, inline_port) = match server.split_once(',') {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid port in server '{}'", server))?;
            (host.trim(), Some(port))
        }
        None => (server, None),
    };
    if host.is_empty() {
        return Err("server is empty".to_string());
    }
    if host.contains('\\') {
        warn!(server = %server, "Named instances are not resolved; connecting to the host's port");
    }
    let host = host.split('\\').next().unwrap_or(host).to_string();
    Ok((host, inline_port.or(port).unwrap_or(DEFAULT_PORT)))
}

/// A live SQL Server connection
pub struct MssqlConnection {
    runtime: Runtime,
    client: Option<SqlClient>,
    timeout: Duration,
}

/// Connect using SQL Server authentication
pub fn connect(config: &DatabaseConfig) -> Result<MssqlConnection, SheetSchemaError> {
    let fail = |message: String| SheetSchemaError::Connection {
        server: config.server.clone(),
        message,
    };

    let (host, port) = server_address(&config.server, config.port).map_err(&fail)?;
    info!(
        host = %host,
        port,
        database = %config.database,
        user = %config.username,
        driver = %config.driver,
        "Connecting to SQL Server"
    );

    let mut tds = Config::new();
    tds.host(&host);
    tds.port(port);
    if !config.database.is_empty() {
        tds.database(&config.database);
    }
    if config.trust_cert {
        tds.trust_cert();
    }
    tds.authentication(AuthMethod::sql_server(&config.username, &config.password));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| fail(e.to_string()))?;
    let timeout = Duration::from_secs(config.timeout_secs.max(1));

    let client = runtime
        .block_on(async {
            tokio::time::timeout(timeout, async {
                let tcp = TcpStream::connect(tds.get_addr()).await?;
                tcp.set_nodelay(true)?;
                let client = Client::connect(tds, tcp.compat_write()).await?;
                Ok::<_, DbError>(client)
            })
            .await
        })
        .map_err(|_| fail(format!("timed out after {}s", timeout.as_secs())))?
        .map_err(|e| fail(e.to_string()))?;

    info!("Connection successful");
    Ok(MssqlConnection {
        runtime,
        client: Some(client),
        timeout,
    })
}

impl MssqlConnection {
    fn client(&mut self) -> Result<(&Runtime, &mut SqlClient), DbError> {
        match self.client.as_mut() {
            Some(client) => Ok((&self.runtime, client)),
            None => Err(DbError::Closed),
        }
    }

    /// Run a batch as plain SQL text, draining every result
    fn batch(&mut self, sql: &str) -> Result<(), DbError> {
        let timeout = self.timeout;
        let (runtime, client) = self.client()?;
        runtime.block_on(async {
            let run = async {
                client.simple_query(sql).await?.into_results().await?;
                Ok::<_, DbError>(())
            };
            tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| DbError::Driver(format!("timed out after {}s", timeout.as_secs())))?
        })
    }

    fn run(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        let timeout = self.timeout;
        let (runtime, client) = self.client()?;
        runtime.block_on(async {
            let run = async {
                let result = client.execute(sql, params).await?;
                Ok::<_, DbError>(result.rows_affected().iter().sum::<u64>())
            };
            tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| DbError::Driver(format!("timed out after {}s", timeout.as_secs())))?
        })
    }
}

impl Connection for MssqlConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        debug!(sql = %sql, "execute");
        self.run(sql, &[])
    }

    fn execute_with(&mut self, sql: &str, params: &[CellValue]) -> Result<u64, DbError> {
        let bound: Vec<SqlParam<'_>> = params.iter().map(SqlParam).collect();
        let refs: Vec<&dyn ToSql> = bound.iter().map(|p| p as &dyn ToSql).collect();
        self.run(sql, &refs)
    }

    fn begin_transaction(&mut self) -> Result<(), DbError> {
        self.batch("BEGIN TRANSACTION")
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.batch("COMMIT TRANSACTION")
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
    }

    fn close(&mut self) -> Result<(), DbError> {
        if let Some(client) = self.client.take() {
            self.runtime.block_on(client.close())?;
            info!("Database connection closed");
        }
        Ok(())
    }
}
