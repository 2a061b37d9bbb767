//! Database connections
//!
//! The emitter talks to the database only through [`Connection`], so the
//! batched loader can be exercised without a server.

mod mssql;

use tracing::warn;

use crate::error::DbError;
use crate::source::CellValue;

pub use mssql::{connect, MssqlConnection, SqlParam};

/// A synchronous database connection
pub trait Connection {
    /// Run a statement without parameters, returning the rows affected
    fn execute(&mut self, sql: &str) -> Result<u64, DbError>;

    /// Run a statement with positional parameters
    fn execute_with(&mut self, sql: &str, params: &[CellValue]) -> Result<u64, DbError>;

    fn begin_transaction(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    /// Close the connection. Closing twice is not an error.
    fn close(&mut self) -> Result<(), DbError>;

    /// Parameter marker for the 1-based `index`
    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }
}

/// Owns a connection for one run and closes it on every exit path
pub struct ConnectionGuard<C: Connection> {
    conn: Option<C>,
}

impl<C: Connection> ConnectionGuard<C> {
    pub fn new(conn: C) -> Self {
        Self { conn: Some(conn) }
    }

    /// The guarded connection, `None` once closed
    pub fn get(&mut self) -> Option<&mut C> {
        self.conn.as_mut()
    }

    /// Close now and report the result
    pub fn close(mut self) -> Result<(), DbError> {
        match self.conn.take() {
            Some(mut conn) => conn.close(),
            None => Ok(()),
        }
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                warn!("Failed to close database connection: {}", e);
            }
        }
    }
}
