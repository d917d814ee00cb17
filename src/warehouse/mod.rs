pub mod local;
#[cfg(feature = "redshift")]
pub mod redshift;

pub use local::LocalDatabase;
#[cfg(feature = "redshift")]
pub use redshift::RedshiftWarehouse;

use crate::constants::{final_tables, STAGING_EVENTS_TABLE, STAGING_SONGS_TABLE};
use crate::error::{Result, WarehouseError};
use async_trait::async_trait;
use std::fmt;

/// Deployment target a warehouse connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    /// Local SQLite star schema, loaded row by row from JSON files
    Local,
    /// Redshift cluster, staged from S3 then transformed in place
    Redshift,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => write!(f, "local"),
            Target::Redshift => write!(f, "redshift"),
        }
    }
}

/// One connection, one statement at a time.
///
/// Every `execute` call is committed before it returns; nothing wraps a
/// sequence of calls in a transaction, so a failure leaves earlier
/// statements applied.
#[async_trait]
pub trait Warehouse: Send {
    fn target(&self) -> Target;

    /// Runs a single statement and returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    async fn count_rows(&mut self, table: &str) -> Result<i64>;
}

/// Only known table names are ever interpolated into SQL.
pub(crate) fn checked_table_name(table: &str) -> Result<&str> {
    let known = final_tables()
        .into_iter()
        .chain([STAGING_EVENTS_TABLE, STAGING_SONGS_TABLE])
        .any(|name| name == table);
    if known {
        Ok(table)
    } else {
        Err(WarehouseError::Config(format!("unknown table '{table}'")))
    }
}
