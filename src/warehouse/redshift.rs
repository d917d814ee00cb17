use super::{checked_table_name, Target, Warehouse};
use crate::config::ClusterConfig;
use crate::error::{Result, WarehouseError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::info;

/// A single Postgres-protocol connection to the Redshift cluster.
///
/// No pool: the pipeline is strictly sequential and owns the connection
/// for the whole run.
pub struct RedshiftWarehouse {
    conn: PgConnection,
}

impl RedshiftWarehouse {
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self> {
        info!(
            "Connecting to Redshift at {}:{}/{}",
            cluster.host, cluster.db_port, cluster.db_name
        );

        let options = PgConnectOptions::new()
            .host(&cluster.host)
            .port(cluster.db_port)
            .username(&cluster.db_user)
            .password(&cluster.db_password)
            .database(&cluster.db_name);

        let conn = options
            .connect()
            .await
            .map_err(|e| WarehouseError::Connection {
                message: format!(
                    "Failed to connect to {}:{}/{}: {e}",
                    cluster.host, cluster.db_port, cluster.db_name
                ),
            })?;

        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    fn target(&self) -> Target {
        Target::Redshift
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        // Simple-query protocol: COPY and DDL are not prepared
        let conn: &mut PgConnection = &mut self.conn;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", checked_table_name(table)?);
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&mut self.conn).await?;
        Ok(count)
    }
}
