//! A single pooled Postgres client: a connection pool plus the one-time
//! metadata loaded right after connect.

use crate::error::{DbError, DbResult};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;
use tokio_util::sync::CancellationToken;

/// Schema metadata loaded once per pooled client.
#[derive(Debug, Clone, Default)]
pub struct ClientMetadata {
    pub server_version: String,
    pub table_count: i64,
}

/// A Postgres connection pool for one (identity, database) pair, published
/// only after both connect and metadata load succeed.
pub struct PooledClient {
    pub database: String,
    pool: Pool,
    metadata: Option<ClientMetadata>,
}

impl PooledClient {
    /// Connects and loads metadata. Never returns a partially initialized
    /// client: on metadata-load failure the pool is dropped and the error
    /// is propagated verbatim.
    pub async fn connect(database: String, connection_string: &str) -> DbResult<Self> {
        let mut pool_config = PoolConfig::new();
        pool_config.url = Some(connection_string.to_string());
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DbError::Connect {
                database: database.clone(),
                reason: e.to_string(),
            })?;

        let metadata = Self::load_metadata(&pool, &database).await.map_err(|e| {
            pool.close();
            e
        })?;

        Ok(Self {
            database,
            pool,
            metadata: Some(metadata),
        })
    }

    async fn load_metadata(pool: &Pool, database: &str) -> DbResult<ClientMetadata> {
        let client = pool.get().await.map_err(|e| DbError::Pool {
            database: database.to_string(),
            source: e,
        })?;
        let row = client
            .query_one("SELECT version()", &[])
            .await
            .map_err(|e| DbError::MetadataLoad {
                database: database.to_string(),
                source: e,
            })?;
        let server_version: String = row.get(0);
        let count_row = client
            .query_one(
                "SELECT count(*) FROM information_schema.tables WHERE table_schema = 'public'",
                &[],
            )
            .await
            .map_err(|e| DbError::MetadataLoad {
                database: database.to_string(),
                source: e,
            })?;
        let table_count: i64 = count_row.get(0);
        Ok(ClientMetadata {
            server_version,
            table_count,
        })
    }

    pub fn metadata(&self) -> DbResult<&ClientMetadata> {
        self.metadata.as_ref().ok_or(DbError::MetadataNotReady)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Runs `query` against a fresh connection, honoring `cancel`.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        cancel: &CancellationToken,
    ) -> DbResult<Vec<tokio_postgres::Row>> {
        let client = self.pool.get().await.map_err(|e| DbError::Pool {
            database: self.database.clone(),
            source: e,
        })?;
        tokio::select! {
            _ = cancel.cancelled() => Err(DbError::Cancelled),
            result = client.query(sql, params) => result.map_err(DbError::Query),
        }
    }

    /// Closes the pool, releasing every idle and checked-out connection
    /// handle as they return.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_not_ready_before_connect() {
        let client = PooledClient {
            database: "test".to_string(),
            pool: PoolConfig::new().create_pool(Some(Runtime::Tokio1), NoTls).unwrap(),
            metadata: None,
        };
        assert!(matches!(client.metadata(), Err(DbError::MetadataNotReady)));
    }
}
