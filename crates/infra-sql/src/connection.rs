// SQL Connection Pool Setup

use crate::error::map_sqlx_error;
use clusterdiag_core::application::coordinator::constants::DEFAULT_CONNECT_TIMEOUT;
use clusterdiag_core::port::BackendError;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

/// Pool sizing and connect behavior, shared by every endpoint
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Pool for one endpoint
///
/// OceanBase and MySQL speak the MySQL protocol; SQLite serves local runs
/// and tests.
#[derive(Debug, Clone)]
pub enum SqlPool {
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl SqlPool {
    pub async fn close(&self) {
        match self {
            SqlPool::MySql(pool) => pool.close().await,
            SqlPool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Create a pool for `url` (`mysql://...`, `sqlite:...`)
///
/// One connection is opened eagerly so unreachable endpoints and bad
/// credentials surface here rather than on the first query.
pub async fn create_pool(url: &str, settings: &PoolSettings) -> Result<SqlPool, BackendError> {
    let max_connections = settings.max_connections.max(1);
    let scheme = url.split(':').next().unwrap_or_default();

    match scheme {
        "mysql" | "mariadb" => MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(url)
            .await
            .map(SqlPool::MySql)
            .map_err(map_sqlx_error),
        "sqlite" => SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(url)
            .await
            .map(SqlPool::Sqlite)
            .map_err(map_sqlx_error),
        other => Err(BackendError::Connect(format!(
            "unsupported SQL url scheme '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_sqlite_pool() {
        let pool = create_pool("sqlite::memory:", &PoolSettings::default())
            .await
            .unwrap();
        match &pool {
            SqlPool::Sqlite(p) => assert!(p.acquire().await.is_ok()),
            SqlPool::MySql(_) => panic!("expected a sqlite pool"),
        }
        pool.close().await;
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_connect_error() {
        let err = create_pool("nosuchdb://localhost/x", &PoolSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Connect(ref m) if m.contains("nosuchdb")), "{:?}", err);
    }
}
