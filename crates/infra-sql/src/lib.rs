// clusterdiag Infrastructure - SQL Adapter
// Implements: QueryExecutor over sqlx MySQL (OceanBase) and SQLite pools

mod connection;
mod error;
mod query_executor;

pub use connection::{create_pool, PoolSettings, SqlPool};
pub use error::map_sqlx_error;
pub use query_executor::SqlQueryExecutor;
