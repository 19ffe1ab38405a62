// sqlx error mapping

use clusterdiag_core::port::BackendError;

/// MySQL `ER_ACCESS_DENIED_ERROR`, also returned by OceanBase
const MYSQL_ACCESS_DENIED: &str = "1045";
/// MySQL `ER_DBACCESS_DENIED_ERROR`
const MYSQL_DB_ACCESS_DENIED: &str = "1044";

/// Convert a sqlx error into the backend error taxonomy
pub fn map_sqlx_error(err: sqlx::Error) -> BackendError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(MYSQL_ACCESS_DENIED) | Some(MYSQL_DB_ACCESS_DENIED) => {
                BackendError::Auth(db_err.message().to_string())
            }
            Some(code) => BackendError::Query(format!("[{}] {}", code, db_err.message())),
            None => BackendError::Query(db_err.message().to_string()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => BackendError::Connect(err.to_string()),
        _ => BackendError::Query(err.to_string()),
    }
}
