// Cluster Version Detection

use crate::domain::{Node, Version};
use crate::error::{AppError, Result};
use crate::port::QueryExecutor;
use tracing::{debug, info};

/// Query whose first cell carries the version banner
pub const DEFAULT_VERSION_QUERY: &str = "SELECT version()";

/// Ask the first SQL-reachable node for the cluster version
pub async fn detect_version(
    query: &dyn QueryExecutor,
    nodes: &[Node],
    query_text: &str,
) -> Result<Version> {
    let node = nodes
        .iter()
        .find(|n| n.sql_url.is_some())
        .ok_or_else(|| AppError::Validation("no node has a sql_url to detect the version".into()))?;

    debug!(node = %node.id, query = query_text, "Detecting cluster version");
    let rows = query.query(node, query_text).await?;
    let banner = rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| AppError::NotFound(format!("version query returned no rows on {}", node.id)))?;

    let version = Version::extract(banner)
        .ok_or_else(|| AppError::Validation(format!("no version in banner '{}'", banner)))?;
    info!(node = %node.id, version = %version, "Detected cluster version");
    Ok(version)
}
