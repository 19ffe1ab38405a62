// Query Executor Port
// Abstraction for running a SQL query against a node's SQL endpoint

use crate::domain::Node;
use crate::port::BackendError;
use async_trait::async_trait;

/// Result rows, every cell rendered as text (`NULL` as empty string)
pub type Rows = Vec<Vec<String>>;

/// Query executor trait
///
/// Implementations:
/// - SqlQueryExecutor: sqlx pools keyed by endpoint
/// - MockQueryExecutor: scripted rows for tests
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` against `node` and return all rows
    ///
    /// # Errors
    /// - BackendError::NotConfigured if the node has no SQL endpoint
    /// - BackendError::Connect / Auth / Timeout / Query on failure
    async fn query(&self, node: &Node, sql: &str) -> Result<Rows, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::NodeId;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Rule {
        node: Option<NodeId>,
        pattern: String,
        reply: Result<Rows, BackendError>,
    }

    /// Mock query executor
    ///
    /// Same matching as `MockRemoteShell`: substring pattern, optional node
    /// scope, last rule wins. Unmatched queries return no rows.
    #[derive(Default)]
    pub struct MockQueryExecutor {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<(NodeId, String)>>,
    }

    impl MockQueryExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, pattern: impl Into<String>, rows: Rows) -> Self {
            self.push(None, pattern, Ok(rows))
        }

        /// Single-cell result
        pub fn on_scalar(self, pattern: impl Into<String>, value: impl Into<String>) -> Self {
            self.on(pattern, vec![vec![value.into()]])
        }

        pub fn on_node_scalar(
            self,
            node: impl Into<String>,
            pattern: impl Into<String>,
            value: impl Into<String>,
        ) -> Self {
            self.push(Some(node.into()), pattern, Ok(vec![vec![value.into()]]))
        }

        pub fn fail(self, pattern: impl Into<String>, error: BackendError) -> Self {
            self.push(None, pattern, Err(error))
        }

        pub fn fail_node(self, node: impl Into<String>, error: BackendError) -> Self {
            self.push(Some(node.into()), "", Err(error))
        }

        fn push(
            self,
            node: Option<NodeId>,
            pattern: impl Into<String>,
            reply: Result<Rows, BackendError>,
        ) -> Self {
            self.rules.lock().unwrap().push(Rule {
                node,
                pattern: pattern.into(),
                reply,
            });
            self
        }

        pub fn calls(&self) -> Vec<(NodeId, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for MockQueryExecutor {
        async fn query(&self, node: &Node, sql: &str) -> Result<Rows, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((node.id.clone(), sql.to_string()));

            self.rules
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| r.node.as_deref().map_or(true, |n| n == node.id) && sql.contains(&r.pattern))
                .map(|r| r.reply.clone())
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
