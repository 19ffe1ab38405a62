// Step Dispatcher
// Routes a substituted step command to the backend matching its kind

use crate::domain::{Node, StepKind};
use crate::port::{BackendError, ParameterReader, QueryExecutor, RemoteShell};
use std::sync::Arc;
use tracing::debug;

/// The three step backends, shared read-only by every node execution
#[derive(Clone)]
pub struct Backends {
    pub query: Arc<dyn QueryExecutor>,
    pub shell: Arc<dyn RemoteShell>,
    pub parameters: Arc<dyn ParameterReader>,
}

impl Backends {
    pub fn new(
        query: Arc<dyn QueryExecutor>,
        shell: Arc<dyn RemoteShell>,
        parameters: Arc<dyn ParameterReader>,
    ) -> Self {
        Self {
            query,
            shell,
            parameters,
        }
    }

    /// Run one step and extract its scalar output
    ///
    /// - sql: first column of the first row (empty if no rows)
    /// - ssh: trimmed stdout; a non-zero exit status is a BackendError
    /// - system parameter: trimmed value
    pub async fn dispatch(
        &self,
        node: &Node,
        kind: StepKind,
        command: &str,
    ) -> Result<String, BackendError> {
        debug!(node = %node.id, kind = %kind, command = %command, "Dispatching step");

        match kind {
            StepKind::Sql => {
                let rows = self.query.query(node, command).await?;
                Ok(rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next())
                    .unwrap_or_default())
            }
            StepKind::Ssh => {
                let output = self.shell.run(node, command).await?;
                if !output.is_success() {
                    return Err(BackendError::CommandFailed {
                        exit_code: output.exit_code,
                        stderr: output.stderr.trim().to_string(),
                    });
                }
                Ok(output.stdout.trim().to_string())
            }
            StepKind::SystemParameter => {
                let value = self.parameters.read(node, command.trim()).await?;
                Ok(value.trim().to_string())
            }
        }
    }

    /// Evaluate an `expression` rule in the step's own backend
    ///
    /// sql steps run `SELECT (<expr>)` and test the first cell for truth;
    /// shell and parameter steps run the expression on the node's shell
    /// and pass on exit status 0.
    pub async fn run_expression(
        &self,
        node: &Node,
        kind: StepKind,
        expression: &str,
    ) -> Result<bool, BackendError> {
        debug!(node = %node.id, kind = %kind, expression = %expression, "Evaluating expression");

        match kind {
            StepKind::Sql => {
                let sql = format!("SELECT ({})", expression);
                let rows = self.query.query(node, &sql).await?;
                let cell = rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next())
                    .unwrap_or_default();
                Ok(is_truthy(&cell))
            }
            StepKind::Ssh | StepKind::SystemParameter => {
                let output = self.shell.run(node, expression).await?;
                Ok(output.is_success())
            }
        }
    }
}

fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    !(cell.is_empty()
        || cell == "0"
        || cell.eq_ignore_ascii_case("false")
        || cell.eq_ignore_ascii_case("null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::parameter_reader::mocks::MockParameterReader;
    use crate::port::query_executor::mocks::MockQueryExecutor;
    use crate::port::remote_shell::mocks::MockRemoteShell;

    fn backends(
        query: MockQueryExecutor,
        shell: MockRemoteShell,
        params: MockParameterReader,
    ) -> Backends {
        Backends::new(Arc::new(query), Arc::new(shell), Arc::new(params))
    }

    #[tokio::test]
    async fn test_sql_extracts_first_cell() {
        let query = MockQueryExecutor::new().on(
            "select",
            vec![
                vec!["4".to_string(), "x".to_string()],
                vec!["9".to_string()],
            ],
        );
        let b = backends(query, MockRemoteShell::new(), MockParameterReader::new());
        let node = Node::new("n1", "h1");

        assert_eq!(b.dispatch(&node, StepKind::Sql, "select 1").await.unwrap(), "4");
        assert_eq!(b.dispatch(&node, StepKind::Sql, "show nothing").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_ssh_trims_and_fails_on_nonzero_exit() {
        let shell = MockRemoteShell::new()
            .on("cat", "  65535\n")
            .on_exit("false", 3);
        let b = backends(MockQueryExecutor::new(), shell, MockParameterReader::new());
        let node = Node::new("n1", "h1");

        assert_eq!(b.dispatch(&node, StepKind::Ssh, "cat x").await.unwrap(), "65535");
        let err = b.dispatch(&node, StepKind::Ssh, "false").await.unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { exit_code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_parameter_read() {
        let params = MockParameterReader::new().with("vm.swappiness", "0\n");
        let b = backends(MockQueryExecutor::new(), MockRemoteShell::new(), params);
        let node = Node::new("n1", "h1");

        let value = b
            .dispatch(&node, StepKind::SystemParameter, " vm.swappiness ")
            .await
            .unwrap();
        assert_eq!(value, "0");
    }

    #[tokio::test]
    async fn test_expressions_use_step_backend() {
        let shell = MockRemoteShell::new().on_exit("-gt", 1);
        let query = MockQueryExecutor::new()
            .on_scalar("SELECT (1 = 1)", "1")
            .on_scalar("SELECT (1 = 2)", "0");
        let b = backends(query, shell, MockParameterReader::new());
        let node = Node::new("n1", "h1");

        assert!(b.run_expression(&node, StepKind::Sql, "1 = 1").await.unwrap());
        assert!(!b.run_expression(&node, StepKind::Sql, "1 = 2").await.unwrap());
        assert!(!b.run_expression(&node, StepKind::Ssh, "[ 1 -gt 2 ]").await.unwrap());
        assert!(b.run_expression(&node, StepKind::Ssh, "[ 2 -eq 2 ]").await.unwrap());
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(" "));
        assert!(!is_truthy("NULL"));
        assert!(!is_truthy("false"));
    }
}
